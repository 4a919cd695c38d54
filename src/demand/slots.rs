//! 时隙划分
//!
//! 把按时间排列的事件流切成固定宽度的时隙，供仿真器逐步消费。

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{Error, Result};
use crate::sim::time::{decimals_of, round_to};

use super::record::{DemandEvent, FlowEvent, JobEvent};

/// 带到达时间的事件
pub trait Timed {
    fn event_time(&self) -> f64;
}

impl Timed for FlowEvent {
    fn event_time(&self) -> f64 {
        self.event_time
    }
}

impl Timed for JobEvent {
    fn event_time(&self) -> f64 {
        self.event_time
    }
}

impl Timed for DemandEvent {
    fn event_time(&self) -> f64 {
        DemandEvent::event_time(self)
    }
}

/// 一个时隙：到达时间落在 `[lb, ub)` 内的事件
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSlot<T> {
    pub lb: f64,
    pub ub: f64,
    pub events: Vec<T>,
}

/// 固定宽度的时隙划分器
#[derive(Debug, Clone, Copy)]
pub struct TimeSlotter {
    slot_size: f64,
    decimals: u32,
}

impl TimeSlotter {
    pub fn new(slot_size: f64) -> Result<Self> {
        if !(slot_size.is_finite() && slot_size > 0.0) {
            return Err(Error::InvalidSlotSize(slot_size));
        }
        Ok(Self {
            slot_size,
            decimals: decimals_of(slot_size),
        })
    }

    pub fn slot_size(&self) -> f64 {
        self.slot_size
    }

    pub fn decimals(&self) -> u32 {
        self.decimals
    }

    /// 第 `k` 个时隙的边界；第 0 个下界恰为会话起点
    fn boundary(&self, start: f64, k: usize) -> f64 {
        if k == 0 {
            start
        } else {
            round_to(start + k as f64 * self.slot_size, self.decimals)
        }
    }

    /// 划分事件。事件先按时间稳定排序，然后单趟归并：时隙指针单调前进，
    /// 每个事件放入第一个上界大于其时间的时隙。空输入返回空表。
    pub fn slot<T: Timed>(&self, mut events: Vec<T>) -> BTreeMap<usize, TimeSlot<T>> {
        let mut slots = BTreeMap::new();
        if events.is_empty() {
            return slots;
        }
        events.sort_by(|a, b| a.event_time().total_cmp(&b.event_time()));
        let start = events[0].event_time();
        let end = events[events.len() - 1].event_time();

        let mut bounds = vec![start];
        loop {
            let ub = self.boundary(start, bounds.len());
            bounds.push(ub);
            if ub > end {
                break;
            }
        }
        for k in 0..bounds.len() - 1 {
            slots.insert(
                k,
                TimeSlot {
                    lb: bounds[k],
                    ub: bounds[k + 1],
                    events: Vec::new(),
                },
            );
        }

        let mut k = 0;
        for ev in events {
            let t = ev.event_time();
            while k + 2 < bounds.len() && t >= bounds[k + 1] {
                k += 1;
            }
            if let Some(slot) = slots.get_mut(&k) {
                slot.events.push(ev);
            }
        }
        debug!(num_slots = slots.len(), start, end, slot_size = self.slot_size, "时隙划分完成");
        slots
    }
}
