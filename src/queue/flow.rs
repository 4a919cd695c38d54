//! 仿真中的流
//!
//! 需求到达时创建，入队后由调度动作补充路径/信道/数据包，
//! 被消费完毕后标记完成并出队。

use crate::net::{ChannelId, NodeId};

/// 流的身份键：(大小, 源, 宿, 到达时间, flow_id, job_id)。
/// 到达时间只能设置一次，所以键在流的生命周期内不变。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FlowKey {
    size_bits: u64,
    pub src: NodeId,
    pub dst: NodeId,
    arrival_bits: Option<u64>,
    pub flow_id: u64,
    pub job_id: Option<u64>,
}

/// 运行时的流
#[derive(Debug, Clone, PartialEq)]
pub struct Flow {
    pub flow_id: u64,
    pub job_id: Option<u64>,
    pub src: NodeId,
    pub dst: NodeId,
    pub size: f64,
    /// 需求记录中的事件时间
    pub event_time: f64,
    time_arrived: Option<f64>,
    /// 出队完成时由所在队列写入
    pub time_completed: Option<f64>,
    /// 作业流在依赖满足前不可调度
    pub schedulable: bool,
    pub path: Option<Vec<NodeId>>,
    pub channel: Option<ChannelId>,
    /// 剩余数据包（每项为一个包的大小）；未分配数据包时为 None
    pub packets: Option<Vec<f64>>,
    /// 未分配数据包时剩余的信息量
    remaining: f64,
}

impl Flow {
    pub fn new(flow_id: u64, job_id: Option<u64>, src: NodeId, dst: NodeId, size: f64, event_time: f64) -> Self {
        Self {
            flow_id,
            job_id,
            src,
            dst,
            size,
            event_time,
            time_arrived: None,
            time_completed: None,
            schedulable: true,
            path: None,
            channel: None,
            packets: None,
            remaining: size,
        }
    }

    pub fn key(&self) -> FlowKey {
        FlowKey {
            size_bits: self.size.to_bits(),
            src: self.src,
            dst: self.dst,
            arrival_bits: self.time_arrived.map(f64::to_bits),
            flow_id: self.flow_id,
            job_id: self.job_id,
        }
    }

    pub fn time_arrived(&self) -> Option<f64> {
        self.time_arrived
    }

    /// 设置到达时间；已设置过则不改动并返回 false
    pub fn mark_arrived(&mut self, now: f64) -> bool {
        if self.time_arrived.is_some() {
            return false;
        }
        self.time_arrived = Some(now);
        true
    }

    /// 剩余未传输的信息量
    pub fn remaining_info(&self) -> f64 {
        match &self.packets {
            Some(pkts) => pkts.iter().sum(),
            None => self.remaining,
        }
    }

    pub fn is_finished(&self) -> bool {
        match &self.packets {
            Some(pkts) => pkts.is_empty(),
            None => self.remaining <= 0.0,
        }
    }

    /// 消耗本时隙可传输的信息量。有数据包时按顺序发送完整的包，
    /// 累计大小不超过 `budget`；否则直接扣减字节数。返回实际传输的信息量。
    pub fn consume(&mut self, budget: f64) -> f64 {
        match &mut self.packets {
            Some(pkts) => {
                let mut sent = 0.0;
                let mut n = 0;
                for &pkt in pkts.iter() {
                    if sent + pkt > budget {
                        break;
                    }
                    sent += pkt;
                    n += 1;
                }
                pkts.drain(..n);
                sent
            }
            None => {
                let sent = budget.min(self.remaining).max(0.0);
                self.remaining -= sent;
                sent
            }
        }
    }
}
