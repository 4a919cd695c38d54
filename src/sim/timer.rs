//! 操作计时器
//!
//! 父操作运行时间的到期事件，按 (到期时间, 序列号) 取最小。

use std::cmp::Ordering;

/// 一个正在运行的父操作到期后释放 `flow_id`
#[derive(Debug, Clone, Copy)]
pub(crate) struct OpTimer {
    pub(crate) at: f64,
    pub(crate) seq: u64,
    pub(crate) job_id: u64,
    pub(crate) flow_id: u64,
}

// BinaryHeap 是 max-heap；我们需要最早到期优先，因此反向比较。
impl Ord for OpTimer {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.at.total_cmp(&other.at) {
            Ordering::Equal => self.seq.cmp(&other.seq),
            ord => ord,
        }
        .reverse()
    }
}

impl PartialOrd for OpTimer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for OpTimer {
    fn eq(&self, other: &Self) -> bool {
        self.at.total_cmp(&other.at) == Ordering::Equal && self.seq == other.seq
    }
}

impl Eq for OpTimer {}
