//! 奖励函数
//!
//! 每步之后根据队列状态打分；排队/阻塞的工作越多，分数越低。

use crate::queue::QueueManager;

/// 可插拔的打分接口
pub trait RewardFn: std::fmt::Debug {
    fn reward(&self, queues: &QueueManager, slot_size: f64) -> f64;
}

/// `−slot_size × (排队流数 + 满队列数)`；无队列上限时满队列数为 0
#[derive(Debug, Clone, Copy, Default)]
pub struct QueueOccupancyReward;

impl RewardFn for QueueOccupancyReward {
    fn reward(&self, queues: &QueueManager, slot_size: f64) -> f64 {
        -slot_size * (queues.num_queued() + queues.num_full()) as f64
    }
}
