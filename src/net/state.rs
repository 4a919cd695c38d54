//! 网络运行状态
//!
//! 每条链路每个信道的剩余容量，以及全网已用容量与活动连接计数。
//! 由仿真器独占，每步以只读快照暴露给调度策略。

use super::id::{ChannelId, LinkId, NodeId};
use super::topology::Topology;

/// 网络状态快照
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkState {
    endpoints: Vec<NodeId>,
    /// `remaining[link][channel]`
    remaining: Vec<Vec<f64>>,
    pub capacity_used: f64,
    pub active_connections: usize,
}

impl NetworkState {
    pub fn new(topo: &Topology) -> Self {
        let remaining = topo
            .links()
            .map(|(_, l)| vec![l.max_channel_capacity; topo.num_channels()])
            .collect();
        Self {
            endpoints: topo.endpoints(),
            remaining,
            capacity_used: 0.0,
            active_connections: 0,
        }
    }

    pub fn endpoints(&self) -> &[NodeId] {
        &self.endpoints
    }

    pub fn remaining(&self, link: LinkId, channel: ChannelId) -> f64 {
        self.remaining[link.0][channel.0]
    }

    /// 链路所有信道的剩余容量
    pub fn channels(&self, link: LinkId) -> &[f64] {
        &self.remaining[link.0]
    }

    pub(crate) fn remaining_mut(&mut self, link: LinkId, channel: ChannelId) -> &mut f64 {
        &mut self.remaining[link.0][channel.0]
    }
}
