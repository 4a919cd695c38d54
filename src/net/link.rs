//! 链路类型
//!
//! 拓扑中的无向链路；每条链路有若干等容量信道。

use super::id::NodeId;

/// 无向链路
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub a: NodeId,
    pub b: NodeId,
    /// 单个信道的最大容量（信息单位/时间单位）
    pub max_channel_capacity: f64,
}

impl Link {
    pub fn new(a: NodeId, b: NodeId, max_channel_capacity: f64) -> Self {
        Self {
            a,
            b,
            max_channel_capacity,
        }
    }

    /// 链路另一端；`node` 不是端点时返回 None
    pub fn other(&self, node: NodeId) -> Option<NodeId> {
        if node == self.a {
            Some(self.b)
        } else if node == self.b {
            Some(self.a)
        } else {
            None
        }
    }
}
