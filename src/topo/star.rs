//! Star 拓扑构建

use crate::net::{NodeId, Topology};

/// Star 拓扑配置选项
#[derive(Debug, Clone)]
pub struct StarOpts {
    pub num_endpoints: usize,
    /// 端点链路单信道容量
    pub ep_link_capacity: f64,
    pub num_channels: usize,
}

impl Default for StarOpts {
    fn default() -> Self {
        Self {
            num_endpoints: 4,
            ep_link_capacity: 1250.0,
            num_channels: 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StarTopology {
    pub topology: Topology,
    pub hub: NodeId,
    pub endpoints: Vec<NodeId>,
    pub ep_link_capacity: f64,
}

impl StarTopology {
    /// 任意两个端点之间经过中心交换机的唯一路径
    pub fn path(&self, src: NodeId, dst: NodeId) -> Vec<NodeId> {
        vec![src, self.hub, dst]
    }

    /// 全网容量：所有端点链路的 `容量 × 信道数` 之和
    pub fn network_rate_capacity(&self) -> f64 {
        self.endpoints
            .iter()
            .map(|ep| self.topology.endpoint_capacity(*ep))
            .sum()
    }

    /// 单端点链路的总容量（所有信道）
    pub fn ep_link_rate_capacity(&self) -> f64 {
        self.ep_link_capacity * self.topology.num_channels() as f64
    }
}

/// 构建 star 拓扑
///
/// 拓扑结构：每个端点 `e{i}` 与中心交换机 `hub` 之间一条链路。
/// 端点先于交换机添加，所以端点 id 为 `0..num_endpoints`。
pub fn build_star(opts: &StarOpts) -> StarTopology {
    let mut topology = Topology::new(opts.num_channels);
    let endpoints: Vec<NodeId> = (0..opts.num_endpoints)
        .map(|i| topology.add_endpoint(format!("e{i}")))
        .collect();
    let hub = topology.add_switch("hub");
    for ep in &endpoints {
        topology.connect(*ep, hub, opts.ep_link_capacity);
    }
    StarTopology {
        topology,
        hub,
        endpoints,
        ep_link_capacity: opts.ep_link_capacity,
    }
}
