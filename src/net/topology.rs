//! 网络拓扑
//!
//! 只描述不可变的拓扑结构：节点、链路与每条链路的信道数。
//! 仿真过程中的可变状态放在 [`NetworkState`](super::NetworkState)。

use std::collections::HashMap;

use tracing::debug;

use super::id::{ChannelId, LinkId, NodeId};
use super::link::Link;
use crate::error::{Error, Result};

/// 节点类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// 端点：流的源或宿
    Endpoint,
    Switch,
}

#[derive(Debug, Clone)]
struct NodeInfo {
    name: String,
    kind: NodeKind,
}

/// 网络拓扑
#[derive(Debug, Clone)]
pub struct Topology {
    nodes: Vec<NodeInfo>,
    links: Vec<Link>,
    edges: HashMap<(NodeId, NodeId), LinkId>,
    num_channels: usize,
}

impl Topology {
    pub fn new(num_channels: usize) -> Self {
        Self {
            nodes: Vec::new(),
            links: Vec::new(),
            edges: HashMap::new(),
            num_channels: num_channels.max(1),
        }
    }

    /// 添加端点节点
    pub fn add_endpoint(&mut self, name: impl Into<String>) -> NodeId {
        self.add_node(name.into(), NodeKind::Endpoint)
    }

    /// 添加交换机节点
    pub fn add_switch(&mut self, name: impl Into<String>) -> NodeId {
        self.add_node(name.into(), NodeKind::Switch)
    }

    fn add_node(&mut self, name: String, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeInfo { name, kind });
        id
    }

    /// 连接两个节点（无向链路，两个方向共用同一组信道）
    pub fn connect(&mut self, a: NodeId, b: NodeId, max_channel_capacity: f64) -> LinkId {
        let id = LinkId(self.links.len());
        self.links.push(Link::new(a, b, max_channel_capacity));
        self.edges.insert((a, b), id);
        self.edges.insert((b, a), id);
        debug!(?a, ?b, link = ?id, max_channel_capacity, "添加链路");
        id
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_links(&self) -> usize {
        self.links.len()
    }

    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    pub fn channels(&self) -> impl Iterator<Item = ChannelId> {
        (0..self.num_channels).map(ChannelId)
    }

    pub fn name(&self, node: NodeId) -> Option<&str> {
        self.nodes.get(node.0).map(|n| n.name.as_str())
    }

    pub fn kind(&self, node: NodeId) -> Option<NodeKind> {
        self.nodes.get(node.0).map(|n| n.kind)
    }

    pub fn is_endpoint(&self, node: NodeId) -> bool {
        self.kind(node) == Some(NodeKind::Endpoint)
    }

    /// 所有端点，按 id 升序
    pub fn endpoints(&self) -> Vec<NodeId> {
        (0..self.nodes.len())
            .map(NodeId)
            .filter(|n| self.is_endpoint(*n))
            .collect()
    }

    pub fn link(&self, id: LinkId) -> &Link {
        &self.links[id.0]
    }

    pub fn links(&self) -> impl Iterator<Item = (LinkId, &Link)> {
        self.links.iter().enumerate().map(|(i, l)| (LinkId(i), l))
    }

    pub fn link_between(&self, a: NodeId, b: NodeId) -> Option<LinkId> {
        self.edges.get(&(a, b)).copied()
    }

    /// 路径上依次经过的链路
    pub fn path_links(&self, path: &[NodeId]) -> Result<Vec<LinkId>> {
        path.windows(2)
            .map(|hop| {
                self.link_between(hop[0], hop[1]).ok_or(Error::InvalidPath {
                    from: hop[0],
                    to: hop[1],
                })
            })
            .collect()
    }

    /// 路径的瓶颈：路径上各链路单信道容量的最小值
    pub fn path_capacity(&self, path: &[NodeId]) -> Result<f64> {
        let links = self.path_links(path)?;
        Ok(links
            .iter()
            .map(|l| self.link(*l).max_channel_capacity)
            .fold(f64::INFINITY, f64::min))
    }

    /// 端点对外的总容量：所有相连链路的 `容量 × 信道数` 之和
    pub fn endpoint_capacity(&self, node: NodeId) -> f64 {
        self.links
            .iter()
            .filter(|l| l.other(node).is_some())
            .map(|l| l.max_channel_capacity * self.num_channels as f64)
            .sum()
    }
}
