//! 连接管理
//!
//! 建立连接时沿路径在指定信道上扣除流大小的容量，拆除时加回。
//! 管理器记住当前已连接的流，只对相邻两次动作之间的差集调用
//! 建立/拆除，重复选中的流保持不动。

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, instrument};

use super::id::{ChannelId, LinkId, NodeId};
use super::state::NetworkState;
use super::topology::Topology;
use crate::error::{Error, Result};

/// 连接标识：(flow_id, job_id)
pub type ConnectionKey = (u64, Option<u64>);

/// 一条已路由的连接
#[derive(Debug, Clone, PartialEq)]
pub struct Connection {
    pub flow_id: u64,
    pub job_id: Option<u64>,
    pub size: f64,
    pub channel: ChannelId,
    links: Vec<LinkId>,
}

impl Connection {
    /// 校验路径与信道后构造连接
    pub fn new(
        topo: &Topology,
        flow_id: u64,
        job_id: Option<u64>,
        size: f64,
        path: &[NodeId],
        channel: ChannelId,
    ) -> Result<Self> {
        if channel.0 >= topo.num_channels() {
            return Err(Error::UnknownChannel {
                channel,
                num_channels: topo.num_channels(),
            });
        }
        Ok(Self {
            flow_id,
            job_id,
            size,
            channel,
            links: topo.path_links(path)?,
        })
    }

    pub fn key(&self) -> ConnectionKey {
        (self.flow_id, self.job_id)
    }

    pub fn links(&self) -> &[LinkId] {
        &self.links
    }
}

/// 一次同步产生的差集
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionDelta {
    pub established: Vec<ConnectionKey>,
    pub torn_down: Vec<ConnectionKey>,
}

#[derive(Debug, Default)]
pub struct ConnectionManager {
    connected: BTreeMap<ConnectionKey, Connection>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_connected(&self, key: ConnectionKey) -> bool {
        self.connected.contains_key(&key)
    }

    pub fn connected(&self) -> impl Iterator<Item = &Connection> {
        self.connected.values()
    }

    pub fn len(&self) -> usize {
        self.connected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connected.is_empty()
    }

    /// 建立连接：路径上每条链路的该信道容量减去流大小
    #[instrument(skip(self, state, conn), fields(flow_id = conn.flow_id, job_id = ?conn.job_id, channel = ?conn.channel))]
    pub fn establish(&mut self, state: &mut NetworkState, conn: Connection) {
        for link in &conn.links {
            *state.remaining_mut(*link, conn.channel) -= conn.size;
            state.capacity_used += conn.size;
        }
        state.active_connections += 1;
        debug!(hops = conn.links.len(), size = conn.size, "🔗 建立连接");
        self.connected.insert(conn.key(), conn);
    }

    /// 拆除连接；未连接时返回 None
    #[instrument(skip(self, state))]
    pub fn teardown(&mut self, state: &mut NetworkState, key: ConnectionKey) -> Option<Connection> {
        let conn = self.connected.remove(&key)?;
        for link in &conn.links {
            *state.remaining_mut(*link, conn.channel) += conn.size;
            state.capacity_used -= conn.size;
        }
        state.active_connections = state.active_connections.saturating_sub(1);
        debug!(hops = conn.links.len(), size = conn.size, "拆除连接");
        Some(conn)
    }

    /// 按新的选择集同步：拆除不再被选中的，建立新选中的
    pub fn sync(&mut self, state: &mut NetworkState, chosen: Vec<Connection>) -> ConnectionDelta {
        let keep: BTreeSet<ConnectionKey> = chosen.iter().map(|c| c.key()).collect();
        let mut delta = ConnectionDelta::default();

        let stale: Vec<ConnectionKey> = self
            .connected
            .keys()
            .filter(|k| !keep.contains(k))
            .copied()
            .collect();
        for key in stale {
            if self.teardown(state, key).is_some() {
                delta.torn_down.push(key);
            }
        }
        for conn in chosen {
            let key = conn.key();
            if self.is_connected(key) {
                continue;
            }
            self.establish(state, conn);
            delta.established.push(key);
        }
        delta
    }

    /// 拆除所有连接
    pub fn clear(&mut self, state: &mut NetworkState) {
        let keys: Vec<ConnectionKey> = self.connected.keys().copied().collect();
        for key in keys {
            self.teardown(state, key);
        }
    }
}
