//! 队列管理
//!
//! 每个有序端点对一个虚拟队列。

use std::collections::BTreeMap;

use tracing::{debug, trace};

use super::flow::{Flow, FlowKey};
use super::virtual_queue::VirtualQueue;
use crate::error::{Error, Result};
use crate::net::NodeId;

#[derive(Debug, Clone, Default)]
pub struct QueueManager {
    max_flows: Option<usize>,
    queues: BTreeMap<(NodeId, NodeId), VirtualQueue>,
}

impl QueueManager {
    /// 为所有有序端点对 (src != dst) 建空队列
    pub fn new(endpoints: &[NodeId], max_flows: Option<usize>) -> Self {
        let mut queues = BTreeMap::new();
        for &src in endpoints {
            for &dst in endpoints.iter().filter(|d| **d != src) {
                queues.insert((src, dst), VirtualQueue::new(max_flows));
            }
        }
        Self { max_flows, queues }
    }

    /// 入队；队列已满返回 Err(flow)
    pub fn admit(&mut self, flow: Flow) -> std::result::Result<(), Flow> {
        let max_flows = self.max_flows;
        let queue = self
            .queues
            .entry((flow.src, flow.dst))
            .or_insert_with(|| VirtualQueue::new(max_flows));
        trace!(flow_id = flow.flow_id, job_id = ?flow.job_id, len = queue.len(), "入队");
        queue.admit(flow)
    }

    pub fn queue(&self, src: NodeId, dst: NodeId) -> Option<&VirtualQueue> {
        self.queues.get(&(src, dst))
    }

    pub fn queues(&self) -> impl Iterator<Item = (&(NodeId, NodeId), &VirtualQueue)> {
        self.queues.iter()
    }

    pub fn find(&self, src: NodeId, dst: NodeId, flow_id: u64, job_id: Option<u64>) -> Result<&Flow> {
        self.queues
            .get(&(src, dst))
            .and_then(|q| q.find(flow_id, job_id))
            .ok_or(Error::FlowNotFound {
                flow_id,
                job_id,
                src,
                dst,
            })
    }

    pub fn find_mut(
        &mut self,
        src: NodeId,
        dst: NodeId,
        flow_id: u64,
        job_id: Option<u64>,
    ) -> Result<&mut Flow> {
        self.queues
            .get_mut(&(src, dst))
            .and_then(|q| q.find_mut(flow_id, job_id))
            .ok_or(Error::FlowNotFound {
                flow_id,
                job_id,
                src,
                dst,
            })
    }

    /// 按身份键出队
    pub fn remove(&mut self, key: &FlowKey) -> Result<Flow> {
        self.queues
            .get_mut(&(key.src, key.dst))
            .and_then(|q| q.remove(key))
            .ok_or(Error::FlowNotFound {
                flow_id: key.flow_id,
                job_id: key.job_id,
                src: key.src,
                dst: key.dst,
            })
    }

    /// 流完成：从所在队列移除并记录完成时间
    pub fn complete(&mut self, key: &FlowKey, at: f64) -> Result<Flow> {
        self.queues
            .get_mut(&(key.src, key.dst))
            .and_then(|q| q.complete(key, at))
            .ok_or(Error::FlowNotFound {
                flow_id: key.flow_id,
                job_id: key.job_id,
                src: key.src,
                dst: key.dst,
            })
    }

    /// 移除某个作业在所有队列中的流
    pub fn remove_job(&mut self, job_id: u64) -> Vec<Flow> {
        let removed: Vec<Flow> = self
            .queues
            .values_mut()
            .flat_map(|q| q.remove_job(job_id))
            .collect();
        if !removed.is_empty() {
            debug!(job_id, removed = removed.len(), "移除作业的已入队流");
        }
        removed
    }

    /// 所有队列中的流数
    pub fn num_queued(&self) -> usize {
        self.queues.values().map(VirtualQueue::len).sum()
    }

    /// 已满的队列数（无上限时恒为 0）
    pub fn num_full(&self) -> usize {
        self.queues.values().filter(|q| q.is_full()).count()
    }

    /// 每个有序端点对的排队信息量
    pub fn queued_info(&self) -> impl Iterator<Item = ((NodeId, NodeId), f64)> + '_ {
        self.queues.iter().map(|(k, q)| (*k, q.queued_info()))
    }

    pub fn iter_flows(&self) -> impl Iterator<Item = &Flow> {
        self.queues.values().flat_map(|q| q.flows().iter())
    }
}
