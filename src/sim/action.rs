//! 动作与观测
//!
//! 调度策略每步读取 [`Observation`]，返回 [`Action`]。

use serde::{Deserialize, Serialize};

use crate::demand::{DemandEvent, TimeSlot};
use crate::net::{ChannelId, NetworkState, NodeId, Topology};
use crate::queue::{Flow, QueueManager};

/// 被选中的流及其路由
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowRef {
    pub flow_id: u64,
    #[serde(default)]
    pub job_id: Option<u64>,
    pub src: NodeId,
    pub dst: NodeId,
    pub path: Vec<NodeId>,
    pub channel: ChannelId,
    /// 数据包大小列表；只在流还没有数据包时被采用
    #[serde(default)]
    pub packets: Option<Vec<f64>>,
}

impl FlowRef {
    /// 以队列中的流为基础构造
    pub fn for_flow(flow: &Flow, path: Vec<NodeId>, channel: ChannelId) -> Self {
        Self {
            flow_id: flow.flow_id,
            job_id: flow.job_id,
            src: flow.src,
            dst: flow.dst,
            path,
            channel,
            packets: None,
        }
    }
}

/// 一步的调度决策
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub chosen_flows: Vec<FlowRef>,
}

/// 每步暴露给策略的只读视图
#[derive(Debug, Clone, Copy)]
pub struct Observation<'a> {
    pub step: usize,
    pub time: f64,
    /// 当前时隙；需求耗尽后为最后一个时隙
    pub slot: Option<&'a TimeSlot<DemandEvent>>,
    pub topology: &'a Topology,
    pub network: &'a NetworkState,
    pub queues: &'a QueueManager,
}

/// `step` 的结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepResult {
    pub reward: f64,
    pub done: bool,
}
