//! 错误类型
//!
//! 需求生成与仿真共用的错误枚举。配置/不变量错误直接中止；
//! 队列满导致的丢弃不是错误，只计入统计。

use std::collections::BTreeMap;

use crate::net::{ChannelId, NodeId};

/// 仿真与需求生成过程中可能出现的错误
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid distribution: {0}")]
    InvalidDistribution(String),

    #[error("invalid load config: {0}")]
    InvalidLoadConfig(String),

    #[error(
        "node distribution invalid for this load: endpoint {endpoint:?} would need {load_rate} \
         info units per unit time but its link capacity is {capacity}"
    )]
    InvalidNodeDistribution {
        endpoint: NodeId,
        load_rate: f64,
        capacity: f64,
    },

    #[error("no free endpoints left to spread excess load of endpoint {endpoint:?} across")]
    NoCapacityToRedistribute { endpoint: NodeId },

    #[error(
        "unable to pack flow {flow_id} (size {size}) without exceeding endpoint info limit \
         {max_ep_info}; endpoint loads: {ep_loads:?}"
    )]
    PackingInfeasible {
        flow_id: u64,
        size: f64,
        max_ep_info: f64,
        ep_loads: BTreeMap<NodeId, f64>,
    },

    #[error(
        "timed out in {phase} phase after {iterations} iterations: reached load fraction \
         {reached} (target {target})"
    )]
    LoadConvergenceTimeout {
        phase: &'static str,
        iterations: usize,
        reached: f64,
        target: f64,
    },

    #[error("session ended but no flows were recorded as arrived; check demand endpoints and sizes")]
    NoFlowsArrived,

    #[error("flow {flow_id} (job {job_id:?}) not found in queue {src:?}->{dst:?}")]
    FlowNotFound {
        flow_id: u64,
        job_id: Option<u64>,
        src: NodeId,
        dst: NodeId,
    },

    #[error("invalid demand data: {0}")]
    InvalidDemand(String),

    #[error("slot size must be finite and > 0, got {0}")]
    InvalidSlotSize(f64),

    #[error("demand spans zero time, load rate is undefined")]
    ZeroDuration,

    #[error("demand endpoint {0:?} is not an endpoint of the topology")]
    UnknownEndpoint(NodeId),

    #[error("path {from:?}->{to:?} is not a route through the topology")]
    InvalidPath { from: NodeId, to: NodeId },

    #[error("channel {channel:?} does not exist, links carry {num_channels} channels")]
    UnknownChannel {
        channel: ChannelId,
        num_channels: usize,
    },

    #[error("simulation already finished, call reset() first")]
    SessionFinished,
}

pub type Result<T> = std::result::Result<T, Error>;
