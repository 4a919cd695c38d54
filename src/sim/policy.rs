//! 调度策略 trait
//!
//! 策略是拉取式的协作者：每步读取观测、返回动作，不直接修改仿真状态。

use std::collections::BTreeSet;

use super::action::{Action, FlowRef, Observation};
use crate::net::{ChannelId, LinkId, NodeId};
use crate::queue::Flow;

/// 调度策略：由业务层实现
pub trait Policy {
    fn decide(&mut self, obs: &Observation<'_>) -> Action;
}

/// 先到先服务的参考策略：按到达时间依次为可调度的流分配第一个
/// 整条路径都空闲的信道，每个 (链路, 信道) 同一时刻只承载一条流。
pub struct FirstComeFirstServed<F> {
    route: F,
}

impl<F> FirstComeFirstServed<F>
where
    F: Fn(NodeId, NodeId) -> Vec<NodeId>,
{
    pub fn new(route: F) -> Self {
        Self { route }
    }
}

impl<F> Policy for FirstComeFirstServed<F>
where
    F: Fn(NodeId, NodeId) -> Vec<NodeId>,
{
    fn decide(&mut self, obs: &Observation<'_>) -> Action {
        let mut ready: Vec<&Flow> = obs.queues.iter_flows().filter(|f| f.schedulable).collect();
        ready.sort_by(|a, b| {
            let ta = a.time_arrived().unwrap_or(f64::INFINITY);
            let tb = b.time_arrived().unwrap_or(f64::INFINITY);
            ta.total_cmp(&tb)
                .then(a.job_id.cmp(&b.job_id))
                .then(a.flow_id.cmp(&b.flow_id))
        });

        let mut busy: BTreeSet<(LinkId, ChannelId)> = BTreeSet::new();
        let mut chosen = Vec::new();
        for flow in ready {
            let path = (self.route)(flow.src, flow.dst);
            let Ok(links) = obs.topology.path_links(&path) else {
                continue;
            };
            let free = obs
                .topology
                .channels()
                .find(|ch| links.iter().all(|l| !busy.contains(&(*l, *ch))));
            if let Some(ch) = free {
                busy.extend(links.iter().map(|l| (*l, ch)));
                chosen.push(FlowRef::for_flow(flow, path, ch));
            }
        }
        Action { chosen_flows: chosen }
    }
}
