//! 作业依赖解析
//!
//! 跟踪作业内流与控制依赖之间的父子关系、父操作运行时间，以及
//! 到达/完成在依赖图上的传播。
//!
//! 每个节点的状态机：
//! - 真实流：`Blocked -> Schedulable -> Arrived -> Completed`
//! - 控制依赖（大小为 0 或源宿相同）：`Blocked -> Satisfied`，从不入队
//!
//! 父节点全部完成后，子节点若父操作运行时间为 0 则立即就绪，
//! 否则启动计时器，到期后就绪。

use std::collections::{BTreeMap, BinaryHeap};

use tracing::{debug, trace, warn};

use super::timer::OpTimer;
use crate::demand::JobEvent;
use crate::net::NodeId;
use crate::queue::Flow;

/// 依赖图节点的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepStatus {
    Blocked,
    Schedulable,
    Arrived,
    Completed,
    Satisfied,
}

impl DepStatus {
    pub fn is_done(self) -> bool {
        matches!(self, DepStatus::Completed | DepStatus::Satisfied)
    }
}

/// 解析结果，由仿真器应用到队列与统计
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolution {
    /// 真实流的依赖已满足，可以被调度
    Schedulable {
        job_id: u64,
        flow_id: u64,
        src: NodeId,
        dst: NodeId,
    },
    JobCompleted { job_id: u64, time: f64 },
}

#[derive(Debug, Clone)]
struct DepNode {
    control: bool,
    src: NodeId,
    dst: NodeId,
    required: usize,
    done_parents: usize,
    children: Vec<u64>,
    parent_op: u64,
    run_time: f64,
    status: DepStatus,
}

#[derive(Debug, Clone)]
struct JobState {
    nodes: BTreeMap<u64, DepNode>,
    remaining: usize,
}

#[derive(Debug, Default)]
pub struct DependencyResolver {
    jobs: BTreeMap<u64, JobState>,
    timers: BinaryHeap<OpTimer>,
    next_seq: u64,
    running_ops: BTreeMap<(u64, u64), NodeId>,
}

impl DependencyResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记新到达的作业，返回需要入队的真实流（初始均不可调度）
    pub fn register_job(&mut self, job: &JobEvent) -> Vec<Flow> {
        let mut nodes = BTreeMap::new();
        let mut flows = Vec::new();
        for spec in &job.flows {
            let control = spec.is_control_dep();
            nodes.insert(
                spec.flow_id,
                DepNode {
                    control,
                    src: spec.src,
                    dst: spec.dst,
                    required: spec.parent_deps.len(),
                    done_parents: 0,
                    children: spec.child_deps.clone(),
                    parent_op: spec.parent_op,
                    run_time: spec.parent_op_run_time,
                    status: DepStatus::Blocked,
                },
            );
            if !control {
                let mut flow = Flow::new(
                    spec.flow_id,
                    Some(job.job_id),
                    spec.src,
                    spec.dst,
                    spec.size,
                    job.event_time,
                );
                flow.schedulable = false;
                flows.push(flow);
            }
        }
        let remaining = nodes.len();
        debug!(job_id = job.job_id, nodes = remaining, real_flows = flows.len(), "登记作业");
        self.jobs.insert(job.job_id, JobState { nodes, remaining });
        flows
    }

    /// 作业入队成功后释放没有父依赖的节点
    pub fn release_initial(&mut self, job_id: u64, now: f64) -> Vec<Resolution> {
        let mut out = Vec::new();
        let Some(job) = self.jobs.get(&job_id) else {
            return out;
        };
        if job.nodes.is_empty() {
            self.jobs.remove(&job_id);
            out.push(Resolution::JobCompleted { job_id, time: now });
            return out;
        }
        let roots: Vec<(u64, bool)> = job
            .nodes
            .iter()
            .filter(|(_, n)| n.required == 0)
            .map(|(id, n)| (*id, n.control))
            .collect();
        let mut done = Vec::new();
        for (flow_id, control) in roots {
            if control {
                self.activate(job_id, flow_id, now, &mut out, &mut done);
            } else {
                self.make_ready(job_id, flow_id, &mut out, &mut done);
            }
        }
        self.cascade(done, now, &mut out);
        out
    }

    /// 真实流进入 Arrived
    pub fn mark_arrived(&mut self, job_id: u64, flow_id: u64) {
        if let Some(node) = self.node_mut(job_id, flow_id) {
            if node.status == DepStatus::Schedulable {
                node.status = DepStatus::Arrived;
            }
        }
    }

    /// 真实流完成，向子节点传播
    pub fn complete_flow(&mut self, job_id: u64, flow_id: u64, now: f64) -> Vec<Resolution> {
        let mut out = Vec::new();
        match self.node_mut(job_id, flow_id) {
            Some(node) if !node.control && !node.status.is_done() => {
                node.status = DepStatus::Completed;
            }
            _ => {
                warn!(job_id, flow_id, "完成的流不在依赖图中或状态不符");
                return out;
            }
        }
        self.cascade(vec![(job_id, flow_id)], now, &mut out);
        out
    }

    /// 让所有到期的父操作计时器生效
    pub fn advance(&mut self, now: f64) -> Vec<Resolution> {
        let mut out = Vec::new();
        let mut done = Vec::new();
        while self.timers.peek().is_some_and(|t| t.at <= now) {
            let Some(timer) = self.timers.pop() else {
                break;
            };
            let Some(node) = self.node_mut(timer.job_id, timer.flow_id) else {
                continue;
            };
            if node.status != DepStatus::Blocked {
                continue;
            }
            let op = node.parent_op;
            self.running_ops.remove(&(timer.job_id, op));
            trace!(job_id = timer.job_id, flow_id = timer.flow_id, op, at = timer.at, "父操作运行结束");
            self.make_ready(timer.job_id, timer.flow_id, &mut out, &mut done);
        }
        self.cascade(done, now, &mut out);
        out
    }

    /// 作业被丢弃：清除其依赖状态与正在运行的操作
    pub fn drop_job(&mut self, job_id: u64) {
        self.jobs.remove(&job_id);
        self.running_ops.retain(|(j, _), _| *j != job_id);
    }

    pub fn status(&self, job_id: u64, flow_id: u64) -> Option<DepStatus> {
        self.jobs.get(&job_id)?.nodes.get(&flow_id).map(|n| n.status)
    }

    /// 正在运行的父操作：(job_id, op_id) -> 所在端点
    pub fn running_ops(&self) -> &BTreeMap<(u64, u64), NodeId> {
        &self.running_ops
    }

    /// 尚未完成的作业数
    pub fn num_active_jobs(&self) -> usize {
        self.jobs.len()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    fn node_mut(&mut self, job_id: u64, flow_id: u64) -> Option<&mut DepNode> {
        self.jobs.get_mut(&job_id)?.nodes.get_mut(&flow_id)
    }

    /// 父节点已全部完成：运行时间为 0 则就绪，否则启动计时器
    fn activate(
        &mut self,
        job_id: u64,
        flow_id: u64,
        now: f64,
        out: &mut Vec<Resolution>,
        done: &mut Vec<(u64, u64)>,
    ) {
        let Some(node) = self.node_mut(job_id, flow_id) else {
            return;
        };
        if node.run_time > 0.0 {
            let (op, src, at) = (node.parent_op, node.src, now + node.run_time);
            self.running_ops.insert((job_id, op), src);
            self.timers.push(OpTimer {
                at,
                seq: self.next_seq,
                job_id,
                flow_id,
            });
            self.next_seq += 1;
            trace!(job_id, flow_id, op, at, "启动父操作计时器");
        } else {
            self.make_ready(job_id, flow_id, out, done);
        }
    }

    fn make_ready(&mut self, job_id: u64, flow_id: u64, out: &mut Vec<Resolution>, done: &mut Vec<(u64, u64)>) {
        let Some(node) = self.node_mut(job_id, flow_id) else {
            return;
        };
        if node.status != DepStatus::Blocked {
            return;
        }
        if node.control {
            node.status = DepStatus::Satisfied;
            done.push((job_id, flow_id));
        } else {
            node.status = DepStatus::Schedulable;
            out.push(Resolution::Schedulable {
                job_id,
                flow_id,
                src: node.src,
                dst: node.dst,
            });
        }
    }

    /// 处理已完成/已满足的节点：计数、通知子节点、判断作业完成
    fn cascade(&mut self, mut done: Vec<(u64, u64)>, now: f64, out: &mut Vec<Resolution>) {
        while let Some((job_id, flow_id)) = done.pop() {
            let Some(job) = self.jobs.get_mut(&job_id) else {
                continue;
            };
            job.remaining = job.remaining.saturating_sub(1);
            let children = job
                .nodes
                .get(&flow_id)
                .map(|n| n.children.clone())
                .unwrap_or_default();

            let mut ready = Vec::new();
            for child in children {
                match job.nodes.get_mut(&child) {
                    Some(c) => {
                        c.done_parents += 1;
                        if c.done_parents == c.required && c.status == DepStatus::Blocked {
                            ready.push(child);
                        }
                    }
                    None => warn!(job_id, flow_id, child, "子依赖不在作业中"),
                }
            }
            let job_done = job.remaining == 0;

            for child in ready {
                self.activate(job_id, child, now, out, &mut done);
            }
            if job_done {
                self.jobs.remove(&job_id);
                debug!(job_id, time = now, "✅ 作业完成");
                out.push(Resolution::JobCompleted { job_id, time: now });
            }
        }
    }
}
