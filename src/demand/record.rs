//! 需求数据记录
//!
//! 以流为中心的需求使用列式结构（各列等长、按到达时间排序）；
//! 以作业为中心的需求是作业列表，每个作业内嵌流与依赖记录。

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::net::NodeId;

use super::load::DurationMethod;

/// 以流为中心的需求数据（列式）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowDemand {
    pub flow_id: Vec<u64>,
    pub sn: Vec<NodeId>,
    pub dn: Vec<NodeId>,
    pub flow_size: Vec<f64>,
    pub event_time: Vec<f64>,
    pub establish: Vec<bool>,
    /// 到达时间的排序下标
    pub index: Vec<usize>,
}

/// 单个流事件（列式数据中的一行）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowEvent {
    pub flow_id: u64,
    pub src: NodeId,
    pub dst: NodeId,
    pub size: f64,
    pub event_time: f64,
    pub establish: bool,
    pub index: usize,
}

impl FlowDemand {
    pub fn len(&self) -> usize {
        self.flow_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flow_id.is_empty()
    }

    /// 检查各列长度一致，且建立事件的流 id 不重复
    pub fn validate(&self) -> Result<()> {
        let n = self.flow_id.len();
        let lens = [
            self.sn.len(),
            self.dn.len(),
            self.flow_size.len(),
            self.event_time.len(),
            self.establish.len(),
            self.index.len(),
        ];
        if lens.iter().any(|&l| l != n) {
            return Err(Error::InvalidDemand(format!(
                "flow demand columns have mismatched lengths: flow_id={n}, others={lens:?}"
            )));
        }
        let mut seen = BTreeSet::new();
        for (id, _) in self.flow_id.iter().zip(&self.establish).filter(|(_, e)| **e) {
            if !seen.insert(*id) {
                return Err(Error::InvalidDemand(format!("duplicate flow_id {id}")));
            }
        }
        Ok(())
    }

    pub fn event(&self, i: usize) -> FlowEvent {
        FlowEvent {
            flow_id: self.flow_id[i],
            src: self.sn[i],
            dst: self.dn[i],
            size: self.flow_size[i],
            event_time: self.event_time[i],
            establish: self.establish[i],
            index: self.index[i],
        }
    }

    pub fn events(&self) -> impl Iterator<Item = FlowEvent> + '_ {
        (0..self.len()).map(|i| self.event(i))
    }

    pub fn push(&mut self, ev: FlowEvent) {
        self.flow_id.push(ev.flow_id);
        self.sn.push(ev.src);
        self.dn.push(ev.dst);
        self.flow_size.push(ev.size);
        self.event_time.push(ev.event_time);
        self.establish.push(ev.establish);
        self.index.push(ev.index);
    }

    /// 最早与最晚事件时间
    pub fn time_span(&self) -> Option<(f64, f64)> {
        let first = self.event_time.iter().copied().reduce(f64::min)?;
        let last = self.event_time.iter().copied().reduce(f64::max)?;
        Some((first, last))
    }

    pub fn duration(&self) -> f64 {
        self.time_span().map(|(a, b)| b - a).unwrap_or(0.0)
    }

    /// 复制全部需求，流 id 从 `next_id` 开始依次分配。返回新的需求
    /// 与更新后的 id 计数器。
    ///
    /// - `AllEps`：副本整体平移全网的会话时长
    /// - `PerEp`：按端点 id 升序，每个端点把尚未复制的流平移该端点
    ///   自己的时长（第一个到最后一个涉及它的流）
    pub fn duplicated(&self, next_id: u64, method: DurationMethod) -> (FlowDemand, u64) {
        let n = self.len();
        let mut out = self.clone();
        let mut next = next_id;
        let mut copy = |out: &mut FlowDemand, i: usize, offset: f64| {
            let mut ev = self.event(i);
            ev.flow_id = next;
            ev.event_time += offset;
            ev.index += n;
            out.push(ev);
            next += 1;
        };
        match method {
            DurationMethod::AllEps => {
                let duration = self.duration();
                for i in 0..n {
                    copy(&mut out, i, duration);
                }
            }
            DurationMethod::PerEp => {
                let eps: BTreeSet<NodeId> = self.sn.iter().chain(&self.dn).copied().collect();
                let mut copied = vec![false; n];
                for ep in eps {
                    let rows: Vec<usize> = (0..n)
                        .filter(|&i| self.sn[i] == ep || self.dn[i] == ep)
                        .collect();
                    let times = rows.iter().map(|&i| self.event_time[i]);
                    let first = times.clone().fold(f64::INFINITY, f64::min);
                    let last = times.fold(f64::NEG_INFINITY, f64::max);
                    for i in rows {
                        if !copied[i] {
                            copied[i] = true;
                            copy(&mut out, i, last - first);
                        }
                    }
                }
            }
        }
        (out, next)
    }
}

/// 作业内依赖的类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyType {
    #[default]
    DataDep,
    ControlDep,
}

/// 作业内的一条流（或控制依赖）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobFlowSpec {
    pub flow_id: u64,
    pub src: NodeId,
    pub dst: NodeId,
    pub size: f64,
    #[serde(default)]
    pub parent_deps: Vec<u64>,
    #[serde(default)]
    pub child_deps: Vec<u64>,
    /// 产生该流的父操作 id
    #[serde(default)]
    pub parent_op: u64,
    #[serde(default)]
    pub parent_op_run_time: f64,
    #[serde(default)]
    pub dependency_type: DependencyType,
}

impl JobFlowSpec {
    /// 大小为 0 或源宿相同的"流"只用于传递完成信号，从不进入队列。
    pub fn is_control_dep(&self) -> bool {
        self.size == 0.0 || self.src == self.dst
    }
}

fn default_establish() -> bool {
    true
}

/// 作业到达事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEvent {
    pub job_id: u64,
    pub event_time: f64,
    #[serde(default = "default_establish")]
    pub establish: bool,
    pub flows: Vec<JobFlowSpec>,
}

/// 以作业为中心的需求数据
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobDemand {
    pub jobs: Vec<JobEvent>,
}

impl JobDemand {
    /// 作业 id 不重复，作业内流 id 不重复
    pub fn validate(&self) -> Result<()> {
        let mut jobs = BTreeSet::new();
        for job in self.jobs.iter().filter(|j| j.establish) {
            if !jobs.insert(job.job_id) {
                return Err(Error::InvalidDemand(format!("duplicate job_id {}", job.job_id)));
            }
            let mut flows = BTreeSet::new();
            if let Some(f) = job.flows.iter().find(|f| !flows.insert(f.flow_id)) {
                return Err(Error::InvalidDemand(format!(
                    "duplicate flow_id {} in job {}",
                    f.flow_id, job.job_id
                )));
            }
        }
        Ok(())
    }
}

/// 需求数据（两种形态之一）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Demand {
    FlowCentric(FlowDemand),
    JobCentric(JobDemand),
}

/// 送入时隙划分的单个事件
#[derive(Debug, Clone, PartialEq)]
pub enum DemandEvent {
    Flow(FlowEvent),
    Job(JobEvent),
}

impl DemandEvent {
    pub fn event_time(&self) -> f64 {
        match self {
            DemandEvent::Flow(f) => f.event_time,
            DemandEvent::Job(j) => j.event_time,
        }
    }

    pub fn establish(&self) -> bool {
        match self {
            DemandEvent::Flow(f) => f.establish,
            DemandEvent::Job(j) => j.establish,
        }
    }
}

impl Demand {
    pub fn is_job_centric(&self) -> bool {
        matches!(self, Demand::JobCentric(_))
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Demand::FlowCentric(d) => d.validate(),
            Demand::JobCentric(d) => d.validate(),
        }
    }

    /// 建立连接（establish）事件的数量，即需求总数
    pub fn num_demands(&self) -> usize {
        match self {
            Demand::FlowCentric(d) => d.establish.iter().filter(|e| **e).count(),
            Demand::JobCentric(d) => d.jobs.iter().filter(|j| j.establish).count(),
        }
    }

    pub fn events(&self) -> Vec<DemandEvent> {
        match self {
            Demand::FlowCentric(d) => d.events().map(DemandEvent::Flow).collect(),
            Demand::JobCentric(d) => d.jobs.iter().cloned().map(DemandEvent::Job).collect(),
        }
    }

    /// 需求中出现过的所有端点（可能重复）
    pub fn endpoints(&self) -> Vec<NodeId> {
        match self {
            Demand::FlowCentric(d) => d.sn.iter().chain(d.dn.iter()).copied().collect(),
            Demand::JobCentric(d) => d
                .jobs
                .iter()
                .flat_map(|j| j.flows.iter().flat_map(|f| [f.src, f.dst]))
                .collect(),
        }
    }
}
