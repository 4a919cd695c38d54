//! 会话记录与统计汇总

use std::collections::BTreeMap;

use serde::Serialize;

use crate::net::{ConnectionKey, NodeId};

/// 一条到达过的流
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowRecord {
    pub flow_id: u64,
    pub job_id: Option<u64>,
    pub src: NodeId,
    pub dst: NodeId,
    pub size: f64,
    pub time_arrived: f64,
    pub time_completed: Option<f64>,
}

impl FlowRecord {
    pub fn fct(&self) -> Option<f64> {
        self.time_completed.map(|c| c - self.time_arrived)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobRecord {
    pub job_id: u64,
    pub time_arrived: f64,
    pub time_completed: f64,
}

/// 到达/完成/丢弃记录
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    pub arrived_flows: BTreeMap<ConnectionKey, FlowRecord>,
    pub completed_flows: Vec<FlowRecord>,
    pub dropped_flows: Vec<FlowRecord>,
    pub arrived_jobs: BTreeMap<u64, f64>,
    pub completed_jobs: Vec<JobRecord>,
    pub dropped_jobs: Vec<u64>,
    pub info_transported: f64,
}

impl Ledger {
    pub fn num_unresolved_flows(&self) -> usize {
        self.arrived_flows
            .len()
            .saturating_sub(self.completed_flows.len() + self.dropped_flows.len())
    }

    pub fn num_unresolved_jobs(&self) -> usize {
        self.arrived_jobs
            .len()
            .saturating_sub(self.completed_jobs.len() + self.dropped_jobs.len())
    }
}

/// 线性插值分位数（`q` 取 0..=100）
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let rank = (q.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64))
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn min_max(values: impl IntoIterator<Item = f64>) -> Option<(f64, f64)> {
    values.into_iter().fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

/// 会话结束后的统计汇总
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionSummary {
    pub num_arrived_flows: usize,
    pub num_completed_flows: usize,
    /// 包含会话结束时仍未完成的流
    pub num_dropped_flows: usize,
    pub mean_fct: Option<f64>,
    pub p99_fct: Option<f64>,
    pub first_arrival: Option<f64>,
    pub last_arrival: Option<f64>,
    pub first_completion: Option<f64>,
    pub last_completion: Option<f64>,
    pub info_arrived: f64,
    pub info_transported: f64,
    /// 到达信息量 / 到达时间跨度
    pub load: Option<f64>,
    /// 传输信息量 / 完成时间跨度
    pub throughput: Option<f64>,
    pub num_arrived_jobs: usize,
    pub num_completed_jobs: usize,
    pub num_dropped_jobs: usize,
    pub mean_jct: Option<f64>,
    pub p99_jct: Option<f64>,
}

impl SessionSummary {
    pub fn from_ledger(ledger: &Ledger) -> Self {
        let fcts: Vec<f64> = ledger.completed_flows.iter().filter_map(FlowRecord::fct).collect();
        let arrivals = min_max(ledger.arrived_flows.values().map(|f| f.time_arrived));
        let completions = min_max(ledger.completed_flows.iter().filter_map(|f| f.time_completed));
        let info_arrived: f64 = ledger.arrived_flows.values().map(|f| f.size).sum();
        let rate = |info: f64, span: Option<(f64, f64)>| {
            span.filter(|(a, b)| b > a).map(|(a, b)| info / (b - a))
        };
        let jcts: Vec<f64> = ledger
            .completed_jobs
            .iter()
            .map(|j| j.time_completed - j.time_arrived)
            .collect();

        Self {
            num_arrived_flows: ledger.arrived_flows.len(),
            num_completed_flows: ledger.completed_flows.len(),
            num_dropped_flows: ledger.dropped_flows.len() + ledger.num_unresolved_flows(),
            mean_fct: mean(&fcts),
            p99_fct: percentile(&fcts, 99.0),
            first_arrival: arrivals.map(|(a, _)| a),
            last_arrival: arrivals.map(|(_, b)| b),
            first_completion: completions.map(|(a, _)| a),
            last_completion: completions.map(|(_, b)| b),
            info_arrived,
            info_transported: ledger.info_transported,
            load: rate(info_arrived, arrivals),
            throughput: rate(ledger.info_transported, completions),
            num_arrived_jobs: ledger.arrived_jobs.len(),
            num_completed_jobs: ledger.completed_jobs.len(),
            num_dropped_jobs: ledger.dropped_jobs.len() + ledger.num_unresolved_jobs(),
            mean_jct: mean(&jcts),
            p99_jct: percentile(&jcts, 99.0),
        }
    }
}
