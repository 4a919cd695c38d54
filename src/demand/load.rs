//! 负载计算
//!
//! 由一组带大小和时间的流计算网络总负载速率与单端点负载速率。

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::net::NodeId;

use super::record::FlowDemand;

/// 单端点负载的时长口径
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationMethod {
    /// 全网第一个到最后一个流的到达间隔
    AllEps,
    /// 该端点自己的第一个到最后一个流
    PerEp,
}

/// 负载速率计算器
#[derive(Debug, Clone, Copy)]
pub struct LoadCalculator {
    /// 双向链路：一条流占用源、宿两条端点链路，负载计两倍
    pub bidirectional: bool,
}

impl Default for LoadCalculator {
    fn default() -> Self {
        Self {
            bidirectional: true,
        }
    }
}

/// 到达间隔的前缀和即到达时间
pub fn event_times(interarrivals: &[f64]) -> Vec<f64> {
    interarrivals
        .iter()
        .scan(0.0, |t, ia| {
            *t += ia;
            Some(*t)
        })
        .collect()
}

/// 总信息量（只计正的流大小）
pub fn total_info(sizes: &[f64]) -> f64 {
    sizes.iter().filter(|s| **s > 0.0).sum()
}

fn span(times: impl IntoIterator<Item = f64>) -> Option<(f64, f64)> {
    times.into_iter().fold(None, |acc, t| match acc {
        None => Some((t, t)),
        Some((lo, hi)) => Some((lo.min(t), hi.max(t))),
    })
}

impl LoadCalculator {
    pub fn new(bidirectional: bool) -> Self {
        Self { bidirectional }
    }

    fn factor(&self) -> f64 {
        if self.bidirectional { 2.0 } else { 1.0 }
    }

    /// 会话时长：由到达间隔得到的第一个与最后一个到达时间之差
    pub fn duration(&self, interarrivals: &[f64]) -> Result<f64> {
        let (first, last) = span(event_times(interarrivals)).ok_or(Error::ZeroDuration)?;
        let duration = last - first;
        if duration > 0.0 {
            Ok(duration)
        } else {
            Err(Error::ZeroDuration)
        }
    }

    /// 生成阶段的总负载速率
    pub fn overall_load_rate(&self, sizes: &[f64], interarrivals: &[f64]) -> Result<f64> {
        let duration = self.duration(interarrivals)?;
        Ok(self.factor() * total_info(sizes) / duration)
    }

    /// 已成形需求的总负载速率；只统计真正成为流的事件（大小 > 0 且源宿不同）
    pub fn demand_load_rate(&self, demand: &FlowDemand) -> Result<f64> {
        let real: Vec<usize> = (0..demand.len())
            .filter(|&i| demand.flow_size[i] > 0.0 && demand.sn[i] != demand.dn[i])
            .collect();
        if real.is_empty() {
            return Err(Error::InvalidDemand(
                "no event with size > 0 between distinct endpoints".into(),
            ));
        }
        let (first, last) =
            span(real.iter().map(|&i| demand.event_time[i])).ok_or(Error::ZeroDuration)?;
        if last <= first {
            return Err(Error::ZeroDuration);
        }
        let info: f64 = real.iter().map(|&i| demand.flow_size[i]).sum();
        Ok(self.factor() * info / (last - first))
    }

    /// 单个端点的负载速率
    pub fn endpoint_load_rate(
        &self,
        demand: &FlowDemand,
        ep: NodeId,
        method: DurationMethod,
    ) -> Result<f64> {
        let rows: Vec<usize> = (0..demand.len())
            .filter(|&i| demand.sn[i] == ep || demand.dn[i] == ep)
            .collect();
        let info: f64 = rows.iter().map(|&i| demand.flow_size[i]).sum();
        let times: Vec<f64> = match method {
            DurationMethod::AllEps => demand.event_time.clone(),
            DurationMethod::PerEp => rows.iter().map(|&i| demand.event_time[i]).collect(),
        };
        let (first, last) = span(times).ok_or(Error::ZeroDuration)?;
        if last <= first {
            return Err(Error::ZeroDuration);
        }
        Ok(info / (last - first))
    }

    /// 每个端点承载的总信息量
    pub fn endpoint_total_info(demand: &FlowDemand, eps: &[NodeId]) -> BTreeMap<NodeId, f64> {
        let mut out: BTreeMap<NodeId, f64> = eps.iter().map(|ep| (*ep, 0.0)).collect();
        for i in 0..demand.len() {
            let size = demand.flow_size[i];
            for ep in [demand.sn[i], demand.dn[i]] {
                if let Some(v) = out.get_mut(&ep) {
                    *v += size;
                }
            }
        }
        out
    }
}
