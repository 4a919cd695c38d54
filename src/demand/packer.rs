//! 流打包
//!
//! 把生成的每条流分配到具体的 (源, 宿) 端点对，使每个端点对承载的
//! 信息量逼近 `对概率 × 总负载速率 × 会话时长`，且任何端点承载的总
//! 信息量不超过 `端点链路容量 × 会话时长`。
//!
//! 贪心策略：先大后小。每条流优先放到离目标最远、放入后仍不超目标的
//! 端点对；否则按目标从大到小找第一个两端都还有余量的端点对。

use std::collections::BTreeMap;

use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{debug, info, instrument, warn};

use crate::dist::NodeDistribution;
use crate::error::{Error, Result};
use crate::net::NodeId;

/// 打包后的流
#[derive(Debug, Clone, PartialEq)]
pub struct PackedFlow {
    pub flow_id: u64,
    pub size: f64,
    pub src: NodeId,
    pub dst: NodeId,
}

/// 打包结果
#[derive(Debug, Clone)]
pub struct PackOutcome {
    /// 已打乱顺序的流，避免流大小与到达顺序相关
    pub flows: Vec<PackedFlow>,
    /// 每个无序端点对 (小 id, 大 id) 的目标信息量
    pub pair_targets: BTreeMap<(NodeId, NodeId), f64>,
    /// 每个无序端点对实际承载的信息量
    pub pair_info: BTreeMap<(NodeId, NodeId), f64>,
    pub ep_info: BTreeMap<NodeId, f64>,
    /// 单端点允许承载的最大信息量
    pub max_ep_info: f64,
    /// 修正后的节点分布（未修正时与输入相同）
    pub node_dist: NodeDistribution,
}

/// 一次生成过程的打包状态；`pack` 消耗自身。
#[derive(Debug)]
pub struct FlowPacker {
    eps: Vec<NodeId>,
    node_dist: NodeDistribution,
    load_rate: f64,
    duration: f64,
    ep_link_capacity: f64,
    auto_correct: bool,
    pairs: Vec<(usize, usize)>,
    pair_target: Vec<f64>,
    pair_current: Vec<f64>,
    ep_total: Vec<f64>,
    max_ep_info: f64,
    eps_at_capacity: Vec<bool>,
}

impl FlowPacker {
    /// `load_rate` 与 `duration` 来自生成器；`ep_link_capacity` 为 `f64::INFINITY`
    /// 时不限制端点。节点分布若超出端点容量，按 `auto_correct` 报错或修正。
    pub fn new(
        eps: &[NodeId],
        node_dist: &NodeDistribution,
        load_rate: f64,
        duration: f64,
        ep_link_capacity: f64,
        auto_correct: bool,
    ) -> Result<Self> {
        if node_dist.num_nodes() != eps.len() {
            return Err(Error::InvalidDistribution(format!(
                "node distribution covers {} endpoints but {} were given",
                node_dist.num_nodes(),
                eps.len()
            )));
        }
        let n = eps.len();
        let mut packer = Self {
            eps: eps.to_vec(),
            node_dist: node_dist.clone(),
            load_rate,
            duration,
            ep_link_capacity,
            auto_correct,
            pairs: Vec::new(),
            pair_target: Vec::new(),
            pair_current: Vec::new(),
            ep_total: vec![0.0; n],
            max_ep_info: ep_link_capacity * duration,
            eps_at_capacity: vec![false; n],
        };
        packer.reset_targets();
        packer.check_node_dist_valid()?;
        Ok(packer)
    }

    fn reset_targets(&mut self) {
        let pair_probs = self.node_dist.pair_probs();
        self.pairs = pair_probs.iter().map(|(p, _)| *p).collect();
        self.pair_target = pair_probs
            .iter()
            .map(|(_, prob)| prob * self.load_rate * self.duration)
            .collect();
        self.pair_current = vec![0.0; self.pairs.len()];
        self.ep_total.iter_mut().for_each(|v| *v = 0.0);
    }

    fn ep_load_rate(&self, idx: usize) -> f64 {
        self.node_dist.row_sum(idx) * self.load_rate
    }

    fn over_capacity(&self, rate: f64) -> bool {
        rate > self.ep_link_capacity * (1.0 + 1e-9)
    }

    fn check_node_dist_valid(&mut self) -> Result<()> {
        for idx in 0..self.eps.len() {
            let rate = self.ep_load_rate(idx);
            if !self.over_capacity(rate) {
                continue;
            }
            if !self.auto_correct {
                return Err(Error::InvalidNodeDistribution {
                    endpoint: self.eps[idx],
                    load_rate: rate,
                    capacity: self.ep_link_capacity,
                });
            }
            info!(
                endpoint = ?self.eps[idx],
                load_rate = rate,
                capacity = self.ep_link_capacity,
                "节点分布超出端点容量，自动修正"
            );
            while self.auto_correct_once()? {}
            break;
        }
        Ok(())
    }

    /// 一轮修正；返回本轮是否发现超载端点
    fn auto_correct_once(&mut self) -> Result<bool> {
        let n = self.eps.len();
        let max_ep_load_frac = self.ep_link_capacity / self.load_rate;
        let capped_share = max_ep_load_frac / (n - 1) as f64;
        let mut invalid_found = false;

        for idx in 0..n {
            if self.eps_at_capacity[idx] {
                continue;
            }
            let rate = self.ep_load_rate(idx);
            if !self.over_capacity(rate) {
                continue;
            }
            invalid_found = true;
            let excess = rate - self.ep_link_capacity;
            self.eps_at_capacity[idx] = true;
            for j in (0..n).filter(|&j| j != idx) {
                self.node_dist.set(idx, j, capped_share);
                self.node_dist.set(j, idx, capped_share);
            }

            let free: Vec<usize> = (0..n).filter(|&i| !self.eps_at_capacity[i]).collect();
            if free.is_empty() {
                return Err(Error::NoCapacityToRedistribute {
                    endpoint: self.eps[idx],
                });
            }
            let per_pair = excess / free.len() as f64 / self.load_rate / (n - 1) as f64;
            for &ep in &free {
                for i in (0..n).filter(|&i| i != ep && !self.eps_at_capacity[i]) {
                    self.node_dist.add(ep, i, per_pair);
                    self.node_dist.add(i, ep, per_pair);
                }
            }
            debug!(
                endpoint = ?self.eps[idx],
                excess,
                free_eps = free.len(),
                "已将超额负载分摊到空闲端点"
            );
        }

        if invalid_found {
            self.reset_targets();
        }
        Ok(invalid_found)
    }

    fn endpoints_fit(&self, pair: usize, size: f64) -> bool {
        let (a, b) = self.pairs[pair];
        self.ep_total[a] + size <= self.max_ep_info && self.ep_total[b] + size <= self.max_ep_info
    }

    fn choose_pair(&self, size: f64) -> Option<usize> {
        // 离目标最远、放入后不超目标的端点对
        let mut best: Option<(usize, f64)> = None;
        for p in 0..self.pairs.len() {
            let distance = self.pair_target[p] - self.pair_current[p];
            if distance - size < 0.0 || !self.endpoints_fit(p, size) {
                continue;
            }
            if best.is_none_or(|(_, d)| distance > d) {
                best = Some((p, distance));
            }
        }
        if let Some((p, _)) = best {
            return Some(p);
        }

        // 所有端点对都已到达目标：按目标从大到小找两端仍有余量的
        let mut by_target: Vec<usize> = (0..self.pairs.len()).collect();
        by_target.sort_by(|&a, &b| self.pair_target[b].total_cmp(&self.pair_target[a]));
        by_target.into_iter().find(|&p| self.endpoints_fit(p, size))
    }

    fn ep_loads(&self) -> BTreeMap<NodeId, f64> {
        self.eps.iter().copied().zip(self.ep_total.iter().copied()).collect()
    }

    /// 打包所有流；`flows` 为 (flow_id, size)。
    #[instrument(skip(self, flows, rng), fields(num_flows = flows.len(), num_pairs = self.pairs.len()))]
    pub fn pack<R: Rng + ?Sized>(mut self, mut flows: Vec<(u64, f64)>, rng: &mut R) -> Result<PackOutcome> {
        flows.sort_by(|a, b| b.1.total_cmp(&a.1));

        let mut packed = Vec::with_capacity(flows.len());
        for (flow_id, size) in flows {
            let Some(p) = self.choose_pair(size) else {
                warn!(flow_id, size, "找不到可容纳该流的端点对");
                return Err(Error::PackingInfeasible {
                    flow_id,
                    size,
                    max_ep_info: self.max_ep_info,
                    ep_loads: self.ep_loads(),
                });
            };
            self.pair_current[p] += size;

            let (a, b) = self.pairs[p];
            let (s, d) = if rng.gen_bool(0.5) { (a, b) } else { (b, a) };
            self.ep_total[s] += size;
            self.ep_total[d] += size;
            packed.push(PackedFlow {
                flow_id,
                size,
                src: self.eps[s],
                dst: self.eps[d],
            });
        }

        packed.shuffle(rng);

        let key = |&(a, b): &(usize, usize)| (self.eps[a], self.eps[b]);
        let pair_targets = self.pairs.iter().map(key).zip(self.pair_target.iter().copied()).collect();
        let pair_info = self.pairs.iter().map(key).zip(self.pair_current.iter().copied()).collect();
        debug!(packed = packed.len(), "打包完成");

        Ok(PackOutcome {
            flows: packed,
            pair_targets,
            pair_info,
            ep_info: self.ep_loads(),
            max_ep_info: self.max_ep_info,
            node_dist: self.node_dist,
        })
    }
}
