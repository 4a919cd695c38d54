//! 流生成器
//!
//! 采样流大小与到达间隔，按需迭代缩放到达间隔以逼近目标负载，
//! 再由 [`FlowPacker`] 分配端点对，得到列式需求数据。

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, instrument, warn};

use crate::dist::{Distribution, NodeDistribution};
use crate::error::{Error, Result};
use crate::net::NodeId;

use super::config::{GeneratorConfig, LoadConfig};
use super::load::{DurationMethod, LoadCalculator, event_times};
use super::packer::FlowPacker;
use super::record::FlowDemand;

/// 端点对数：`⌊n²/2 − n⌋`，不足时为 0
pub fn num_pairs(num_eps: usize) -> usize {
    let n = num_eps as f64;
    (n * n / 2.0 - n).max(0.0).floor() as usize
}

/// 生成结果
#[derive(Debug, Clone)]
pub struct GeneratedDemand {
    pub demand: FlowDemand,
    /// 仅当 `return_adjusted_interarrival_dist` 时返回
    pub adjusted_interarrival_dist: Option<Distribution>,
    /// 到达间隔相对原始分布的累计缩放因子
    pub interarrival_scale: f64,
    /// 打包前的总负载速率
    pub load_rate: f64,
    /// 下一个可用的流 id（复制需求时继续使用）
    pub next_flow_id: u64,
}

/// 两阶段负载搜索的结果
#[derive(Debug, Clone, PartialEq)]
pub struct LoadSearch {
    pub interarrivals: Vec<f64>,
    pub scale: f64,
    pub load_rate: f64,
    /// 进入细调阶段前的负载速率
    pub coarse_load_rate: f64,
    pub coarse_iterations: usize,
    pub fine_iterations: usize,
}

/// 以流为中心的需求生成器
#[derive(Debug)]
pub struct FlowGenerator {
    eps: Vec<NodeId>,
    node_dist: NodeDistribution,
    config: GeneratorConfig,
    rng: ChaCha8Rng,
}

impl FlowGenerator {
    pub fn new(eps: Vec<NodeId>, node_dist: NodeDistribution, config: GeneratorConfig) -> Result<Self> {
        if let Some(load) = &config.load {
            load.validate()?;
        }
        if node_dist.num_nodes() != eps.len() {
            return Err(Error::InvalidDistribution(format!(
                "node distribution covers {} endpoints but {} were given",
                node_dist.num_nodes(),
                eps.len()
            )));
        }
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Ok(Self {
            eps,
            node_dist,
            config,
            rng,
        })
    }

    pub fn num_demands(&self) -> usize {
        num_pairs(self.eps.len()) * self.config.num_demands_factor
    }

    fn calculator(&self) -> LoadCalculator {
        LoadCalculator::new(
            self.config
                .load
                .as_ref()
                .map(|l| l.bidirectional_links)
                .unwrap_or(true),
        )
    }

    /// 生成需求
    #[instrument(skip(self, flow_size_dist, interarrival_dist), fields(num_eps = self.eps.len(), num_demands = self.num_demands()))]
    pub fn generate(
        &mut self,
        flow_size_dist: &Distribution,
        interarrival_dist: &Distribution,
    ) -> Result<GeneratedDemand> {
        let num_demands = self.num_demands();
        let sizes = flow_size_dist.sample_n(num_demands, &mut self.rng)?;
        let mut interarrivals = interarrival_dist.sample_n(num_demands, &mut self.rng)?;
        let calc = self.calculator();

        let mut scale = 1.0;
        if let Some(load) = &self.config.load {
            let search = search_load(&calc, &sizes, interarrivals, load)?;
            info!(
                load_rate = search.load_rate,
                target = load.target_load_rate(),
                coarse_iterations = search.coarse_iterations,
                fine_iterations = search.fine_iterations,
                "✅ 到达间隔已调整到目标负载"
            );
            interarrivals = search.interarrivals;
            scale = search.scale;
        }

        let times = event_times(&interarrivals);
        let mut index: Vec<usize> = (0..times.len()).collect();
        index.sort_by(|&a, &b| times[a].total_cmp(&times[b]));
        let sorted_times: Vec<f64> = index.iter().map(|&i| times[i]).collect();

        let load_rate = calc.overall_load_rate(&sizes, &interarrivals)?;
        let duration = calc.duration(&interarrivals)?;
        let ep_link_capacity = self
            .config
            .load
            .as_ref()
            .map(|l| l.ep_link_capacity)
            .unwrap_or(f64::INFINITY);
        let packer = FlowPacker::new(
            &self.eps,
            &self.node_dist,
            load_rate,
            duration,
            ep_link_capacity,
            self.config.auto_node_dist_correction,
        )?;
        let flows: Vec<(u64, f64)> = sizes
            .iter()
            .enumerate()
            .map(|(i, s)| (i as u64, *s))
            .collect();
        let packed = packer.pack(flows, &mut self.rng)?;

        let mut demand = FlowDemand::default();
        for (pos, flow) in packed.flows.iter().enumerate() {
            demand.flow_id.push(flow.flow_id);
            demand.sn.push(flow.src);
            demand.dn.push(flow.dst);
            demand.flow_size.push(flow.size);
            demand.event_time.push(sorted_times[pos]);
            demand.establish.push(true);
            demand.index.push(index[pos]);
        }
        let mut next_flow_id = num_demands as u64;

        if let Some(min_last) = self.config.min_last_arrival_time {
            let (d, next) = extend_to_min_last_arrival(demand, next_flow_id, min_last)?;
            demand = d;
            next_flow_id = next;
        }

        let adjusted_interarrival_dist = self
            .config
            .load
            .as_ref()
            .filter(|l| l.return_adjusted_interarrival_dist)
            .map(|_| interarrival_dist.scaled(scale));

        Ok(GeneratedDemand {
            demand,
            adjusted_interarrival_dist,
            interarrival_scale: scale,
            load_rate,
            next_flow_id,
        })
    }
}

/// 两阶段搜索：粗调阶段按 `coarse_factor` 缩小到达间隔直到负载超过目标，
/// 细调阶段按 `fine_factor` 放大直到负载不超过目标。
pub fn search_load(
    calc: &LoadCalculator,
    sizes: &[f64],
    mut interarrivals: Vec<f64>,
    load: &LoadConfig,
) -> Result<LoadSearch> {
    let params = load.convergence;
    let target = load.target_load_rate();
    let fraction = |rate: f64| rate / load.network_rate_capacity;

    let mut rate = calc.overall_load_rate(sizes, &interarrivals)?;
    if rate <= 0.0 {
        return Err(Error::InvalidDistribution(
            "flow sizes carry no information, target load is unreachable".into(),
        ));
    }

    let mut scale = 1.0;
    let mut coarse_iterations = 0;
    while rate <= target {
        if !load.disable_timeouts && coarse_iterations >= params.max_coarse_iterations {
            return Err(Error::LoadConvergenceTimeout {
                phase: "coarse",
                iterations: coarse_iterations,
                reached: fraction(rate),
                target: load.target_load_fraction,
            });
        }
        interarrivals.iter_mut().for_each(|t| *t *= params.coarse_factor);
        scale *= params.coarse_factor;
        rate = calc.overall_load_rate(sizes, &interarrivals)?;
        coarse_iterations += 1;
        if coarse_iterations % 10 == 0 {
            warn!(coarse_iterations, reached = fraction(rate), "负载粗调仍未达到目标");
        }
    }
    let coarse_load_rate = rate;

    let mut fine_iterations = 0;
    while rate > target {
        if !load.disable_timeouts && fine_iterations >= params.max_fine_iterations {
            return Err(Error::LoadConvergenceTimeout {
                phase: "fine",
                iterations: fine_iterations,
                reached: fraction(rate),
                target: load.target_load_fraction,
            });
        }
        interarrivals.iter_mut().for_each(|t| *t *= params.fine_factor);
        scale *= params.fine_factor;
        rate = calc.overall_load_rate(sizes, &interarrivals)?;
        fine_iterations += 1;
    }
    debug!(rate, coarse_load_rate, scale, "负载搜索结束");

    Ok(LoadSearch {
        interarrivals,
        scale,
        load_rate: rate,
        coarse_load_rate,
        coarse_iterations,
        fine_iterations,
    })
}

/// 反复整体复制需求，直到最后一个到达时间不早于 `min_last_arrival`。
pub fn extend_to_min_last_arrival(
    mut demand: FlowDemand,
    mut next_flow_id: u64,
    min_last_arrival: f64,
) -> Result<(FlowDemand, u64)> {
    loop {
        let (_, last) = demand
            .time_span()
            .ok_or_else(|| Error::InvalidDemand("cannot extend an empty demand".into()))?;
        if last >= min_last_arrival {
            return Ok((demand, next_flow_id));
        }
        if demand.duration() <= 0.0 {
            return Err(Error::ZeroDuration);
        }
        let (d, next) = demand.duplicated(next_flow_id, DurationMethod::AllEps);
        debug!(events = d.len(), last, min_last_arrival, "复制需求以延长会话");
        demand = d;
        next_flow_id = next;
    }
}
