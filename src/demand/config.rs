//! 需求生成配置

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// 目标负载比例的上限
pub const MAX_TARGET_LOAD_FRACTION: f64 = 0.95;

fn default_true() -> bool {
    true
}

/// 网络负载配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    /// 网络可靠传输的最大速率（信息单位/时间单位）
    pub network_rate_capacity: f64,
    /// 需求请求的负载占 `network_rate_capacity` 的比例，必须 <= 0.95
    pub target_load_fraction: f64,
    /// 单个端点链路的容量
    pub ep_link_capacity: f64,
    /// 为 true 时负载搜索不设迭代上限
    #[serde(default)]
    pub disable_timeouts: bool,
    /// 是否返回调整后的到达间隔分布
    #[serde(default)]
    pub return_adjusted_interarrival_dist: bool,
    /// 双向链路下一条流同时占用源、宿两条端点链路
    #[serde(default = "default_true")]
    pub bidirectional_links: bool,
    #[serde(default)]
    pub convergence: ConvergenceParams,
}

impl LoadConfig {
    pub fn new(network_rate_capacity: f64, target_load_fraction: f64, ep_link_capacity: f64) -> Self {
        Self {
            network_rate_capacity,
            target_load_fraction,
            ep_link_capacity,
            disable_timeouts: false,
            return_adjusted_interarrival_dist: false,
            bidirectional_links: true,
            convergence: ConvergenceParams::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.target_load_fraction > 0.0
            && self.target_load_fraction <= MAX_TARGET_LOAD_FRACTION)
        {
            return Err(Error::InvalidLoadConfig(format!(
                "target load fraction {} is invalid, must be in (0, {MAX_TARGET_LOAD_FRACTION}]",
                self.target_load_fraction
            )));
        }
        if !(self.network_rate_capacity.is_finite() && self.network_rate_capacity > 0.0) {
            return Err(Error::InvalidLoadConfig(format!(
                "network rate capacity {} must be finite and > 0",
                self.network_rate_capacity
            )));
        }
        if !(self.ep_link_capacity > 0.0) {
            return Err(Error::InvalidLoadConfig(format!(
                "endpoint link capacity {} must be > 0",
                self.ep_link_capacity
            )));
        }
        self.convergence.validate()
    }

    /// 目标负载速率
    pub fn target_load_rate(&self) -> f64 {
        self.target_load_fraction * self.network_rate_capacity
    }
}

/// 两阶段负载搜索的参数（经验值，可调）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvergenceParams {
    /// 粗调阶段到达间隔的缩放因子（< 1）
    pub coarse_factor: f64,
    /// 细调阶段到达间隔的缩放因子（> 1）
    pub fine_factor: f64,
    pub max_coarse_iterations: usize,
    pub max_fine_iterations: usize,
}

impl Default for ConvergenceParams {
    fn default() -> Self {
        Self {
            coarse_factor: 0.5,
            fine_factor: 1.001,
            max_coarse_iterations: 15,
            max_fine_iterations: 10_000,
        }
    }
}

impl ConvergenceParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.coarse_factor > 0.0 && self.coarse_factor < 1.0) {
            return Err(Error::InvalidLoadConfig(format!(
                "coarse factor {} must be in (0, 1)",
                self.coarse_factor
            )));
        }
        if !(self.fine_factor > 1.0 && self.fine_factor.is_finite()) {
            return Err(Error::InvalidLoadConfig(format!(
                "fine factor {} must be > 1",
                self.fine_factor
            )));
        }
        Ok(())
    }
}

/// 流生成器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// 需求数 = 端点对数 × 该因子
    #[serde(default = "GeneratorConfig::default_num_demands_factor")]
    pub num_demands_factor: usize,
    #[serde(default)]
    pub load: Option<LoadConfig>,
    /// 最后一个需求到达时间的下限；不足时整体复制需求
    #[serde(default)]
    pub min_last_arrival_time: Option<f64>,
    /// 自动修正超出端点容量的节点分布
    #[serde(default)]
    pub auto_node_dist_correction: bool,
    #[serde(default)]
    pub seed: u64,
}

impl GeneratorConfig {
    fn default_num_demands_factor() -> usize {
        500
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            num_demands_factor: Self::default_num_demands_factor(),
            load: None,
            min_last_arrival_time: None,
            auto_node_dist_correction: false,
            seed: 0,
        }
    }
}
