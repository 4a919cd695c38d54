use serde::{Deserialize, Serialize};

use crate::dist::{Distribution, NodeDistribution};
use crate::error::Result;
use crate::sim::SimConfig;
use crate::topo::{StarOpts, StarTopology, build_star};

use super::config::{GeneratorConfig, LoadConfig};

fn default_schema_version() -> u32 {
    1
}

fn default_num_channels() -> usize {
    1
}

/// 一次生成 + 仿真的完整场景描述（JSON）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSpec {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub topology: TopologySpec,
    /// `[[value, prob], ...]`
    pub flow_size_dist: Vec<(f64, f64)>,
    pub interarrival_dist: Vec<(f64, f64)>,
    /// 行优先的端点对概率矩阵；缺省为均匀分布
    #[serde(default)]
    pub node_dist: Option<Vec<Vec<f64>>>,
    /// 设置后按拓扑容量构造负载配置（`generator.load` 优先）
    #[serde(default)]
    pub target_load_fraction: Option<f64>,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub sim: SimConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TopologySpec {
    Star {
        num_endpoints: usize,
        ep_link_capacity: f64,
        #[serde(default = "default_num_channels")]
        num_channels: usize,
    },
}

impl TopologySpec {
    pub fn build(&self) -> StarTopology {
        match self {
            TopologySpec::Star {
                num_endpoints,
                ep_link_capacity,
                num_channels,
            } => build_star(&StarOpts {
                num_endpoints: *num_endpoints,
                ep_link_capacity: *ep_link_capacity,
                num_channels: *num_channels,
            }),
        }
    }
}

impl ScenarioSpec {
    pub fn flow_size_dist(&self) -> Result<Distribution> {
        Distribution::new(self.flow_size_dist.iter().copied())
    }

    pub fn interarrival_dist(&self) -> Result<Distribution> {
        Distribution::new(self.interarrival_dist.iter().copied())
    }

    pub fn node_dist(&self, num_endpoints: usize) -> Result<NodeDistribution> {
        match &self.node_dist {
            Some(m) => NodeDistribution::from_matrix(m.clone()),
            None => NodeDistribution::uniform(num_endpoints),
        }
    }

    /// 生成器配置；给了目标负载比例但没有显式负载配置时按拓扑容量补上
    pub fn generator_config(&self, topo: &StarTopology) -> GeneratorConfig {
        let mut config = self.generator.clone();
        if config.load.is_none() {
            config.load = self.target_load_fraction.map(|frac| {
                LoadConfig::new(topo.network_rate_capacity(), frac, topo.ep_link_rate_capacity())
            });
        }
        config
    }
}
