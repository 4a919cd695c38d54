//! 流量需求
//!
//! 需求记录、负载计算、流生成与打包、时隙划分，以及 JSON 场景描述。

mod config;
mod generator;
mod load;
mod packer;
mod record;
mod scenario;
mod slots;

pub use config::{ConvergenceParams, GeneratorConfig, LoadConfig, MAX_TARGET_LOAD_FRACTION};
pub use generator::{
    FlowGenerator, GeneratedDemand, LoadSearch, extend_to_min_last_arrival, num_pairs, search_load,
};
pub use load::{DurationMethod, LoadCalculator, event_times, total_info};
pub use packer::{FlowPacker, PackOutcome, PackedFlow};
pub use record::{
    Demand, DemandEvent, DependencyType, FlowDemand, FlowEvent, JobDemand, JobEvent, JobFlowSpec,
};
pub use scenario::{ScenarioSpec, TopologySpec};
pub use slots::{TimeSlot, TimeSlotter, Timed};
