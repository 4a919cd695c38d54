//! 仿真核心模块
//!
//! 此模块包含时隙驱动的虚拟队列仿真器、作业依赖解析、
//! 调度动作/观测、奖励与会话统计。

// 子模块声明
mod action;
mod dependency;
mod ledger;
mod policy;
mod reward;
mod simulator;
pub mod time;
mod timer;

// 重新导出公共接口
pub use action::{Action, FlowRef, Observation, StepResult};
pub use dependency::{DepStatus, DependencyResolver, Resolution};
pub use ledger::{FlowRecord, JobRecord, Ledger, SessionSummary, percentile};
pub use policy::{FirstComeFirstServed, Policy};
pub use reward::{QueueOccupancyReward, RewardFn};
pub use simulator::{Phase, SimConfig, Simulator};
