//! 概率分布
//!
//! 数值分布（流大小、到达间隔）的离散采样，以及端点对之间的节点分布矩阵。

mod node;
mod value;

pub use node::NodeDistribution;
pub use value::{DiscretizedSampler, Distribution, PROB_SUM_TOLERANCE, SIGNIFICANT_DIGITS};
