//! 拓扑构建

mod star;

pub use star::{StarOpts, StarTopology, build_star};
