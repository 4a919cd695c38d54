//! 网络模型模块
//!
//! 此模块包含不可变拓扑、仿真期间的网络状态以及连接管理。

// 子模块声明
mod connection;
mod id;
mod link;
mod state;
mod topology;

// 重新导出公共接口
pub use connection::{Connection, ConnectionDelta, ConnectionKey, ConnectionManager};
pub use id::{ChannelId, LinkId, NodeId};
pub use link::Link;
pub use state::NetworkState;
pub use topology::{NodeKind, Topology};
