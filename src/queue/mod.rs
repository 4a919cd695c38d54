//! 虚拟队列
//!
//! 每个 (源, 宿) 端点对一个按入队顺序排列的流队列，可选流数上限（尾丢弃）。

mod flow;
mod manager;
mod virtual_queue;

pub use flow::{Flow, FlowKey};
pub use manager::QueueManager;
pub use virtual_queue::VirtualQueue;
