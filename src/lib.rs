pub mod demand;
pub mod dist;
pub mod error;
pub mod net;
pub mod queue;
pub mod sim;
pub mod topo;

pub use error::{Error, Result};

#[cfg(test)]
mod test;
