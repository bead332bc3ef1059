//! Gateway request handlers

pub mod gateway;
pub mod proxy;

pub use gateway::*;
pub use proxy::*;
