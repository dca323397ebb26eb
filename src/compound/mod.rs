//! Task decomposition tree and the machinery attached to it.

pub mod equalizer;
pub mod frame;
pub mod statistics;
pub mod tree;
