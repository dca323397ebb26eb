//! Server side of the cluster: configurations, their nodes and the session registry.

mod commands;
pub mod config;
pub mod loader;
pub mod node;
mod reconcile;
pub mod registry;
pub mod snapshot;
