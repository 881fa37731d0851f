//! yamk: yet another make command.
//!
//! Cookbooks declare targets, their requirements and the shell commands
//! that build them. Targets are resolved into a dependency graph,
//! linearized, checked for staleness by timestamp, and the stale ones
//! are built in order.

pub mod cli;
pub mod core;
pub mod transport;
