//! Core build logic: cookbook parsing, templating, recipes, graph, execution.

pub mod dag;
pub mod error;
pub mod executor;
pub mod functions;
pub mod parser;
pub mod planner;
pub mod recipe;
pub mod report;
pub mod state;
pub mod template;
pub mod types;
pub mod vars;
