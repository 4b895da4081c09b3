//! Core domain models for mlpipe
//!
//! This module defines the fundamental data structures that represent
//! pipelines, parameters, steps, and the state of a run.

pub mod config;
pub mod context;
pub mod error;
pub mod graph;
pub mod parameter;
pub mod pipeline;
pub mod state;
pub mod step;
pub mod value;

pub use config::{load_overrides, PipelineConfig};
pub use context::*;
pub use error::{PipelineError, Result};
pub use graph::DependencyGraph;
pub use parameter::{Parameter, ParameterOverrides, ParameterStore};
pub use pipeline::*;
pub use state::*;
pub use step::*;
pub use value::*;
