//! Trellis Core
//!
//! This crate provides the component model of the Trellis view compiler.
//! It implements:
//!
//! - The reactive instance protocol (dirty tracking, batched flushing,
//!   lifecycle hooks, two-way bindings)
//! - The composition planner for embedded child components, including
//!   dynamically selected children and their swap protocol
//! - An executor that runs planned blocks as fragments
//!
//! # Architecture
//!
//! - `runtime`: component instances, the scheduler and the fragment contract
//! - `compile`: the input tree, dependency resolution, the planner, and the
//!   block IR with its renderer and executor
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use trellis_core::compile::{compile, CompileOptions, ComponentSource, Registry};
//! use trellis_core::runtime::{Component, Options, Scheduler, Target};
//!
//! let registry = Registry::new();
//! let source = ComponentSource::from_json(APP_JSON)?;
//! let app = compile(&source, &registry, &CompileOptions::default())?.register();
//!
//! let scheduler = Scheduler::new();
//! let root = Component::new(&scheduler, app, Options::new().target(Target::new("body")));
//! root.set("count", 1.into())?;
//! scheduler.run_deferred();
//! ```

pub mod compile;
mod error;
pub mod runtime;

pub use error::{Error, Result};
