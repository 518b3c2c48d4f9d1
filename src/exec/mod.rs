// src/exec/mod.rs

//! External command boundary.
//!
//! This is the only place that spawns OS processes.
//!
//! - [`command`] describes an invocation (`CommandSpec`) and its results, and
//!   builds the child environment from `$`-prefixed options.
//! - [`backend`] provides the `ExecutorBackend` trait and the production
//!   `RealExecutorBackend`; tests replace it with a scripted implementation.
//! - [`process`] runs one child with `tokio::process` and handles
//!   cancellation.
//! - [`registry`] tracks live child pids so a kill reaches every process
//!   tree.

pub mod backend;
pub mod command;
pub mod process;
pub mod registry;

pub use backend::{ExecRequest, ExecutorBackend, RealExecutorBackend};
pub use command::{CommandLine, CommandSpec, ExecError, ProcessOutput, environment};
pub use registry::ProcessRegistry;
