// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! The orchestrator hands every external command to an `ExecutorBackend`
//! instead of spawning processes itself. This makes it easy to swap in a
//! scripted executor in tests while keeping the production implementation
//! in [`process`](super::process).

use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use crate::engine::KillToken;
use crate::exec::command::{CommandSpec, ExecError, ProcessOutput};
use crate::exec::process::run_command;
use crate::exec::registry::ProcessRegistry;

/// Everything an executor needs for one invocation.
#[derive(Debug, Clone, Copy)]
pub struct ExecRequest<'a> {
    pub spec: &'a CommandSpec,
    /// Project root; `spec.cwd` is relative to it.
    pub root: &'a Path,
    /// Extra environment variables for the child.
    pub env: &'a [(String, String)],
    pub token: &'a KillToken,
}

/// Trait abstracting how external commands are executed.
///
/// Production code uses [`RealExecutorBackend`]; tests can provide their own
/// implementation that doesn't spawn real processes.
pub trait ExecutorBackend: Send {
    fn execute<'a>(
        &'a mut self,
        request: ExecRequest<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<ProcessOutput, ExecError>> + Send + 'a>>;
}

/// Real executor backend: spawns OS processes and records them in the
/// shared registry so a kill can reach them.
#[derive(Debug, Clone, Default)]
pub struct RealExecutorBackend {
    registry: ProcessRegistry,
}

impl RealExecutorBackend {
    pub fn new(registry: ProcessRegistry) -> Self {
        Self { registry }
    }
}

impl ExecutorBackend for RealExecutorBackend {
    fn execute<'a>(
        &'a mut self,
        request: ExecRequest<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<ProcessOutput, ExecError>> + Send + 'a>> {
        Box::pin(async move {
            run_command(
                request.spec,
                request.root,
                request.env,
                &self.registry,
                request.token,
            )
            .await
        })
    }
}
