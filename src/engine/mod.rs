// src/engine/mod.rs

//! Build orchestration.
//!
//! This module ties together:
//! - [`DiCy`], which runs commands phase by phase over the graph
//! - the phase loop: rule discovery and action evaluation ([`phase`])
//! - the invalidation pass that turns artifact changes into pending actions
//!   ([`invalidation`])
//! - the serial ordering of pending rules ([`scheduler`])
//! - build-scoped cancellation ([`kill`])
//!
//! The graph is only ever mutated through [`State`]; steps see it through a
//! [`StepContext`](crate::rule::StepContext).

pub mod invalidation;
pub mod kill;
pub mod phase;
pub mod scheduler;

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::{OptionSchema, OptionSet};
use crate::errors::{DicyError, Result};
use crate::exec::{ExecutorBackend, RealExecutorBackend};
use crate::graph::{FileTypes, State};
use crate::rule::RuleCatalog;
use crate::types::{Command, Phase};

pub use kill::{BuildGuard, KillSwitch, KillToken};

/// The build orchestrator for one main source document.
pub struct DiCy {
    pub(crate) state: State,
    pub(crate) catalog: RuleCatalog,
    pub(crate) executor: Box<dyn ExecutorBackend>,
    kill: KillSwitch,
}

impl fmt::Debug for DiCy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiCy")
            .field("file_path", &self.state.file_path())
            .field("catalog", &self.catalog)
            .finish_non_exhaustive()
    }
}

impl DiCy {
    /// Orchestrator for the document at `path` with the built-in catalog and
    /// the real process executor.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        DiCyBuilder::for_path(path.as_ref())?.build()
    }

    /// Builder for the main source `file_path`, relative to `root`.
    pub fn builder(root: impl Into<PathBuf>, file_path: &str) -> DiCyBuilder {
        DiCyBuilder::new(root, file_path)
    }

    /// Run `commands` in order, each through its three phases.
    ///
    /// Returns `Ok(true)` when no rule ended the build with a recorded
    /// failure. A cancelled build returns `Ok(false)`.
    pub async fn run<S: AsRef<str>>(&mut self, commands: &[S]) -> Result<bool> {
        let commands = commands
            .iter()
            .map(|c| {
                c.as_ref()
                    .parse::<Command>()
                    .map_err(|_| DicyError::UnknownCommand(c.as_ref().to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        let guard = self.kill.begin()?;
        let token = guard.token().clone();
        info!(file = %self.state.file_path(), ?commands, "build started");

        self.state.clear_build_changes();
        let outcome = self.run_commands(&commands, &token).await;
        drop(guard);

        match outcome {
            Ok(()) => {
                let failed: Vec<&str> = self
                    .state
                    .rules()
                    .filter(|r| r.is_failed())
                    .map(|r| r.id.as_str())
                    .collect();
                if failed.is_empty() {
                    info!("build succeeded");
                } else {
                    warn!(rules = ?failed, "build failed");
                }
                Ok(failed.is_empty())
            }
            Err(DicyError::Cancelled(reason)) => {
                warn!(%reason, "build cancelled");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn run_commands(&mut self, commands: &[Command], token: &KillToken) -> Result<()> {
        for &command in commands {
            for phase in Phase::ALL {
                self.run_phase(command, phase, token).await?;
            }
        }
        Ok(())
    }

    /// Handle for cancelling builds of this orchestrator from elsewhere.
    pub fn kill_switch(&self) -> KillSwitch {
        self.kill.clone()
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn catalog(&self) -> &RuleCatalog {
        &self.catalog
    }

    /// Target artifacts of every active job.
    pub fn targets(&self) -> Vec<String> {
        self.state.targets()
    }

    /// Replace the instance options. Returns whether build rules were
    /// invalidated by the change.
    pub fn set_instance_options(&mut self, options: OptionSet) -> bool {
        self.state.set_instance_options(options)
    }

    pub fn instance_options(&self) -> &OptionSet {
        self.state.instance_options()
    }
}

/// Assembles a [`DiCy`]. Anything not supplied falls back to the built-in
/// schema, file types and rule catalog and to real process execution.
pub struct DiCyBuilder {
    root: PathBuf,
    file_path: String,
    schema: Option<OptionSchema>,
    file_types: Option<FileTypes>,
    catalog: Option<RuleCatalog>,
    executor: Option<Box<dyn ExecutorBackend>>,
    kill: Option<KillSwitch>,
    options: OptionSet,
}

impl DiCyBuilder {
    pub fn new(root: impl Into<PathBuf>, file_path: &str) -> Self {
        Self {
            root: root.into(),
            file_path: file_path.to_string(),
            schema: None,
            file_types: None,
            catalog: None,
            executor: None,
            kill: None,
            options: OptionSet::new(),
        }
    }

    /// Split a document path into project root and file name.
    pub fn for_path(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                DicyError::ConfigError(format!("not a document path: {}", path.display()))
            })?;
        let root = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Ok(Self::new(root, name))
    }

    pub fn schema(mut self, schema: OptionSchema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn file_types(mut self, file_types: FileTypes) -> Self {
        self.file_types = Some(file_types);
        self
    }

    pub fn catalog(mut self, catalog: RuleCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn executor(mut self, executor: impl ExecutorBackend + 'static) -> Self {
        self.executor = Some(Box::new(executor));
        self
    }

    pub fn kill_switch(mut self, kill: KillSwitch) -> Self {
        self.kill = Some(kill);
        self
    }

    /// Initial instance options.
    pub fn options(mut self, options: OptionSet) -> Self {
        self.options = options;
        self
    }

    pub fn build(self) -> Result<DiCy> {
        let schema = self.schema.unwrap_or_else(OptionSchema::builtin);
        let file_types = match self.file_types {
            Some(types) => types,
            None => FileTypes::builtin()?,
        };
        let catalog = match self.catalog {
            Some(catalog) => catalog,
            None => crate::steps::builtin_catalog()?,
        };
        let kill = self.kill.unwrap_or_default();
        let executor = self
            .executor
            .unwrap_or_else(|| Box::new(RealExecutorBackend::new(kill.processes().clone())));

        let mut state = State::new(self.root, &self.file_path, schema, file_types);
        state.set_instance_options(self.options);

        Ok(DiCy {
            state,
            catalog,
            executor,
            kill,
        })
    }
}
