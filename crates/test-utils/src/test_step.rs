use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dicy::errors::Result;
use dicy::exec::{CommandSpec, ProcessOutput};
use dicy::rule::{StepContext, StepDescriptor, StepType};
use dicy::types::{Command, Phase};

type RunFn = dyn Fn(&mut StepContext<'_>) -> Result<bool> + Send + Sync;

/// A configurable step type for orchestrator tests.
///
/// It either runs an external command (`command`) or calls a closure
/// (`on_run`), and counts how often its `run` action was evaluated.
pub struct TestStep {
    name: String,
    descriptor: StepDescriptor,
    always: bool,
    command: Option<Vec<String>>,
    on_run: Option<Arc<RunFn>>,
    runs: Arc<AtomicUsize>,
}

impl TestStep {
    pub fn new(name: &str, command: Command, phase: Phase) -> Self {
        Self {
            name: name.to_string(),
            descriptor: StepDescriptor::new(&[command], &[phase]),
            always: false,
            command: None,
            on_run: None,
            runs: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Add a parameter position accepting `types`.
    pub fn parameter(mut self, types: &[&str]) -> Self {
        self.descriptor = self.descriptor.parameter(types);
        self
    }

    pub fn always_evaluate(mut self) -> Self {
        self.always = true;
        self
    }

    pub fn command(mut self, argv: &[&str]) -> Self {
        self.command = Some(argv.iter().map(|a| a.to_string()).collect());
        self
    }

    pub fn on_run<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut StepContext<'_>) -> Result<bool> + Send + Sync + 'static,
    {
        self.on_run = Some(Arc::new(f));
        self
    }

    /// Shared run counter; read it after the step moved into a catalog.
    pub fn runs(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.runs)
    }
}

impl StepType for TestStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn descriptor(&self) -> StepDescriptor {
        self.descriptor.clone()
    }

    fn always_evaluate(&self) -> bool {
        self.always
    }

    fn construct_command(&self, _ctx: &StepContext<'_>) -> Result<Option<CommandSpec>> {
        Ok(self.command.as_ref().map(|argv| CommandSpec::argv(argv.clone())))
    }

    fn process_output(&self, _ctx: &mut StepContext<'_>, _output: &ProcessOutput) -> Result<bool> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }

    fn run(&self, ctx: &mut StepContext<'_>) -> Result<bool> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        match &self.on_run {
            Some(f) => f(ctx),
            None => Ok(true),
        }
    }
}
