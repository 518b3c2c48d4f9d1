use std::fs;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use dicy::exec::{CommandLine, ExecError, ExecRequest, ExecutorBackend, ProcessOutput};

/// One command as seen by [`ScriptedExecutor`].
#[derive(Debug, Clone)]
pub struct ScriptedCall {
    pub args: Vec<String>,
    /// Absolute working directory.
    pub cwd: PathBuf,
}

impl ScriptedCall {
    pub fn program(&self) -> &str {
        self.args.first().map(String::as_str).unwrap_or("")
    }

    /// Write `contents` to `name` relative to the working directory.
    pub fn write(&self, name: &str, contents: &str) {
        let path = self.cwd.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("failed to create output dir");
        }
        fs::write(path, contents).expect("failed to write tool output");
    }

    pub fn exists(&self, name: &str) -> bool {
        self.cwd.join(name).exists()
    }
}

type Handler = dyn Fn(&ScriptedCall) -> Result<ProcessOutput, ExecError> + Send + Sync;

/// An executor that never spawns a process:
/// - records the argv of every command
/// - lets a closure simulate the tool by writing its output files.
pub struct ScriptedExecutor {
    handler: Arc<Handler>,
    calls: Arc<Mutex<Vec<Vec<String>>>>,
}

impl ScriptedExecutor {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&ScriptedCall) -> Result<ProcessOutput, ExecError> + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Shared record of executed commands; stays valid after the executor
    /// has been moved into an orchestrator.
    pub fn calls(&self) -> CallLog {
        CallLog(Arc::clone(&self.calls))
    }
}

impl ExecutorBackend for ScriptedExecutor {
    fn execute<'a>(
        &'a mut self,
        request: ExecRequest<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<ProcessOutput, ExecError>> + Send + 'a>> {
        let handler = Arc::clone(&self.handler);
        let calls = Arc::clone(&self.calls);
        Box::pin(async move {
            let args = match &request.spec.command {
                CommandLine::Argv(args) => args.clone(),
                CommandLine::Shell(line) => line.split_whitespace().map(str::to_string).collect(),
            };
            calls.lock().unwrap().push(args.clone());

            if request.token.is_cancelled() {
                return Err(ExecError::Cancelled {
                    program: request.spec.program().to_string(),
                    reason: "cancelled before start".to_string(),
                });
            }
            let call = ScriptedCall {
                args,
                cwd: request.root.join(&request.spec.cwd),
            };
            handler(&call)
        })
    }
}

/// Handle onto the commands a [`ScriptedExecutor`] has run.
#[derive(Clone)]
pub struct CallLog(Arc<Mutex<Vec<Vec<String>>>>);

impl CallLog {
    pub fn all(&self) -> Vec<Vec<String>> {
        self.0.lock().unwrap().clone()
    }

    /// How many times `program` was run.
    pub fn count(&self, program: &str) -> usize {
        self.all()
            .iter()
            .filter(|args| args.first().map(String::as_str) == Some(program))
            .count()
    }
}

/// Successful empty output.
pub fn ok() -> Result<ProcessOutput, ExecError> {
    Ok(ProcessOutput::default())
}

/// A non-zero exit of `program`.
pub fn failed(program: &str) -> Result<ProcessOutput, ExecError> {
    Err(ExecError::Failed {
        program: program.to_string(),
        code: Some(1),
        signal: None,
        stdout: String::new(),
        stderr: String::new(),
    })
}

/// Simulate a typesetting engine run in `call.cwd`.
///
/// Writes the log, recorder listing, auxiliary file and PDF for `jobname`.
/// The first run (no auxiliary file yet) asks for a rerun.
pub fn fake_latex(call: &ScriptedCall, jobname: &str, source: &str) {
    let first_run = !call.exists(&format!("{jobname}.aux"));
    let mut log = String::from("This is pdfTeX, Version 3.14\n");
    log.push_str(&format!("({source}\n"));
    if first_run {
        log.push_str("LaTeX Warning: Label(s) may have changed. Rerun to get cross-references right.\n");
    }
    log.push_str(&format!("Output written on {jobname}.pdf (1 page, 1234 bytes).\n"));
    call.write(&format!("{jobname}.log"), &log);
    call.write(
        &format!("{jobname}.fls"),
        &format!(
            "PWD {cwd}\nINPUT {source}\nOUTPUT {jobname}.aux\nOUTPUT {jobname}.log\nOUTPUT {jobname}.pdf\n",
            cwd = call.cwd.display()
        ),
    );
    call.write(&format!("{jobname}.aux"), "\\relax\n");
    call.write(&format!("{jobname}.pdf"), "%PDF-1.5\n");
}

/// Executor simulating the usual tool chain: every `*latex` engine behaves
/// like [`fake_latex`], anything else succeeds without output.
pub fn latex_tools() -> ScriptedExecutor {
    ScriptedExecutor::new(|call| {
        if call.program().ends_with("latex") {
            simulate_engine(call);
        }
        ok()
    })
}

/// Run [`fake_latex`] with the job name and source taken from the argv.
pub fn simulate_engine(call: &ScriptedCall) {
    let source = call.args.last().cloned().unwrap_or_default();
    let jobname = call
        .args
        .iter()
        .find_map(|a| a.strip_prefix("-jobname=").map(str::to_string))
        .unwrap_or_else(|| source.trim_end_matches(".tex").to_string());
    fake_latex(call, &jobname, &source);
}
