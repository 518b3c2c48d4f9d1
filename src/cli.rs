// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `dicy`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "dicy",
    version,
    about = "Incremental build orchestrator for LaTeX documents.",
    long_about = None
)]
pub struct CliArgs {
    /// Main source file of the document.
    #[arg(value_name = "FILE")]
    pub file: String,

    /// Commands to run in order: build, log, clean, scrub, graph.
    ///
    /// Default: `build`. The cache is loaded before and saved after them.
    #[arg(value_name = "COMMAND")]
    pub commands: Vec<String>,

    /// Instance option as `name=value`; overrides option files.
    #[arg(short = 'o', long = "option", value_name = "NAME=VALUE")]
    pub options: Vec<String>,

    /// Neither read nor write the cache file.
    #[arg(long)]
    pub no_cache: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `DICY_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

impl CliArgs {
    /// The command sequence handed to the orchestrator.
    pub fn effective_commands(&self) -> Vec<String> {
        let mut commands = Vec::new();
        if !self.no_cache {
            commands.push("load".to_string());
        }
        if self.commands.is_empty() {
            commands.push("build".to_string());
        } else {
            commands.extend(self.commands.iter().cloned());
        }
        if !commands.iter().any(|c| c == "log") {
            commands.push("log".to_string());
        }
        if !self.no_cache {
            commands.push("save".to_string());
        }
        commands
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_command_is_wrapped_in_cache_commands() {
        let args = CliArgs::parse_from(["dicy", "doc.tex"]);
        assert_eq!(args.effective_commands(), vec!["load", "build", "log", "save"]);
    }

    #[test]
    fn no_cache_drops_load_and_save() {
        let args = CliArgs::parse_from([
            "dicy", "--no-cache", "-o", "engine=xelatex", "doc.tex", "clean", "log",
        ]);
        assert_eq!(args.effective_commands(), vec!["clean", "log"]);
        assert_eq!(args.options, vec!["engine=xelatex".to_string()]);
    }
}
