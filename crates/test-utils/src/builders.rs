#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use dicy::config::{OptionSchema, OptionSet, OptionValue};
use dicy::engine::{DiCy, DiCyBuilder};
use dicy::exec::ExecutorBackend;
use dicy::rule::RuleCatalog;
use tempfile::TempDir;

/// A minimal document that classifies as a LaTeX main source.
pub const MINIMAL_DOCUMENT: &str =
    "\\documentclass{article}\n\\begin{document}\nHello.\n\\end{document}\n";

/// Builder for a throwaway project directory.
pub struct ProjectBuilder {
    main: String,
    files: Vec<(String, String)>,
}

impl ProjectBuilder {
    pub fn new() -> Self {
        Self {
            main: "doc.tex".to_string(),
            files: Vec::new(),
        }
    }

    /// Main source name and content.
    pub fn main(mut self, name: &str, contents: &str) -> Self {
        self.main = name.to_string();
        self.files.push((name.to_string(), contents.to_string()));
        self
    }

    pub fn file(mut self, name: &str, contents: &str) -> Self {
        self.files.push((name.to_string(), contents.to_string()));
        self
    }

    pub fn build(self) -> Project {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let mut files = self.files;
        if !files.iter().any(|(name, _)| *name == self.main) {
            files.push((self.main.clone(), MINIMAL_DOCUMENT.to_string()));
        }
        let project = Project {
            dir,
            main: self.main,
        };
        for (name, contents) in files {
            project.write(&name, &contents);
        }
        project
    }
}

impl Default for ProjectBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A project on disk; removed when dropped.
pub struct Project {
    dir: TempDir,
    main: String,
}

impl Project {
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn main(&self) -> &str {
        &self.main
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn write(&self, name: &str, contents: &str) {
        let path = self.path(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("failed to create parent dir");
        }
        fs::write(path, contents).expect("failed to write project file");
    }

    /// Rewrite a file after a pause, so its mtime is strictly newer than
    /// anything written before.
    pub async fn touch_later(&self, name: &str, contents: &str) {
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.write(name, contents);
    }

    pub fn read(&self, name: &str) -> String {
        fs::read_to_string(self.path(name)).unwrap_or_default()
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path(name).exists()
    }

    /// Orchestrator builder for the main source.
    pub fn builder(&self) -> DiCyBuilder {
        DiCy::builder(self.root(), &self.main)
    }

    /// Orchestrator with the built-in catalog and the given executor.
    pub fn dicy(&self, executor: impl ExecutorBackend + 'static) -> DiCy {
        self.builder()
            .executor(executor)
            .build()
            .expect("failed to build orchestrator")
    }

    /// Orchestrator with a custom catalog.
    pub fn dicy_with(&self, catalog: RuleCatalog, executor: impl ExecutorBackend + 'static) -> DiCy {
        self.builder()
            .catalog(catalog)
            .executor(executor)
            .build()
            .expect("failed to build orchestrator")
    }
}

/// Instance options from `(name, value)` pairs; invalid pairs panic.
pub fn options(pairs: &[(&str, OptionValue)]) -> OptionSet {
    let schema = OptionSchema::builtin();
    let mut set = OptionSet::new();
    for (name, value) in pairs {
        assert!(set.set(&schema, name, value.clone()), "invalid option {name}");
    }
    set
}
