// src/graph/file_types.rs

//! File-type catalog.
//!
//! Each entry matches on the file name with glob patterns and optionally on
//! the head of the file content with a regex. Entries are tried in order and
//! the first match wins.

use globset::{Glob, GlobSet, GlobSetBuilder};
use regex::Regex;

use crate::errors::{DicyError, Result};

/// Bytes of content inspected by content-matching entries.
pub const CONTENT_HEAD_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub file_type: String,
    pub sub_type: Option<String>,
    pub is_virtual: bool,
}

#[derive(Debug, Clone)]
struct FileTypeDef {
    name: String,
    sub_type: Option<String>,
    names: GlobSet,
    content: Option<Regex>,
    is_virtual: bool,
}

#[derive(Debug, Clone, Default)]
pub struct FileTypes {
    defs: Vec<FileTypeDef>,
}

impl FileTypes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type matched on file name only.
    pub fn push(&mut self, name: &str, patterns: &[&str]) -> Result<()> {
        self.push_def(name, None, patterns, None, false)
    }

    /// Register a type that also requires `content` to match the file head.
    pub fn push_with_content(
        &mut self,
        name: &str,
        sub_type: Option<&str>,
        patterns: &[&str],
        content: &str,
    ) -> Result<()> {
        self.push_def(name, sub_type, patterns, Some(content), false)
    }

    /// Register a virtual type (in-memory artifacts with no backing file).
    pub fn push_virtual(&mut self, name: &str, patterns: &[&str]) -> Result<()> {
        self.push_def(name, None, patterns, None, true)
    }

    fn push_def(
        &mut self,
        name: &str,
        sub_type: Option<&str>,
        patterns: &[&str],
        content: Option<&str>,
        is_virtual: bool,
    ) -> Result<()> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = Glob::new(pattern).map_err(|e| {
                DicyError::ConfigError(format!("invalid pattern '{pattern}' for {name}: {e}"))
            })?;
            builder.add(glob);
        }
        let names = builder
            .build()
            .map_err(|e| DicyError::ConfigError(format!("building patterns for {name}: {e}")))?;
        let content = content
            .map(|re| {
                Regex::new(re).map_err(|e| {
                    DicyError::ConfigError(format!("invalid content pattern for {name}: {e}"))
                })
            })
            .transpose()?;

        self.defs.push(FileTypeDef {
            name: name.to_string(),
            sub_type: sub_type.map(str::to_string),
            names,
            content,
            is_virtual,
        });
        Ok(())
    }

    /// Classify a file by name, reading its head through `read_head` only if
    /// a name-matching entry needs it. The head is read at most once.
    pub fn classify<F>(&self, file_name: &str, mut read_head: F) -> Option<Classification>
    where
        F: FnMut() -> Option<String>,
    {
        let mut head: Option<Option<String>> = None;
        for def in &self.defs {
            if !def.names.is_match(file_name) {
                continue;
            }
            if let Some(re) = &def.content {
                let text = head.get_or_insert_with(&mut read_head);
                match text {
                    Some(text) if re.is_match(text) => {}
                    _ => continue,
                }
            }
            return Some(Classification {
                file_type: def.name.clone(),
                sub_type: def.sub_type.clone(),
                is_virtual: def.is_virtual,
            });
        }
        None
    }

    pub fn is_virtual_name(&self, file_name: &str) -> bool {
        self.defs
            .iter()
            .any(|d| d.is_virtual && d.names.is_match(file_name))
    }

    /// The catalog used by the built-in steps.
    pub fn builtin() -> Result<Self> {
        let mut types = FileTypes::new();
        types.push_virtual("ParsedLaTeXLog", &["*-ParsedLaTeXLog"])?;
        types.push_virtual("ParsedLaTeXFileListing", &["*-ParsedLaTeXFileListing"])?;
        types.push_virtual("ParsedOptions", &["*-ParsedOptions"])?;
        types.push("OptionsFile", &["dicy.toml", "*.dicy.toml"])?;
        types.push_with_content(
            "LaTeX",
            Some("LaTeX2e"),
            &["*.tex", "*.ltx"],
            r"\\documentclass",
        )?;
        types.push("LaTeX", &["*.tex", "*.ltx"])?;
        types.push_with_content("LaTeXLog", None, &["*.log"], r"(?m)^This is \S*TeX")?;
        types.push("LaTeXFileListing", &["*.fls"])?;
        types.push("LaTeXAuxilary", &["*.aux"])?;
        types.push("BibTeXBibliography", &["*.bbl"])?;
        types.push("BibTeXLog", &["*.blg"])?;
        types.push("BibTeXDatabase", &["*.bib"])?;
        types.push("PortableDocumentFormat", &["*.pdf"])?;
        types.push("DeviceIndependentFile", &["*.dvi"])?;
        types.push("PostScript", &["*.ps"])?;
        types.push("GraphvizDot", &["*.dot"])?;
        Ok(types)
    }
}
