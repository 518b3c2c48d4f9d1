// src/graph/paths.rs

//! Project-relative path keys and `$`-templates.
//!
//! Artifacts are keyed by forward-slash paths relative to the project root.
//! Rule code names artifacts with templates such as `$DIR/$JOB.log`, resolved
//! per job against the main source file.

use std::path::{Component, Path};

/// Normalise a relative path: collapse `.` and `..`, use `/` separators.
///
/// `..` segments that climb above the start are kept.
pub fn normalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                if matches!(parts.last(), Some(last) if *last != "..") {
                    parts.pop();
                } else {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }
    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}

/// Key for `path` relative to `root`, or `None` if it lies outside the root.
/// Relative paths are taken as relative to `root` already.
pub fn relative_key(root: &Path, path: &Path) -> Option<String> {
    if path.is_relative() {
        let key = normalize(&path.to_string_lossy());
        return is_inside(&key).then_some(key);
    }
    let rel = path.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in rel.components() {
        match component {
            Component::Normal(s) => parts.push(s.to_string_lossy().into_owned()),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(normalize(&parts.join("/")))
}

/// Key for a path a tool reported while running in `cwd` (a project key).
/// Absolute paths are mapped through `root`. `None` if it lies outside the
/// project.
pub fn project_key(root: &Path, cwd: &str, path: &str) -> Option<String> {
    let path = path.trim();
    if Path::new(path).is_absolute() {
        return relative_key(root, Path::new(path));
    }
    let key = normalize(&format!("{cwd}/{path}"));
    is_inside(&key).then_some(key)
}

/// Whether a normalised key stays below the project root.
pub fn is_inside(key: &str) -> bool {
    key != ".." && !key.starts_with("../")
}

/// File name part of a key.
pub fn base_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

/// Values substituted into path templates for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathContext {
    pub dir: String,
    pub name: String,
    pub base: String,
    pub ext: String,
    pub job: String,
    pub outdir: String,
}

impl PathContext {
    /// Build the context for `source` (a project key) and the given job.
    pub fn new(source: &str, job: Option<&str>, output_directory: &str) -> Self {
        let base = base_name(source).to_string();
        let dir = match source.rfind('/') {
            Some(i) => source[..i].to_string(),
            None => ".".to_string(),
        };
        let (name, ext) = match base.rfind('.') {
            Some(i) if i > 0 => (base[..i].to_string(), base[i..].to_string()),
            _ => (base.clone(), String::new()),
        };
        let job = job.map(str::to_string).unwrap_or_else(|| name.clone());
        let outdir = normalize(&format!("{dir}/{output_directory}"));
        Self {
            dir,
            name,
            base,
            ext,
            job,
            outdir,
        }
    }

    /// Substitute template variables and normalise the result.
    pub fn resolve(&self, template: &str) -> String {
        let vars: [(&str, &str); 6] = [
            ("OUTDIR", self.outdir.as_str()),
            ("DIR", self.dir.as_str()),
            ("NAME", self.name.as_str()),
            ("BASE", self.base.as_str()),
            ("EXT", self.ext.as_str()),
            ("JOB", self.job.as_str()),
        ];
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(pos) = rest.find('$') {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos + 1..];
            match vars.iter().find(|(name, _)| tail.starts_with(name)) {
                Some((name, value)) => {
                    out.push_str(value);
                    rest = &tail[name.len()..];
                }
                None => {
                    out.push('$');
                    rest = tail;
                }
            }
        }
        out.push_str(rest);
        normalize(&out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn normalize_collapses_segments() {
        assert_eq!(normalize("./a/../b"), "b");
        assert_eq!(normalize("a//b/./c"), "a/b/c");
        assert_eq!(normalize("../x"), "../x");
        assert_eq!(normalize("a\\b"), "a/b");
        assert_eq!(normalize("./"), ".");
    }

    #[test]
    fn templates_resolve_per_job() {
        let ctx = PathContext::new("chapters/doc.tex", None, "out");
        assert_eq!(ctx.resolve("$OUTDIR/$JOB.log"), "chapters/out/doc.log");
        assert_eq!(ctx.resolve("$DIR/$NAME.dicy.toml"), "chapters/doc.dicy.toml");
        assert_eq!(ctx.resolve("$BASE"), "doc.tex");
        assert_eq!(ctx.ext, ".tex");

        let job = PathContext::new("doc.tex", Some("draft"), ".");
        assert_eq!(job.resolve("$OUTDIR/$JOB.pdf"), "draft.pdf");
        assert_eq!(job.resolve("$DIR/$NAME-graph.dot"), "doc-graph.dot");
    }

    #[test]
    fn relative_keys_stay_inside_the_root() {
        let root = PathBuf::from("/proj");
        assert_eq!(
            relative_key(&root, Path::new("/proj/sub/a.tex")),
            Some("sub/a.tex".to_string())
        );
        assert_eq!(relative_key(&root, Path::new("/usr/share/x.sty")), None);
        assert_eq!(relative_key(&root, Path::new("./b.aux")), Some("b.aux".to_string()));
        assert_eq!(relative_key(&root, Path::new("../c")), None);
    }

    #[test]
    fn reported_paths_outside_the_project_have_no_key() {
        let root = PathBuf::from("/proj");
        assert_eq!(project_key(&root, "sub", "../doc.pdf"), Some("doc.pdf".to_string()));
        assert_eq!(project_key(&root, ".", "../doc.pdf"), None);
        assert_eq!(project_key(&root, "sub", "../../x.pdf"), None);
        assert_eq!(project_key(&root, ".", "/proj/out/doc.pdf"), Some("out/doc.pdf".to_string()));
        assert_eq!(project_key(&root, ".", "/tmp/doc.pdf"), None);
        assert!(is_inside("..foo/bar"));
        assert!(!is_inside(".."));
    }
}
