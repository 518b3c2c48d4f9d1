// src/cache/store.rs

//! Load, validate and save the cache file.
//!
//! Nothing here is fatal to a build: a missing, unreadable or incompatible
//! snapshot is reported and the caller falls back to [`validate`].

use std::fs;

use tracing::{debug, info, warn};

use crate::cache::snapshot::{CACHE_VERSION, CacheSnapshot, CachedFile, is_compatible};
use crate::engine::invalidation::check_updates;
use crate::errors::{DicyError, Result};
use crate::graph::State;
use crate::rule::{Rule, RuleCatalog};

/// Replace the in-memory graph with the on-disk snapshot when the snapshot
/// is newer than what was last loaded or saved.
///
/// Returns `Ok(false)` when there was nothing to load or the snapshot was
/// skipped.
pub fn load(state: &mut State, catalog: &RuleCatalog) -> Result<bool> {
    let path = state.cache_path();
    let Ok(meta) = fs::metadata(&path) else {
        debug!(path = %path.display(), "no cache file");
        return Ok(false);
    };
    let modified = meta.modified()?;
    if state.cache_timestamp().is_some_and(|current| current >= modified) {
        debug!("in-memory graph is current; cache not reloaded");
        return Ok(false);
    }

    let text = fs::read_to_string(&path)?;
    let snapshot: CacheSnapshot = serde_json::from_str(&text)
        .map_err(|e| DicyError::CacheError(format!("{}: {e}", path.display())))?;

    match snapshot.version.as_deref() {
        Some(version) if is_compatible(version) => {}
        Some(version) => {
            warn!(%version, expected = CACHE_VERSION, "incompatible cache version; ignoring cache");
            return Ok(false);
        }
        None => {
            warn!("cache file has no version; ignoring cache");
            return Ok(false);
        }
    }
    if snapshot.file_path != state.file_path() {
        warn!(cached = %snapshot.file_path, "cache belongs to another document; ignoring cache");
        return Ok(false);
    }

    state.clear();
    state.restore_options(snapshot.options);
    for (key, cached) in &snapshot.files {
        restore_file(state, key, cached);
    }

    let mut restored = 0;
    for cached in snapshot.rules {
        let Some(step) = catalog.get(&cached.name) else {
            warn!(step = %cached.name, "unknown step type in cache; rule skipped");
            continue;
        };
        if let Some(missing) = cached.parameters.iter().find(|p| state.file(p).is_none()) {
            warn!(step = %cached.name, file = %missing, "cached rule parameter missing; rule skipped");
            continue;
        }

        let rule = Rule::new(
            &cached.name,
            cached.command,
            cached.phase,
            cached.job_name,
            cached.parameters,
        );
        let id = rule.id.clone();
        state.add_rule(rule);

        for edge in cached.inputs.iter().chain(&cached.awaiting) {
            state.add_input(&id, &edge.file, edge.dependency);
        }
        let mut output_missing = false;
        for edge in &cached.outputs {
            output_missing |= !state.add_output(&id, &edge.file, edge.dependency);
        }

        if output_missing || step.always_evaluate() {
            if let Some(rule) = state.rule_mut(&id) {
                for action in step.default_actions() {
                    rule.add_action(action, None);
                }
            }
        }
        restored += 1;
    }

    state.set_cache_timestamp(Some(modified));
    info!(files = snapshot.files.len(), rules = restored, "cache loaded");
    Ok(true)
}

/// Bring a cached artifact back. Physical files are re-read from disk and
/// only count as changed when their content hash differs from the cached
/// one.
fn restore_file(state: &mut State, key: &str, cached: &CachedFile) {
    let Some(file) = state.get_file(key) else {
        debug!(file = %key, "cached file no longer available");
        return;
    };
    file.job_names = cached.job_names.clone();
    if file.is_virtual {
        file.value = cached.value.clone();
        file.hash = cached.hash.clone();
        file.timestamp = cached.timestamp;
        file.clear_changes();
    } else if file.hash == cached.hash {
        file.clear_changes();
    }
}

/// Re-check the in-memory graph against the disk: refresh every physical
/// artifact, purge vanished ones and re-arm what the changes invalidate.
///
/// A rule that produced a vanished artifact gets its default actions back.
pub fn validate(state: &mut State, catalog: &RuleCatalog) {
    let mut vanished = Vec::new();
    for file in state.files_mut() {
        if !file.refresh() {
            vanished.push(file.file_path.clone());
        }
    }

    for key in vanished {
        for producer in state.producers_of(&key) {
            let actions = state
                .rule(&producer)
                .and_then(|r| catalog.get(&r.type_name))
                .map(|step| step.default_actions())
                .unwrap_or_default();
            if let Some(rule) = state.rule_mut(&producer) {
                for action in actions {
                    rule.add_action(action, None);
                }
            }
        }
        info!(file = %key, "file vanished");
        state.purge_file(&key);
    }

    check_updates(state, catalog, None);
}

/// Write the snapshot unless no rule has a physical output.
pub fn save(state: &mut State) -> Result<bool> {
    let durable = state.rules().any(|r| {
        state
            .outputs_of(&r.id)
            .iter()
            .any(|o| state.file(o).is_some_and(|f| !f.is_virtual))
    });
    if !durable {
        debug!("no physical rule outputs; cache not written");
        return Ok(false);
    }

    let path = state.cache_path();
    let snapshot = CacheSnapshot::capture(state);
    let json = serde_json::to_string_pretty(&snapshot)?;
    fs::write(&path, json)?;

    state.set_cache_timestamp(fs::metadata(&path)?.modified().ok());
    info!(
        path = %path.display(),
        files = snapshot.files.len(),
        rules = snapshot.rules.len(),
        "cache saved"
    );
    Ok(true)
}

/// Delete the cache file. Returns whether one existed.
pub fn remove(state: &State) -> Result<bool> {
    let path = state.cache_path();
    if !path.exists() {
        return Ok(false);
    }
    fs::remove_file(&path)?;
    info!(path = %path.display(), "cache deleted");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OptionSchema;
    use crate::graph::FileTypes;

    fn state(dir: &tempfile::TempDir) -> State {
        State::new(
            dir.path(),
            "doc.tex",
            OptionSchema::builtin(),
            FileTypes::builtin().unwrap(),
        )
    }

    #[test]
    fn versionless_cache_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("doc-cache.json"), r#"{"filePath":"doc.tex"}"#).unwrap();
        let mut state = state(&dir);
        assert!(!load(&mut state, &RuleCatalog::new()).unwrap());
    }

    #[test]
    fn incompatible_cache_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("doc-cache.json"),
            r#"{"version":"2.0.0","filePath":"doc.tex"}"#,
        )
        .unwrap();
        let mut state = state(&dir);
        assert!(!load(&mut state, &RuleCatalog::new()).unwrap());
    }

    #[test]
    fn malformed_cache_is_an_error_not_a_panic() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("doc-cache.json"), "{not json").unwrap();
        let mut state = state(&dir);
        assert!(matches!(
            load(&mut state, &RuleCatalog::new()),
            Err(DicyError::CacheError(_))
        ));
    }

    #[test]
    fn save_skips_graphs_without_physical_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state(&dir);
        assert!(!save(&mut state).unwrap());
        assert!(!state.cache_path().exists());
        assert!(!remove(&state).unwrap());
    }

    #[test]
    fn inputs_still_missing_survive_a_reload() {
        use crate::steps::builtin_catalog;
        use crate::types::{Command, DependencyType, Phase};

        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("doc.tex"), "\\documentclass{article}").unwrap();
        fs::write(dir.path().join("doc.pdf"), "%PDF").unwrap();
        let mut saved = state(&dir);
        saved.get_file("doc.tex").unwrap();
        let rule = Rule::new(
            "LaTeX",
            Command::Build,
            Phase::Execute,
            None,
            vec!["doc.tex".to_string()],
        );
        let id = rule.id.clone();
        saved.add_rule(rule);
        saved.add_output(&id, "doc.pdf", DependencyType::Target);
        assert!(!saved.add_input(&id, "doc.bbl", DependencyType::Default));
        assert!(save(&mut saved).unwrap());

        let mut loaded = state(&dir);
        assert!(load(&mut loaded, &builtin_catalog().unwrap()).unwrap());
        assert_eq!(
            loaded.awaited_inputs(&id),
            vec![("doc.bbl".to_string(), DependencyType::Default)]
        );

        fs::write(dir.path().join("doc.bbl"), "\\begin{thebibliography}").unwrap();
        loaded.get_file("doc.bbl").unwrap();
        assert!(loaded.inputs_of(&id).contains(&"doc.bbl".to_string()));
    }

    #[test]
    fn validate_purges_vanished_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("gone.txt"), "x").unwrap();
        let mut state = state(&dir);
        state.get_file("gone.txt").unwrap();
        fs::remove_file(dir.path().join("gone.txt")).unwrap();

        validate(&mut state, &RuleCatalog::new());
        assert!(state.file("gone.txt").is_none());
    }
}
