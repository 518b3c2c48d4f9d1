// src/graph/state.rs

//! The dependency graph: artifact registry, rule registry and the bipartite
//! file/rule graph, plus the option layers.
//!
//! Edge direction:
//! - file → rule: the file is an input of the rule
//! - rule → file: the file is an output of the rule
//!
//! All structural mutation goes through the methods here; connectivity views
//! are derived and dropped on every mutation.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::SystemTime;

use petgraph::Direction;
use petgraph::dot::{Config, Dot};
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::unionfind::UnionFind;
use petgraph::visit::{EdgeRef, IntoEdgeReferences, NodeIndexable};
use serde_json::Value;
use tracing::{debug, info, trace, warn};

use crate::config::{JobOptions, OptionSchema, OptionSet};
use crate::errors::Result;
use crate::graph::file::File;
use crate::graph::file_types::FileTypes;
use crate::graph::paths::{PathContext, is_inside, normalize};
use crate::rule::Rule;
use crate::types::{Command, DependencyType, JobName, Phase};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Node {
    File(String),
    Rule(String),
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::File(key) | Node::Rule(key) => f.write_str(key),
        }
    }
}

#[derive(Debug)]
pub struct State {
    root: PathBuf,
    file_path: String,
    files: BTreeMap<String, File>,
    rules: BTreeMap<String, Rule>,
    graph: StableDiGraph<Node, DependencyType>,
    nodes: HashMap<Node, NodeIndex>,
    /// Effective options (user files + instance options) last applied.
    options: OptionSet,
    /// Options read from option files.
    user_options: OptionSet,
    /// Options set through the API / command line.
    instance_options: OptionSet,
    schema: OptionSchema,
    file_types: FileTypes,
    components: OnceLock<Vec<Vec<String>>>,
    /// Inputs declared before their file existed: file key → rule → edge.
    awaited: BTreeMap<String, BTreeMap<String, DependencyType>>,
    cache_timestamp: Option<SystemTime>,
}

impl State {
    /// `file_path` is the main source, relative to `root`.
    pub fn new(
        root: impl Into<PathBuf>,
        file_path: &str,
        schema: OptionSchema,
        file_types: FileTypes,
    ) -> Self {
        Self {
            root: root.into(),
            file_path: normalize(file_path),
            files: BTreeMap::new(),
            rules: BTreeMap::new(),
            graph: StableDiGraph::new(),
            nodes: HashMap::new(),
            options: OptionSet::new(),
            user_options: OptionSet::new(),
            instance_options: OptionSet::new(),
            schema,
            file_types,
            components: OnceLock::new(),
            awaited: BTreeMap::new(),
            cache_timestamp: None,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Key of the main source file.
    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    pub fn schema(&self) -> &OptionSchema {
        &self.schema
    }

    pub fn file_types(&self) -> &FileTypes {
        &self.file_types
    }

    pub fn cache_timestamp(&self) -> Option<SystemTime> {
        self.cache_timestamp
    }

    pub fn set_cache_timestamp(&mut self, ts: Option<SystemTime>) {
        self.cache_timestamp = ts;
    }

    /// `<root>/<dir>/<name>-cache.json` for the main source.
    pub fn cache_path(&self) -> PathBuf {
        let ctx = PathContext::new(&self.file_path, None, ".");
        self.root.join(ctx.resolve("$DIR/$NAME-cache.json"))
    }

    pub fn resolve_path(&self, template: &str, job: Option<&str>) -> String {
        let outdir = self.job_options(job).output_directory().to_string();
        PathContext::new(&self.file_path, job, &outdir).resolve(template)
    }

    // ----- options --------------------------------------------------------

    pub fn options(&self) -> &OptionSet {
        &self.options
    }

    pub fn instance_options(&self) -> &OptionSet {
        &self.instance_options
    }

    pub fn job_options<'a>(&'a self, job: Option<&'a str>) -> JobOptions<'a> {
        JobOptions::new(&self.options, &self.schema, job)
    }

    pub fn job_names(&self) -> Vec<JobName> {
        self.job_options(None).job_names()
    }

    /// Replace the instance layer and re-apply the effective options.
    pub fn set_instance_options(&mut self, options: OptionSet) -> bool {
        self.instance_options = options;
        let mut merged = self.user_options.clone();
        merged.merge(&self.instance_options);
        self.assign_options(merged)
    }

    /// Replace the option-file layer and re-apply the effective options.
    pub fn assign_user_options(&mut self, options: OptionSet) -> bool {
        self.user_options = options;
        let mut merged = self.user_options.clone();
        merged.merge(&self.instance_options);
        self.assign_options(merged)
    }

    /// Install `options` as the effective option set.
    ///
    /// Any change to an option that invalidates the build removes every rule
    /// except those of `load`/`finalize`. Returns whether rules were removed.
    pub fn assign_options(&mut self, options: OptionSet) -> bool {
        let changed = self.options.invalidating_changes(&options, &self.schema);
        self.options = options;
        if changed.is_empty() {
            return false;
        }

        let stale: Vec<String> = self
            .rules
            .values()
            .filter(|r| !(r.command == Command::Load && r.phase == Phase::Finalize))
            .map(|r| r.id.clone())
            .collect();
        info!(
            options = ?changed,
            removed = stale.len(),
            "options changed; invalidating build rules"
        );
        for id in stale {
            self.remove_rule(&id);
        }
        true
    }

    /// Restore the effective options verbatim (cache load).
    pub fn restore_options(&mut self, options: OptionSet) {
        self.options = options;
    }

    // ----- files ----------------------------------------------------------

    /// Return the artifact for `key`, creating it on first reference.
    ///
    /// `None` means "not yet available": the path names a physical file that
    /// is not readable. Paths outside the project root are never available.
    ///
    /// A new artifact becomes an input of every rule that was waiting for it.
    pub fn get_file(&mut self, key: &str) -> Option<&mut File> {
        let key = normalize(key);
        if !is_inside(&key) {
            warn!(file = %key, "path outside the project ignored");
            return None;
        }
        if !self.files.contains_key(&key) {
            let file = File::create(&self.root, &key, &self.file_types)?;
            self.ensure_node(Node::File(key.clone()));
            self.files.insert(key.clone(), file);
            for (rule_id, dependency) in self.awaited.remove(&key).unwrap_or_default() {
                debug!(rule = %rule_id, file = %key, "awaited input appeared");
                self.link(&rule_id, &key, dependency, Direction::Incoming);
            }
        }
        self.files.get_mut(&key)
    }

    pub fn file(&self, key: &str) -> Option<&File> {
        self.files.get(key)
    }

    pub fn file_mut(&mut self, key: &str) -> Option<&mut File> {
        self.files.get_mut(key)
    }

    pub fn files(&self) -> impl Iterator<Item = &File> {
        self.files.values()
    }

    pub fn files_mut(&mut self) -> impl Iterator<Item = &mut File> {
        self.files.values_mut()
    }

    /// Set the payload of an existing artifact. Returns whether it changed.
    pub fn set_file_value(&mut self, key: &str, value: Value) -> bool {
        match self.files.get_mut(key) {
            Some(file) => file.set_value(value),
            None => false,
        }
    }

    /// Drop `job`'s reference to `key`. When no job references the artifact
    /// any longer it leaves the graph together with every rule that has it
    /// as a parameter, and with `unlink` its backing file is deleted.
    ///
    /// Returns whether the artifact was removed.
    pub fn delete_file(&mut self, key: &str, job: &JobName, unlink: bool) -> Result<bool> {
        let Some(file) = self.files.get_mut(key) else {
            return Ok(false);
        };
        file.job_names.remove(job);
        if !file.job_names.is_empty() {
            return Ok(false);
        }

        let real = file.real_file_path.clone();
        let is_virtual = file.is_virtual;
        self.purge_file(key);

        if unlink && !is_virtual && real.exists() {
            info!(file = %key, "deleting");
            fs::remove_file(&real)?;
        }
        Ok(true)
    }

    /// Remove an artifact from the graph unconditionally.
    pub fn purge_file(&mut self, key: &str) {
        let owners: Vec<String> = self
            .rules
            .values()
            .filter(|r| r.parameters.iter().any(|p| p == key))
            .map(|r| r.id.clone())
            .collect();
        for id in owners {
            self.remove_rule(&id);
        }
        self.files.remove(key);
        self.remove_node(&Node::File(key.to_string()));
        debug!(file = %key, "artifact removed");
    }

    /// Start-of-build reset of every artifact's change flags.
    pub fn clear_build_changes(&mut self) {
        for file in self.files.values_mut() {
            file.clear_changes();
        }
    }

    // ----- rules ----------------------------------------------------------

    /// Register a rule. Each parameter artifact gains an input edge to it.
    pub fn add_rule(&mut self, rule: Rule) {
        let id = rule.id.clone();
        let rule_node = self.ensure_node(Node::Rule(id.clone()));
        for param in &rule.parameters {
            if let Some(&file_node) = self.nodes.get(&Node::File(param.clone())) {
                self.graph
                    .update_edge(file_node, rule_node, DependencyType::Default);
            } else {
                warn!(rule = %id, file = %param, "parameter artifact missing from graph");
            }
        }
        self.rules.insert(id, rule);
        self.components = OnceLock::new();
    }

    pub fn remove_rule(&mut self, id: &str) -> Option<Rule> {
        let rule = self.rules.remove(id)?;
        self.awaited.retain(|_, rules| {
            rules.remove(id);
            !rules.is_empty()
        });
        self.remove_node(&Node::Rule(id.to_string()));
        debug!(rule = %id, "rule removed");
        Some(rule)
    }

    pub fn rule(&self, id: &str) -> Option<&Rule> {
        self.rules.get(id)
    }

    pub fn rule_mut(&mut self, id: &str) -> Option<&mut Rule> {
        self.rules.get_mut(id)
    }

    pub fn has_rule(&self, id: &str) -> bool {
        self.rules.contains_key(id)
    }

    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.values()
    }

    pub fn rule_ids(&self) -> Vec<String> {
        self.rules.keys().cloned().collect()
    }

    // ----- edges ----------------------------------------------------------

    /// Make `file` an input of `rule_id`, creating the artifact if needed.
    /// Returns `false` when the artifact is not available or the rule is
    /// unknown. An unavailable input is remembered and linked as soon as the
    /// artifact is created.
    pub fn add_input(&mut self, rule_id: &str, file: &str, dependency: DependencyType) -> bool {
        self.add_edge(rule_id, file, dependency, Direction::Incoming)
    }

    /// Make `file` an output of `rule_id`, creating the artifact if needed.
    pub fn add_output(&mut self, rule_id: &str, file: &str, dependency: DependencyType) -> bool {
        self.add_edge(rule_id, file, dependency, Direction::Outgoing)
    }

    fn add_edge(
        &mut self,
        rule_id: &str,
        file: &str,
        dependency: DependencyType,
        direction: Direction,
    ) -> bool {
        if !self.rules.contains_key(rule_id) {
            return false;
        }
        let key = normalize(file);
        if self.get_file(&key).is_none() {
            if direction == Direction::Incoming && is_inside(&key) {
                trace!(rule = %rule_id, file = %key, "input not yet available");
                self.awaited
                    .entry(key)
                    .or_default()
                    .insert(rule_id.to_string(), dependency);
            }
            return false;
        }
        self.link(rule_id, &key, dependency, direction)
    }

    /// Connect an existing artifact to an existing rule.
    ///
    /// A consumer that joins during a build still sees the changes the
    /// artifact went through earlier in that build.
    fn link(
        &mut self,
        rule_id: &str,
        key: &str,
        dependency: DependencyType,
        direction: Direction,
    ) -> bool {
        let (Some(rule), Some(file)) = (self.rules.get(rule_id), self.files.get_mut(key)) else {
            return false;
        };
        file.job_names.insert(rule.job_name.clone());

        let (Some(&file_node), Some(&rule_node)) = (
            self.nodes.get(&Node::File(key.to_string())),
            self.nodes.get(&Node::Rule(rule_id.to_string())),
        ) else {
            return false;
        };
        let (a, b) = match direction {
            Direction::Incoming => (file_node, rule_node),
            Direction::Outgoing => (rule_node, file_node),
        };
        // A `Target` edge is never downgraded.
        let existing = self.graph.find_edge(a, b);
        match existing {
            Some(e) if self.graph[e] == dependency || dependency == DependencyType::Default => {
                return true;
            }
            Some(e) => self.graph[e] = dependency,
            None => {
                self.graph.add_edge(a, b, dependency);
                if direction == Direction::Incoming {
                    if let Some(file) = self.files.get_mut(key) {
                        file.has_been_updated |= file.has_been_updated_cache;
                    }
                }
            }
        }
        self.components = OnceLock::new();
        true
    }

    /// Inputs of `rule_id` still waiting for their artifact.
    pub fn awaited_inputs(&self, rule_id: &str) -> Vec<(String, DependencyType)> {
        self.awaited
            .iter()
            .filter_map(|(key, rules)| rules.get(rule_id).map(|dep| (key.clone(), *dep)))
            .collect()
    }

    pub fn input_edges(&self, rule_id: &str) -> Vec<(String, DependencyType)> {
        self.rule_edges(rule_id, Direction::Incoming)
    }

    pub fn output_edges(&self, rule_id: &str) -> Vec<(String, DependencyType)> {
        self.rule_edges(rule_id, Direction::Outgoing)
    }

    pub fn inputs_of(&self, rule_id: &str) -> Vec<String> {
        self.input_edges(rule_id).into_iter().map(|(f, _)| f).collect()
    }

    pub fn outputs_of(&self, rule_id: &str) -> Vec<String> {
        self.output_edges(rule_id).into_iter().map(|(f, _)| f).collect()
    }

    fn rule_edges(&self, rule_id: &str, direction: Direction) -> Vec<(String, DependencyType)> {
        let Some(&idx) = self.nodes.get(&Node::Rule(rule_id.to_string())) else {
            return Vec::new();
        };
        let mut edges: Vec<(String, DependencyType)> = self
            .graph
            .edges_directed(idx, direction)
            .filter_map(|e| {
                let other = match direction {
                    Direction::Incoming => e.source(),
                    Direction::Outgoing => e.target(),
                };
                match &self.graph[other] {
                    Node::File(key) => Some((key.clone(), *e.weight())),
                    Node::Rule(_) => None,
                }
            })
            .collect();
        edges.sort();
        edges
    }

    /// Rules that consume `file`.
    pub fn dependents_of(&self, file: &str) -> Vec<String> {
        self.file_neighbors(file, Direction::Outgoing)
    }

    /// Rules that produce `file`.
    pub fn producers_of(&self, file: &str) -> Vec<String> {
        self.file_neighbors(file, Direction::Incoming)
    }

    fn file_neighbors(&self, file: &str, direction: Direction) -> Vec<String> {
        let Some(&idx) = self.nodes.get(&Node::File(file.to_string())) else {
            return Vec::new();
        };
        let ids: BTreeSet<String> = self
            .graph
            .neighbors_directed(idx, direction)
            .filter_map(|n| match &self.graph[n] {
                Node::Rule(id) => Some(id.clone()),
                Node::File(_) => None,
            })
            .collect();
        ids.into_iter().collect()
    }

    /// True if some artifact is an output of `a` and an input of `b`.
    pub fn is_grandparent_of(&self, a: &str, b: &str) -> bool {
        let (Some(&ia), Some(&ib)) = (
            self.nodes.get(&Node::Rule(a.to_string())),
            self.nodes.get(&Node::Rule(b.to_string())),
        ) else {
            return false;
        };
        self.graph
            .neighbors_directed(ia, Direction::Outgoing)
            .any(|file| self.graph.find_edge(file, ib).is_some())
    }

    /// Rules partitioned into weakly connected components, artifacts acting
    /// as intermediate nodes. Memoised until the next graph mutation.
    pub fn weakly_connected_components(&self) -> &[Vec<String>] {
        self.components.get_or_init(|| self.compute_components())
    }

    fn compute_components(&self) -> Vec<Vec<String>> {
        let mut sets = UnionFind::<usize>::new(self.graph.node_bound());
        for edge in self.graph.edge_references() {
            sets.union(edge.source().index(), edge.target().index());
        }

        let mut order: Vec<usize> = Vec::new();
        let mut groups: HashMap<usize, Vec<String>> = HashMap::new();
        for id in self.rules.keys() {
            let Some(&idx) = self.nodes.get(&Node::Rule(id.clone())) else {
                continue;
            };
            let root = sets.find(idx.index());
            let group = groups.entry(root).or_insert_with(|| {
                order.push(root);
                Vec::new()
            });
            group.push(id.clone());
        }
        order
            .into_iter()
            .filter_map(|root| groups.remove(&root))
            .collect()
    }

    /// Final deliverables: outputs reached through a `Target` edge.
    pub fn targets(&self) -> Vec<String> {
        self.targets_matching(|_| true)
    }

    pub fn targets_for(&self, job: Option<&str>) -> Vec<String> {
        self.targets_matching(|rule| rule.job_name.as_deref() == job)
    }

    fn targets_matching(&self, keep: impl Fn(&Rule) -> bool) -> Vec<String> {
        let mut out = BTreeSet::new();
        for rule in self.rules.values().filter(|r| keep(r)) {
            for (file, dep) in self.output_edges(&rule.id) {
                if dep == DependencyType::Target {
                    out.insert(file);
                }
            }
        }
        out.into_iter().collect()
    }

    /// Graphviz rendering of the file/rule graph.
    pub fn to_dot(&self) -> String {
        format!("{}", Dot::with_config(&self.graph, &[Config::EdgeNoLabel]))
    }

    /// Drop every artifact and rule. Options, schema and file types stay.
    pub fn clear(&mut self) {
        self.files.clear();
        self.rules.clear();
        self.graph.clear();
        self.nodes.clear();
        self.awaited.clear();
        self.components = OnceLock::new();
    }

    fn ensure_node(&mut self, node: Node) -> NodeIndex {
        if let Some(&idx) = self.nodes.get(&node) {
            return idx;
        }
        let idx = self.graph.add_node(node.clone());
        self.nodes.insert(node, idx);
        self.components = OnceLock::new();
        idx
    }

    fn remove_node(&mut self, node: &Node) {
        if let Some(idx) = self.nodes.remove(node) {
            self.graph.remove_node(idx);
            self.components = OnceLock::new();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Action;

    fn state() -> (tempfile::TempDir, State) {
        let dir = tempfile::tempdir().unwrap();
        let state = State::new(
            dir.path(),
            "doc.tex",
            OptionSchema::builtin(),
            FileTypes::builtin().unwrap(),
        );
        (dir, state)
    }

    fn rule(name: &str) -> Rule {
        Rule::new(name, Command::Build, Phase::Execute, None, vec![])
    }

    #[test]
    fn parameters_become_inputs() {
        let (dir, mut state) = state();
        std::fs::write(dir.path().join("doc.aux"), "\\bibdata{refs}").unwrap();
        state.get_file("doc.aux").unwrap();

        let r = Rule::new(
            "BibTeX",
            Command::Build,
            Phase::Execute,
            None,
            vec!["doc.aux".to_string()],
        );
        let id = r.id.clone();
        state.add_rule(r);

        assert_eq!(state.inputs_of(&id), vec!["doc.aux".to_string()]);
        assert_eq!(state.dependents_of("doc.aux"), vec![id]);
    }

    #[test]
    fn grandparent_and_components() {
        let (_dir, mut state) = state();
        for name in ["A", "B", "C"] {
            state.add_rule(rule(name));
        }
        let a = "A(build;execute;)";
        let b = "B(build;execute;)";
        let c = "C(build;execute;)";
        assert_eq!(state.weakly_connected_components().len(), 3);

        state.add_output(a, "mid-ParsedLaTeXLog", DependencyType::Default);
        state.add_input(b, "mid-ParsedLaTeXLog", DependencyType::Default);

        assert!(state.is_grandparent_of(a, b));
        assert!(!state.is_grandparent_of(b, a));
        assert!(!state.is_grandparent_of(a, c));

        let comps = state.weakly_connected_components();
        assert_eq!(comps.len(), 2);
        assert_eq!(comps[0], vec![a.to_string(), b.to_string()]);
        assert_eq!(comps[1], vec![c.to_string()]);
    }

    #[test]
    fn missing_input_is_linked_once_its_file_appears() {
        let (dir, mut state) = state();
        state.add_rule(rule("LaTeX"));
        state.add_rule(rule("BibTeX"));
        let latex = "LaTeX(build;execute;)";
        let bibtex = "BibTeX(build;execute;)";

        assert!(!state.add_input(latex, "doc.bbl", DependencyType::Default));
        assert!(state.inputs_of(latex).is_empty());
        assert_eq!(
            state.awaited_inputs(latex),
            vec![("doc.bbl".to_string(), DependencyType::Default)]
        );

        std::fs::write(dir.path().join("doc.bbl"), "\\begin{thebibliography}").unwrap();
        assert!(state.add_output(bibtex, "doc.bbl", DependencyType::Default));

        assert_eq!(state.inputs_of(latex), vec!["doc.bbl".to_string()]);
        assert!(state.awaited_inputs(latex).is_empty());
        assert!(state.is_grandparent_of(bibtex, latex));
        assert!(state.file("doc.bbl").unwrap().has_been_updated);
    }

    #[test]
    fn removed_rule_stops_waiting() {
        let (_dir, mut state) = state();
        state.add_rule(rule("LaTeX"));
        let latex = "LaTeX(build;execute;)";
        state.add_input(latex, "doc.bbl", DependencyType::Default);

        state.remove_rule(latex);
        assert!(state.awaited_inputs(latex).is_empty());
    }

    #[test]
    fn new_consumer_sees_earlier_changes_of_the_build() {
        let (dir, mut state) = state();
        std::fs::write(dir.path().join("in.tex"), "x").unwrap();
        state.add_rule(rule("A"));
        state.get_file("in.tex").unwrap().has_been_updated = false;

        assert!(state.add_input("A(build;execute;)", "in.tex", DependencyType::Default));
        assert!(state.file("in.tex").unwrap().has_been_updated);
    }

    #[test]
    fn paths_outside_the_root_are_never_artifacts() {
        let outer = tempfile::tempdir().unwrap();
        let root = outer.path().join("paper");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(outer.path().join("stray.pdf"), "%PDF").unwrap();
        let mut state = State::new(
            &root,
            "doc.tex",
            OptionSchema::builtin(),
            FileTypes::builtin().unwrap(),
        );
        state.add_rule(rule("LaTeX"));
        let id = "LaTeX(build;execute;)";

        assert!(state.get_file("../stray.pdf").is_none());
        assert!(!state.add_output(id, "../stray.pdf", DependencyType::Target));
        assert!(!state.add_input(id, "sub/../../stray.pdf", DependencyType::Default));
        assert!(state.awaited_inputs(id).is_empty());
        assert!(state.files().next().is_none());
        assert!(outer.path().join("stray.pdf").exists());
    }

    #[test]
    fn delete_file_counts_job_references() {
        let (dir, mut state) = state();
        std::fs::write(dir.path().join("out.pdf"), "%PDF").unwrap();
        let draft = Rule::new("X", Command::Build, Phase::Execute, Some("draft".into()), vec![]);
        let fin = Rule::new("X", Command::Build, Phase::Execute, Some("final".into()), vec![]);
        let (d, f) = (draft.id.clone(), fin.id.clone());
        state.add_rule(draft);
        state.add_rule(fin);
        state.add_output(&d, "out.pdf", DependencyType::Target);
        state.add_output(&f, "out.pdf", DependencyType::Target);

        assert!(!state.delete_file("out.pdf", &Some("draft".into()), true).unwrap());
        assert!(state.file("out.pdf").is_some());
        assert!(state.delete_file("out.pdf", &Some("final".into()), true).unwrap());
        assert!(state.file("out.pdf").is_none());
        assert!(!dir.path().join("out.pdf").exists());
    }

    #[test]
    fn invalidating_option_change_keeps_only_load_finalize() {
        let (_dir, mut state) = state();
        state.add_rule(Rule::new("ApplyOptions", Command::Load, Phase::Finalize, None, vec![]));
        state.add_rule(Rule::new("LoadOptions", Command::Load, Phase::Initialize, None, vec![]));
        state.add_rule(rule("LaTeX"));

        let schema = OptionSchema::builtin();
        let mut opts = OptionSet::new();
        opts.set(&schema, "phaseCycles", 3.0.into());
        assert!(!state.assign_options(opts.clone()));
        assert_eq!(state.rules().count(), 3);

        opts.set(&schema, "engine", "xelatex".into());
        assert!(state.assign_options(opts));
        assert_eq!(state.rule_ids(), vec!["ApplyOptions(load;finalize;)".to_string()]);
    }

    #[test]
    fn targets_follow_target_edges() {
        let (dir, mut state) = state();
        std::fs::write(dir.path().join("doc.pdf"), "%PDF").unwrap();
        std::fs::write(dir.path().join("doc.aux"), "").unwrap();
        let mut r = rule("LaTeX");
        r.add_action(Action::Run, None);
        let id = r.id.clone();
        state.add_rule(r);
        state.add_output(&id, "doc.pdf", DependencyType::Target);
        state.add_output(&id, "doc.aux", DependencyType::Default);
        state.add_output(&id, "doc.pdf", DependencyType::Default);
        assert_eq!(state.targets(), vec!["doc.pdf".to_string()]);
        assert!(state.to_dot().contains("doc.pdf"));
    }
}
