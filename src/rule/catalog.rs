// src/rule/catalog.rs

//! Explicit registry of step types, built at program start.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::errors::{DicyError, Result};
use crate::rule::StepType;
use crate::types::{Command, Phase};

#[derive(Clone, Default)]
pub struct RuleCatalog {
    steps: Vec<Arc<dyn StepType>>,
    by_name: BTreeMap<String, usize>,
}

impl RuleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a step type. Registration order is discovery order.
    pub fn register(&mut self, step: Arc<dyn StepType>) -> Result<()> {
        let name = step.name().to_string();
        if self.by_name.contains_key(&name) {
            return Err(DicyError::ConfigError(format!(
                "step type '{name}' registered twice"
            )));
        }
        self.by_name.insert(name, self.steps.len());
        self.steps.push(step);
        Ok(())
    }

    pub fn with(mut self, step: impl StepType + 'static) -> Result<Self> {
        self.register(Arc::new(step))?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn StepType>> {
        self.by_name.get(name).map(|&i| &self.steps[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn StepType>> {
        self.steps.iter()
    }

    /// Step types taking part in `command` / `phase`.
    pub fn for_phase(&self, command: Command, phase: Phase) -> Vec<Arc<dyn StepType>> {
        self.steps
            .iter()
            .filter(|s| s.descriptor().matches(command, phase))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl std::fmt::Debug for RuleCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.by_name.keys()).finish()
    }
}
