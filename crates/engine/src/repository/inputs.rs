//! Contextual input store: global inputs per workflow name, local inputs
//! per instance name.

use std::collections::HashMap;

use dashmap::DashMap;
use tracing::debug;

use crate::models::ContextualInput;

/// Two-level key/value store used to resolve task request placeholders.
#[derive(Debug, Default)]
pub struct ContextualInputStore {
    /// workflow name → key → value
    global: DashMap<String, HashMap<String, String>>,
    /// instance name → local scope
    local: DashMap<String, LocalScope>,
}

#[derive(Debug)]
enum LocalScope {
    /// key → value (`None` when the producing task failed)
    Live(HashMap<String, Option<String>>),
    /// The instance was evicted; late writes are discarded.
    Retired,
}

impl ContextualInputStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Global inputs
    // ------------------------------------------------------------------

    /// Upsert `inputs` into the global scope of `workflow`.
    pub fn save_global_inputs(
        &self,
        workflow: &str,
        inputs: impl IntoIterator<Item = ContextualInput>,
    ) {
        let mut scope = self.global.entry(workflow.to_owned()).or_default();
        for input in inputs {
            scope.insert(input.key, input.value);
        }
    }

    pub fn find_global(&self, workflow: &str, key: &str) -> Option<String> {
        self.global.get(workflow)?.get(key).cloned()
    }

    pub fn global_inputs(&self, workflow: &str) -> Vec<ContextualInput> {
        let mut inputs: Vec<ContextualInput> = self
            .global
            .get(workflow)
            .map(|scope| {
                scope
                    .iter()
                    .map(|(k, v)| ContextualInput::new(k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default();
        inputs.sort_by(|a, b| a.key.cmp(&b.key));
        inputs
    }

    pub fn delete_global(&self, workflow: &str) {
        self.global.remove(workflow);
    }

    // ------------------------------------------------------------------
    // Local inputs
    // ------------------------------------------------------------------

    /// Record `key` for `instance`. A `None` value marks the key as known
    /// but unusable; it never substitutes.
    ///
    /// Writes for a retired instance are dropped.
    pub fn save_local(&self, instance: &str, key: impl Into<String>, value: Option<String>) {
        let key = key.into();
        let mut scope = self
            .local
            .entry(instance.to_owned())
            .or_insert_with(|| LocalScope::Live(HashMap::new()));
        match &mut *scope {
            LocalScope::Live(values) => {
                values.insert(key, value);
            }
            LocalScope::Retired => {
                debug!(instance, %key, "instance retired, local input dropped");
            }
        }
    }

    pub fn find_local(&self, instance: &str, key: &str) -> Option<String> {
        match &*self.local.get(instance)? {
            LocalScope::Live(values) => values.get(key).cloned().flatten(),
            LocalScope::Retired => None,
        }
    }

    /// Drop every local input of `instance` and refuse later writes.
    pub fn retire_local(&self, instance: &str) {
        if let Some(LocalScope::Live(_)) = self.local.insert(instance.to_owned(), LocalScope::Retired) {
            debug!(instance, "dropped local contextual inputs");
        }
    }

    // ------------------------------------------------------------------
    // Resolution
    // ------------------------------------------------------------------

    /// Resolve one template value: global, then local, then the literal.
    pub fn resolve(&self, workflow: &str, instance: &str, value: &str) -> String {
        self.find_global(workflow, value)
            .or_else(|| self.find_local(instance, value))
            .unwrap_or_else(|| value.to_owned())
    }
}
