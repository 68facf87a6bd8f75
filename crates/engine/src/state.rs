//! Playbook state: four named namespaces of nested values.
//!
//! `inputs` holds caller-provided parameters, `outputs` and `deployed` are
//! written by instruction outputs, and `contracts` holds contract handles
//! created on first use. Namespaces are created lazily and are never replaced
//! wholesale; writes at a path merge into whatever object already lives there.

use std::fmt;

use deckhand_types::{Map, Value};
use indexmap::IndexMap;
use tracing::trace;

use crate::error::PlaybookError;
use crate::path::{lookup, parse_path, slot_mut};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Namespace {
    Inputs,
    Outputs,
    Contracts,
    Deployed,
}

impl Namespace {
    pub const ALL: [Namespace; 4] = [Namespace::Inputs, Namespace::Outputs, Namespace::Contracts, Namespace::Deployed];

    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Inputs => "inputs",
            Namespace::Outputs => "outputs",
            Namespace::Contracts => "contracts",
            Namespace::Deployed => "deployed",
        }
    }

    /// Parses a namespace keyword, with or without the leading `$`.
    pub fn parse(keyword: &str) -> Option<Self> {
        let keyword = keyword.strip_prefix('$').unwrap_or(keyword);
        Namespace::ALL.into_iter().find(|namespace| namespace.as_str() == keyword)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.as_str())
    }
}

/// Mutable store shared by every instruction of a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateStore {
    namespaces: IndexMap<Namespace, Value>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// State whose `inputs` namespace starts out as `inputs`.
    pub fn with_inputs(inputs: Map) -> Self {
        let mut state = Self::new();
        state.namespaces.insert(Namespace::Inputs, Value::Object(inputs));
        state
    }

    /// Rebuilds state from a previously exported document.
    ///
    /// Top-level keys name namespaces (`inputs` or `$inputs`) and each must
    /// hold an object. Unknown keys are rejected.
    pub fn from_value(document: Value) -> Result<Self, PlaybookError> {
        let Value::Object(fields) = document else {
            return Err(PlaybookError::validation(format!(
                "state document must be a mapping of namespaces, found {}",
                document.shape()
            )));
        };
        let mut state = Self::new();
        for (key, value) in fields {
            let namespace = Namespace::parse(&key)
                .ok_or_else(|| PlaybookError::validation(format!("unknown state namespace `{key}`")))?;
            if !value.is_object() {
                return Err(PlaybookError::validation(format!(
                    "state namespace `{key}` must be a mapping, found {}",
                    value.shape()
                )));
            }
            state.namespace_mut(namespace).merge(value);
        }
        Ok(state)
    }

    pub fn namespace(&self, namespace: Namespace) -> Option<&Value> {
        self.namespaces.get(&namespace)
    }

    /// The namespace root, created empty on first access.
    pub fn namespace_mut(&mut self, namespace: Namespace) -> &mut Value {
        self.namespaces
            .entry(namespace)
            .or_insert_with(|| Value::Object(Map::new()))
    }

    /// Value at `path` inside `namespace`. An empty path yields the namespace itself.
    pub fn get(&self, namespace: Namespace, path: &str) -> Option<&Value> {
        lookup(self.namespace(namespace)?, &parse_path(path))
    }

    /// Writes `value` at `path` inside `namespace`.
    ///
    /// # Arguments
    /// - `namespace`: The namespace to write into.
    /// - `path`: Dot and index path; empty addresses the namespace root.
    /// - `value`: The value to store.
    ///
    /// # Returns
    /// `Ok(())` once written. Missing intermediates are created, and an object
    /// merges into an existing object (or handle) at the target.
    ///
    /// # Errors
    /// A resolution error when the root would be replaced by a non-object or
    /// when the path cannot be written (see [`slot_mut`]).
    pub fn set(&mut self, namespace: Namespace, path: &str, value: Value) -> Result<(), PlaybookError> {
        let segments = parse_path(path);
        if segments.is_empty() && !value.is_object() {
            return Err(PlaybookError::resolution(format!(
                "cannot replace namespace {namespace} with a {}",
                value.shape()
            )));
        }
        trace!(namespace = %namespace, path, shape = %value.shape(), "writing state");
        let root = self.namespace_mut(namespace);
        slot_mut(root, &segments, path)?.merge(value);
        Ok(())
    }

    /// Exports all namespaces as one object keyed by bare namespace keywords.
    pub fn to_value(&self) -> Value {
        let mut document = Map::new();
        for namespace in Namespace::ALL {
            if let Some(value) = self.namespaces.get(&namespace) {
                document.insert(namespace.as_str().to_string(), value.clone());
            }
        }
        Value::Object(document)
    }

    /// Exports the subset of state addressed by `references`, such as
    /// `$deployed` or `$outputs.token`. Paths that hold nothing are left out.
    pub fn select(&self, references: &[String]) -> Result<Value, PlaybookError> {
        let mut selected = StateStore::new();
        for reference in references {
            let trimmed = reference.trim();
            let (keyword, path) = trimmed.split_once('.').unwrap_or((trimmed, ""));
            let namespace = Namespace::parse(keyword)
                .ok_or_else(|| PlaybookError::validation(format!("unknown state namespace in `{reference}`")))?;
            match self.get(namespace, path) {
                Some(value) if path.is_empty() => selected.namespace_mut(namespace).merge(value.clone()),
                Some(value) => selected.set(namespace, path, value.clone())?,
                None => {}
            }
        }
        Ok(selected.to_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_namespaces_are_lazy() {
        let mut state = StateStore::new();
        assert!(state.namespace(Namespace::Deployed).is_none());
        assert!(state.get(Namespace::Deployed, "token").is_none());

        state.namespace_mut(Namespace::Deployed);
        assert_eq!(state.get(Namespace::Deployed, ""), Some(&Value::Object(Map::new())));
    }

    #[test]
    fn test_set_merges_existing_objects() {
        let mut state = StateStore::new();
        state
            .set(Namespace::Deployed, "token", Value::from(json!({"address": "0x1", "owner": "alice"})))
            .expect("first write");
        state
            .set(Namespace::Deployed, "token", Value::from(json!({"address": "0x2"})))
            .expect("second write");

        assert_eq!(
            state.get(Namespace::Deployed, "token").map(Value::to_json),
            Some(json!({"address": "0x2", "owner": "alice"}))
        );
    }

    #[test]
    fn test_set_replaces_scalars() {
        let mut state = StateStore::new();
        state.set(Namespace::Outputs, "count", Value::from(1_i64)).expect("write");
        state.set(Namespace::Outputs, "count", Value::from(2_i64)).expect("overwrite");
        assert_eq!(state.get(Namespace::Outputs, "count"), Some(&Value::from(2_i64)));
    }

    #[test]
    fn test_set_root_requires_object() {
        let mut state = StateStore::new();
        let err = state.set(Namespace::Inputs, "", Value::from("nope")).expect_err("scalar root");
        assert!(err.to_string().contains("cannot replace namespace $inputs"), "{err}");

        state
            .set(Namespace::Inputs, "", Value::from(json!({"owner": "alice"})))
            .expect("object merge");
        assert_eq!(state.get(Namespace::Inputs, "owner"), Some(&Value::from("alice")));
    }

    #[test]
    fn test_from_value_accepts_prefixed_keys() {
        let state = StateStore::from_value(Value::from(json!({
            "$inputs": {"owner": "alice"},
            "deployed": {"token": {"address": "0x1"}}
        })))
        .expect("state");

        assert_eq!(state.get(Namespace::Inputs, "owner"), Some(&Value::from("alice")));
        assert_eq!(state.get(Namespace::Deployed, "token.address"), Some(&Value::from("0x1")));
    }

    #[test]
    fn test_from_value_rejects_unknown_namespace() {
        let err = StateStore::from_value(Value::from(json!({"$secrets": {}}))).expect_err("unknown namespace");
        assert!(err.to_string().contains("$secrets"), "{err}");

        let err = StateStore::from_value(Value::from(json!({"inputs": [1]}))).expect_err("non-object namespace");
        assert!(err.to_string().contains("must be a mapping"), "{err}");
    }

    #[test]
    fn test_select_subset_for_dump() {
        let state = StateStore::from_value(Value::from(json!({
            "inputs": {"owner": "alice"},
            "outputs": {"tx": "0xabc", "other": 1},
            "deployed": {"token": {"address": "0x1"}}
        })))
        .expect("state");

        let dump = state
            .select(&["$deployed".to_string(), "$outputs.tx".to_string(), "$outputs.missing".to_string()])
            .expect("select");
        assert_eq!(
            dump.to_json(),
            json!({"outputs": {"tx": "0xabc"}, "deployed": {"token": {"address": "0x1"}}})
        );
    }
}
