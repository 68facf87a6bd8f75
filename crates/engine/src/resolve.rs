//! # Reference Resolution
//!
//! Instruction fields may refer to playbook state instead of carrying literal
//! values. A reference is a string of the form `$<namespace>.<path>`:
//!
//! - `$inputs.owner` - caller supplied parameter
//! - `$outputs.sale.tx` - value written by an earlier instruction
//! - `$deployed.token` - deployed contract record
//! - `$contracts.Token` - contract handle, created on first use
//!
//! Inside loop templates, `$item` and `$item.<path>` refer to the current
//! loop element instead.
//!
//! Resolution is a single hop: a reference that resolves to another
//! reference-looking string is returned as that string.
//!
//! ## Usage
//!
//! ```rust
//! use deckhand_engine::resolve::resolve;
//! use deckhand_engine::state::{Namespace, StateStore};
//! use deckhand_types::Value;
//!
//! let mut state = StateStore::new();
//! state.set(Namespace::Inputs, "owner", Value::from("0xabc")).unwrap();
//!
//! assert_eq!(resolve(&Value::from("$inputs.owner"), &state), Some(Value::from("0xabc")));
//! assert_eq!(resolve(&Value::from("plain"), &state), Some(Value::from("plain")));
//! assert_eq!(resolve(&Value::from("$inputs.missing"), &state), None);
//! ```

use deckhand_types::Value;

use crate::path::select;
use crate::state::{Namespace, StateStore};

pub const REFERENCE_SIGIL: char = '$';
pub const ITEM_KEYWORD: &str = "item";

/// A parsed `$<namespace>.<path>` state reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reference<'a> {
    pub namespace: Namespace,
    pub path: &'a str,
}

impl<'a> Reference<'a> {
    /// Parses a state reference. Anything else, including `$item` forms and
    /// bare namespace keywords without a path, returns `None`.
    pub fn parse(text: &'a str) -> Option<Self> {
        let rest = text.strip_prefix(REFERENCE_SIGIL)?;
        let (keyword, path) = rest.split_once('.')?;
        let namespace = Namespace::parse(keyword)?;
        Some(Self { namespace, path })
    }
}

pub fn is_reference(text: &str) -> bool {
    Reference::parse(text).is_some()
}

/// Path below the loop element for `$item` (empty) or `$item.<path>` /
/// `$item[<n>]...`; `None` when `text` is not an item reference.
pub fn item_path(text: &str) -> Option<&str> {
    let rest = text.strip_prefix(REFERENCE_SIGIL)?.strip_prefix(ITEM_KEYWORD)?;
    if rest.is_empty() {
        return Some("");
    }
    if let Some(path) = rest.strip_prefix('.') {
        return Some(path);
    }
    rest.starts_with('[').then_some(rest)
}

pub fn is_item_reference(value: &Value) -> bool {
    value.as_str().and_then(item_path).is_some()
}

/// Resolves one value against `state`.
///
/// Non-string values and strings that are not state references are returned
/// unchanged. A reference whose target is absent yields `None`.
pub fn resolve(value: &Value, state: &StateStore) -> Option<Value> {
    let Value::String(text) = value else {
        return Some(value.clone());
    };
    match Reference::parse(text) {
        Some(reference) => state.get(reference.namespace, reference.path).cloned(),
        None => Some(value.clone()),
    }
}

/// Resolves an item reference against the current loop element.
///
/// Returns `None` when `value` is not an item reference or its path does not
/// exist in `item`.
pub fn resolve_item(value: &Value, item: &Value) -> Option<Value> {
    let path = value.as_str().and_then(item_path)?;
    select(item, path).cloned()
}
