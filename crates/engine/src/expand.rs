//! Loop definitions and their expansion into concrete instructions.
//!
//! ```yaml
//! for: $inputs.investors
//! each:
//!   contract: Token
//!   at: $deployed.token
//!   run: transfer
//!   inputs: [{ to: $item.address, amount: $item.amount }]
//! ```
//!
//! Expansion happens when the loop is reached, so `for` may name state written
//! by earlier instructions. Item references are substituted one level deep:
//! a substituted value is not searched for further `$item` references.

use deckhand_types::Value;
use tracing::debug;

use crate::error::PlaybookError;
use crate::instruction::Instruction;
use crate::resolve::{Reference, resolve, resolve_item};
use crate::state::StateStore;

const LOOP_FIELDS: [&str; 3] = ["description", "for", "each"];

/// A validated `for`/`each` loop.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopDefinition {
    description: Option<String>,
    source: Value,
    templates: Vec<Value>,
}

impl LoopDefinition {
    /// Validates the loop structure and the shape of each template.
    pub fn build(definition: &Value) -> Result<Self, PlaybookError> {
        let Value::Object(fields) = definition else {
            return Err(PlaybookError::validation(format!(
                "loop must be a mapping, found {}",
                definition.shape()
            )));
        };
        if let Some(unknown) = fields.keys().find(|key| !LOOP_FIELDS.contains(&key.as_str())) {
            return Err(PlaybookError::validation(format!("unknown loop field `{unknown}`")));
        }

        let description = match fields.get("description") {
            None | Some(Value::Null) => None,
            Some(Value::String(text)) => Some(text.clone()),
            Some(other) => {
                return Err(PlaybookError::validation(format!(
                    "loop description must be a string, found {}",
                    other.shape()
                )));
            }
        };

        let source = match fields.get("for") {
            Some(Value::Array(items)) => Value::Array(items.clone()),
            Some(Value::String(reference)) if Reference::parse(reference).is_some() => Value::String(reference.clone()),
            Some(other) => {
                return Err(PlaybookError::validation(format!(
                    "loop `for` must be a list or a state reference, found {}",
                    describe(other)
                )));
            }
            None => return Err(PlaybookError::validation("loop is missing required field `for`")),
        };

        let templates = match fields.get("each") {
            Some(template @ Value::Object(_)) => vec![template.clone()],
            Some(Value::Array(templates)) => templates.clone(),
            Some(other) => {
                return Err(PlaybookError::validation(format!(
                    "loop `each` must be an instruction or a list of instructions, found {}",
                    other.shape()
                )));
            }
            None => return Err(PlaybookError::validation("loop is missing required field `each`")),
        };
        for (index, template) in templates.iter().enumerate() {
            Instruction::check_template(template).map_err(|error| match error {
                PlaybookError::Validation { message } => {
                    PlaybookError::validation(format!("loop template {index}: {message}"))
                }
                other => other,
            })?;
        }

        Ok(Self {
            description,
            source,
            templates,
        })
    }

    pub fn templates(&self) -> &[Value] {
        &self.templates
    }

    pub fn summary(&self) -> String {
        match (&self.description, &self.source) {
            (Some(description), _) => description.clone(),
            (None, Value::String(reference)) => format!("loop over {reference}"),
            (None, _) => "loop".to_string(),
        }
    }

    /// The elements the loop iterates over, read from `state` when `for` is a reference.
    pub fn items(&self, state: &StateStore) -> Result<Vec<Value>, PlaybookError> {
        match &self.source {
            Value::Array(items) => Ok(items.clone()),
            reference => match resolve(reference, state) {
                Some(Value::Array(items)) => Ok(items),
                Some(other) => Err(PlaybookError::resolution(format!(
                    "loop source {reference} is a {}, not a list",
                    other.shape()
                ))),
                None => Err(PlaybookError::resolution(format!("loop source {reference} is not set"))),
            },
        }
    }

    /// Number of instructions this loop expands to against `state`.
    pub fn instruction_count(&self, state: &StateStore) -> Result<usize, PlaybookError> {
        Ok(self.items(state)?.len() * self.templates.len())
    }

    /// Expands the loop into concrete instructions.
    ///
    /// # Arguments
    /// - `state`: Current state, read when `for` is a reference.
    ///
    /// # Returns
    /// `items × templates` instructions, item-major: every template for the
    /// first item, then every template for the second.
    ///
    /// # Errors
    /// A resolution error when the source is unset or not a list, and a
    /// validation error naming the item when a substituted template is invalid.
    pub fn expand(&self, state: &StateStore) -> Result<Vec<Instruction>, PlaybookError> {
        let items = self.items(state)?;
        debug!(loop_summary = %self.summary(), items = items.len(), templates = self.templates.len(), "expanding loop");
        let mut instructions = Vec::with_capacity(items.len() * self.templates.len());
        for (item_index, item) in items.iter().enumerate() {
            for template in &self.templates {
                let concrete = substitute_item(template, item);
                let instruction = Instruction::build(&concrete).map_err(|error| match error {
                    PlaybookError::Validation { message } => {
                        PlaybookError::validation(format!("loop item {item_index}: {message}"))
                    }
                    other => other,
                })?;
                instructions.push(instruction);
            }
        }
        Ok(instructions)
    }
}

/// Replaces `$item` references in the leaves of `template` with values from
/// `item`. References whose path is absent from the item are left as written.
pub fn substitute_item(template: &Value, item: &Value) -> Value {
    match template {
        Value::String(_) => resolve_item(template, item).unwrap_or_else(|| template.clone()),
        Value::Array(values) => Value::Array(values.iter().map(|value| substitute_item(value, item)).collect()),
        Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(key, value)| (key.clone(), substitute_item(value, item)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::String(text) => format!("`{text}`"),
        other => other.shape().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::state::Namespace;
    use serde_json::json;

    const TOKEN: &str = "0x00000000000000000000000000000000000000aa";

    fn transfer_loop(source: serde_json::Value) -> LoopDefinition {
        LoopDefinition::build(&Value::from(json!({
            "for": source,
            "each": {
                "contract": "Token",
                "at": TOKEN,
                "run": "transfer",
                "inputs": [{"to": "$item.address", "amount": "$item.amount"}]
            }
        })))
        .expect("loop")
    }

    #[test]
    fn test_expand_literal_list() {
        let definition = transfer_loop(json!([{"address": "0x1", "amount": 10}, {"address": "0x2", "amount": 20}]));
        let instructions = definition.expand(&StateStore::new()).expect("expand");

        assert_eq!(instructions.len(), 2);
        assert_eq!(instructions[1].inputs()[0].to_json(), json!({"to": "0x2", "amount": 20}));
    }

    #[test]
    fn test_expand_reads_source_at_expansion_time() {
        let definition = transfer_loop(json!("$outputs.holders"));
        let mut state = StateStore::new();
        let err = definition.expand(&state).expect_err("not yet written");
        assert_eq!(err.kind(), ErrorKind::Resolution);

        state
            .set(Namespace::Outputs, "holders", Value::from(json!([{"address": "0x9", "amount": 1}])))
            .expect("write");
        assert_eq!(definition.instruction_count(&state).expect("count"), 1);
    }

    #[test]
    fn test_expand_is_item_major() {
        let definition = LoopDefinition::build(&Value::from(json!({
            "for": ["a", "b"],
            "each": [
                {"contract": "Token", "run": "new", "inputs": ["$item"], "description": "first"},
                {"contract": "Token", "run": "new", "inputs": ["$item"], "description": "second"}
            ]
        })))
        .expect("loop");

        let order: Vec<(String, Value)> = definition
            .expand(&StateStore::new())
            .expect("expand")
            .into_iter()
            .map(|instruction| (instruction.summary(), instruction.inputs()[0].clone()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("first".to_string(), Value::from("a")),
                ("second".to_string(), Value::from("a")),
                ("first".to_string(), Value::from("b")),
                ("second".to_string(), Value::from("b")),
            ]
        );
    }

    #[test]
    fn test_substitution_is_one_level() {
        let item = Value::from(json!({"nested": "$item.other", "other": "x"}));
        let substituted = substitute_item(&Value::from(json!(["$item.nested", "$item.absent", 4])), &item);
        assert_eq!(substituted.to_json(), json!(["$item.other", "$item.absent", 4]));
    }

    #[test]
    fn test_non_list_source_fails() {
        let definition = transfer_loop(json!("$inputs.investors"));
        let mut state = StateStore::new();
        state.set(Namespace::Inputs, "investors", Value::from("0x1")).expect("write");
        let err = definition.expand(&state).expect_err("string source");
        assert!(err.to_string().contains("not a list"), "{err}");
    }

    #[test]
    fn test_build_rejects_bad_loops() {
        let err = LoopDefinition::build(&Value::from(json!({"for": "investors", "each": {}}))).expect_err("bad for");
        assert!(err.to_string().contains("`investors`"), "{err}");

        let err = LoopDefinition::build(&Value::from(json!({"for": [], "each": "Token"}))).expect_err("bad each");
        assert!(err.to_string().contains("`each`"), "{err}");

        let err = LoopDefinition::build(&Value::from(json!({"for": [], "each": {"run": "new"}}))).expect_err("template");
        assert!(err.to_string().contains("loop template 0"), "{err}");
    }

    #[test]
    fn test_concrete_validation_after_substitution() {
        let definition = LoopDefinition::build(&Value::from(json!({
            "for": [{"token": "not-an-address"}],
            "each": {"contract": "Token", "at": "$item.token", "run": "pause"}
        })))
        .expect("template is fine");
        let err = definition.expand(&StateStore::new()).expect_err("bad locator");
        assert!(err.to_string().contains("loop item 0"), "{err}");
    }
}
