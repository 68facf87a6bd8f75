//! Playbook entries: instructions, loops and nested lists of either.

use deckhand_types::Value;

use crate::error::PlaybookError;
use crate::expand::LoopDefinition;
use crate::instruction::Instruction;
use crate::state::StateStore;

#[derive(Debug, Clone, PartialEq)]
pub enum PlaybookEntry {
    Instruction(Instruction),
    Loop(LoopDefinition),
    Nested(Vec<PlaybookEntry>),
}

impl PlaybookEntry {
    /// Classifies and validates one authored entry. Mappings with a `for`
    /// key are loops, other mappings are instructions and lists nest.
    pub fn build(definition: &Value) -> Result<Self, PlaybookError> {
        Self::build_at(definition, "playbook")
    }

    fn build_at(definition: &Value, location: &str) -> Result<Self, PlaybookError> {
        let entry = match definition {
            Value::Array(entries) => {
                let mut built = Vec::with_capacity(entries.len());
                for (index, entry) in entries.iter().enumerate() {
                    built.push(Self::build_at(entry, &format!("{location}[{index}]"))?);
                }
                return Ok(PlaybookEntry::Nested(built));
            }
            Value::Object(fields) if fields.contains_key("for") => LoopDefinition::build(definition).map(PlaybookEntry::Loop),
            _ => Instruction::build(definition).map(PlaybookEntry::Instruction),
        };
        entry.map_err(|error| match error {
            PlaybookError::Validation { message } => PlaybookError::validation(format!("{location}: {message}")),
            other => other,
        })
    }

    /// Number of concrete instructions this entry runs, expanding loops
    /// against `state` as it stands now.
    pub fn instruction_count(&self, state: &StateStore) -> Result<usize, PlaybookError> {
        match self {
            PlaybookEntry::Instruction(_) => Ok(1),
            PlaybookEntry::Loop(definition) => definition.instruction_count(state),
            PlaybookEntry::Nested(entries) => count_instructions(entries, state),
        }
    }
}

/// Builds the entries of a whole playbook document. A document is either a
/// list of entries or a single entry.
pub fn build_playbook(document: &Value) -> Result<Vec<PlaybookEntry>, PlaybookError> {
    match PlaybookEntry::build(document)? {
        PlaybookEntry::Nested(entries) => Ok(entries),
        single => Ok(vec![single]),
    }
}

/// Total instruction count for `entries`, recursing into nested lists and
/// expanding loops.
pub fn count_instructions(entries: &[PlaybookEntry], state: &StateStore) -> Result<usize, PlaybookError> {
    entries
        .iter()
        .try_fold(0, |total, entry| -> Result<usize, PlaybookError> { Ok(total + entry.instruction_count(state)?) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    #[test]
    fn test_build_classifies_entries() {
        let entries = build_playbook(&Value::from(json!([
            {"contract": "Token", "run": "new"},
            {"for": [1, 2, 3], "each": {"contract": "Token", "run": "new", "inputs": ["$item"]}},
            [
                {"contract": "Sale", "run": "new"},
                [{"contract": "Vault", "run": "new"}]
            ]
        ])))
        .expect("playbook");

        assert!(matches!(entries[0], PlaybookEntry::Instruction(_)));
        assert!(matches!(entries[1], PlaybookEntry::Loop(_)));
        assert!(matches!(entries[2], PlaybookEntry::Nested(_)));
        assert_eq!(count_instructions(&entries, &StateStore::new()).expect("count"), 6);
    }

    #[test]
    fn test_single_entry_document() {
        let entries = build_playbook(&Value::from(json!({"contract": "Token", "run": "new"}))).expect("single");
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_errors_carry_location() {
        let err = build_playbook(&Value::from(json!([
            {"contract": "Token", "run": "new"},
            [{"contract": "Token", "run": "transfer"}]
        ])))
        .expect_err("missing at");
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("playbook[1][0]"), "{err}");
    }

    #[test]
    fn test_scalar_entries_are_rejected() {
        let err = build_playbook(&Value::from(json!(["Token.new"]))).expect_err("scalar");
        assert!(err.to_string().contains("found string"), "{err}");
    }
}
