//! Loading playbooks and state documents from YAML or JSON.
//!
//! A playbook file may pull in other playbook files with an include entry,
//! resolved relative to the including file:
//!
//! ```yaml
//! - playbook: ./token.yml
//! - contract: Crowdsale
//!   run: new
//! ```

use std::fs;
use std::path::Path;

use deckhand_types::{Map, Value};
use tracing::debug;

use crate::error::PlaybookError;
use crate::playbook::{PlaybookEntry, build_playbook};
use crate::state::StateStore;

/// Maximum include nesting before a playbook is considered cyclic.
pub const MAX_INCLUDE_DEPTH: usize = 16;

const INCLUDE_KEY: &str = "playbook";

/// Parses YAML or JSON text into a document value.
///
/// Integer literals up to 128 bits load exactly; those wider than 64 bits
/// become [`Value::BigInt`]. Wider amounts must be quoted.
pub fn parse_document(content: &str, origin: &str) -> Result<Value, PlaybookError> {
    serde_yaml::from_str::<Value>(content)
        .map_err(|error| PlaybookError::document(origin, error.to_string()))
}

/// Parses and validates playbook text. Include entries are not supported here.
pub fn parse_playbook_str(content: &str) -> Result<Vec<PlaybookEntry>, PlaybookError> {
    build_playbook(&parse_document(content, "<inline playbook>")?)
}

/// Loads, expands includes in, and validates a playbook file.
pub fn parse_playbook_file(path: &Path) -> Result<Vec<PlaybookEntry>, PlaybookError> {
    let document = load_with_includes(path, 0)?;
    build_playbook(&document)
}

/// Reads any YAML or JSON file into a value.
pub fn load_value_file(path: &Path) -> Result<Value, PlaybookError> {
    let content = fs::read_to_string(path).map_err(|error| PlaybookError::document(path.display().to_string(), error.to_string()))?;
    parse_document(&content, &path.display().to_string())
}

/// Loads a state document previously produced by a state dump.
pub fn parse_state_file(path: &Path) -> Result<StateStore, PlaybookError> {
    StateStore::from_value(load_value_file(path)?)
}

/// Loads an inputs document: a mapping that becomes the `inputs` namespace.
pub fn parse_inputs_file(path: &Path) -> Result<Map, PlaybookError> {
    match load_value_file(path)? {
        Value::Object(inputs) => Ok(inputs),
        Value::Null => Ok(Map::new()),
        other => Err(PlaybookError::document(
            path.display().to_string(),
            format!("inputs must be a mapping, found {}", other.shape()),
        )),
    }
}

fn load_with_includes(path: &Path, depth: usize) -> Result<Value, PlaybookError> {
    if depth > MAX_INCLUDE_DEPTH {
        return Err(PlaybookError::document(
            path.display().to_string(),
            format!("playbook includes nest deeper than {MAX_INCLUDE_DEPTH} levels"),
        ));
    }
    debug!(path = %path.display(), depth, "loading playbook document");
    let document = load_value_file(path)?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    expand_includes(document, base, depth)
}

fn expand_includes(document: Value, base: &Path, depth: usize) -> Result<Value, PlaybookError> {
    match document {
        Value::Array(entries) => entries
            .into_iter()
            .map(|entry| expand_includes(entry, base, depth))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(fields) if fields.len() == 1 && fields.contains_key(INCLUDE_KEY) => match fields.get(INCLUDE_KEY) {
            Some(Value::String(relative)) => load_with_includes(&base.join(relative), depth + 1),
            _ => Err(PlaybookError::validation("`playbook` include must name a file path")),
        },
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::sort_inputs;
    use crate::coerce::Coercer;
    use crate::error::ErrorKind;
    use crate::state::Namespace;
    use deckhand_types::{AbiParam, MethodSignature};
    use num_bigint::BigInt;

    #[test]
    fn test_parse_playbook_str_yaml() {
        let entries = parse_playbook_str(
            r#"
- description: Deploy
  contract: Token
  run: new
  inputs: [1000]
- for: $inputs.holders
  each:
    contract: Token
    at: $deployed.token
    run: transfer
    inputs: [$item, 1]
"#,
        )
        .expect("playbook");
        assert_eq!(entries.len(), 2);
        assert!(matches!(entries[1], PlaybookEntry::Loop(_)));
    }

    #[test]
    fn test_wide_integer_literal_reaches_uint256_intact() {
        let entries = parse_playbook_str(
            r#"
- contract: Token
  at: $deployed.token
  run: mint
  inputs: [{ amount: 1000000000000000000001 }]
"#,
        )
        .expect("playbook");
        let PlaybookEntry::Instruction(instruction) = &entries[0] else {
            panic!("expected an instruction, got {:?}", entries[0]);
        };
        let amount = BigInt::parse_bytes(b"1000000000000000000001", 10).expect("bigint");
        let inputs = instruction.get_inputs(&StateStore::new());
        assert_eq!(inputs[0].get("amount"), Some(&Value::BigInt(amount)));

        let signature = MethodSignature::function("mint", vec![AbiParam::new("amount", "uint256")]);
        let bound = sort_inputs(inputs, Some(&signature), &Coercer::new()).expect("bind");
        assert_eq!(bound, vec![Value::from("1000000000000000000001")]);
    }

    #[test]
    fn test_parse_errors_are_document_errors() {
        let err = parse_playbook_str("- contract: [unclosed").expect_err("bad yaml");
        assert_eq!(err.kind(), ErrorKind::Document);
    }

    #[test]
    fn test_includes_resolve_relative_to_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir(dir.path().join("parts")).expect("mkdir");
        fs::write(
            dir.path().join("parts/token.yml"),
            "- contract: Token\n  run: new\n- contract: Library\n  run: new\n",
        )
        .expect("write part");
        fs::write(
            dir.path().join("main.yml"),
            "- playbook: parts/token.yml\n- contract: Sale\n  run: new\n",
        )
        .expect("write main");

        let entries = parse_playbook_file(&dir.path().join("main.yml")).expect("load");
        assert_eq!(entries.len(), 2);
        match &entries[0] {
            PlaybookEntry::Nested(included) => assert_eq!(included.len(), 2),
            other => panic!("expected nested include, got {other:?}"),
        }
    }

    #[test]
    fn test_cyclic_includes_stop() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("loop.yml"), "- playbook: loop.yml\n").expect("write");
        let err = parse_playbook_file(&dir.path().join("loop.yml")).expect_err("cycle");
        assert!(err.to_string().contains("nest deeper"), "{err}");
    }

    #[test]
    fn test_include_in_inline_playbook_is_rejected() {
        let err = parse_playbook_str("- playbook: other.yml").expect_err("inline include");
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_state_and_inputs_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state_path = dir.path().join("state.json");
        fs::write(&state_path, r#"{"$deployed": {"token": {"address": "0x1"}}}"#).expect("write state");
        let state = parse_state_file(&state_path).expect("state");
        assert_eq!(state.get(Namespace::Deployed, "token.address"), Some(&Value::from("0x1")));

        let inputs_path = dir.path().join("inputs.yml");
        fs::write(&inputs_path, "owner: '0xabc'\nholders: []\n").expect("write inputs");
        let inputs = parse_inputs_file(&inputs_path).expect("inputs");
        assert_eq!(inputs.get("owner"), Some(&Value::from("0xabc")));

        fs::write(&inputs_path, "- 1\n").expect("write list");
        assert!(parse_inputs_file(&inputs_path).is_err());
    }
}
