//! Writes call results into playbook state according to an [`OutputSpec`].

use deckhand_types::{OutputSpec, Value};
use tracing::debug;

use crate::error::PlaybookError;
use crate::path::select;
use crate::resolve::{REFERENCE_SIGIL, Reference};
use crate::state::{Namespace, StateStore};

/// Splits a destination into its namespace and path.
///
/// `$<namespace>.<path>` targets that namespace; a bare path targets
/// `outputs`. A `$` prefix naming anything else is rejected.
pub fn destination_of(target: &str) -> Result<(Namespace, &str), PlaybookError> {
    if let Some(reference) = Reference::parse(target) {
        return Ok((reference.namespace, reference.path));
    }
    if target.starts_with(REFERENCE_SIGIL) {
        return Err(PlaybookError::validation(format!(
            "output destination `{target}` does not name a state namespace"
        )));
    }
    Ok((Namespace::Outputs, target))
}

/// Applies `destination` to `result`.
///
/// # Arguments
/// - `result`: The value a call returned.
/// - `state`: State receiving the writes.
/// - `destination`: Where the result goes:
///   - a path stores the whole result there
///   - a mapping copies each named result field to its targets, skipping
///     fields the result does not have
///   - a list applies each entry in order
///
/// # Returns
/// `Ok(())` once every write landed. Writes merge into existing objects at
/// the target.
///
/// # Errors
/// Destination and path errors from [`StateStore::set`]; earlier writes of the
/// same destination stay applied.
pub fn write_outputs(result: &Value, state: &mut StateStore, destination: &OutputSpec) -> Result<(), PlaybookError> {
    match destination {
        OutputSpec::Path(target) => write_destination(state, target, result.clone()),
        OutputSpec::Mapping(mapping) => {
            for (source, targets) in mapping {
                let Some(value) = select(result, source) else {
                    debug!(source = %source, "result has no such field, skipping output");
                    continue;
                };
                for target in targets.paths() {
                    write_destination(state, target, value.clone())?;
                }
            }
            Ok(())
        }
        OutputSpec::List(destinations) => {
            for nested in destinations {
                write_outputs(result, state, nested)?;
            }
            Ok(())
        }
    }
}

fn write_destination(state: &mut StateStore, target: &str, value: Value) -> Result<(), PlaybookError> {
    let (namespace, path) = destination_of(target)?;
    state.set(namespace, path, value)
}
