//! Validated contract instructions.
//!
//! An instruction names a contract, a method to `run` on it, the positional
//! or keyed `inputs` for that method and where the result goes (`outputs`).
//! The three static methods `new`, `link` and `at` operate on the contract
//! abstraction; every other method is an instance call and needs an `at`
//! locator naming the deployed address.
//!
//! ```yaml
//! - description: Deploy the token
//!   contract: Token
//!   run: new
//!   inputs: [1000000, { from: $inputs.owner }]
//!   outputs: { address: $deployed.token }
//! - contract: Token
//!   at: $deployed.token
//!   run: transfer
//!   inputs: [{ to: $inputs.investor, amount: 100 }]
//! ```

use deckhand_types::{Map, OutputSpec, Value};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::PlaybookError;
use crate::outputs::{destination_of, write_outputs};
use crate::resolve::{Reference, is_item_reference, resolve};
use crate::state::StateStore;

/// Methods that operate on the contract abstraction instead of a deployed instance.
pub const STATIC_METHODS: [&str; 3] = ["at", "link", "new"];

const INSTRUCTION_FIELDS: [&str; 6] = ["description", "contract", "at", "run", "inputs", "outputs"];

static ADDRESS_LITERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^0x[a-fA-F0-9]{40}$").expect("address literal regex should compile"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Static,
    Instance,
}

impl CallKind {
    pub fn of(run: &str) -> Self {
        if STATIC_METHODS.contains(&run) {
            CallKind::Static
        } else {
            CallKind::Instance
        }
    }
}

pub fn is_address_literal(text: &str) -> bool {
    ADDRESS_LITERAL.is_match(text)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BuildMode {
    Concrete,
    /// Loop templates: any field may still be an `$item` reference.
    Template,
}

impl BuildMode {
    fn defers(&self, value: &Value) -> bool {
        *self == BuildMode::Template && is_item_reference(value)
    }
}

/// A single validated contract call. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    description: Option<String>,
    contract: String,
    at: Option<String>,
    run: String,
    inputs: Vec<Value>,
    outputs: OutputSpec,
    kind: CallKind,
}

impl Instruction {
    /// Validates an authored instruction.
    ///
    /// Fails with a validation error when a required field is missing, a
    /// field has the wrong shape, an unknown field is present, an instance
    /// call has no locator, or a locator or output destination is malformed.
    pub fn build(definition: &Value) -> Result<Self, PlaybookError> {
        Self::build_with(definition, BuildMode::Concrete)
    }

    /// Shape check for loop templates, where `$item` references stand in for
    /// values that are only known at expansion time.
    pub fn check_template(definition: &Value) -> Result<(), PlaybookError> {
        Self::build_with(definition, BuildMode::Template).map(|_| ())
    }

    fn build_with(definition: &Value, mode: BuildMode) -> Result<Self, PlaybookError> {
        let Value::Object(fields) = definition else {
            return Err(PlaybookError::validation(format!(
                "instruction must be a mapping, found {}",
                definition.shape()
            )));
        };
        if fields.contains_key("playbook") {
            return Err(PlaybookError::validation(
                "playbook includes are only supported when loading playbooks from files",
            ));
        }
        if let Some(unknown) = fields.keys().find(|key| !INSTRUCTION_FIELDS.contains(&key.as_str())) {
            return Err(PlaybookError::validation(format!("unknown instruction field `{unknown}`")));
        }

        let description = optional_string(fields, "description")?;
        let contract = required_string(fields, "contract")?;
        let run = required_string(fields, "run")?;
        let at = optional_string(fields, "at")?;

        if let Some(locator) = &at
            && !is_address_literal(locator)
            && Reference::parse(locator).is_none()
            && !mode.defers(&Value::String(locator.clone()))
        {
            return Err(PlaybookError::validation(format!(
                "`at` for {contract}.{run} must be a 0x-prefixed 40 digit hex address or a state reference, found `{locator}`"
            )));
        }

        let inputs = match fields.get("inputs") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.clone(),
            Some(deferred) if mode.defers(deferred) => Vec::new(),
            Some(other) => {
                return Err(PlaybookError::validation(format!(
                    "`inputs` for {contract}.{run} must be a list, found {}",
                    other.shape()
                )));
            }
        };

        let outputs = match fields.get("outputs") {
            None | Some(Value::Null) => OutputSpec::default(),
            Some(deferred) if mode.defers(deferred) => OutputSpec::default(),
            Some(value) => {
                let spec = OutputSpec::from_value(value)
                    .map_err(|message| PlaybookError::validation(format!("{contract}.{run}: {message}")))?;
                for destination in spec.destinations() {
                    if !mode.defers(&Value::from(destination)) {
                        destination_of(destination)?;
                    }
                }
                spec
            }
        };

        let kind = CallKind::of(&run);
        if kind == CallKind::Instance && at.is_none() && !mode.defers(&Value::String(run.clone())) {
            return Err(PlaybookError::validation(format!(
                "instance method {contract}.{run} needs an `at` locator"
            )));
        }

        Ok(Self {
            description,
            contract,
            at,
            run,
            inputs,
            outputs,
            kind,
        })
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn contract(&self) -> &str {
        &self.contract
    }

    pub fn at(&self) -> Option<&str> {
        self.at.as_deref()
    }

    pub fn run(&self) -> &str {
        &self.run
    }

    pub fn inputs(&self) -> &[Value] {
        &self.inputs
    }

    pub fn outputs(&self) -> &OutputSpec {
        &self.outputs
    }

    pub fn kind(&self) -> CallKind {
        self.kind
    }

    /// The description when present, otherwise `Contract.method`.
    pub fn summary(&self) -> String {
        match &self.description {
            Some(description) => description.clone(),
            None => format!("{}.{}", self.contract, self.run),
        }
    }

    /// Resolves every input one hop against `state`.
    ///
    /// Keyed objects are resolved field by field and fields whose reference
    /// points at nothing are dropped, so the argument binder reports them as
    /// missing. A positional reference to nothing becomes null.
    pub fn get_inputs(&self, state: &StateStore) -> Vec<Value> {
        self.inputs
            .iter()
            .map(|input| match input {
                Value::Object(fields) => {
                    let mut resolved = Map::new();
                    for (key, value) in fields {
                        if let Some(value) = resolve(value, state) {
                            resolved.insert(key.clone(), value);
                        }
                    }
                    Value::Object(resolved)
                }
                other => resolve(other, state).unwrap_or(Value::Null),
            })
            .collect()
    }

    /// Resolves the `at` locator to a concrete address.
    ///
    /// A reference may land on an address string, on a record with an
    /// `address` field, or on a bound contract handle.
    pub fn resolve_address(&self, state: &StateStore) -> Result<Option<String>, PlaybookError> {
        let Some(locator) = &self.at else {
            return Ok(None);
        };
        if is_address_literal(locator) {
            return Ok(Some(locator.clone()));
        }
        let address = match resolve(&Value::String(locator.clone()), state) {
            Some(Value::String(address)) => Some(address),
            Some(Value::Object(record)) => record.get("address").and_then(Value::as_str).map(str::to_string),
            Some(Value::Handle(handle)) => handle.address,
            _ => None,
        };
        address.map(Some).ok_or_else(|| {
            PlaybookError::resolution(format!("locator `{locator}` for {} did not resolve to an address", self.summary()))
        })
    }

    /// Writes `result` into `state` using `destination`, or the instruction's
    /// own `outputs` when no override is given.
    pub fn write_outputs(
        &self,
        result: &Value,
        state: &mut StateStore,
        destination: Option<&OutputSpec>,
    ) -> Result<(), PlaybookError> {
        write_outputs(result, state, destination.unwrap_or(&self.outputs))
    }
}

fn required_string(fields: &Map, key: &str) -> Result<String, PlaybookError> {
    match fields.get(key) {
        Some(Value::String(text)) if !text.trim().is_empty() => Ok(text.clone()),
        Some(Value::String(_)) => Err(PlaybookError::validation(format!("instruction field `{key}` must not be empty"))),
        Some(other) => Err(PlaybookError::validation(format!(
            "instruction field `{key}` must be a string, found {}",
            other.shape()
        ))),
        None => Err(PlaybookError::validation(format!("instruction is missing required field `{key}`"))),
    }
}

fn optional_string(fields: &Map, key: &str) -> Result<Option<String>, PlaybookError> {
    match fields.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(_) => required_string(fields, key).map(Some),
    }
}
