//! Compiled contract artifacts and the ABI entries the argument binder reads.
//!
//! Only the fields the playbook runner needs are modelled; everything else a
//! compiler emits into an artifact (bytecode, source maps, networks) is
//! ignored during deserialization.

use serde::{Deserialize, Serialize};

/// One declared input or output of an ABI entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiParam {
    /// Declared parameter name; may be empty for unnamed parameters.
    #[serde(default)]
    pub name: String,
    /// Declared Solidity type, e.g. `uint256` or `bytes32`.
    #[serde(rename = "type")]
    pub kind: String,
}

impl AbiParam {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AbiEntryKind {
    #[default]
    Function,
    Constructor,
    Event,
    Fallback,
    Receive,
    Error,
}

/// A single ABI entry: a function, constructor, event and so on.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MethodSignature {
    #[serde(rename = "type", default)]
    pub kind: AbiEntryKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub inputs: Vec<AbiParam>,
    #[serde(default)]
    pub outputs: Vec<AbiParam>,
}

impl MethodSignature {
    pub fn function(name: impl Into<String>, inputs: Vec<AbiParam>) -> Self {
        Self {
            kind: AbiEntryKind::Function,
            name: Some(name.into()),
            inputs,
            outputs: Vec::new(),
        }
    }

    pub fn constructor(inputs: Vec<AbiParam>) -> Self {
        Self {
            kind: AbiEntryKind::Constructor,
            name: None,
            inputs,
            outputs: Vec::new(),
        }
    }

    /// Name used in diagnostics; constructors report as `constructor`.
    pub fn display_name(&self) -> &str {
        match (&self.kind, &self.name) {
            (AbiEntryKind::Constructor, _) => "constructor",
            (_, Some(name)) => name,
            (_, None) => "<anonymous>",
        }
    }
}

/// Compiled contract artifact keyed by its `contractName`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractArtifact {
    #[serde(rename = "contractName")]
    pub contract_name: String,
    #[serde(default)]
    pub abi: Vec<MethodSignature>,
}

impl ContractArtifact {
    pub fn new(contract_name: impl Into<String>, abi: Vec<MethodSignature>) -> Self {
        Self {
            contract_name: contract_name.into(),
            abi,
        }
    }

    /// First function entry named `name`. Overloads beyond the first are not
    /// distinguished.
    pub fn method(&self, name: &str) -> Option<&MethodSignature> {
        self.abi
            .iter()
            .find(|entry| entry.kind == AbiEntryKind::Function && entry.name.as_deref() == Some(name))
    }

    pub fn constructor(&self) -> Option<&MethodSignature> {
        self.abi.iter().find(|entry| entry.kind == AbiEntryKind::Constructor)
    }

    /// Signature the arguments of a `run` method are bound against.
    ///
    /// `new` binds against the constructor, or an empty constructor when the
    /// artifact declares none. `link` and `at` take no ABI-described
    /// arguments and return `None`, as does an unknown method.
    pub fn signature_for(&self, run: &str) -> Option<MethodSignature> {
        match run {
            "new" => Some(self.constructor().cloned().unwrap_or_else(|| MethodSignature::constructor(Vec::new()))),
            "link" | "at" => None,
            method => self.method(method).cloned(),
        }
    }
}
