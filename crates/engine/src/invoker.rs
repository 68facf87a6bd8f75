//! The seam between the playbook runner and the contract layer.
//!
//! Engines can provide concrete invokers that talk to a node. The default
//! [`DryRunInvoker`] fabricates deterministic results so playbooks can be
//! exercised without a chain.

use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use deckhand_types::{ContractHandle, Map, Value};
use tracing::debug;

use crate::instruction::CallKind;

/// A fully bound contract call.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractCall {
    pub contract: String,
    /// Deployed address for instance calls.
    pub address: Option<String>,
    pub method: String,
    /// Positional arguments, already sorted and coerced.
    pub arguments: Vec<Value>,
    pub kind: CallKind,
}

impl ContractCall {
    pub fn target(&self) -> String {
        match &self.address {
            Some(address) => format!("{}@{}.{}", self.contract, address, self.method),
            None => format!("{}.{}", self.contract, self.method),
        }
    }
}

/// Executes contract calls.
///
/// Implementations return the raw call result. Errors are surfaced to the
/// playbook author unchanged, wrapped only with the contract and method.
#[async_trait]
pub trait ContractInvoker: Send + Sync {
    async fn invoke(&self, call: &ContractCall) -> Result<Value>;
}

/// Invoker that performs no external calls.
///
/// - `new` returns `{address, tx}` with a fresh address
/// - `at` returns a handle bound to the first argument
/// - `link` returns null
/// - instance calls echo `{contract, address, method, arguments, tx}`
#[derive(Debug, Default)]
pub struct DryRunInvoker {
    sequence: AtomicU64,
}

impl DryRunInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls_made(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ContractInvoker for DryRunInvoker {
    async fn invoke(&self, call: &ContractCall) -> Result<Value> {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let tx = Value::String(format!("0x{sequence:064x}"));
        debug!(target_call = %call.target(), sequence, "dry-run invocation");

        let result = match call.method.as_str() {
            "new" => {
                let mut record = Map::new();
                record.insert("address".into(), Value::String(format!("0x{sequence:040x}")));
                record.insert("tx".into(), tx);
                Value::Object(record)
            }
            "at" => {
                let address = call.arguments.first().and_then(Value::as_str).or(call.address.as_deref());
                Value::Handle(ContractHandle {
                    contract: call.contract.clone(),
                    address: address.map(str::to_string),
                })
            }
            "link" => Value::Null,
            method => {
                let mut record = Map::new();
                record.insert("contract".into(), Value::String(call.contract.clone()));
                if let Some(address) = &call.address {
                    record.insert("address".into(), Value::String(address.clone()));
                }
                record.insert("method".into(), Value::String(method.to_string()));
                record.insert("arguments".into(), Value::Array(call.arguments.clone()));
                record.insert("tx".into(), tx);
                Value::Object(record)
            }
        };
        Ok(result)
    }
}

/// Normalised view of a call result for logging and reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct CallRecord {
    pub address: Option<String>,
    /// Transaction identifier, from a `tx` or `transactionHash` field.
    pub transaction: Option<String>,
    pub value: Value,
}

impl CallRecord {
    pub fn from_result(result: &Value) -> Self {
        let (address, transaction) = match result {
            Value::Object(fields) => {
                let text = |key: &str| fields.get(key).and_then(Value::as_str).map(str::to_string);
                (text("address"), text("tx").or_else(|| text("transactionHash")))
            }
            Value::Handle(handle) => (handle.address.clone(), None),
            _ => (None, None),
        };
        Self {
            address,
            transaction,
            value: result.clone(),
        }
    }
}
