//! The dynamic value model shared by playbook state, instruction arguments and
//! call results.
//!
//! Playbooks are authored as YAML or JSON, so every value starts life as plain
//! data. Contract calls, however, produce values with more structure than JSON
//! can carry: arbitrary precision integers, timestamps, raw byte strings and
//! deployed contract handles. [`Value`] keeps those shapes distinct so that
//! type coercion can dispatch on them, and only flattens them back to JSON
//! when state is exported.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use num_bigint::BigInt;
use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value as JsonValue};

/// Ordered string-keyed mapping used for objects and state namespaces.
pub type Map = IndexMap<String, Value>;

/// Reference to a contract abstraction, optionally bound to a deployed address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContractHandle {
    /// Artifact name of the contract (`contractName`).
    pub contract: String,
    /// Deployed address when the handle refers to a concrete instance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl ContractHandle {
    pub fn new(contract: impl Into<String>) -> Self {
        Self {
            contract: contract.into(),
            address: None,
        }
    }

    pub fn at(contract: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            contract: contract.into(),
            address: Some(address.into()),
        }
    }

    /// The handle as object fields: `contract`, then `address` when bound.
    pub fn to_fields(&self) -> Map {
        let mut fields = Map::new();
        fields.insert("contract".into(), Value::String(self.contract.clone()));
        if let Some(address) = &self.address {
            fields.insert("address".into(), Value::String(address.clone()));
        }
        fields
    }
}

/// A playbook value.
///
/// `Number` holds integers that fit in 64 bits and floats. `BigInt` holds
/// integers that must not lose precision (token amounts, balances); document
/// import produces it for integer literals wider than 64 bits.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(into = "JsonValue")]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    BigInt(BigInt),
    Date(DateTime<Utc>),
    String(String),
    Bytes(Vec<u8>),
    Array(Vec<Value>),
    Object(Map),
    Handle(ContractHandle),
}

/// The runtime shape of a [`Value`], used as the dispatch key for coercion tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueShape {
    Null,
    Bool,
    Number,
    BigInt,
    Date,
    String,
    Bytes,
    Array,
    Object,
    Handle,
}

impl ValueShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueShape::Null => "null",
            ValueShape::Bool => "bool",
            ValueShape::Number => "number",
            ValueShape::BigInt => "bigint",
            ValueShape::Date => "date",
            ValueShape::String => "string",
            ValueShape::Bytes => "bytes",
            ValueShape::Array => "array",
            ValueShape::Object => "object",
            ValueShape::Handle => "handle",
        }
    }
}

impl fmt::Display for ValueShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Value {
    pub fn shape(&self) -> ValueShape {
        match self {
            Value::Null => ValueShape::Null,
            Value::Bool(_) => ValueShape::Bool,
            Value::Number(_) => ValueShape::Number,
            Value::BigInt(_) => ValueShape::BigInt,
            Value::Date(_) => ValueShape::Date,
            Value::String(_) => ValueShape::String,
            Value::Bytes(_) => ValueShape::Bytes,
            Value::Array(_) => ValueShape::Array,
            Value::Object(_) => ValueShape::Object,
            Value::Handle(_) => ValueShape::Handle,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Map> {
        match self {
            Value::Object(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut Map> {
        match self {
            Value::Object(fields) => Some(fields),
            _ => None,
        }
    }

    /// Field lookup on objects; `None` for every other shape.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|fields| fields.get(key))
    }

    /// Replaces a handle with its object form (`contract`, `address`) so that
    /// fields can be written next to it. Other shapes are left alone.
    pub fn open_handle(&mut self) {
        if let Value::Handle(handle) = self {
            *self = Value::Object(handle.to_fields());
        }
    }

    /// Deep-merges `incoming` into `self`.
    ///
    /// When both sides are objects, keys are merged recursively and keys only
    /// present on the existing side are kept. An object merged onto a handle
    /// opens the handle first, so its contract and address survive. In every
    /// other combination the incoming value replaces the existing one,
    /// including arrays.
    pub fn merge(&mut self, incoming: Value) {
        if incoming.is_object() {
            self.open_handle();
        }
        match (self, incoming) {
            (Value::Object(existing), Value::Object(incoming)) => {
                for (key, value) in incoming {
                    match existing.get_mut(&key) {
                        Some(slot) => slot.merge(value),
                        None => {
                            existing.insert(key, value);
                        }
                    }
                }
            }
            (slot, incoming) => *slot = incoming,
        }
    }

    /// Exports the value as plain JSON.
    ///
    /// Big integers become decimal strings, dates become RFC 3339 strings,
    /// bytes become `0x`-prefixed hex and handles become objects.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Bool(flag) => JsonValue::Bool(*flag),
            Value::Number(number) => JsonValue::Number(number.clone()),
            Value::BigInt(integer) => JsonValue::String(integer.to_string()),
            Value::Date(date) => JsonValue::String(date.to_rfc3339_opts(SecondsFormat::Secs, true)),
            Value::String(text) => JsonValue::String(text.clone()),
            Value::Bytes(bytes) => JsonValue::String(format!("0x{}", hex::encode(bytes))),
            Value::Array(items) => JsonValue::Array(items.iter().map(Value::to_json).collect()),
            Value::Object(fields) => {
                let mut object = serde_json::Map::new();
                for (key, value) in fields {
                    object.insert(key.clone(), value.to_json());
                }
                JsonValue::Object(object)
            }
            Value::Handle(handle) => Value::Object(handle.to_fields()).to_json(),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(ValueVisitor)
    }
}

/// Builds values straight from the deserializer so integers wider than 64
/// bits (reported as `i128`/`u128`) keep full precision as [`Value::BigInt`].
struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a playbook value")
    }

    fn visit_bool<E>(self, flag: bool) -> Result<Value, E>
    where
        E: de::Error,
    {
        Ok(Value::Bool(flag))
    }

    fn visit_i64<E>(self, number: i64) -> Result<Value, E>
    where
        E: de::Error,
    {
        Ok(Value::from(number))
    }

    fn visit_u64<E>(self, number: u64) -> Result<Value, E>
    where
        E: de::Error,
    {
        Ok(Value::from(number))
    }

    fn visit_i128<E>(self, number: i128) -> Result<Value, E>
    where
        E: de::Error,
    {
        Ok(i64::try_from(number).map_or_else(|_| Value::BigInt(BigInt::from(number)), Value::from))
    }

    fn visit_u128<E>(self, number: u128) -> Result<Value, E>
    where
        E: de::Error,
    {
        Ok(u64::try_from(number).map_or_else(|_| Value::BigInt(BigInt::from(number)), Value::from))
    }

    fn visit_f64<E>(self, number: f64) -> Result<Value, E>
    where
        E: de::Error,
    {
        Number::from_f64(number)
            .map(Value::Number)
            .ok_or_else(|| E::custom(format!("number {number} is not finite")))
    }

    fn visit_str<E>(self, text: &str) -> Result<Value, E>
    where
        E: de::Error,
    {
        Ok(Value::String(text.to_string()))
    }

    fn visit_string<E>(self, text: String) -> Result<Value, E>
    where
        E: de::Error,
    {
        Ok(Value::String(text))
    }

    fn visit_unit<E>(self) -> Result<Value, E>
    where
        E: de::Error,
    {
        Ok(Value::Null)
    }

    fn visit_none<E>(self) -> Result<Value, E>
    where
        E: de::Error,
    {
        Ok(Value::Null)
    }

    fn visit_some<D>(self, deserializer: D) -> Result<Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer)
    }

    fn visit_seq<A>(self, mut sequence: A) -> Result<Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut items = Vec::with_capacity(sequence.size_hint().unwrap_or(0));
        while let Some(item) = sequence.next_element::<Value>()? {
            items.push(item);
        }
        Ok(Value::Array(items))
    }

    fn visit_map<A>(self, mut mapping: A) -> Result<Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut fields = Map::new();
        while let Some((key, value)) = mapping.next_entry::<String, Value>()? {
            fields.insert(key, value);
        }
        Ok(Value::Object(fields))
    }
}

impl From<JsonValue> for Value {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(flag) => Value::Bool(flag),
            JsonValue::Number(number) => Value::Number(number),
            JsonValue::String(text) => Value::String(text),
            JsonValue::Array(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            JsonValue::Object(fields) => Value::Object(fields.into_iter().map(|(key, value)| (key, Value::from(value))).collect()),
        }
    }
}

impl From<Value> for JsonValue {
    fn from(value: Value) -> Self {
        value.to_json()
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::String(text.to_string())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Value::String(text)
    }
}

impl From<bool> for Value {
    fn from(flag: bool) -> Self {
        Value::Bool(flag)
    }
}

impl From<i64> for Value {
    fn from(number: i64) -> Self {
        Value::Number(Number::from(number))
    }
}

impl From<u64> for Value {
    fn from(number: u64) -> Self {
        Value::Number(Number::from(number))
    }
}

impl From<BigInt> for Value {
    fn from(integer: BigInt) -> Self {
        Value::BigInt(integer)
    }
}

impl From<ContractHandle> for Value {
    fn from(handle: ContractHandle) -> Self {
        Value::Handle(handle)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<Map> for Value {
    fn from(fields: Map) -> Self {
        Value::Object(fields)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_json() {
            JsonValue::String(text) => f.write_str(&text),
            other => write!(f, "{other}"),
        }
    }
}
