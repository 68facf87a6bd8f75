//! Conversion of bound arguments to the shape the contract layer expects for
//! their declared Solidity type.
//!
//! Conversion is a two level table lookup: the declared parameter type picks
//! a table, the runtime shape of the value picks the conversion in it. Shapes
//! with no registered conversion pass through untouched.
//!
//! | declared type     | value shape | result                          |
//! |-------------------|-------------|---------------------------------|
//! | `bool`            | string      | `true`/`false`, else truthiness |
//! | `uint*` / `int*`  | bigint      | decimal string                  |
//! | `uint*` / `int*`  | date        | unix seconds, rounded           |
//! | `uint*` / `int*`  | string      | bigint (decimal or `0x` hex)    |
//! | `bytes1..32`      | string      | UTF-8 bytes                     |
//!
//! Callers can override conversions per declared type, or per family through
//! the `uint`, `int` and `bytes` aliases. An alias override applies to every
//! width in its family and takes precedence over a per-type override.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use deckhand_types::{Value, ValueShape};
use num_bigint::BigInt;
use serde_json::Number;
use tracing::warn;

use crate::error::PlaybookError;

/// A single conversion. Errors are plain messages; the coercer attaches the
/// declared type.
pub type Conversion = Arc<dyn Fn(&Value) -> Result<Value, String> + Send + Sync>;

pub type ConversionTable = HashMap<ValueShape, Conversion>;

/// A supported Solidity parameter type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SolidityType {
    Address,
    Bool,
    String,
    Uint(u16),
    Int(u16),
    FixedBytes(u8),
}

impl SolidityType {
    /// Parses a declared type. Widths must be multiples of eight up to 256
    /// (bare `uint`/`int` mean 256) and fixed byte lengths 1 to 32. Arrays,
    /// tuples, dynamic `bytes` and fixed point types are not supported.
    pub fn parse(declared: &str) -> Option<Self> {
        match declared.trim() {
            "address" => Some(SolidityType::Address),
            "bool" => Some(SolidityType::Bool),
            "string" => Some(SolidityType::String),
            other => {
                if let Some(width) = other.strip_prefix("uint") {
                    integer_width(width).map(SolidityType::Uint)
                } else if let Some(width) = other.strip_prefix("int") {
                    integer_width(width).map(SolidityType::Int)
                } else if let Some(length) = other.strip_prefix("bytes") {
                    let length = length.parse::<u8>().ok()?;
                    (1..=32).contains(&length).then_some(SolidityType::FixedBytes(length))
                } else {
                    None
                }
            }
        }
    }

    /// The family alias this type belongs to, if any.
    pub fn alias(&self) -> Option<&'static str> {
        match self {
            SolidityType::Uint(_) => Some("uint"),
            SolidityType::Int(_) => Some("int"),
            SolidityType::FixedBytes(_) => Some("bytes"),
            _ => None,
        }
    }
}

fn integer_width(width: &str) -> Option<u16> {
    if width.is_empty() {
        return Some(256);
    }
    let bits = width.parse::<u16>().ok()?;
    (bits % 8 == 0 && (8..=256).contains(&bits)).then_some(bits)
}

impl fmt::Display for SolidityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolidityType::Address => f.write_str("address"),
            SolidityType::Bool => f.write_str("bool"),
            SolidityType::String => f.write_str("string"),
            SolidityType::Uint(bits) => write!(f, "uint{bits}"),
            SolidityType::Int(bits) => write!(f, "int{bits}"),
            SolidityType::FixedBytes(length) => write!(f, "bytes{length}"),
        }
    }
}

/// Caller supplied conversions, merged over the defaults per value shape.
#[derive(Clone, Default)]
pub struct TypeOverrides {
    tables: HashMap<String, ConversionTable>,
}

impl TypeOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a conversion for `declared_type` (or an alias such as
    /// `uint`) and values of `shape`.
    pub fn register<F>(mut self, declared_type: impl Into<String>, shape: ValueShape, conversion: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.tables
            .entry(declared_type.into())
            .or_default()
            .insert(shape, Arc::new(conversion));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl fmt::Debug for TypeOverrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeOverrides").field("types", &sorted_keys(&self.tables)).finish()
    }
}

/// Converts argument values for their declared parameter types.
///
/// Conversions live in tables keyed by declared type and then by value
/// shape. Every supported family (`address`, `bool`, `string`, `uint`, `int`,
/// `bytes`) has a default table; overrides are merged over a copy of the
/// family table, so shapes an override leaves out keep their defaults.
#[derive(Clone)]
pub struct Coercer {
    /// Family tables, including any alias overrides.
    families: HashMap<String, ConversionTable>,
    /// Per-type tables such as `uint256`, each a merged copy of its family table.
    exact: HashMap<String, ConversionTable>,
    /// Families whose alias was overridden; these ignore per-type tables.
    aliased: HashSet<String>,
}

impl Default for Coercer {
    fn default() -> Self {
        Self {
            families: default_tables(),
            exact: HashMap::new(),
            aliased: HashSet::new(),
        }
    }
}

impl fmt::Debug for Coercer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coercer")
            .field("families", &sorted_keys(&self.families))
            .field("exact", &sorted_keys(&self.exact))
            .field("aliased", &self.aliased)
            .finish()
    }
}

impl Coercer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a coercer whose tables are the defaults merged with `overrides`.
    ///
    /// # Arguments
    /// - `overrides`: Conversions keyed by exact type (`uint256`) or family
    ///   alias (`uint`, `int`, `bytes`).
    ///
    /// # Returns
    /// A coercer where an alias override applies to every width in its family
    /// and wins over per-type overrides. Keys that name no supported type are
    /// ignored with a warning.
    pub fn with_overrides(overrides: TypeOverrides) -> Self {
        let mut coercer = Self::default();
        for (key, table) in overrides.tables {
            let key = key.trim();
            if FAMILY_ALIASES.contains(&key) {
                coercer.families.entry(key.to_string()).or_default().extend(table);
                coercer.aliased.insert(key.to_string());
                continue;
            }
            let Some(parsed) = SolidityType::parse(key) else {
                warn!(declared_type = key, "ignoring conversion override for unsupported type");
                continue;
            };
            let mut merged = coercer.families.get(family_key(parsed)).cloned().unwrap_or_default();
            merged.extend(table);
            coercer.exact.insert(parsed.to_string(), merged);
        }
        coercer
    }

    /// Converts `value` for a parameter declared as `declared_type`.
    ///
    /// # Arguments
    /// - `declared_type`: The ABI type of the parameter, such as `uint256`.
    /// - `value`: The bound argument value.
    ///
    /// # Returns
    /// The converted value. Value shapes without a conversion in the type's
    /// table are returned unchanged.
    ///
    /// # Errors
    /// [`PlaybookError::UnsupportedType`] when the declared type is not
    /// recognised and [`PlaybookError::Coercion`] when a conversion rejects
    /// the value.
    pub fn coerce(&self, declared_type: &str, value: &Value) -> Result<Value, PlaybookError> {
        let parsed = SolidityType::parse(declared_type).ok_or_else(|| PlaybookError::UnsupportedType {
            declared_type: declared_type.to_string(),
        })?;
        let Some(conversion) = self.table_for(parsed).and_then(|table| table.get(&value.shape())) else {
            return Ok(value.clone());
        };
        conversion(value).map_err(|message| PlaybookError::Coercion {
            declared_type: declared_type.to_string(),
            message,
        })
    }

    fn table_for(&self, parsed: SolidityType) -> Option<&ConversionTable> {
        let family = family_key(parsed);
        if !self.aliased.contains(family)
            && let Some(table) = self.exact.get(&parsed.to_string())
        {
            return Some(table);
        }
        self.families.get(family)
    }
}

const FAMILY_ALIASES: [&str; 3] = ["uint", "int", "bytes"];

fn family_key(parsed: SolidityType) -> &'static str {
    match parsed {
        SolidityType::Address => "address",
        SolidityType::Bool => "bool",
        SolidityType::String => "string",
        SolidityType::Uint(_) => "uint",
        SolidityType::Int(_) => "int",
        SolidityType::FixedBytes(_) => "bytes",
    }
}

fn default_tables() -> HashMap<String, ConversionTable> {
    let integer: ConversionTable = HashMap::from([
        (ValueShape::BigInt, conversion(integer_from_bigint)),
        (ValueShape::Date, conversion(integer_from_date)),
        (ValueShape::String, conversion(integer_from_string)),
    ]);
    HashMap::from([
        ("address".to_string(), ConversionTable::new()),
        ("bool".to_string(), HashMap::from([(ValueShape::String, conversion(bool_from_string))])),
        ("string".to_string(), ConversionTable::new()),
        ("uint".to_string(), integer.clone()),
        ("int".to_string(), integer),
        ("bytes".to_string(), HashMap::from([(ValueShape::String, conversion(bytes_from_string))])),
    ])
}

fn conversion<F>(function: F) -> Conversion
where
    F: Fn(&Value) -> Result<Value, String> + Send + Sync + 'static,
{
    Arc::new(function)
}

fn sorted_keys(tables: &HashMap<String, ConversionTable>) -> Vec<&String> {
    let mut keys: Vec<&String> = tables.keys().collect();
    keys.sort();
    keys
}

fn bool_from_string(value: &Value) -> Result<Value, String> {
    match value {
        Value::String(text) => Ok(Value::Bool(parse_bool(text))),
        other => Ok(other.clone()),
    }
}

fn integer_from_bigint(value: &Value) -> Result<Value, String> {
    match value {
        Value::BigInt(integer) => Ok(Value::String(integer.to_string())),
        other => Ok(other.clone()),
    }
}

fn integer_from_date(value: &Value) -> Result<Value, String> {
    match value {
        Value::Date(date) => {
            let seconds = (date.timestamp_millis() + 500).div_euclid(1000);
            Ok(Value::Number(Number::from(seconds)))
        }
        other => Ok(other.clone()),
    }
}

fn integer_from_string(value: &Value) -> Result<Value, String> {
    match value {
        Value::String(text) => parse_integer(text).map(Value::BigInt),
        other => Ok(other.clone()),
    }
}

fn bytes_from_string(value: &Value) -> Result<Value, String> {
    match value {
        Value::String(text) => Ok(Value::Bytes(text.as_bytes().to_vec())),
        other => Ok(other.clone()),
    }
}

fn parse_bool(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.eq_ignore_ascii_case("true") {
        true
    } else if trimmed.eq_ignore_ascii_case("false") {
        false
    } else {
        !text.is_empty()
    }
}

/// Parses a decimal or `0x` hexadecimal integer string, optionally negative.
pub fn parse_integer(text: &str) -> Result<BigInt, String> {
    let trimmed = text.trim();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };
    let parsed = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => BigInt::parse_bytes(hex.as_bytes(), 16),
        None => BigInt::parse_bytes(digits.as_bytes(), 10),
    };
    match parsed {
        Some(integer) if negative => Ok(-integer),
        Some(integer) => Ok(integer),
        None => Err(format!("`{text}` is not a decimal or 0x-prefixed hex integer")),
    }
}
