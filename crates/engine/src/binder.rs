//! Binds resolved instruction inputs to a method's declared parameters.
//!
//! Authors may pass arguments positionally, as a keyed object naming the
//! parameters, or a mix of both. A keyed object is replaced by its values in
//! ABI declaration order, each coerced to its declared type. A trailing
//! object made only of transaction option keys (`from`, `gas`, ...) is passed
//! through untouched instead.

use deckhand_types::{Map, MethodSignature, Value};
use tracing::trace;

use crate::coerce::Coercer;
use crate::error::PlaybookError;

/// Keys of the transaction options object accepted after the method arguments.
pub const CALL_OPTION_KEYS: [&str; 7] = ["to", "from", "gas", "gasPrice", "nonce", "value", "data"];

/// Produces the positional argument list for a call.
///
/// # Arguments
/// - `inputs`: Resolved inputs in declaration order.
/// - `signature`: The target method, or `None` for methods with no ABI entry
///   to bind against (`link`, `at`); keyed objects then pass through as is.
/// - `coercer`: Converts each keyed value for its declared type.
///
/// # Returns
/// One argument per positional input, each keyed object replaced by its
/// values in parameter order, and a trailing call options object kept last.
///
/// # Errors
/// [`PlaybookError::MissingArgument`] when a keyed object lacks a declared
/// parameter, and coercion errors from `coercer`.
pub fn sort_inputs(
    inputs: Vec<Value>,
    signature: Option<&MethodSignature>,
    coercer: &Coercer,
) -> Result<Vec<Value>, PlaybookError> {
    let parameter_count = signature.map_or(0, |signature| signature.inputs.len());
    let input_count = inputs.len();
    let mut sorted = Vec::with_capacity(input_count.max(parameter_count));

    for (index, input) in inputs.into_iter().enumerate() {
        if is_call_options(&input, index, input_count, sorted.len(), parameter_count) {
            trace!(index, "passing call options through");
            sorted.push(input);
            continue;
        }
        match (input, signature) {
            (Value::Object(fields), Some(signature)) => sorted.extend(bind_named(&fields, signature, coercer)?),
            (other, _) => sorted.push(other),
        }
    }
    Ok(sorted)
}

/// Whether the input at `index` is the trailing transaction options object.
///
/// It must be the last input, contain only [`CALL_OPTION_KEYS`], and the
/// arguments produced so far plus the inputs consumed must already cover
/// every declared parameter.
pub fn is_call_options(
    input: &Value,
    index: usize,
    input_count: usize,
    produced: usize,
    parameter_count: usize,
) -> bool {
    if index + 1 != input_count || produced + index < parameter_count {
        return false;
    }
    match input {
        Value::Object(fields) => fields.keys().all(|key| CALL_OPTION_KEYS.contains(&key.as_str())),
        _ => false,
    }
}

fn bind_named(fields: &Map, signature: &MethodSignature, coercer: &Coercer) -> Result<Vec<Value>, PlaybookError> {
    signature
        .inputs
        .iter()
        .map(|parameter| {
            let attempted = candidate_names(&parameter.name);
            let value = attempted
                .iter()
                .find_map(|name| fields.get(*name))
                .ok_or_else(|| PlaybookError::MissingArgument {
                    method: signature.display_name().to_string(),
                    parameter: parameter.name.clone(),
                    attempted: attempted.iter().map(|name| name.to_string()).collect(),
                })?;
            coercer.coerce(&parameter.kind, value)
        })
        .collect()
}

/// The declared name, then the name without leading underscores when that differs.
fn candidate_names(name: &str) -> Vec<&str> {
    let mut names = vec![name];
    let stripped = name.trim_start_matches('_');
    if !stripped.is_empty() && stripped != name {
        names.push(stripped);
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use deckhand_types::AbiParam;
    use num_bigint::BigInt;
    use serde_json::json;

    fn transfer() -> MethodSignature {
        MethodSignature::function(
            "transfer",
            vec![AbiParam::new("_to", "address"), AbiParam::new("_amount", "uint256")],
        )
    }

    fn inputs(value: serde_json::Value) -> Vec<Value> {
        match Value::from(value) {
            Value::Array(items) => items,
            other => vec![other],
        }
    }

    #[test]
    fn test_keyed_object_follows_declaration_order() {
        let sorted = sort_inputs(inputs(json!([{"amount": "100", "to": "0xabc"}])), Some(&transfer()), &Coercer::new())
            .expect("bound");
        assert_eq!(sorted, vec![Value::from("0xabc"), Value::BigInt(BigInt::from(100))]);
    }

    #[test]
    fn test_declared_name_wins_over_stripped() {
        let sorted = sort_inputs(
            inputs(json!([{"_to": "0xdeclared", "to": "0xstripped", "_amount": 1}])),
            Some(&transfer()),
            &Coercer::new(),
        )
        .expect("bound");
        assert_eq!(sorted[0], Value::from("0xdeclared"));
    }

    #[test]
    fn test_missing_argument_names_both_candidates() {
        let err = sort_inputs(inputs(json!([{"to": "0xabc", "value": 5}])), Some(&transfer()), &Coercer::new())
            .expect_err("amount missing");
        assert_eq!(err.kind(), ErrorKind::Resolution);
        let message = err.to_string();
        assert!(message.contains("_amount") && message.contains(" amount"), "{message}");
    }

    #[test]
    fn test_trailing_call_options_pass_through() {
        let sorted = sort_inputs(
            inputs(json!([{"to": "0xabc", "amount": 1}, {"from": "0xowner", "gas": 90000}])),
            Some(&transfer()),
            &Coercer::new(),
        )
        .expect("bound");
        assert_eq!(sorted.len(), 3);
        assert_eq!(sorted[2].to_json(), json!({"from": "0xowner", "gas": 90000}));
    }

    #[test]
    fn test_option_keys_bind_when_arguments_are_short() {
        // `to` and `value` are option keys, but the object is also the only
        // source of the declared arguments, so it is bound.
        let signature = MethodSignature::function(
            "send",
            vec![AbiParam::new("to", "address"), AbiParam::new("value", "uint256")],
        );
        let sorted = sort_inputs(inputs(json!([{"value": "7", "to": "0xabc"}])), Some(&signature), &Coercer::new())
            .expect("bound");
        assert_eq!(sorted, vec![Value::from("0xabc"), Value::BigInt(BigInt::from(7))]);
    }

    #[test]
    fn test_positional_inputs_are_untouched() {
        let positional = inputs(json!(["0xabc", 5]));
        let sorted = sort_inputs(positional.clone(), Some(&transfer()), &Coercer::new()).expect("bound");
        assert_eq!(sorted, positional);

        let again = sort_inputs(sorted.clone(), Some(&transfer()), &Coercer::new()).expect("idempotent");
        assert_eq!(again, sorted);
    }

    #[test]
    fn test_no_signature_passes_objects_through() {
        let raw = inputs(json!(["$contracts.Library", {"memo": "x"}]));
        let sorted = sort_inputs(raw.clone(), None, &Coercer::new()).expect("unbound");
        assert_eq!(sorted, raw);
    }

    #[test]
    fn test_empty_constructor_with_options() {
        let constructor = MethodSignature::constructor(Vec::new());
        let sorted = sort_inputs(inputs(json!([{"from": "0xowner"}])), Some(&constructor), &Coercer::new())
            .expect("options only");
        assert_eq!(sorted.len(), 1);
    }
}
