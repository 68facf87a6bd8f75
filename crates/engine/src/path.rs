//! Dot and index path navigation over [`Value`] trees.
//!
//! Paths look like `token.holders[0].address`. Empty segments are skipped,
//! so `a..b` and `a.b` are the same path. A numeric key segment also indexes
//! into arrays, which lets `holders.0` and `holders[0]` mean the same thing.

use deckhand_types::{Map, Value};

use crate::error::PlaybookError;

/// Largest number of elements a single indexed write may add to a list.
pub const MAX_LIST_PADDING: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Splits a path into key and index segments.
pub fn parse_path(path: &str) -> Vec<PathSegment> {
    let mut segments = Vec::new();
    for part in path.trim().split('.') {
        if part.is_empty() {
            continue;
        }
        let (key, indices) = split_indices(part);
        if !key.is_empty() {
            segments.push(PathSegment::Key(key.to_string()));
        }
        segments.extend(indices.into_iter().map(PathSegment::Index));
    }
    segments
}

fn split_indices(segment: &str) -> (&str, Vec<usize>) {
    let key_end = segment.find('[').unwrap_or(segment.len());
    let key = &segment[..key_end];
    let mut indices = Vec::new();
    let mut rest = &segment[key_end..];
    while let Some(open) = rest.strip_prefix('[') {
        let Some(close) = open.find(']') else {
            break;
        };
        if let Ok(index) = open[..close].trim().parse::<usize>() {
            indices.push(index);
        }
        rest = &open[close + 1..];
    }
    (key, indices)
}

/// Reads the value at `segments` below `root`; `None` when any hop is missing
/// or lands on the wrong shape.
pub fn lookup<'a>(root: &'a Value, segments: &[PathSegment]) -> Option<&'a Value> {
    let mut current = root;
    for segment in segments {
        current = match (segment, current) {
            (PathSegment::Key(key), Value::Object(fields)) => fields.get(key)?,
            (PathSegment::Key(key), Value::Array(items)) => items.get(key.parse::<usize>().ok()?)?,
            (PathSegment::Index(index), Value::Array(items)) => items.get(*index)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Convenience wrapper parsing `path` before [`lookup`].
pub fn select<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    lookup(root, &parse_path(path))
}

/// Returns a mutable slot at `segments`, creating missing intermediates.
///
/// Missing or null key hops become empty objects and missing index hops pad
/// the array with nulls, at most [`MAX_LIST_PADDING`] past its end. A handle
/// on a key hop is opened into an object so its fields survive. A scalar
/// sitting where a container is needed is replaced. Indexing into an object,
/// or keying into an array with a non-numeric key, fails.
pub fn slot_mut<'a>(root: &'a mut Value, segments: &[PathSegment], path: &str) -> Result<&'a mut Value, PlaybookError> {
    let mut current = root;
    for segment in segments {
        current = match segment {
            PathSegment::Key(key) if matches!(current, Value::Array(_)) => {
                let index = key
                    .parse::<usize>()
                    .map_err(|_| PlaybookError::resolution(format!("cannot write key `{key}` of `{path}` into a list")))?;
                list_slot(current, index, path)?
            }
            PathSegment::Key(key) => {
                current.open_handle();
                if !current.is_object() {
                    *current = Value::Object(Map::new());
                }
                current
                    .as_object_mut()
                    .ok_or_else(|| PlaybookError::resolution(format!("`{path}` does not address an object")))?
                    .entry(key.clone())
                    .or_insert(Value::Null)
            }
            PathSegment::Index(index) => {
                if current.is_object() {
                    return Err(PlaybookError::resolution(format!(
                        "cannot write index [{index}] of `{path}` into an object"
                    )));
                }
                if !matches!(current, Value::Array(_)) {
                    *current = Value::Array(Vec::new());
                }
                list_slot(current, *index, path)?
            }
        };
    }
    Ok(current)
}

fn list_slot<'a>(slot: &'a mut Value, index: usize, path: &str) -> Result<&'a mut Value, PlaybookError> {
    let Value::Array(items) = slot else {
        return Err(PlaybookError::resolution(format!("`{path}` does not address a list")));
    };
    if items.len() <= index {
        let length = index
            .checked_add(1)
            .filter(|length| length - items.len() <= MAX_LIST_PADDING)
            .ok_or_else(|| {
                PlaybookError::resolution(format!(
                    "index [{index}] of `{path}` is more than {MAX_LIST_PADDING} past the end of a list of {}",
                    items.len()
                ))
            })?;
        items.resize(length, Value::Null);
    }
    Ok(&mut items[index])
}

#[cfg(test)]
mod tests {
    use super::*;
    use deckhand_types::ContractHandle;
    use serde_json::json;

    #[test]
    fn test_parse_path_keys_and_indices() {
        assert_eq!(
            parse_path("holders[0].address"),
            vec![
                PathSegment::Key("holders".into()),
                PathSegment::Index(0),
                PathSegment::Key("address".into())
            ]
        );
        assert_eq!(parse_path("matrix[1][2]"), vec![
            PathSegment::Key("matrix".into()),
            PathSegment::Index(1),
            PathSegment::Index(2)
        ]);
        assert!(parse_path("").is_empty());
        assert_eq!(parse_path("a..b").len(), 2);
    }

    #[test]
    fn test_select_nested_values() {
        let value = Value::from(json!({"holders": [{"address": "0x1"}, {"address": "0x2"}], "count": 2}));
        assert_eq!(select(&value, "holders[1].address"), Some(&Value::from("0x2")));
        assert_eq!(select(&value, "holders.0.address"), Some(&Value::from("0x1")));
        assert_eq!(select(&value, "count"), Some(&Value::from(2_u64)));
        assert_eq!(select(&value, ""), Some(&value));
    }

    #[test]
    fn test_select_missing_or_wrong_shape() {
        let value = Value::from(json!({"holders": [{"address": "0x1"}], "name": "x"}));
        assert!(select(&value, "holders[3]").is_none());
        assert!(select(&value, "name.first").is_none());
        assert!(select(&value, "holders.first").is_none());
        assert!(select(&value, "missing").is_none());
    }

    #[test]
    fn test_slot_mut_creates_intermediates() {
        let mut root = Value::Object(Map::new());
        *slot_mut(&mut root, &parse_path("a.b[2].c"), "a.b[2].c").expect("slot") = Value::from("x");
        assert_eq!(root.to_json(), json!({"a": {"b": [null, null, {"c": "x"}]}}));
    }

    #[test]
    fn test_slot_mut_rejects_index_into_object() {
        let mut root = Value::from(json!({"a": {"b": 1}}));
        let err = slot_mut(&mut root, &parse_path("a[0]"), "a[0]").expect_err("object is not indexable");
        assert!(err.to_string().contains("into an object"), "{err}");
    }

    #[test]
    fn test_slot_mut_bounds_list_padding() {
        let mut root = Value::from(json!({"list": ["a"]}));

        let err = slot_mut(&mut root, &parse_path("list[18446744073709551615]"), "list[18446744073709551615]")
            .expect_err("overflowing index");
        assert!(err.to_string().contains("past the end"), "{err}");
        assert!(slot_mut(&mut root, &parse_path("list[99999999999]"), "list[99999999999]").is_err());
        assert_eq!(root.to_json(), json!({"list": ["a"]}));

        let edge = MAX_LIST_PADDING.to_string();
        *slot_mut(&mut root, &parse_path(&format!("list[{edge}]")), "edge").expect("within bound") = Value::from("z");
        assert_eq!(root.get("list").and_then(Value::as_array).map(Vec::len), Some(MAX_LIST_PADDING + 1));
    }

    #[test]
    fn test_slot_mut_opens_handles_on_the_way_down() {
        let mut root = Value::from(json!({}));
        *slot_mut(&mut root, &parse_path("vault"), "vault").expect("slot") =
            Value::Handle(ContractHandle::at("Vault", "0xabc"));

        *slot_mut(&mut root, &parse_path("vault.tx"), "vault.tx").expect("slot") = Value::from("0xdead");
        assert_eq!(
            root.to_json(),
            json!({"vault": {"contract": "Vault", "address": "0xabc", "tx": "0xdead"}})
        );
    }
}
