//! JSON Merge Patch (RFC 7396).
//!
//! - A non-object patch replaces the target wholesale
//! - An object patch is applied key by key: `null` deletes, objects recurse
//!   (a missing or non-object target key starts out as `{}`), anything else
//!   replaces
//!
//! Merging is total over JSON values; there is no failure case.

use serde_json::{Map, Value};

/// Apply `patch` to `target` in place.
pub fn merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch_map) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(target_map) = target {
        for (key, value) in patch_map {
            if value.is_null() {
                let _ = target_map.remove(key);
            } else {
                merge_patch(target_map.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
    }
}

/// Owned variant of [`merge_patch`].
pub fn merged(mut target: Value, patch: &Value) -> Value {
    merge_patch(&mut target, patch);
    target
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_deletes_and_new_keys_are_added() {
        let out = merged(json!({"a": 1, "b": 2}), &json!({"b": null, "c": 3}));
        assert_eq!(out, json!({"a": 1, "c": 3}));
    }

    #[test]
    fn nested_objects_recurse() {
        let out = merged(
            json!({"user": {"name": "ann", "age": 30}}),
            &json!({"user": {"age": 31}}),
        );
        assert_eq!(out, json!({"user": {"name": "ann", "age": 31}}));
    }

    #[test]
    fn arrays_are_replaced_not_merged() {
        let out = merged(json!({"tags": [1, 2, 3]}), &json!({"tags": [4]}));
        assert_eq!(out, json!({"tags": [4]}));
    }

    #[test]
    fn non_object_patch_replaces_target() {
        assert_eq!(merged(json!({"a": 1}), &json!([1, 2])), json!([1, 2]));
        assert_eq!(merged(json!({"a": 1}), &json!("text")), json!("text"));
        assert_eq!(merged(json!({"a": 1}), &Value::Null), Value::Null);
    }

    #[test]
    fn object_patch_over_scalar_starts_from_empty_object() {
        let out = merged(json!(5), &json!({"a": {"b": null, "c": 1}}));
        assert_eq!(out, json!({"a": {"c": 1}}));
    }

    #[test]
    fn object_patch_value_over_scalar_key() {
        let out = merged(json!({"a": "flat"}), &json!({"a": {"deep": true}}));
        assert_eq!(out, json!({"a": {"deep": true}}));
    }

    #[test]
    fn deleting_missing_key_is_noop() {
        let out = merged(json!({"a": 1}), &json!({"zzz": null}));
        assert_eq!(out, json!({"a": 1}));
    }

    #[test]
    fn empty_patch_leaves_target() {
        let out = merged(json!({"a": [1]}), &json!({}));
        assert_eq!(out, json!({"a": [1]}));
    }

    #[test]
    fn rfc_7396_appendix_example() {
        let target = json!({
            "title": "Goodbye!",
            "author": {"givenName": "John", "familyName": "Doe"},
            "tags": ["example", "sample"],
            "content": "This will be unchanged"
        });
        let patch = json!({
            "title": "Hello!",
            "phoneNumber": "+01-123-456-7890",
            "author": {"familyName": null},
            "tags": ["example"]
        });
        let expected = json!({
            "title": "Hello!",
            "author": {"givenName": "John"},
            "tags": ["example"],
            "content": "This will be unchanged",
            "phoneNumber": "+01-123-456-7890"
        });
        assert_eq!(merged(target, &patch), expected);
    }
}
