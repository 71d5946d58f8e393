//! Dot-delimited paths and deep merging over JSON snapshots.

use serde_json::{Map, Value};

/// Looks up `path` (e.g. `"tags.nginx.0.digest"`) in `value`.
///
/// Object members are addressed by name, array items by decimal index. An empty path addresses `value` itself.
#[must_use]
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
	if path.is_empty() {
		return Some(value);
	}
	path.split('.').try_fold(value, |value, segment| match value {
		Value::Object(map) => map.get(segment),
		Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
		_ => None,
	})
}

/// Merges `patch` into `target`: objects recursively, everything else (arrays and `null` included) by replacement.
pub fn deep_merge(target: &mut Value, patch: Value) {
	match (target, patch) {
		(Value::Object(target), Value::Object(patch)) => merge_maps(target, patch),
		(target, patch) => *target = patch,
	}
}

fn merge_maps(target: &mut Map<String, Value>, patch: Map<String, Value>) {
	for (key, value) in patch {
		match target.get_mut(&key) {
			Some(existing) => deep_merge(existing, value),
			None => {
				target.insert(key, value);
			}
		}
	}
}

/// The JSON type name of `value`, for error messages.
#[must_use]
pub fn kind_of(value: &Value) -> &'static str {
	match value {
		Value::Null => "null",
		Value::Bool(_) => "a boolean",
		Value::Number(_) => "a number",
		Value::String(_) => "a string",
		Value::Array(_) => "an array",
		Value::Object(_) => "an object",
	}
}
