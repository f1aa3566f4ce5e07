//! JSON Patch (RFC 6902).
//!
//! [`apply_patch`] runs every operation in order against a working copy and
//! only hands the copy back when all of them succeed, so callers never
//! observe a partially applied patch.

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::errors::{OperationError, PatchError};
use crate::pointer::{parse_index, JsonPointer};

/// One JSON Patch operation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOperation {
    /// Insert or overwrite a value; `-` appends to an array.
    Add {
        /// Target pointer.
        path: String,
        /// Value to insert.
        value: Value,
    },
    /// Remove an existing value.
    Remove {
        /// Target pointer.
        path: String,
    },
    /// Overwrite an existing value.
    Replace {
        /// Target pointer.
        path: String,
        /// Replacement value.
        value: Value,
    },
    /// Remove the value at `from` and add it at `path`.
    Move {
        /// Source pointer.
        from: String,
        /// Target pointer.
        path: String,
    },
    /// Add a copy of the value at `from` at `path`.
    Copy {
        /// Source pointer.
        from: String,
        /// Target pointer.
        path: String,
    },
    /// Assert that the value at `path` equals `value`.
    Test {
        /// Target pointer.
        path: String,
        /// Expected value.
        value: Value,
    },
}

impl PatchOperation {
    /// Wire name of the operation.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Add { .. } => "add",
            Self::Remove { .. } => "remove",
            Self::Replace { .. } => "replace",
            Self::Move { .. } => "move",
            Self::Copy { .. } => "copy",
            Self::Test { .. } => "test",
        }
    }

    fn apply(&self, doc: &mut Value) -> Result<(), OperationError> {
        match self {
            Self::Add { path, value } => add(doc, &JsonPointer::parse(path)?, value.clone()),
            Self::Remove { path } => remove(doc, &JsonPointer::parse(path)?).map(|_| ()),
            Self::Replace { path, value } => {
                replace(doc, &JsonPointer::parse(path)?, value.clone())
            }
            Self::Move { from, path } => {
                let from = JsonPointer::parse(from)?;
                let path = JsonPointer::parse(path)?;
                if from == path {
                    // Still has to exist.
                    return resolve(doc, &from).map(|_| ());
                }
                if path.is_descendant_of(&from) {
                    return Err(OperationError::InvalidTarget(
                        path.to_string(),
                        "cannot move a value into one of its children",
                    ));
                }
                let value = remove(doc, &from)?;
                add(doc, &path, value)
            }
            Self::Copy { from, path } => {
                let value = resolve(doc, &JsonPointer::parse(from)?)?.clone();
                add(doc, &JsonPointer::parse(path)?, value)
            }
            Self::Test { path, value } => {
                let ptr = JsonPointer::parse(path)?;
                if json_equal(resolve(doc, &ptr)?, value) {
                    Ok(())
                } else {
                    Err(OperationError::TestFailed(ptr.to_string()))
                }
            }
        }
    }
}

/// Decode a patch payload (a JSON array of operation objects).
pub fn parse_patch(payload: &Value) -> Result<Vec<PatchOperation>, PatchError> {
    if !payload.is_array() {
        return Err(PatchError::Malformed(
            "expected an array of operations".to_owned(),
        ));
    }
    serde_json::from_value(payload.clone()).map_err(|e| PatchError::Malformed(e.to_string()))
}

/// Apply `ops` in order to a copy of `doc` and return the result.
///
/// On failure `doc` is untouched and the error names the first failing
/// operation.
pub fn apply_patch(doc: &Value, ops: &[PatchOperation]) -> Result<Value, PatchError> {
    let mut working = doc.clone();
    for (index, op) in ops.iter().enumerate() {
        op.apply(&mut working).map_err(|kind| PatchError::Operation {
            index,
            op: op.name(),
            kind,
        })?;
    }
    Ok(working)
}

// ── Navigation ───────────────────────────────────────────────────────────

fn resolve<'a>(doc: &'a Value, ptr: &JsonPointer) -> Result<&'a Value, OperationError> {
    let mut current = doc;
    for token in ptr.tokens() {
        current = match current {
            Value::Object(map) => map
                .get(token)
                .ok_or_else(|| OperationError::NotFound(ptr.to_string()))?,
            Value::Array(items) => {
                let index = array_index(token, ptr)?;
                items.get(index).ok_or(OperationError::OutOfBounds {
                    index,
                    len: items.len(),
                    path: ptr.to_string(),
                })?
            }
            _ => return Err(OperationError::NotFound(ptr.to_string())),
        };
    }
    Ok(current)
}

fn resolve_mut<'a>(
    doc: &'a mut Value,
    tokens: &[String],
    ptr: &JsonPointer,
) -> Result<&'a mut Value, OperationError> {
    let mut current = doc;
    for token in tokens {
        current = match current {
            Value::Object(map) => map
                .get_mut(token)
                .ok_or_else(|| OperationError::NotFound(ptr.to_string()))?,
            Value::Array(items) => {
                let index = array_index(token, ptr)?;
                let len = items.len();
                items.get_mut(index).ok_or(OperationError::OutOfBounds {
                    index,
                    len,
                    path: ptr.to_string(),
                })?
            }
            _ => return Err(OperationError::NotFound(ptr.to_string())),
        };
    }
    Ok(current)
}

fn array_index(token: &str, ptr: &JsonPointer) -> Result<usize, OperationError> {
    parse_index(token).ok_or_else(|| OperationError::InvalidIndex {
        token: token.to_owned(),
        path: ptr.to_string(),
    })
}

// ── Operations ───────────────────────────────────────────────────────────

fn add(doc: &mut Value, ptr: &JsonPointer, value: Value) -> Result<(), OperationError> {
    let Some((parent, last)) = ptr.split_last() else {
        *doc = value;
        return Ok(());
    };
    match resolve_mut(doc, parent, ptr)? {
        Value::Object(map) => {
            let _ = map.insert(last.to_owned(), value);
            Ok(())
        }
        Value::Array(items) => {
            if last == "-" {
                items.push(value);
                return Ok(());
            }
            let index = array_index(last, ptr)?;
            if index > items.len() {
                return Err(OperationError::OutOfBounds {
                    index,
                    len: items.len(),
                    path: ptr.to_string(),
                });
            }
            items.insert(index, value);
            Ok(())
        }
        _ => Err(OperationError::NotAContainer(ptr.to_string())),
    }
}

fn remove(doc: &mut Value, ptr: &JsonPointer) -> Result<Value, OperationError> {
    let Some((parent, last)) = ptr.split_last() else {
        return Err(OperationError::InvalidTarget(
            String::new(),
            "cannot remove the document root",
        ));
    };
    match resolve_mut(doc, parent, ptr)? {
        Value::Object(map) => map
            .remove(last)
            .ok_or_else(|| OperationError::NotFound(ptr.to_string())),
        Value::Array(items) => {
            let index = array_index(last, ptr)?;
            if index >= items.len() {
                return Err(OperationError::OutOfBounds {
                    index,
                    len: items.len(),
                    path: ptr.to_string(),
                });
            }
            Ok(items.remove(index))
        }
        _ => Err(OperationError::NotAContainer(ptr.to_string())),
    }
}

fn replace(doc: &mut Value, ptr: &JsonPointer, value: Value) -> Result<(), OperationError> {
    if ptr.is_root() {
        *doc = value;
        return Ok(());
    }
    let slot = resolve_mut(doc, ptr.tokens(), ptr)?;
    *slot = value;
    Ok(())
}

/// Structural equality with numbers compared by value (`1 == 1.0`).
fn json_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => number_equal(x, y),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| json_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| json_equal(x, y)))
        }
        _ => a == b,
    }
}

/// Integers compare exactly; floats only when either side is one.
fn number_equal(x: &Number, y: &Number) -> bool {
    if let (Some(a), Some(b)) = (x.as_i64(), y.as_i64()) {
        return a == b;
    }
    if let (Some(a), Some(b)) = (x.as_u64(), y.as_u64()) {
        return a == b;
    }
    (x.is_f64() || y.is_f64()) && x.as_f64() == y.as_f64()
}
