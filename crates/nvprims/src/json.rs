//! Conversion between lists and JSON values.
//!
//! | JSON | list |
//! |---|---|
//! | `null` | NULL |
//! | `true` / `false` | BOOL |
//! | non-negative integer | NUMBER |
//! | string | STRING |
//! | object | NVLIST |
//! | array of integers in `0..=255` | BINARY |
//!
//! Descriptors have no JSON form; they render as their numeric value and
//! cannot be read back.

use std::os::fd::AsRawFd;

use nvprims_nv::{NvError, NvList, NvValue, NVLIST_MAX_LEVEL};
use serde_json::{Map, Value};

/// Errors converting JSON into a list.
#[derive(Debug, thiserror::Error)]
pub enum JsonError {
    #[error("top-level JSON value must be an object")]
    NotAnObject,

    #[error("'{0}': only non-negative integers fit in a NUMBER")]
    UnsupportedNumber(String),

    #[error("'{0}': arrays must hold bytes (integers 0..=255)")]
    UnsupportedArray(String),

    #[error("objects nest deeper than {} levels", NVLIST_MAX_LEVEL)]
    TooDeep,

    #[error(transparent)]
    Nv(#[from] NvError),

    #[error("invalid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Parse JSON text into a list.
pub fn from_str(text: &str) -> Result<NvList, JsonError> {
    let value: Value = serde_json::from_str(text)?;
    from_value(&value)
}

/// Build a list from a JSON object.
pub fn from_value(value: &Value) -> Result<NvList, JsonError> {
    let Value::Object(map) = value else {
        return Err(JsonError::NotAnObject);
    };
    let nvl = build(map, 1)?;
    if let Some(err) = nvl.error() {
        return Err(JsonError::Nv(err.clone()));
    }
    Ok(nvl)
}

fn build(map: &Map<String, Value>, level: usize) -> Result<NvList, JsonError> {
    if level > NVLIST_MAX_LEVEL {
        return Err(JsonError::TooDeep);
    }
    let mut nvl = NvList::new();
    for (name, value) in map {
        match value {
            Value::Null => nvl.add_null(name),
            Value::Bool(b) => nvl.add_bool(name, *b),
            Value::Number(n) => match n.as_u64() {
                Some(n) => nvl.add_number(name, n),
                None => return Err(JsonError::UnsupportedNumber(name.clone())),
            },
            Value::String(s) => nvl.add_string(name, s),
            Value::Array(items) => {
                let bytes = items
                    .iter()
                    .map(|item| item.as_u64().and_then(|b| u8::try_from(b).ok()))
                    .collect::<Option<Vec<u8>>>()
                    .ok_or_else(|| JsonError::UnsupportedArray(name.clone()))?;
                nvl.move_binary(name, bytes);
            }
            Value::Object(child) => nvl.move_nvlist(name, build(child, level + 1)?),
        }
    }
    Ok(nvl)
}

/// Render a list as a JSON object, keeping pair order.
///
/// # Panics
///
/// If `nvl` carries a sticky error.
pub fn to_value(nvl: &NvList) -> Value {
    let mut map = Map::new();
    for pair in nvl {
        let value = match pair.value() {
            NvValue::Null => Value::Null,
            NvValue::Bool(b) => Value::Bool(*b),
            NvValue::Number(n) => Value::from(*n),
            NvValue::String(s) => Value::String(s.clone()),
            NvValue::NvList(child) => to_value(child),
            NvValue::Descriptor(fd) => Value::from(fd.as_raw_fd()),
            NvValue::Binary(bytes) => {
                Value::Array(bytes.iter().map(|&b| Value::from(b)).collect())
            }
        };
        map.insert(pair.name().to_owned(), value);
    }
    Value::Object(map)
}
