//! Conversions between script values and what the host shows or stores.

use rhai::{Array, Dynamic, FLOAT, FnPtr, INT, ImmutableString, Map};
use serde_json::Value;

use super::api::commands::Commands;
use super::api::surface::Surface;
use super::pending::Pending;
use super::repl::Repl;

/// Runtime type name reported alongside an echoed value
pub fn kind_of(value: &Dynamic) -> String {
    let kind = if value.is_unit() {
        "undefined"
    } else if value.is::<INT>() || value.is::<FLOAT>() {
        "number"
    } else if value.is::<ImmutableString>() || value.is::<char>() {
        "string"
    } else if value.is::<bool>() {
        "boolean"
    } else if value.is::<Array>() {
        "array"
    } else if value.is::<Map>() {
        "object"
    } else if value.is::<FnPtr>() {
        "function"
    } else {
        // Custom types carry their full Rust path
        return value
            .type_name()
            .rsplit("::")
            .next()
            .unwrap_or_default()
            .to_string();
    };
    kind.to_string()
}

/// Results that are not worth echoing: `()` and the empty object
pub fn is_silent(value: &Dynamic) -> bool {
    value.is_unit() || value.read_lock::<Map>().is_some_and(|map| map.is_empty())
}

/// Text shown for a value; strings are shown without quotes
pub fn display(value: &Dynamic) -> String {
    if value.is_unit() {
        return "()".to_string();
    }
    if let Some(text) = value.read_lock::<ImmutableString>() {
        return text.to_string();
    }
    if let Some(pending) = value.read_lock::<Pending>() {
        return pending.to_string();
    }
    if let Some(repl) = value.read_lock::<Repl>() {
        return repl.to_string();
    }
    if let Some(surface) = value.read_lock::<Surface>() {
        return surface.to_string();
    }
    if let Some(commands) = value.read_lock::<Commands>() {
        return commands.to_string();
    }
    value.to_string()
}

pub fn to_json(value: &Dynamic) -> Value {
    if value.is_unit() {
        return Value::Null;
    }
    if let Ok(flag) = value.as_bool() {
        return Value::Bool(flag);
    }
    if let Ok(n) = value.as_int() {
        return Value::from(n);
    }
    if let Ok(f) = value.as_float() {
        return serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number);
    }
    if let Some(array) = value.read_lock::<Array>() {
        return Value::Array(array.iter().map(to_json).collect());
    }
    if let Some(map) = value.read_lock::<Map>() {
        return Value::Object(
            map.iter()
                .map(|(k, v)| (k.to_string(), to_json(v)))
                .collect(),
        );
    }
    Value::String(display(value))
}

pub fn from_json(value: &Value) -> Dynamic {
    match value {
        Value::Null => Dynamic::UNIT,
        Value::Bool(flag) => Dynamic::from(*flag),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Dynamic::from(i as INT),
            None => Dynamic::from(n.as_f64().unwrap_or_default() as FLOAT),
        },
        Value::String(s) => Dynamic::from(s.clone()),
        Value::Array(items) => Dynamic::from_array(items.iter().map(from_json).collect()),
        Value::Object(entries) => Dynamic::from_map(
            entries
                .iter()
                .map(|(k, v)| (k.as_str().into(), from_json(v)))
                .collect(),
        ),
    }
}
