//! Text renderings of metadata values.

use serde_json::Value;

/// Quote a value the way validation messages refer to it.
///
/// Strings are single-quoted so that `'10'` and `10` read differently.
pub fn quote(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => quote_str(s),
        Value::Array(items) => {
            let inner: Vec<String> = items.iter().map(quote).collect();
            format!("[{}]", inner.join(", "))
        }
        Value::Object(map) => {
            let inner: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{}: {}", quote_str(k), quote(v)))
                .collect();
            format!("{{{}}}", inner.join(", "))
        }
    }
}

pub fn quote_str(s: &str) -> String {
    if s.contains('\'') && !s.contains('"') {
        format!("\"{}\"", s)
    } else {
        format!("'{}'", s.replace('\'', "\\'"))
    }
}

/// Render a value without quoting strings, for error messages aimed at users.
pub fn plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Render a value as the right-hand side of a `name: value` summary line.
///
/// Strings stay bare unless YAML would read them back as something else.
/// Multi-line strings and everything else are written as inline JSON, which
/// is valid YAML flow and keeps line breaks exact.
pub fn summary_value(value: &Value) -> String {
    match value {
        Value::String(s) if s.contains(['\n', '\r']) => value.to_string(),
        Value::String(s) => match serde_yaml::to_string(s) {
            Ok(yaml) => yaml.trim_end_matches('\n').to_string(),
            Err(_) => value.to_string(),
        },
        other => other.to_string(),
    }
}
