//! Placeholder substitution for alert messages and gateway requests.
//!
//! Templates are plain strings containing `{name}` placeholders. Rendering
//! replaces every occurrence of each provided variable, in the order the
//! variables are given. Placeholders with no matching variable are left
//! intact, so configurations can pass literal braces through to downstream
//! systems.

use serde_json::Value;

/// Substitute variables into a template string.
///
/// Variables are applied in slice order, so a value substituted early can
/// itself contain a placeholder that a later variable fills in.
pub fn render_str(template: &str, vars: &[(&str, String)]) -> String {
    let mut out = template.to_string();
    for (key, value) in vars {
        out = out.replace(&format!("{{{key}}}"), value);
    }
    out
}

/// Substitute variables into every string inside a JSON value.
///
/// Recurses through arrays and objects; object keys, numbers, booleans and
/// nulls pass through unchanged.
pub fn render_value(value: &Value, vars: &[(&str, String)]) -> Value {
    match value {
        Value::String(text) => Value::String(render_str(text, vars)),
        Value::Array(items) => Value::Array(items.iter().map(|v| render_value(v, vars)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), render_value(v, vars)))
                .collect(),
        ),
        other => other.clone(),
    }
}
