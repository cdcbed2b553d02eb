//! Canonical request keys

use serde_json::Value;

/// Build the deduplication key for a request.
///
/// The method is upper-cased and object keys in `params` are sorted at every
/// depth, so `{a:1,b:2}` and `{b:2,a:1}` produce the same key. Missing params
/// are equivalent to an empty object.
pub fn request_key(method: &str, url: &str, params: Option<&Value>) -> String {
    let params = params.map(canonical_params).unwrap_or_else(|| "{}".to_string());
    format!("{}:{}:{}", method.to_ascii_uppercase(), url, params)
}

/// Serialize a JSON value with object keys sorted lexicographically.
pub fn canonical_params(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();

            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
