// Tagged-value wire codec for the REST fallback transport.
//
// The wire shape is a closed union with exactly these tags: stringValue,
// integerValue, booleanValue, nullValue, timestampValue, mapValue,
// arrayValue. Two asymmetries are part of the format and must not be
// "fixed": non-integral numbers are floored into integerValue on encode, and
// the top-level `id` field is never carried in the payload (it is derived
// from the store path on decode).

use chrono::DateTime;
use serde_json::{json, Map, Value};

const ID_FIELD: &str = "id";

/// Encode one value into its wire representation.
pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => {
            // The union has no float tag. Fractional values are floored,
            // not rounded.
            let i = if let Some(i) = n.as_i64() {
                i
            } else {
                n.as_f64().map(f64::floor).unwrap_or(0.0) as i64
            };
            json!({ "integerValue": i.to_string() })
        }
        Value::String(s) => {
            if DateTime::parse_from_rfc3339(s).is_ok() {
                json!({ "timestampValue": s })
            } else {
                json!({ "stringValue": s })
            }
        }
        Value::Array(items) => {
            let values: Vec<Value> = items.iter().map(encode_value).collect();
            json!({ "arrayValue": { "values": values } })
        }
        Value::Object(fields) => {
            json!({ "mapValue": { "fields": encode_map(fields) } })
        }
    }
}

/// Encode a document's fields. The `id` field is dropped: on the wire a
/// document's id lives in its path, not its payload.
pub fn encode_document(fields: &Map<String, Value>) -> Value {
    let wire: Map<String, Value> = fields
        .iter()
        .filter(|(name, _)| name.as_str() != ID_FIELD)
        .map(|(name, value)| (name.clone(), encode_value(value)))
        .collect();
    Value::Object(wire)
}

fn encode_map(fields: &Map<String, Value>) -> Value {
    let wire: Map<String, Value> = fields
        .iter()
        .map(|(name, value)| (name.clone(), encode_value(value)))
        .collect();
    Value::Object(wire)
}

/// Decode one wire value. Unknown or absent tags decode to null.
pub fn decode_value(wire: &Value) -> Value {
    let Some(obj) = wire.as_object() else {
        return Value::Null;
    };

    if let Some(s) = obj.get("stringValue").and_then(Value::as_str) {
        return Value::String(s.to_string());
    }
    if let Some(raw) = obj.get("integerValue") {
        let parsed = match raw {
            Value::String(s) => s.parse::<i64>().ok(),
            Value::Number(n) => n.as_i64(),
            _ => None,
        };
        return parsed.map(Value::from).unwrap_or(Value::Null);
    }
    if let Some(b) = obj.get("booleanValue").and_then(Value::as_bool) {
        return Value::Bool(b);
    }
    if let Some(s) = obj.get("timestampValue").and_then(Value::as_str) {
        return Value::String(s.to_string());
    }
    if obj.contains_key("nullValue") {
        return Value::Null;
    }
    if let Some(map) = obj.get("mapValue") {
        let fields = map.get("fields").and_then(Value::as_object);
        let decoded: Map<String, Value> = fields
            .map(|f| {
                f.iter()
                    .map(|(name, value)| (name.clone(), decode_value(value)))
                    .collect()
            })
            .unwrap_or_default();
        return Value::Object(decoded);
    }
    if let Some(array) = obj.get("arrayValue") {
        let values = array.get("values").and_then(Value::as_array);
        let decoded: Vec<Value> = values
            .map(|v| v.iter().map(decode_value).collect())
            .unwrap_or_default();
        return Value::Array(decoded);
    }

    Value::Null
}

/// Decode a document payload, reattaching the id derived from the store path.
pub fn decode_document(wire_fields: &Value, id: &str) -> Map<String, Value> {
    let mut fields: Map<String, Value> = wire_fields
        .as_object()
        .map(|obj| {
            obj.iter()
                .map(|(name, value)| (name.clone(), decode_value(value)))
                .collect()
        })
        .unwrap_or_default();
    fields.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
    fields
}
