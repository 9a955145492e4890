use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Number, Value};

pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// One value in an ordered field list
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Bool(bool),
    Number(Number),
    /// Encoded as ISO-8601 with milliseconds, e.g. `2020-01-01T00:00:00.000Z`
    Date(DateTime<Utc>),
    Json(Value),
}

impl FieldValue {
    /// Text form used in `key=value` pairs, before percent-encoding.
    /// `None` means the field is skipped.
    fn as_form_text(&self) -> Option<String> {
        match self {
            FieldValue::Text(s) => Some(s.clone()),
            FieldValue::Bool(b) => Some(b.to_string()),
            FieldValue::Number(n) => Some(n.to_string()),
            FieldValue::Date(d) => Some(iso_millis(d)),
            FieldValue::Json(v) => json_form_text(v),
        }
    }

    fn to_json(&self) -> Value {
        match self {
            FieldValue::Text(s) => Value::String(s.clone()),
            FieldValue::Bool(b) => Value::Bool(*b),
            FieldValue::Number(n) => Value::Number(n.clone()),
            FieldValue::Date(d) => Value::String(iso_millis(d)),
            FieldValue::Json(v) => v.clone(),
        }
    }
}

fn iso_millis(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn json_form_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Number(value.into())
    }
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        FieldValue::Number(value.into())
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Number::from_f64(value)
            .map(FieldValue::Number)
            .unwrap_or(FieldValue::Json(Value::Null))
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        FieldValue::Date(value)
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        FieldValue::Json(value)
    }
}

/// Ordered key/value fields; key order is preserved in both encodings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields(Vec<(String, FieldValue)>);

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.0.push((key.into(), value.into()));
        self
    }

    /// Adds the field only when a value is present
    pub fn with_opt<V: Into<FieldValue>>(self, key: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(v) => self.with(key, v),
            None => self,
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `k1=v1&k2=v2` with every key and value percent-encoded
    pub fn to_form_string(&self) -> String {
        self.0
            .iter()
            .filter_map(|(key, value)| {
                value.as_form_text().map(|text| {
                    format!("{}={}", urlencoding::encode(key), urlencoding::encode(&text))
                })
            })
            .collect::<Vec<_>>()
            .join("&")
    }

    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .0
            .iter()
            .map(|(key, value)| (key.clone(), value.to_json()))
            .collect();
        Value::Object(map)
    }
}

/// Request payload
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(Value),
    Fields(Fields),
    /// Sent as-is regardless of content type
    Raw(String),
}

impl RequestBody {
    /// Serializes the body; `form` selects `application/x-www-form-urlencoded`
    pub fn encode(&self, form: bool) -> Result<String, serde_json::Error> {
        match (self, form) {
            (RequestBody::Raw(raw), _) => Ok(raw.clone()),
            (RequestBody::Fields(fields), true) => Ok(fields.to_form_string()),
            (RequestBody::Fields(fields), false) => serde_json::to_string(&fields.to_json()),
            (RequestBody::Json(Value::Object(map)), true) => Ok(map
                .iter()
                .filter_map(|(key, value)| {
                    json_form_text(value).map(|text| {
                        format!("{}={}", urlencoding::encode(key), urlencoding::encode(&text))
                    })
                })
                .collect::<Vec<_>>()
                .join("&")),
            (RequestBody::Json(value), _) => serde_json::to_string(value),
        }
    }
}

impl From<Value> for RequestBody {
    fn from(value: Value) -> Self {
        RequestBody::Json(value)
    }
}

impl From<Fields> for RequestBody {
    fn from(fields: Fields) -> Self {
        RequestBody::Fields(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn new_year_2020() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn should_form_encode_bool_and_date_in_insertion_order() {
        // Arrange
        let fields = Fields::new().with("a", true).with("b", new_year_2020());

        // Act
        let encoded = RequestBody::from(fields).encode(true).unwrap();

        // Assert
        assert_eq!(encoded, "a=true&b=2020-01-01T00%3A00%3A00.000Z");
    }

    #[test]
    fn should_percent_encode_keys_and_values() {
        let fields = Fields::new().with("user name", "a&b=c");

        assert_eq!(fields.to_form_string(), "user%20name=a%26b%3Dc");
    }

    #[test]
    fn should_skip_absent_fields() {
        let fields = Fields::new()
            .with("a", 1i64)
            .with_opt("b", None::<&str>)
            .with("c", Value::Null);

        assert_eq!(fields.to_form_string(), "a=1");
    }

    #[test]
    fn should_encode_fields_as_json_without_form_content_type() {
        let fields = Fields::new().with("a", true).with("b", new_year_2020());

        let encoded = RequestBody::from(fields).encode(false).unwrap();
        let value: Value = serde_json::from_str(&encoded).unwrap();

        assert_eq!(value, json!({"a": true, "b": "2020-01-01T00:00:00.000Z"}));
    }

    #[test]
    fn should_form_encode_json_objects() {
        let body = RequestBody::Json(json!({"grant_type": "client_credentials"}));

        assert_eq!(body.encode(true).unwrap(), "grant_type=client_credentials");
    }

    #[test]
    fn should_pass_raw_body_through() {
        let body = RequestBody::Raw("already=encoded".to_string());

        assert_eq!(body.encode(false).unwrap(), "already=encoded");
        assert_eq!(body.encode(true).unwrap(), "already=encoded");
    }
}
