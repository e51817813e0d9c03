//! # Typed Step Snapshots
//!
//! A debug step result is a partial view of the request or response after a policy
//! ran. Instead of a free-form map, each phase has its own struct whose fields
//! record three states: absent, explicitly `null`, or set. A key present in a step
//! result replaces the accumulated value wholesale, an absent key leaves it
//! untouched.
//!
//! ## Merge Semantics
//! - Shallow: `headers`, `attributes` and parameter maps are replaced, never merged
//! - `error.*` keys are independent fields and are replaced one by one
//! - A JSON `null` clears the field; the key stays present and serializes as `null`

use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::debug::event::Phase;

/// Multi-valued map used for headers and request parameters
pub type MultiValueMap = BTreeMap<String, Vec<String>>;

/// Execution context attributes
pub type Attributes = BTreeMap<String, Value>;

/// Snapshot field: `None` when the key was never seen, `Some(None)` when it was
/// set to `null`
pub type Nullable<T> = Option<Option<T>>;

/// Error fields a policy may set when it interrupts the chain
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorFields {
    #[serde(
        rename = "error.message",
        default,
        deserialize_with = "nullable_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub message: Nullable<String>,

    #[serde(
        rename = "error.key",
        default,
        deserialize_with = "nullable_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub key: Nullable<String>,

    #[serde(
        rename = "error.status",
        default,
        deserialize_with = "nullable_u16",
        skip_serializing_if = "Option::is_none"
    )]
    pub status: Nullable<u16>,

    #[serde(
        rename = "error.contentType",
        default,
        deserialize_with = "nullable_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub content_type: Nullable<String>,
}

impl ErrorFields {
    pub fn message(&self) -> Option<&str> {
        value(&self.message).map(String::as_str)
    }

    pub fn key(&self) -> Option<&str> {
        value(&self.key).map(String::as_str)
    }

    pub fn status(&self) -> Option<u16> {
        value(&self.status).copied()
    }

    pub fn content_type(&self) -> Option<&str> {
        value(&self.content_type).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.message().is_none()
            && self.key().is_none()
            && self.status().is_none()
            && self.content_type().is_none()
    }

    /// `(key, value)` pairs in display order, absent fields included as `None`
    pub fn entries(&self) -> Vec<(&'static str, Option<String>)> {
        vec![
            ("error.contentType", self.content_type().map(str::to_string)),
            ("error.key", self.key().map(str::to_string)),
            ("error.message", self.message().map(str::to_string)),
            ("error.status", self.status().map(|s| s.to_string())),
        ]
    }

    fn merge(&mut self, patch: &ErrorFields) {
        replace_if_present(&mut self.message, &patch.message);
        replace_if_present(&mut self.key, &patch.key);
        replace_if_present(&mut self.status, &patch.status);
        replace_if_present(&mut self.content_type, &patch.content_type);
    }
}

/// Cumulative state of one phase (request or response)
pub trait PhaseSnapshot:
    Clone + Default + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Phase whose steps may patch this snapshot
    const PHASE: Phase;

    /// Shallow merge: every field present in `patch`, `null` included, replaces
    /// the field in `self`
    fn merge(&mut self, patch: &Self);

    fn attributes(&self) -> Option<&Attributes>;

    fn set_attributes(&mut self, attributes: Attributes);

    fn headers(&self) -> Option<&MultiValueMap>;

    fn body(&self) -> Option<&str>;

    fn errors(&self) -> &ErrorFields;

    /// Rows of the "HTTP properties" table
    fn properties(&self) -> BTreeMap<String, String>;

    /// Decode a raw step result map
    fn from_result(result: &serde_json::Map<String, Value>) -> serde_json::Result<Self> {
        serde_json::from_value(Value::Object(result.clone()))
    }
}

/// Request side of a debug step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSnapshot {
    #[serde(default, deserialize_with = "nullable_string", skip_serializing_if = "Option::is_none")]
    pub method: Nullable<String>,

    #[serde(default, deserialize_with = "nullable_string", skip_serializing_if = "Option::is_none")]
    pub path: Nullable<String>,

    #[serde(default, deserialize_with = "nullable_string", skip_serializing_if = "Option::is_none")]
    pub context_path: Nullable<String>,

    #[serde(default, deserialize_with = "nullable_multi_value_map", skip_serializing_if = "Option::is_none")]
    pub path_parameters: Nullable<MultiValueMap>,

    #[serde(default, deserialize_with = "nullable_multi_value_map", skip_serializing_if = "Option::is_none")]
    pub parameters: Nullable<MultiValueMap>,

    #[serde(default, deserialize_with = "nullable_multi_value_map", skip_serializing_if = "Option::is_none")]
    pub headers: Nullable<MultiValueMap>,

    #[serde(default, deserialize_with = "nullable_string", skip_serializing_if = "Option::is_none")]
    pub body: Nullable<String>,

    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub attributes: Nullable<Attributes>,

    #[serde(flatten)]
    pub error: ErrorFields,
}

impl RequestSnapshot {
    pub fn method(&self) -> Option<&str> {
        value(&self.method).map(String::as_str)
    }

    pub fn path(&self) -> Option<&str> {
        value(&self.path).map(String::as_str)
    }

    pub fn context_path(&self) -> Option<&str> {
        value(&self.context_path).map(String::as_str)
    }
}

impl PhaseSnapshot for RequestSnapshot {
    const PHASE: Phase = Phase::Request;

    fn merge(&mut self, patch: &Self) {
        replace_if_present(&mut self.method, &patch.method);
        replace_if_present(&mut self.path, &patch.path);
        replace_if_present(&mut self.context_path, &patch.context_path);
        replace_if_present(&mut self.path_parameters, &patch.path_parameters);
        replace_if_present(&mut self.parameters, &patch.parameters);
        replace_if_present(&mut self.headers, &patch.headers);
        replace_if_present(&mut self.body, &patch.body);
        replace_if_present(&mut self.attributes, &patch.attributes);
        self.error.merge(&patch.error);
    }

    fn attributes(&self) -> Option<&Attributes> {
        value(&self.attributes)
    }

    fn set_attributes(&mut self, attributes: Attributes) {
        self.attributes = Some(Some(attributes));
    }

    fn headers(&self) -> Option<&MultiValueMap> {
        value(&self.headers)
    }

    fn body(&self) -> Option<&str> {
        value(&self.body).map(String::as_str)
    }

    fn errors(&self) -> &ErrorFields {
        &self.error
    }

    fn properties(&self) -> BTreeMap<String, String> {
        let mut rows = BTreeMap::new();
        insert_non_empty(&mut rows, "method", self.method());
        insert_non_empty(&mut rows, "path", self.path());
        insert_non_empty(&mut rows, "contextPath", self.context_path());
        if let Some(params) = value(&self.path_parameters) {
            for (name, values) in params {
                rows.insert(format!("pathParameters.{}", name), values.join(", "));
            }
        }
        if let Some(params) = value(&self.parameters) {
            for (name, values) in params {
                rows.insert(format!("parameters.{}", name), values.join(", "));
            }
        }
        rows
    }
}

/// Response side of a debug step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseSnapshot {
    #[serde(default, deserialize_with = "nullable_u16", skip_serializing_if = "Option::is_none")]
    pub status_code: Nullable<u16>,

    #[serde(default, deserialize_with = "nullable_string", skip_serializing_if = "Option::is_none")]
    pub reason: Nullable<String>,

    #[serde(default, deserialize_with = "nullable_multi_value_map", skip_serializing_if = "Option::is_none")]
    pub headers: Nullable<MultiValueMap>,

    #[serde(default, deserialize_with = "nullable_string", skip_serializing_if = "Option::is_none")]
    pub body: Nullable<String>,

    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub attributes: Nullable<Attributes>,

    #[serde(flatten)]
    pub error: ErrorFields,
}

impl ResponseSnapshot {
    pub fn status_code(&self) -> Option<u16> {
        value(&self.status_code).copied()
    }

    pub fn reason(&self) -> Option<&str> {
        value(&self.reason).map(String::as_str)
    }

    /// `"<code> - <reason>"`, using the canonical reason when none was captured
    pub fn status_line(&self) -> Option<String> {
        let code = self.status_code()?;
        let reason = self.reason().map(str::to_string).or_else(|| {
            reqwest::StatusCode::from_u16(code)
                .ok()
                .and_then(|status| status.canonical_reason())
                .map(str::to_string)
        });
        Some(match reason {
            Some(reason) => format!("{} - {}", code, reason),
            None => code.to_string(),
        })
    }
}

impl PhaseSnapshot for ResponseSnapshot {
    const PHASE: Phase = Phase::Response;

    fn merge(&mut self, patch: &Self) {
        replace_if_present(&mut self.status_code, &patch.status_code);
        replace_if_present(&mut self.reason, &patch.reason);
        replace_if_present(&mut self.headers, &patch.headers);
        replace_if_present(&mut self.body, &patch.body);
        replace_if_present(&mut self.attributes, &patch.attributes);
        self.error.merge(&patch.error);
    }

    fn attributes(&self) -> Option<&Attributes> {
        value(&self.attributes)
    }

    fn set_attributes(&mut self, attributes: Attributes) {
        self.attributes = Some(Some(attributes));
    }

    fn headers(&self) -> Option<&MultiValueMap> {
        value(&self.headers)
    }

    fn body(&self) -> Option<&str> {
        value(&self.body).map(String::as_str)
    }

    fn errors(&self) -> &ErrorFields {
        &self.error
    }

    fn properties(&self) -> BTreeMap<String, String> {
        let mut rows = BTreeMap::new();
        if let Some(code) = self.status_code() {
            rows.insert("statusCode".to_string(), code.to_string());
        }
        insert_non_empty(&mut rows, "reason", self.reason());
        rows
    }
}

/// Pretty print a JSON body, or return it untouched when it is not JSON
pub fn format_body(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => {
            serde_json::to_string_pretty(&value).unwrap_or_else(|_| body.to_string())
        }
        _ => body.to_string(),
    }
}

/// Render an attribute value for a table cell
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn value<T>(field: &Nullable<T>) -> Option<&T> {
    field.as_ref().and_then(Option::as_ref)
}

fn replace_if_present<T: Clone>(target: &mut Nullable<T>, patch: &Nullable<T>) {
    if patch.is_some() {
        target.clone_from(patch);
    }
}

fn insert_non_empty(rows: &mut BTreeMap<String, String>, key: &str, value: Option<&str>) {
    if let Some(value) = value.filter(|v| !v.is_empty()) {
        rows.insert(key.to_string(), value.to_string());
    }
}

fn scalar_to_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

// The deserializers below only run for keys that are present, so each of them
// returns `Some`, holding `None` for an explicit `null`.

fn nullable<'de, D, T>(deserializer: D) -> Result<Nullable<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn nullable_string<'de, D>(deserializer: D) -> Result<Nullable<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Some(Option::<Value>::deserialize(deserializer)?.map(scalar_to_string)))
}

fn nullable_u16<'de, D>(deserializer: D) -> Result<Nullable<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let value = match Option::<Value>::deserialize(deserializer)? {
        Some(value) => value,
        None => return Ok(Some(None)),
    };
    let code = match &value {
        Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    code.map(|code| Some(Some(code)))
        .ok_or_else(|| D::Error::custom(format!("invalid status code: {}", value)))
}

fn nullable_multi_value_map<'de, D>(deserializer: D) -> Result<Nullable<MultiValueMap>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<BTreeMap<String, Value>>::deserialize(deserializer)?;
    Ok(Some(raw.map(|entries| {
        entries
            .into_iter()
            .map(|(name, value)| {
                let values = match value {
                    Value::Array(items) => items.into_iter().map(scalar_to_string).collect(),
                    Value::Null => Vec::new(),
                    other => vec![scalar_to_string(other)],
                };
                (name, values)
            })
            .collect()
    })))
}
