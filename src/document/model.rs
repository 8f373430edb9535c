//! Typed views over the engine configuration.
//!
//! The engine schema is polymorphic: most match fields may be a single
//! scalar, a list, or missing, and `route.rule_set` may be one object or an
//! array of them. The types here absorb that variance so the classifier,
//! projector and mutation engine all see one normalized shape.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Keys the listing endpoints add to entries for display. They are removed
/// from request bodies before an entry is written back to the document.
pub const DISPLAY_ONLY_KEYS: [&str; 3] = ["id", "category", "conditions"];

/// Shape of a match field that may be a scalar, a list, or missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldShape {
    Absent,
    Scalar(String),
    List(Vec<String>),
}

impl FieldShape {
    /// Classify a raw JSON value. `null` counts as absent.
    pub fn of(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => FieldShape::Absent,
            Some(Value::Array(items)) => {
                FieldShape::List(items.iter().map(scalar_text).collect())
            }
            Some(other) => FieldShape::Scalar(scalar_text(other)),
        }
    }

    /// Normalize to a list: a scalar becomes a one-element list.
    pub fn into_list(self) -> Vec<String> {
        match self {
            FieldShape::Absent => Vec::new(),
            FieldShape::Scalar(value) => vec![value],
            FieldShape::List(values) => values,
        }
    }

    /// True when the field carries at least one non-empty value.
    pub fn has_content(&self) -> bool {
        match self {
            FieldShape::Absent => false,
            FieldShape::Scalar(value) => !value.is_empty(),
            FieldShape::List(values) => values.iter().any(|v| !v.is_empty()),
        }
    }
}

/// Render a JSON scalar the way it reads in the file: strings unquoted,
/// everything else in its JSON form.
pub fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// A value that the engine accepts either bare or wrapped in an array.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }
}

/// Strict-mode root. Only the sections this crate reads are declared;
/// everything else is dropped on decode, so never write this back.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub inbounds: Vec<Inbound>,
    pub outbounds: Vec<Outbound>,
    pub route: Option<Route>,
}

/// Listener entry. Read-only in this crate.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Inbound {
    #[serde(default)]
    pub tag: String,

    #[serde(rename = "type", default)]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listen: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listen_port: Option<u16>,
}

impl Inbound {
    /// Human label for the inbound protocol.
    pub fn protocol_label(&self) -> &str {
        match self.kind.as_str() {
            "http" => "HTTP",
            "socks" => "SOCKS5",
            "mixed" => "HTTP/SOCKS5",
            "tun" => "TUN",
            "shadowsocks" => "Shadowsocks",
            other => other,
        }
    }
}

/// Egress node. `tag` and `type` are required; every other field is kept
/// verbatim in `extra` so a decode/encode cycle is lossless.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Outbound {
    pub tag: String,

    #[serde(rename = "type")]
    pub kind: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Outbound {
    /// Decode a request body, dropping display-only keys added by listings.
    pub fn from_request(value: Value) -> Result<Self, serde_json::Error> {
        let mut outbound: Outbound = serde_json::from_value(value)?;
        for key in DISPLAY_ONLY_KEYS {
            outbound.extra.shift_remove(key);
        }
        Ok(outbound)
    }

    pub fn into_value(self) -> Value {
        let mut map = Map::new();
        map.insert("tag".to_string(), Value::String(self.tag));
        map.insert("type".to_string(), Value::String(self.kind));
        map.extend(self.extra);
        Value::Object(map)
    }
}

/// Strict-mode routing section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Route {
    pub rules: Vec<Map<String, Value>>,
    pub rule_set: Option<OneOrMany<RuleSet>>,
    #[serde(rename = "final")]
    pub final_outbound: Option<String>,
}

/// A route rule body: an open bag of match predicates plus one result.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct RouteRule(pub Map<String, Value>);

impl RouteRule {
    /// Decode a request body, dropping display-only keys added by listings.
    pub fn from_request(value: Value) -> Result<Self, serde_json::Error> {
        let mut rule: RouteRule = serde_json::from_value(value)?;
        for key in DISPLAY_ONLY_KEYS {
            rule.0.shift_remove(key);
        }
        Ok(rule)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

/// Externally sourced rule collection referenced by route rules.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RuleSet {
    pub tag: String,

    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_detour: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_interval: Option<String>,
}

impl RuleSet {
    /// Encode for the document. Empty optional strings are left out.
    pub fn into_value(self) -> Value {
        let mut map = Map::new();
        map.insert("tag".to_string(), Value::String(self.tag));
        map.insert("type".to_string(), Value::String(self.kind));
        let optional = [
            ("format", self.format),
            ("url", self.url),
            ("path", self.path),
            ("download_detour", self.download_detour),
            ("update_interval", self.update_interval),
        ];
        for (key, value) in optional {
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                map.insert(key.to_string(), Value::String(value));
            }
        }
        Value::Object(map)
    }
}
