//! Route rule projection.
//!
//! Turns a stored rule (an open bag of match fields) into the flat,
//! ordered condition list the rule table displays.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::document::model::{scalar_text, FieldShape};

/// Match keys shown as conditions, in display order.
pub const CONDITION_KEYS: [&str; 25] = [
    "domain",
    "domain_suffix",
    "domain_keyword",
    "domain_regex",
    "ip_cidr",
    "geoip",
    "geosite",
    "source_geoip",
    "inbound",
    "protocol",
    "network",
    "auth_user",
    "port",
    "port_range",
    "source_port",
    "source_port_range",
    "source_ip_cidr",
    "process_name",
    "process_path",
    "package_name",
    "user",
    "user_id",
    "clash_mode",
    "rule_set",
    "ip_is_private",
];

const DISPLAY_LIMIT: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Condition {
    #[serde(rename = "type")]
    pub kind: String,
    pub content: String,
}

/// Display form of one route rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectedRule {
    /// 1-based position at projection time.
    pub id: String,
    pub conditions: Vec<Condition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outbound: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_version: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invert: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_is_private: Option<Value>,
}

/// Join values for display: all of them when there are at most three,
/// otherwise the first three and a count of the rest.
pub fn display_text(values: &[String]) -> String {
    if values.len() <= DISPLAY_LIMIT {
        return values.join(", ");
    }
    format!(
        "{} ... (+{} more)",
        values[..DISPLAY_LIMIT].join(", "),
        values.len() - DISPLAY_LIMIT
    )
}

pub fn project_rule(rule: &Map<String, Value>, position: usize) -> ProjectedRule {
    let mut conditions: Vec<Condition> = CONDITION_KEYS
        .iter()
        .filter_map(|key| {
            let values = FieldShape::of(rule.get(*key)).into_list();
            if values.is_empty() {
                return None;
            }
            Some(Condition {
                kind: key.to_string(),
                content: display_text(&values),
            })
        })
        .collect();

    if conditions.is_empty() {
        conditions.push(Condition {
            kind: "unknown".to_string(),
            content: "composite rule".to_string(),
        });
    }

    ProjectedRule {
        id: position.to_string(),
        conditions,
        outbound: rule.get("outbound").map(scalar_text),
        action: rule.get("action").map(scalar_text),
        ip_version: rule.get("ip_version").map(integral),
        invert: rule.get("invert").cloned(),
        network: rule
            .get("network")
            .map(|v| display_text(&FieldShape::of(Some(v)).into_list())),
        ip_is_private: rule.get("ip_is_private").cloned(),
    }
}

/// Project every rule; entries that are not objects project as composite.
pub fn project_rules(rules: &[Value]) -> Vec<ProjectedRule> {
    let empty = Map::new();
    rules
        .iter()
        .enumerate()
        .map(|(i, rule)| project_rule(rule.as_object().unwrap_or(&empty), i + 1))
        .collect()
}

// Whole floats such as `4.0` display as `4`.
fn integral(value: &Value) -> Value {
    match value.as_f64() {
        Some(n) if n.fract() == 0.0 && value.is_f64() => Value::from(n as i64),
        _ => value.clone(),
    }
}
