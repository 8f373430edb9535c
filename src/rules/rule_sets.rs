//! Rule table view: route rules plus the rule-set registry.

use serde::Serialize;
use serde_json::Value;

use crate::rules::projector::{project_rules, ProjectedRule};

/// Rule-set entry as listed. `id` is 1-based for display; edits address
/// rule sets by 0-based index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleSetEntry {
    pub id: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_detour: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_interval: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RulesView {
    #[serde(rename = "routeRules")]
    pub route_rules: Vec<ProjectedRule>,
    #[serde(rename = "ruleSets")]
    pub rule_sets: Vec<RuleSetEntry>,
}

impl RulesView {
    pub fn build(rules: &[Value], rule_sets: &[Value]) -> Self {
        Self {
            route_rules: project_rules(rules),
            rule_sets: list_rule_sets(rule_sets),
        }
    }
}

/// Only string-valued fields are listed; non-object entries are skipped
/// but still count toward the position.
pub fn list_rule_sets(rule_sets: &[Value]) -> Vec<RuleSetEntry> {
    rule_sets
        .iter()
        .enumerate()
        .filter_map(|(i, entry)| {
            let map = entry.as_object()?;
            let text = |key: &str| map.get(key).and_then(Value::as_str).map(str::to_string);
            Some(RuleSetEntry {
                id: i + 1,
                tag: text("tag"),
                kind: text("type"),
                format: text("format"),
                url: text("url"),
                path: text("path"),
                download_detour: text("download_detour"),
                update_interval: text("update_interval"),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_list_rule_sets() {
        let sets = vec![
            json!({"tag": "geosite-cn", "type": "remote", "format": "binary",
                   "url": "https://example.com/cn.srs", "download_detour": "proxy"}),
            json!({"tag": "local-ads", "type": "local", "path": "/etc/ads.srs", "update_interval": 1}),
        ];
        let listed = list_rule_sets(&sets);
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, 1);
        assert_eq!(listed[0].download_detour.as_deref(), Some("proxy"));
        assert_eq!(listed[1].path.as_deref(), Some("/etc/ads.srs"));
        assert_eq!(listed[1].update_interval, None);
    }

    #[test]
    fn test_view_json_names() {
        let view = RulesView::build(
            &[json!({"geosite": "cn", "outbound": "direct"})],
            &[json!({"tag": "geosite-cn", "type": "remote"})],
        );
        let value = serde_json::to_value(&view).unwrap();
        assert_eq!(value["routeRules"][0]["conditions"][0]["type"], "geosite");
        assert_eq!(value["ruleSets"][0]["type"], "remote");
        assert!(value["ruleSets"][0].get("url").is_none());
    }
}
