//! Grouped outbound listing.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::classify::classifier::{classify_tag, is_builtin, is_logical, is_proxy_protocol, GroupName};
use crate::document::FieldShape;

/// One display group with the nodes it contains.
#[derive(Debug, Clone, Serialize)]
pub struct NodeGroup {
    pub name: GroupName,
    pub nodes: Vec<Value>,
}

/// Group one outbound by declared type. `None` for built-ins.
pub fn group_of(outbound: &Map<String, Value>) -> Option<GroupName> {
    let kind = outbound.get("type").and_then(Value::as_str).unwrap_or_default();
    if is_builtin(kind) {
        return None;
    }
    if is_proxy_protocol(kind) {
        return Some(GroupName::Proxy);
    }
    if is_logical(kind) {
        let filtered = FieldShape::of(outbound.get("include")).has_content()
            || FieldShape::of(outbound.get("exclude")).has_content();
        return Some(if filtered {
            GroupName::NodeFilter
        } else {
            GroupName::ApplicationRouting
        });
    }
    Some(GroupName::Type(kind.to_string()))
}

/// Build the grouped listing.
///
/// Each node is a copy of the stored entry with a 1-based `id` (its
/// position among all outbounds, so it can be passed to delete) prepended.
/// Logical nodes also carry the tag classifier's verdict as `category`.
/// Groups come out as proxy, application routing, node filter, then other
/// types in first-seen order.
pub fn group_outbounds(outbounds: &[Value]) -> Vec<NodeGroup> {
    let mut fixed: [Vec<Value>; 3] = Default::default();
    let mut others: Vec<(GroupName, Vec<Value>)> = Vec::new();
    let mut other_index: HashMap<GroupName, usize> = HashMap::new();

    for (position, entry) in outbounds.iter().enumerate() {
        let Some(outbound) = entry.as_object() else {
            continue;
        };
        let Some(group) = group_of(outbound) else {
            continue;
        };

        let mut node = Map::new();
        node.insert("id".to_string(), Value::from(position + 1));
        for (key, value) in outbound {
            node.insert(key.clone(), value.clone());
        }
        let kind = outbound.get("type").and_then(Value::as_str).unwrap_or_default();
        if is_logical(kind) {
            let tag = outbound.get("tag").and_then(Value::as_str).unwrap_or_default();
            node.insert(
                "category".to_string(),
                Value::String(classify_tag(tag).as_str().to_string()),
            );
        }
        let node = Value::Object(node);

        match group {
            GroupName::Proxy => fixed[0].push(node),
            GroupName::ApplicationRouting => fixed[1].push(node),
            GroupName::NodeFilter => fixed[2].push(node),
            other => {
                let slot = *other_index.entry(other.clone()).or_insert_with(|| {
                    others.push((other, Vec::new()));
                    others.len() - 1
                });
                others[slot].1.push(node);
            }
        }
    }

    let [proxy, routing, filter] = fixed;
    let mut groups: Vec<NodeGroup> = [
        (GroupName::Proxy, proxy),
        (GroupName::ApplicationRouting, routing),
        (GroupName::NodeFilter, filter),
    ]
    .into_iter()
    .chain(others)
    .filter(|(_, nodes)| !nodes.is_empty())
    .map(|(name, nodes)| NodeGroup { name, nodes })
    .collect();

    if groups.is_empty() {
        groups.push(NodeGroup {
            name: GroupName::Default,
            nodes: Vec::new(),
        });
    }
    groups
}
