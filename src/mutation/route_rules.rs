//! Route rule mutations. Rules are addressed by 1-based position.

use std::fmt;

use serde::Deserialize;
use serde_json::Value;

use crate::document::{Document, RouteRule};
use crate::mutation::error::MutationError;

/// A rule id as sent by clients: `"3"` and `3` are both accepted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RuleId {
    Number(i64),
    Text(String),
}

impl RuleId {
    /// Resolve to a 0-based index into a list of `len` rules.
    pub fn index(&self, len: usize) -> Result<usize, MutationError> {
        let id = match self {
            RuleId::Number(n) => *n,
            RuleId::Text(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| MutationError::InvalidRuleId(s.clone()))?,
        };
        if id < 1 || id as usize > len {
            return Err(MutationError::InvalidRuleId(self.to_string()));
        }
        Ok(id as usize - 1)
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleId::Number(n) => write!(f, "{}", n),
            RuleId::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for RuleId {
    fn from(s: &str) -> Self {
        RuleId::Text(s.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    Up,
    Down,
}

impl MoveDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            MoveDirection::Up => "up",
            MoveDirection::Down => "down",
        }
    }
}

/// Positions reported back after a move, both 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveOutcome {
    pub from: usize,
    pub to: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReorderRequest {
    #[serde(default)]
    pub rule_ids: Vec<RuleId>,
}

fn require_rules(doc: &Document) -> Result<(), MutationError> {
    if doc.route_rules()?.is_empty() {
        return Err(MutationError::NoRules);
    }
    Ok(())
}

pub fn create_rule(doc: &mut Document, rule: RouteRule) -> Result<usize, MutationError> {
    let rules = doc.route_rules_mut()?;
    rules.push(rule.into_value());
    Ok(rules.len())
}

pub fn update_rule(doc: &mut Document, id: &RuleId, rule: RouteRule) -> Result<(), MutationError> {
    require_rules(doc)?;
    let rules = doc.route_rules_mut()?;
    let index = id.index(rules.len())?;
    rules[index] = rule.into_value();
    Ok(())
}

pub fn delete_rule(doc: &mut Document, id: &RuleId) -> Result<Value, MutationError> {
    require_rules(doc)?;
    let rules = doc.route_rules_mut()?;
    let index = id.index(rules.len())?;
    Ok(rules.remove(index))
}

/// Swap the rule with its neighbour in `direction`.
pub fn move_rule(
    doc: &mut Document,
    id: &RuleId,
    direction: MoveDirection,
) -> Result<MoveOutcome, MutationError> {
    require_rules(doc)?;
    let rules = doc.route_rules_mut()?;
    let index = id.index(rules.len())?;
    let target = match direction {
        MoveDirection::Up => index as i64 - 1,
        MoveDirection::Down => index as i64 + 1,
    };
    if target < 0 || target as usize >= rules.len() {
        return Err(MutationError::OutOfBounds {
            from: index + 1,
            to: target + 1,
        });
    }
    rules.swap(index, target as usize);
    Ok(MoveOutcome {
        from: index + 1,
        to: target as usize + 1,
    })
}

/// Rebuild the rule list so position `j` holds the rule originally at
/// `ids[j]`. Repeated ids are allowed and duplicate that rule.
pub fn reorder_rules(doc: &mut Document, ids: &[RuleId]) -> Result<usize, MutationError> {
    let original = doc.route_rules()?;
    if original.is_empty() {
        return Err(MutationError::NoRules);
    }
    if ids.len() != original.len() {
        return Err(MutationError::CountMismatch {
            expected: original.len(),
            actual: ids.len(),
        });
    }

    let reordered = ids
        .iter()
        .map(|id| id.index(original.len()).map(|i| original[i].clone()))
        .collect::<Result<Vec<_>, _>>()?;

    let count = reordered.len();
    *doc.route_rules_mut()? = reordered;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> Document {
        Document::from_value(json!({
            "route": {
                "rules": [
                    {"domain": ["a.com"], "outbound": "A"},
                    {"domain": ["b.com"], "outbound": "B"},
                    {"domain": ["c.com"], "outbound": "C"}
                ],
                "final": "A"
            }
        }))
        .unwrap()
    }

    fn outbounds(doc: &Document) -> Vec<&str> {
        doc.route_rules()
            .unwrap()
            .iter()
            .map(|r| r["outbound"].as_str().unwrap())
            .collect()
    }

    fn rule(value: Value) -> RouteRule {
        RouteRule::from_request(value).unwrap()
    }

    #[test]
    fn test_rule_id_forms() {
        assert_eq!(RuleId::Number(2).index(3).unwrap(), 1);
        assert_eq!(RuleId::from(" 3 ").index(3).unwrap(), 2);
        assert!(matches!(RuleId::from("x").index(3), Err(MutationError::InvalidRuleId(_))));
        assert!(matches!(RuleId::Number(0).index(3), Err(MutationError::InvalidRuleId(_))));
        assert!(matches!(RuleId::Number(4).index(3), Err(MutationError::InvalidRuleId(_))));

        let ids: Vec<RuleId> = serde_json::from_value(json!(["1", 2])).unwrap();
        assert_eq!(ids, [RuleId::Text("1".into()), RuleId::Number(2)]);
    }

    #[test]
    fn test_create_update_delete() {
        let mut d = doc();
        assert_eq!(create_rule(&mut d, rule(json!({"geosite": "cn", "outbound": "D", "id": "9"}))).unwrap(), 4);
        assert!(d.route_rules().unwrap()[3].get("id").is_none());

        update_rule(&mut d, &RuleId::Number(1), rule(json!({"outbound": "Z"}))).unwrap();
        assert_eq!(outbounds(&d), ["Z", "B", "C", "D"]);

        delete_rule(&mut d, &RuleId::from("2")).unwrap();
        assert_eq!(outbounds(&d), ["Z", "C", "D"]);
        assert_eq!(d.root()["route"]["final"], "A");

        assert!(delete_rule(&mut d, &RuleId::Number(9)).is_err());
    }

    #[test]
    fn test_update_and_delete_without_rules() {
        let mut d = Document::from_value(json!({"route": {"rules": [], "final": "A"}})).unwrap();
        assert_eq!(
            update_rule(&mut d, &RuleId::Number(1), rule(json!({"outbound": "Z"}))),
            Err(MutationError::NoRules)
        );
        assert_eq!(delete_rule(&mut d, &RuleId::from("1")), Err(MutationError::NoRules));
        assert_eq!(delete_rule(&mut Document::default(), &RuleId::Number(1)), Err(MutationError::NoRules));
    }

    #[test]
    fn test_create_on_empty_document() {
        let mut d = Document::default();
        create_rule(&mut d, rule(json!({"outbound": "direct"}))).unwrap();
        assert_eq!(d.into_value(), json!({"route": {"rules": [{"outbound": "direct"}]}}));
    }

    #[test]
    fn test_move_swaps_neighbours() {
        let mut d = doc();
        let outcome = move_rule(&mut d, &RuleId::Number(3), MoveDirection::Up).unwrap();
        assert_eq!(outcome, MoveOutcome { from: 3, to: 2 });
        assert_eq!(outbounds(&d), ["A", "C", "B"]);

        assert!(matches!(
            move_rule(&mut d, &RuleId::Number(1), MoveDirection::Up),
            Err(MutationError::OutOfBounds { from: 1, to: 0 })
        ));
        assert!(matches!(
            move_rule(&mut d, &RuleId::Number(3), MoveDirection::Down),
            Err(MutationError::OutOfBounds { from: 3, to: 4 })
        ));
        assert!(matches!(
            move_rule(&mut Document::default(), &RuleId::Number(1), MoveDirection::Down),
            Err(MutationError::NoRules)
        ));
    }

    #[test]
    fn test_reorder() {
        let mut d = doc();
        let ids: Vec<RuleId> = serde_json::from_value(json!(["3", "1", "2"])).unwrap();
        assert_eq!(reorder_rules(&mut d, &ids).unwrap(), 3);
        assert_eq!(outbounds(&d), ["C", "A", "B"]);
    }

    #[test]
    fn test_reorder_count_mismatch_and_bad_id() {
        let mut d = doc();
        let before = d.clone();
        assert_eq!(
            reorder_rules(&mut d, &[RuleId::Number(1), RuleId::Number(2)]).unwrap_err(),
            MutationError::CountMismatch { expected: 3, actual: 2 }
        );
        assert!(matches!(
            reorder_rules(&mut d, &[RuleId::Number(1), RuleId::Number(2), RuleId::Number(7)]),
            Err(MutationError::InvalidRuleId(_))
        ));
        assert_eq!(d, before);
    }

    #[test]
    fn test_reorder_allows_repeated_ids() {
        let mut d = doc();
        let ids = [RuleId::Number(1), RuleId::Number(1), RuleId::Number(2)];
        reorder_rules(&mut d, &ids).unwrap();
        assert_eq!(outbounds(&d), ["A", "A", "B"]);
    }
}
