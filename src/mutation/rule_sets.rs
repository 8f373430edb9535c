//! Rule-set registry mutations. Entries are addressed by 0-based index
//! into the normalized list; the document shape is collapsed on store.

use crate::document::{Document, RuleSet};
use crate::mutation::error::{Entity, MutationError};

fn has_tag(entry: &serde_json::Value, tag: &str) -> bool {
    entry.get("tag").and_then(|t| t.as_str()) == Some(tag)
}

fn check_index(index: i64, len: usize) -> Result<usize, MutationError> {
    if index < 0 || index as usize >= len {
        return Err(MutationError::OutOfRange {
            entity: Entity::RuleSet,
            index,
            len,
        });
    }
    Ok(index as usize)
}

pub fn create_rule_set(doc: &mut Document, rule_set: RuleSet) -> Result<(), MutationError> {
    MutationError::require_tag(Entity::RuleSet, &rule_set.tag)?;
    let mut entries = doc.rule_sets()?;
    if entries.iter().any(|e| has_tag(e, &rule_set.tag)) {
        return Err(MutationError::DuplicateTag {
            entity: Entity::RuleSet,
            tag: rule_set.tag,
        });
    }
    entries.push(rule_set.into_value());
    doc.set_rule_sets(entries)?;
    Ok(())
}

pub fn update_rule_set(doc: &mut Document, index: i64, rule_set: RuleSet) -> Result<(), MutationError> {
    MutationError::require_tag(Entity::RuleSet, &rule_set.tag)?;
    let mut entries = doc.rule_sets()?;
    let index = check_index(index, entries.len())?;
    let collides = entries
        .iter()
        .enumerate()
        .any(|(i, e)| i != index && has_tag(e, &rule_set.tag));
    if collides {
        return Err(MutationError::DuplicateTag {
            entity: Entity::RuleSet,
            tag: rule_set.tag,
        });
    }
    entries[index] = rule_set.into_value();
    doc.set_rule_sets(entries)?;
    Ok(())
}

pub fn delete_rule_set(doc: &mut Document, index: i64) -> Result<(), MutationError> {
    let mut entries = doc.rule_sets()?;
    let index = check_index(index, entries.len())?;
    entries.remove(index);
    doc.set_rule_sets(entries)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn rule_set(tag: &str) -> RuleSet {
        serde_json::from_value(json!({
            "tag": tag,
            "type": "remote",
            "format": "binary",
            "url": format!("https://example.com/{}.srs", tag),
            "path": ""
        }))
        .unwrap()
    }

    fn route(doc: &Document) -> &Value {
        &doc.root()["route"]
    }

    #[test]
    fn test_shape_collapses_through_lifecycle() {
        let mut d = Document::from_value(json!({"route": {"final": "direct"}})).unwrap();

        create_rule_set(&mut d, rule_set("cn")).unwrap();
        assert!(route(&d)["rule_set"].is_object());
        assert!(route(&d)["rule_set"].get("path").is_none());

        create_rule_set(&mut d, rule_set("ads")).unwrap();
        assert_eq!(route(&d)["rule_set"].as_array().unwrap().len(), 2);

        delete_rule_set(&mut d, 0).unwrap();
        assert_eq!(route(&d)["rule_set"]["tag"], "ads");

        delete_rule_set(&mut d, 0).unwrap();
        assert!(route(&d).get("rule_set").is_none());
        assert_eq!(route(&d)["final"], "direct");
    }

    #[test]
    fn test_duplicate_tag_rejected() {
        let mut d = Document::default();
        create_rule_set(&mut d, rule_set("cn")).unwrap();
        let before = d.clone();
        assert!(matches!(
            create_rule_set(&mut d, rule_set("cn")),
            Err(MutationError::DuplicateTag { entity: Entity::RuleSet, .. })
        ));
        assert_eq!(d, before);
    }

    #[test]
    fn test_update_checks_index_and_other_tags() {
        let mut d = Document::default();
        create_rule_set(&mut d, rule_set("cn")).unwrap();
        create_rule_set(&mut d, rule_set("ads")).unwrap();

        // Keeping its own tag is fine.
        update_rule_set(&mut d, 1, rule_set("ads")).unwrap();

        assert!(matches!(
            update_rule_set(&mut d, 1, rule_set("cn")),
            Err(MutationError::DuplicateTag { .. })
        ));
        assert!(matches!(
            update_rule_set(&mut d, 2, rule_set("x")),
            Err(MutationError::OutOfRange { index: 2, len: 2, .. })
        ));
        assert!(matches!(
            delete_rule_set(&mut d, -1),
            Err(MutationError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_blank_tag_rejected() {
        let mut d = Document::default();
        create_rule_set(&mut d, rule_set("cn")).unwrap();
        let before = d.clone();

        assert_eq!(
            create_rule_set(&mut d, rule_set("")),
            Err(MutationError::BlankTag { entity: Entity::RuleSet })
        );
        assert!(matches!(
            update_rule_set(&mut d, 0, rule_set(" ")),
            Err(MutationError::BlankTag { .. })
        ));
        assert_eq!(d, before);
    }
}
