//! Outbound node mutations.
//!
//! # Responsibilities
//! - Create (append, tag must be new) and update (replace by tag)
//! - Delete by 1-based position over the full outbound array
//! - Apply a batch of UI changes to one candidate, all or nothing
//!
//! # Design Decisions
//! - Every operation checks first and only then edits, so a failed call
//!   leaves the candidate exactly as it was
//! - Entries are kept as loose values; only `tag` is ever inspected

use serde::Deserialize;
use serde_json::Value;

use crate::document::{Document, Outbound};
use crate::mutation::error::{Entity, MutationError};

fn tag_of(value: &Value) -> Option<&str> {
    value.get("tag").and_then(Value::as_str)
}

pub fn create_outbound(doc: &mut Document, outbound: Outbound) -> Result<(), MutationError> {
    MutationError::require_tag(Entity::Outbound, &outbound.tag)?;
    let outbounds = doc.outbounds_mut()?;
    if outbounds.iter().any(|o| tag_of(o) == Some(outbound.tag.as_str())) {
        return Err(MutationError::DuplicateTag {
            entity: Entity::Outbound,
            tag: outbound.tag,
        });
    }
    outbounds.push(outbound.into_value());
    Ok(())
}

/// Replace the first entry whose tag matches the body's tag.
pub fn update_outbound(doc: &mut Document, outbound: Outbound) -> Result<(), MutationError> {
    MutationError::require_tag(Entity::Outbound, &outbound.tag)?;
    let outbounds = doc.outbounds_mut()?;
    let Some(slot) = outbounds
        .iter_mut()
        .find(|o| tag_of(o) == Some(outbound.tag.as_str()))
    else {
        return Err(MutationError::NotFound {
            entity: Entity::Outbound,
            key: outbound.tag,
        });
    };
    *slot = outbound.into_value();
    Ok(())
}

/// Remove the entry at 1-based `id`; later entries shift down by one.
/// Returns the removed entry.
pub fn delete_outbound(doc: &mut Document, id: i64) -> Result<Value, MutationError> {
    let outbounds = doc.outbounds_mut()?;
    let len = outbounds.len();
    if id < 1 || id as usize > len {
        return Err(MutationError::OutOfRange {
            entity: Entity::Outbound,
            index: id,
            len,
        });
    }
    Ok(outbounds.remove(id as usize - 1))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Create,
    Update,
    Delete,
}

/// Reference to the node a change was made against.
#[derive(Debug, Clone, Deserialize)]
pub struct OriginalRef {
    pub tag: String,
}

/// One pending edit from the node editor.
#[derive(Debug, Clone, Deserialize)]
pub struct OutboundChange {
    #[serde(rename = "type")]
    pub kind: ChangeKind,

    #[serde(default)]
    pub data: Value,

    #[serde(rename = "originalProxy", default)]
    pub original: Option<OriginalRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangeBatch {
    #[serde(default)]
    pub changes: Vec<OutboundChange>,
}

/// Apply `changes` in order. The first invalid change aborts and the
/// document is left untouched.
pub fn apply_changes(doc: &mut Document, changes: &[OutboundChange]) -> Result<(), MutationError> {
    let mut candidate = doc.clone();
    for (index, change) in changes.iter().enumerate() {
        apply_one(&mut candidate, index, change)?;
    }
    *doc = candidate;
    Ok(())
}

fn apply_one(doc: &mut Document, index: usize, change: &OutboundChange) -> Result<(), MutationError> {
    let invalid = |reason: String| MutationError::InvalidChange { index, reason };

    match change.kind {
        ChangeKind::Create => {
            let outbound = Outbound::from_request(change.data.clone())
                .map_err(|e| invalid(format!("invalid node data: {}", e)))?;
            create_outbound(doc, outbound)
        }
        ChangeKind::Update => {
            let original = change
                .original
                .as_ref()
                .ok_or_else(|| invalid("update requires originalProxy".to_string()))?;
            let outbound = Outbound::from_request(change.data.clone())
                .map_err(|e| invalid(format!("invalid node data: {}", e)))?;
            MutationError::require_tag(Entity::Outbound, &outbound.tag)?;

            let outbounds = doc.outbounds_mut()?;
            let Some(position) = outbounds
                .iter()
                .position(|o| tag_of(o) == Some(original.tag.as_str()))
            else {
                return Err(MutationError::NotFound {
                    entity: Entity::Outbound,
                    key: original.tag.clone(),
                });
            };
            let renamed_onto_other = outbounds
                .iter()
                .enumerate()
                .any(|(i, o)| i != position && tag_of(o) == Some(outbound.tag.as_str()));
            if renamed_onto_other {
                return Err(MutationError::DuplicateTag {
                    entity: Entity::Outbound,
                    tag: outbound.tag,
                });
            }
            outbounds[position] = outbound.into_value();
            Ok(())
        }
        ChangeKind::Delete => {
            let original = change
                .original
                .as_ref()
                .ok_or_else(|| invalid("delete requires originalProxy".to_string()))?;
            let outbounds = doc.outbounds_mut()?;
            let before = outbounds.len();
            outbounds.retain(|o| tag_of(o) != Some(original.tag.as_str()));
            if outbounds.len() == before {
                return Err(MutationError::NotFound {
                    entity: Entity::Outbound,
                    key: original.tag.clone(),
                });
            }
            Ok(())
        }
    }
}
