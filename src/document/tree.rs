//! Loose document tree.
//!
//! `Document` holds the whole engine configuration as a generic JSON object.
//! Accessors reach into the three sections this crate edits (`outbounds`,
//! `route.rules`, `route.rule_set`) and leave every other key alone, so a
//! load/save cycle with no edits reproduces the input tree exactly.

use serde_json::{Map, Value};
use thiserror::Error;

/// Errors raised when the document does not have the expected layout.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DocumentError {
    /// The top level of the file is not a JSON object.
    #[error("configuration root must be a JSON object")]
    NotAnObject,

    /// A known section exists but with the wrong JSON type.
    #[error("section `{section}` must be {expected}")]
    WrongShape {
        section: &'static str,
        expected: &'static str,
    },
}

/// The full configuration as a generic tree.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    root: Map<String, Value>,
}

impl Document {
    pub fn from_value(value: Value) -> Result<Self, DocumentError> {
        match value {
            Value::Object(root) => Ok(Self { root }),
            _ => Err(DocumentError::NotAnObject),
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.root)
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.root.clone())
    }

    pub fn root(&self) -> &Map<String, Value> {
        &self.root
    }

    /// Outbound entries in file order. Missing section reads as empty.
    pub fn outbounds(&self) -> Result<&[Value], DocumentError> {
        match self.root.get("outbounds") {
            None | Some(Value::Null) => Ok(&[]),
            Some(Value::Array(items)) => Ok(items),
            Some(_) => Err(DocumentError::WrongShape {
                section: "outbounds",
                expected: "an array",
            }),
        }
    }

    pub fn outbounds_mut(&mut self) -> Result<&mut Vec<Value>, DocumentError> {
        array_entry(&mut self.root, "outbounds", "outbounds")
    }

    /// Route rules in evaluation order. Missing `route` reads as empty.
    pub fn route_rules(&self) -> Result<&[Value], DocumentError> {
        let Some(route) = self.route()? else {
            return Ok(&[]);
        };
        match route.get("rules") {
            None | Some(Value::Null) => Ok(&[]),
            Some(Value::Array(items)) => Ok(items),
            Some(_) => Err(DocumentError::WrongShape {
                section: "route.rules",
                expected: "an array",
            }),
        }
    }

    pub fn route_rules_mut(&mut self) -> Result<&mut Vec<Value>, DocumentError> {
        let route = self.route_mut()?;
        array_entry(route, "rules", "route.rules")
    }

    /// Rule sets normalized to a list, whatever shape the file stores.
    pub fn rule_sets(&self) -> Result<Vec<Value>, DocumentError> {
        let Some(route) = self.route()? else {
            return Ok(Vec::new());
        };
        match route.get("rule_set") {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => Ok(items.clone()),
            Some(single @ Value::Object(_)) => Ok(vec![single.clone()]),
            Some(_) => Err(DocumentError::WrongShape {
                section: "route.rule_set",
                expected: "an object or an array",
            }),
        }
    }

    /// Store rule sets back in their collapsed on-disk shape: no key when
    /// empty, a bare object for one entry, an array otherwise.
    pub fn set_rule_sets(&mut self, mut rule_sets: Vec<Value>) -> Result<(), DocumentError> {
        let route = self.route_mut()?;
        match rule_sets.len() {
            0 => {
                route.shift_remove("rule_set");
            }
            1 => {
                let single = rule_sets.remove(0);
                route.insert("rule_set".to_string(), single);
            }
            _ => {
                route.insert("rule_set".to_string(), Value::Array(rule_sets));
            }
        }
        Ok(())
    }

    fn route(&self) -> Result<Option<&Map<String, Value>>, DocumentError> {
        match self.root.get("route") {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Object(route)) => Ok(Some(route)),
            Some(_) => Err(DocumentError::WrongShape {
                section: "route",
                expected: "an object",
            }),
        }
    }

    fn route_mut(&mut self) -> Result<&mut Map<String, Value>, DocumentError> {
        let entry = self
            .root
            .entry("route")
            .or_insert_with(|| Value::Object(Map::new()));
        if entry.is_null() {
            *entry = Value::Object(Map::new());
        }
        entry.as_object_mut().ok_or(DocumentError::WrongShape {
            section: "route",
            expected: "an object",
        })
    }
}

fn array_entry<'a>(
    map: &'a mut Map<String, Value>,
    key: &str,
    section: &'static str,
) -> Result<&'a mut Vec<Value>, DocumentError> {
    let entry = map
        .entry(key)
        .or_insert_with(|| Value::Array(Vec::new()));
    if entry.is_null() {
        *entry = Value::Array(Vec::new());
    }
    entry.as_array_mut().ok_or(DocumentError::WrongShape {
        section,
        expected: "an array",
    })
}
