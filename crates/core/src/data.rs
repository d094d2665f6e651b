//! Working data carried by requests and transitions.
//!
//! `StateData` is the request's accumulated working data: an open-ended
//! key-value bag mutated incrementally by each transition. The merge policy
//! is additive — new keys are layered in and unrelated keys always survive,
//! so no role's earlier contribution is lost by a later role's transition.
//!
//! `TransitionData` is the per-step input: the well-known fields are typed,
//! the genuinely open-ended ones spill into `extra`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One equipment line item (cable, router, connectors...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquipmentLine {
    pub item: String,
    pub quantity: u32,
}

impl EquipmentLine {
    pub fn new(item: impl Into<String>, quantity: u32) -> Self {
        EquipmentLine {
            item: item.into(),
            quantity,
        }
    }
}

/// Accumulated working data on a request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateData(BTreeMap<String, serde_json::Value>);

impl StateData {
    pub fn new() -> Self {
        StateData(BTreeMap::new())
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.0.insert(key.into(), value);
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &serde_json::Value)> {
        self.0.iter()
    }

    /// Additive merge: keys from `incoming` are layered in, replacing only
    /// the same key. Keys absent from `incoming` are untouched.
    pub fn merge(&mut self, incoming: &StateData) {
        for (key, value) in &incoming.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }

    /// Append equipment lines under the `equipment_used` key, preserving
    /// lines recorded by earlier transitions.
    pub fn append_equipment(&mut self, lines: &[EquipmentLine]) {
        if lines.is_empty() {
            return;
        }
        let entry = self
            .0
            .entry("equipment_used".to_string())
            .or_insert_with(|| serde_json::Value::Array(Vec::new()));
        if let serde_json::Value::Array(existing) = entry {
            for line in lines {
                match serde_json::to_value(line) {
                    Ok(value) => existing.push(value),
                    Err(_) => existing.push(serde_json::json!({
                        "item": line.item,
                        "quantity": line.quantity,
                    })),
                }
            }
        }
    }
}

impl FromIterator<(String, serde_json::Value)> for StateData {
    fn from_iter<T: IntoIterator<Item = (String, serde_json::Value)>>(iter: T) -> Self {
        StateData(iter.into_iter().collect())
    }
}

/// Input supplied with a single transition.
///
/// Typed fields cover the data the workflow definitions validate against;
/// anything else travels in `extra` and merges into the request's
/// `StateData` under its own key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransitionData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technician_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub equipment: Vec<EquipmentLine>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl TransitionData {
    pub fn new() -> Self {
        TransitionData::default()
    }

    pub fn with_comment(comment: impl Into<String>) -> Self {
        TransitionData {
            comments: Some(comment.into()),
            ..TransitionData::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.comments.is_none()
            && self.technician_id.is_none()
            && self.diagnostics.is_none()
            && self.rating.is_none()
            && self.equipment.is_empty()
            && self.extra.is_empty()
    }

    /// Whether a named field is present, checking typed fields first and the
    /// `extra` bag second. Used by required-data validation.
    pub fn contains_field(&self, name: &str) -> bool {
        match name {
            "comments" => self.comments.is_some(),
            "technician_id" => self.technician_id.is_some(),
            "diagnostics" => self.diagnostics.is_some(),
            "rating" => self.rating.is_some(),
            "equipment" => !self.equipment.is_empty(),
            other => self.extra.contains_key(other),
        }
    }

    /// Merge this transition's data into the request's state data.
    ///
    /// Typed fields land under their field names, equipment lines append to
    /// `equipment_used`, and `extra` keys layer in additively.
    pub fn apply_to(&self, state: &mut StateData) {
        if let Some(ref comments) = self.comments {
            state.insert("comments", serde_json::Value::String(comments.clone()));
        }
        if let Some(ref technician_id) = self.technician_id {
            state.insert(
                "technician_id",
                serde_json::Value::String(technician_id.clone()),
            );
        }
        if let Some(ref diagnostics) = self.diagnostics {
            state.insert(
                "diagnostics",
                serde_json::Value::String(diagnostics.clone()),
            );
        }
        if let Some(rating) = self.rating {
            state.insert("rating", serde_json::json!(rating));
        }
        state.append_equipment(&self.equipment);
        for (key, value) in &self.extra {
            state.insert(key.clone(), value.clone());
        }
    }
}
