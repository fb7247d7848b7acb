use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::warn;

use super::types::{ClassLabel, Day, SlotKey};

/// Sparse (day, period, class) -> teacher code table.
/// A missing key means the cell is unassigned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssignmentMap {
    cells: BTreeMap<SlotKey, String>,
}

impl AssignmentMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &SlotKey) -> Option<&str> {
        self.cells.get(key).map(String::as_str)
    }

    pub fn code_at(&self, day: Day, period: u8, class: &ClassLabel) -> Option<&str> {
        self.get(&SlotKey::new(day, period, class.clone()))
    }

    /// Writes a cell. An empty or blank code clears it instead.
    /// Returns the previous occupant.
    pub fn assign(&mut self, key: SlotKey, code: &str) -> Option<String> {
        let code = code.trim();
        if code.is_empty() {
            return self.clear(&key);
        }
        self.cells.insert(key, code.to_string())
    }

    pub fn clear(&mut self, key: &SlotKey) -> Option<String> {
        self.cells.remove(key)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SlotKey, &str)> {
        self.cells.iter().map(|(k, v)| (k, v.as_str()))
    }

    pub fn for_day(&self, day: Day) -> impl Iterator<Item = (&SlotKey, &str)> {
        self.iter().filter(move |(k, _)| k.day == day)
    }

    /// Decodes the persisted string-keyed form, dropping keys that don't parse
    pub fn from_string_map(raw: BTreeMap<String, String>) -> Self {
        let mut map = AssignmentMap::new();
        for (key, code) in raw {
            match key.parse::<SlotKey>() {
                Ok(slot) => {
                    map.assign(slot, &code);
                }
                Err(e) => warn!(key = %key, error = %e, "Dropping malformed schedule key"),
            }
        }
        map
    }

    pub fn to_string_map(&self) -> BTreeMap<String, String> {
        self.cells
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }
}

impl Serialize for AssignmentMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_string_map().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for AssignmentMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, serde_json::Value>::deserialize(deserializer)?;
        let raw = raw
            .into_iter()
            .filter_map(|(k, v)| match v {
                serde_json::Value::String(s) => Some((k, s)),
                _ => None,
            })
            .collect();
        Ok(AssignmentMap::from_string_map(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::types::Grade;

    fn key(day: Day, period: u8, letter: &str) -> SlotKey {
        SlotKey::new(day, period, ClassLabel::new(Grade::VII, letter))
    }

    #[test]
    fn blank_code_clears_cell() {
        let mut map = AssignmentMap::new();
        map.assign(key(Day::Senin, 1, "A"), "MTK-1");
        assert_eq!(map.assign(key(Day::Senin, 1, "A"), "  "), Some("MTK-1".to_string()));
        assert!(map.is_empty());
    }

    #[test]
    fn persisted_form_drops_malformed_keys() {
        let json = r#"{"SENIN-1-VII A":"MTK-1","garbage":"X","RABU-2-VII B":"IPA-1","SELASA-1-VII C":5}"#;
        let map: AssignmentMap = serde_json::from_str(json).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(&key(Day::Rabu, 2, "B")), Some("IPA-1"));

        let back = serde_json::to_value(&map).unwrap();
        assert_eq!(back["SENIN-1-VII A"], "MTK-1");
    }

    #[test]
    fn filters_by_day() {
        let mut map = AssignmentMap::new();
        map.assign(key(Day::Senin, 1, "A"), "MTK-1");
        map.assign(key(Day::Selasa, 1, "A"), "MTK-1");
        assert_eq!(map.for_day(Day::Selasa).count(), 1);
    }
}
