use std::collections::HashMap;

use serde::Serialize;

use super::assignment::AssignmentMap;
use super::types::ClassLabel;
use crate::display::load_state_hex;
use crate::roster::{Roster, Teacher};

/// How many cells of the week each (code, class) pair occupies
#[derive(Debug, Clone, Default)]
pub struct HoursUsage {
    used: HashMap<(String, ClassLabel), u32>,
}

impl HoursUsage {
    /// Counts every assignment in the week. Codes are counted whether or not
    /// the roster knows them.
    pub fn from_map(map: &AssignmentMap) -> Self {
        let mut used = HashMap::new();
        for (key, code) in map.iter() {
            *used.entry((code.to_string(), key.class.clone())).or_insert(0) += 1;
        }
        HoursUsage { used }
    }

    pub fn used(&self, code: &str, class: &ClassLabel) -> u32 {
        self.used
            .get(&(code.to_string(), class.clone()))
            .copied()
            .unwrap_or(0)
    }

    pub fn remaining(&self, teacher: &Teacher, class: &ClassLabel) -> i32 {
        remaining_hours(teacher.quota(class), self.used(&teacher.code, class))
    }
}

/// `quota - used`, saturating at the `i32` range
fn remaining_hours(quota: u32, used: u32) -> i32 {
    (quota as i64 - used as i64).clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

/// Display state of one monitor cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadState {
    /// No quota for this class and nothing placed
    Inactive,
    UnderAssigned,
    FullyAssigned,
    OverAssigned,
}

impl LoadState {
    pub fn classify(quota: u32, used: u32) -> Self {
        if quota == 0 {
            // placing a class the teacher has no hours for is a problem too
            return if used == 0 {
                LoadState::Inactive
            } else {
                LoadState::OverAssigned
            };
        }
        match (quota as i64 - used as i64).signum() {
            1 => LoadState::UnderAssigned,
            0 => LoadState::FullyAssigned,
            _ => LoadState::OverAssigned,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadCell {
    pub class: ClassLabel,
    pub quota: u32,
    pub used: u32,
    pub remaining: i32,
    pub state: LoadState,
    pub hex: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct TeacherLoad {
    pub no: u32,
    pub name: String,
    pub code: String,
    pub cells: Vec<LoadCell>,
}

impl TeacherLoad {
    pub fn has_problem(&self) -> bool {
        self.cells.iter().any(|c| c.state == LoadState::OverAssigned)
    }
}

pub fn load_cell(teacher: &Teacher, class: &ClassLabel, usage: &HoursUsage) -> LoadCell {
    let quota = teacher.quota(class);
    let used = usage.used(&teacher.code, class);
    let state = LoadState::classify(quota, used);
    LoadCell {
        class: class.clone(),
        quota,
        used,
        remaining: remaining_hours(quota, used),
        state,
        hex: load_state_hex(state),
    }
}

/// Recomputes the whole remaining-hours table from the week's assignments.
/// One row per roster record, one cell per class.
pub fn monitor_load(roster: &Roster, classes: &[ClassLabel], map: &AssignmentMap) -> Vec<TeacherLoad> {
    let usage = HoursUsage::from_map(map);
    roster
        .teachers()
        .iter()
        .map(|teacher| TeacherLoad {
            no: teacher.no,
            name: teacher.name.clone(),
            code: teacher.code.clone(),
            cells: classes
                .iter()
                .map(|class| load_cell(teacher, class, &usage))
                .collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::types::{Day, SlotKey};

    fn cell_of<'a>(row: &'a TeacherLoad, class: &ClassLabel) -> Option<&'a LoadCell> {
        row.cells.iter().find(|c| &c.class == class)
    }

    fn class(s: &str) -> ClassLabel {
        s.parse().unwrap()
    }

    fn budi() -> Teacher {
        Teacher::new("Budi", "MTK-1", "Matematika").with_quota(&class("VII A"), 4)
    }

    #[test]
    fn used_counts_matching_class_and_code_across_the_week() {
        let mut map = AssignmentMap::new();
        map.assign(SlotKey::new(Day::Senin, 1, class("VII A")), "MTK-1");
        map.assign(SlotKey::new(Day::Rabu, 5, class("VII A")), "MTK-1");
        map.assign(SlotKey::new(Day::Rabu, 5, class("VIII A")), "MTK-1");
        map.assign(SlotKey::new(Day::Kamis, 2, class("VII A")), "IPA-1");

        let usage = HoursUsage::from_map(&map);
        assert_eq!(usage.used("MTK-1", &class("VII A")), 2);
        assert_eq!(usage.used("MTK-1", &class("VIII A")), 1);
        assert_eq!(usage.remaining(&budi(), &class("VII A")), 2);
    }

    #[test]
    fn fifth_hour_goes_over_quota() {
        let roster = Roster::new(vec![budi()]);
        let classes = vec![class("VII A"), class("VII B")];
        let mut map = AssignmentMap::new();
        for period in 1..=4 {
            map.assign(SlotKey::new(Day::Senin, period, class("VII A")), "MTK-1");
        }

        let rows = monitor_load(&roster, &classes, &map);
        let cell = cell_of(&rows[0], &class("VII A")).unwrap();
        assert_eq!(cell.remaining, 0);
        assert_eq!(cell.state, LoadState::FullyAssigned);

        map.assign(SlotKey::new(Day::Senin, 5, class("VII A")), "MTK-1");
        let rows = monitor_load(&roster, &classes, &map);
        let cell = cell_of(&rows[0], &class("VII A")).unwrap();
        assert_eq!(cell.remaining, -1);
        assert_eq!(cell.state, LoadState::OverAssigned);
        assert!(rows[0].has_problem());
        assert_eq!(cell_of(&rows[0], &class("VII B")).unwrap().state, LoadState::Inactive);
    }

    #[test]
    fn classifies_presentation_states() {
        assert_eq!(LoadState::classify(4, 1), LoadState::UnderAssigned);
        assert_eq!(LoadState::classify(4, 4), LoadState::FullyAssigned);
        assert_eq!(LoadState::classify(4, 6), LoadState::OverAssigned);
        assert_eq!(LoadState::classify(0, 0), LoadState::Inactive);
        assert_eq!(LoadState::classify(0, 2), LoadState::OverAssigned);
    }

    #[test]
    fn remaining_saturates_instead_of_wrapping() {
        assert_eq!(remaining_hours(u32::MAX, 0), i32::MAX);
        assert_eq!(remaining_hours(0, u32::MAX), i32::MIN);
        assert_eq!(remaining_hours(3, 5), -2);
    }

    #[test]
    fn huge_quota_stays_under_assigned() {
        let json = r#"{"name": "Budi", "code": "MTK-1", "hoursVII": {"A": 4294967295}}"#;
        let teacher: Teacher = serde_json::from_str(json).unwrap();
        let mut map = AssignmentMap::new();
        map.assign(SlotKey::new(Day::Senin, 1, class("VII A")), "MTK-1");

        let cell = load_cell(&teacher, &class("VII A"), &HoursUsage::from_map(&map));
        assert!(cell.remaining > 0);
        assert_eq!(cell.state, LoadState::UnderAssigned);
    }
}
