use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use super::assignment::AssignmentMap;
use super::types::{ClassLabel, DayTemplate};
use crate::roster::Roster;

/// Conflicts found on one day
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DayConflicts {
    /// Number of flagged cells; a mutual double booking counts both cells
    pub cross_class: usize,
    /// Extra codes a teacher name appears under within one class's day
    pub multi_subject: usize,
    /// (period, class) cells whose teacher is also booked elsewhere that period
    pub flagged: BTreeSet<(u8, ClassLabel)>,
}

impl DayConflicts {
    pub fn is_flagged(&self, period: u8, class: &ClassLabel) -> bool {
        self.flagged.contains(&(period, class.clone()))
    }

    pub fn is_clean(&self) -> bool {
        self.cross_class == 0 && self.multi_subject == 0
    }
}

/// Scans one day's teaching periods for double bookings and for a teacher
/// teaching one class under several codes. Codes missing from the roster have
/// no owner and take part in neither check.
pub fn detect_conflicts(
    roster: &Roster,
    map: &AssignmentMap,
    template: &DayTemplate,
    classes: &[ClassLabel],
) -> DayConflicts {
    let day = template.day;
    let mut conflicts = DayConflicts::default();

    for period in template.teaching_periods() {
        let owners: Vec<(&ClassLabel, &str)> = classes
            .iter()
            .filter_map(|class| {
                map.code_at(day, period, class)
                    .and_then(|code| roster.name_of(code))
                    .map(|name| (class, name))
            })
            .collect();

        let mut per_name: HashMap<&str, usize> = HashMap::new();
        for (_, name) in &owners {
            *per_name.entry(*name).or_insert(0) += 1;
        }

        for (class, name) in &owners {
            if per_name.get(name).copied().unwrap_or(0) > 1 {
                conflicts.flagged.insert((period, (*class).clone()));
            }
        }
    }
    conflicts.cross_class = conflicts.flagged.len();

    for class in classes {
        let mut codes_by_name: HashMap<&str, BTreeSet<&str>> = HashMap::new();
        for period in template.teaching_periods() {
            let Some(code) = map.code_at(day, period, class) else {
                continue;
            };
            if let Some(name) = roster.name_of(code) {
                codes_by_name.entry(name).or_default().insert(code);
            }
        }
        conflicts.multi_subject += codes_by_name
            .values()
            .map(|codes| codes.len().saturating_sub(1))
            .sum::<usize>();
    }

    conflicts
}
