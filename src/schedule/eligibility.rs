use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::assignment::AssignmentMap;
use super::monitor::HoursUsage;
use super::types::{Day, SlotKey};
use crate::roster::Roster;

/// Days on which a code's teacher cannot be scheduled (leave, fixed duties)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Unavailability(pub BTreeMap<String, BTreeSet<Day>>);

impl Unavailability {
    pub fn is_unavailable(&self, code: &str, day: Day) -> bool {
        self.0.get(code).map(|days| days.contains(&day)).unwrap_or(false)
    }

    /// Flips a (code, day) constraint. Returns true when the day is now blocked.
    pub fn toggle(&mut self, code: &str, day: Day) -> bool {
        let days = self.0.entry(code.to_string()).or_default();
        let blocked = if days.remove(&day) {
            false
        } else {
            days.insert(day);
            true
        };
        if days.is_empty() {
            self.0.remove(code);
        }
        blocked
    }
}

/// An option for a cell's dropdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EligibleCode {
    pub code: String,
    pub name: String,
    pub subject: String,
    pub remaining: i32,
}

/// Codes that may be offered for the cell at `slot`, sorted by code.
///
/// A code qualifies when its teacher has a positive quota for the class, has
/// hours left and isn't blocked on the slot's day. The code already occupying
/// the cell skips the last two checks so it never disappears from its own list.
pub fn eligible_codes(
    roster: &Roster,
    map: &AssignmentMap,
    unavailable: &Unavailability,
    slot: &SlotKey,
) -> Vec<EligibleCode> {
    let usage = HoursUsage::from_map(map);
    let incumbent = map.get(slot);

    let mut eligible: Vec<EligibleCode> = roster
        .unique_codes()
        .filter(|t| t.quota(&slot.class) > 0)
        .filter_map(|t| {
            let remaining = usage.remaining(t, &slot.class);
            let is_incumbent = incumbent == Some(t.code.as_str());
            if !is_incumbent && (remaining <= 0 || unavailable.is_unavailable(&t.code, slot.day)) {
                return None;
            }
            Some(EligibleCode {
                code: t.code.clone(),
                name: t.name.clone(),
                subject: t.subject.clone(),
                remaining,
            })
        })
        .collect();

    eligible.sort_by(|a, b| a.code.cmp(&b.code));
    eligible
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::Teacher;
    use crate::schedule::types::ClassLabel;

    fn class(s: &str) -> ClassLabel {
        s.parse().unwrap()
    }

    fn roster() -> Roster {
        Roster::new(vec![
            Teacher::new("Sari", "IPA-1", "IPA").with_quota(&class("VII A"), 2),
            Teacher::new("Budi", "MTK-1", "Matematika").with_quota(&class("VII A"), 4),
            Teacher::new("Dewi", "BIN-1", "Bahasa Indonesia").with_quota(&class("VII B"), 6),
        ])
    }

    fn codes(list: &[EligibleCode]) -> Vec<&str> {
        list.iter().map(|e| e.code.as_str()).collect()
    }

    #[test]
    fn offers_only_teachers_with_quota_sorted_by_code() {
        let slot = SlotKey::new(Day::Senin, 1, class("VII A"));
        let list = eligible_codes(&roster(), &AssignmentMap::new(), &Unavailability::default(), &slot);
        assert_eq!(codes(&list), vec!["IPA-1", "MTK-1"]);
        assert_eq!(list[1].remaining, 4);
    }

    #[test]
    fn incumbent_survives_exhausted_hours() {
        let mut map = AssignmentMap::new();
        for period in 1..=5 {
            map.assign(SlotKey::new(Day::Senin, period, class("VII A")), "MTK-1");
        }
        let unavailable = Unavailability::default();

        let own = SlotKey::new(Day::Senin, 5, class("VII A"));
        let list = eligible_codes(&roster(), &map, &unavailable, &own);
        assert_eq!(codes(&list), vec!["IPA-1", "MTK-1"]);
        assert_eq!(list[1].remaining, -1);

        let other = SlotKey::new(Day::Senin, 6, class("VII A"));
        let list = eligible_codes(&roster(), &map, &unavailable, &other);
        assert_eq!(codes(&list), vec!["IPA-1"]);
    }

    #[test]
    fn blocked_day_hides_code_except_for_its_own_cell() {
        let mut unavailable = Unavailability::default();
        assert!(unavailable.toggle("IPA-1", Day::Selasa));

        let mut map = AssignmentMap::new();
        let own = SlotKey::new(Day::Selasa, 1, class("VII A"));
        map.assign(own.clone(), "IPA-1");

        assert_eq!(codes(&eligible_codes(&roster(), &map, &unavailable, &own)), vec!["IPA-1", "MTK-1"]);
        let other = SlotKey::new(Day::Selasa, 2, class("VII A"));
        assert_eq!(codes(&eligible_codes(&roster(), &map, &unavailable, &other)), vec!["MTK-1"]);
        let monday = SlotKey::new(Day::Senin, 2, class("VII A"));
        assert_eq!(codes(&eligible_codes(&roster(), &map, &unavailable, &monday)), vec!["IPA-1", "MTK-1"]);
    }

    #[test]
    fn toggle_twice_clears_constraint() {
        let mut unavailable = Unavailability::default();
        unavailable.toggle("MTK-1", Day::Rabu);
        assert!(!unavailable.toggle("MTK-1", Day::Rabu));
        assert!(unavailable.0.is_empty());
    }
}
