use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::Serialize;

use super::assignment::AssignmentMap;
use super::conflicts::{detect_conflicts, DayConflicts};
use super::slot_utils::{format_run, group_consecutive};
use super::types::{ClassLabel, Day, DayTemplate, PeriodRow, WeekLayout};
use crate::display::{code_palette, format_teacher_label, CellTone};
use crate::roster::Roster;

#[derive(Debug, Clone, Serialize)]
pub struct GridCell {
    pub class: ClassLabel,
    pub code: Option<String>,
    /// "CODE (Name)" or the bare code
    pub label: Option<String>,
    pub teacher: Option<String>,
    pub subject: Option<String>,
    pub conflict: bool,
    pub dimmed: bool,
    pub tone: CellTone,
    pub hex: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GridRow {
    Teaching { period: u8, time: String, cells: Vec<GridCell> },
    Activity { jam: String, time: String, activity: String },
}

/// Everything the schedule editor shows for one day tab
#[derive(Debug, Clone, Serialize)]
pub struct DayGrid {
    pub day: Day,
    pub classes: Vec<ClassLabel>,
    pub rows: Vec<GridRow>,
    pub conflicts: DayConflicts,
    pub code_counts: BTreeMap<String, usize>,
}

/// Builds the editor grid for a day. With a non-empty `filter`, filled cells
/// whose code is not in it come back dimmed.
pub fn day_grid(
    layout: &WeekLayout,
    roster: &Roster,
    map: &AssignmentMap,
    template: &DayTemplate,
    filter: &BTreeSet<String>,
) -> DayGrid {
    let conflicts = detect_conflicts(roster, map, template, &layout.classes);
    let palette = code_palette(roster);

    let rows = template
        .rows
        .iter()
        .map(|row| match row {
            PeriodRow::Activity { jam, time, activity } => GridRow::Activity {
                jam: jam.clone(),
                time: time.clone(),
                activity: activity.clone(),
            },
            PeriodRow::Teaching { period, time } => {
                let cells = layout
                    .classes
                    .iter()
                    .map(|class| {
                        let code = map.code_at(template.day, *period, class);
                        let teacher = code.and_then(|c| roster.by_code(c));
                        let conflict = conflicts.is_flagged(*period, class);
                        let tone = match code {
                            None => CellTone::Empty,
                            Some(_) if conflict => CellTone::Conflict,
                            Some(c) => palette.get(c).copied().map(CellTone::Teacher).unwrap_or(CellTone::Unknown),
                        };
                        GridCell {
                            class: class.clone(),
                            code: code.map(str::to_string),
                            label: code.map(|c| format_teacher_label(c, teacher.map(|t| t.name.as_str()))),
                            teacher: teacher.map(|t| t.name.clone()),
                            subject: teacher.map(|t| t.subject.clone()),
                            conflict,
                            dimmed: !filter.is_empty() && code.map(|c| !filter.contains(c)).unwrap_or(false),
                            tone,
                            hex: tone.hex(),
                        }
                    })
                    .collect();
                GridRow::Teaching { period: *period, time: time.clone(), cells }
            }
        })
        .collect();

    DayGrid {
        day: template.day,
        classes: layout.classes.clone(),
        rows,
        conflicts,
        code_counts: codes_in_use(map, template.day),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimetableEntry {
    pub day: Day,
    pub jam: String,
    pub time: String,
    /// Subject and teacher for a class view, "VII A (Matematika)" list for a teacher view,
    /// activity name for activity rows
    pub label: String,
    pub detail: Option<String>,
    pub is_activity: bool,
}

/// Week schedule of one class: subject and teacher per period
pub fn class_timetable(layout: &WeekLayout, roster: &Roster, map: &AssignmentMap, class: &ClassLabel) -> Vec<TimetableEntry> {
    let mut entries = Vec::new();
    for template in &layout.days {
        for row in &template.rows {
            let entry = match row {
                PeriodRow::Activity { jam, time, activity } => TimetableEntry {
                    day: template.day,
                    jam: jam.clone(),
                    time: time.clone(),
                    label: activity.clone(),
                    detail: None,
                    is_activity: true,
                },
                PeriodRow::Teaching { period, time } => {
                    let teacher = map
                        .code_at(template.day, *period, class)
                        .and_then(|code| roster.by_code(code));
                    TimetableEntry {
                        day: template.day,
                        jam: period.to_string(),
                        time: time.clone(),
                        label: teacher.map(|t| t.subject.clone()).unwrap_or_else(|| "-".to_string()),
                        detail: teacher.map(|t| t.name.clone()),
                        is_activity: false,
                    }
                }
            };
            entries.push(entry);
        }
    }
    entries
}

/// Week schedule of one person across all of their codes
pub fn teacher_timetable(layout: &WeekLayout, roster: &Roster, map: &AssignmentMap, name: &str) -> Vec<TimetableEntry> {
    let codes: Vec<&str> = roster.codes_of_name(name).collect();
    let mut entries = Vec::new();

    for template in &layout.days {
        for row in &template.rows {
            let (label, is_activity) = match row {
                PeriodRow::Activity { activity, .. } => (activity.clone(), true),
                PeriodRow::Teaching { period, .. } => {
                    let found: Vec<String> = layout
                        .classes
                        .iter()
                        .filter_map(|class| {
                            let code = map.code_at(template.day, *period, class)?;
                            if !codes.contains(&code) {
                                return None;
                            }
                            let subject = roster.by_code(code).map(|t| t.subject.as_str()).unwrap_or("");
                            Some(format!("{} ({})", class, subject))
                        })
                        .collect();
                    if found.is_empty() {
                        ("-".to_string(), false)
                    } else {
                        (found.join(", "), false)
                    }
                }
            };
            entries.push(TimetableEntry {
                day: template.day,
                jam: row.jam(),
                time: row.time().to_string(),
                label,
                detail: None,
                is_activity,
            });
        }
    }
    entries
}

/// A run of consecutive periods one teacher spends in one class
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeachingBlock {
    pub day: Day,
    pub class: ClassLabel,
    pub start: u8,
    pub end: u8,
}

impl TeachingBlock {
    /// "SENIN|1-2|VII A"
    pub fn label(&self) -> String {
        format!("{}|{}|{}", self.day, format_run((self.start, self.end)), self.class)
    }
}

/// The blocks a teacher name teaches on the weekday of `date`, used to pick
/// what a journal entry is about. Sundays have none.
pub fn teaching_blocks_on(
    layout: &WeekLayout,
    roster: &Roster,
    map: &AssignmentMap,
    name: &str,
    date: NaiveDate,
) -> Vec<TeachingBlock> {
    let Some(day) = Day::from_date(date) else {
        return Vec::new();
    };
    let Some(template) = layout.day(day) else {
        return Vec::new();
    };
    let codes: Vec<&str> = roster.codes_of_name(name).collect();

    let mut by_class: BTreeMap<&ClassLabel, Vec<u8>> = BTreeMap::new();
    for period in template.teaching_periods() {
        for class in &layout.classes {
            if let Some(code) = map.code_at(day, period, class) {
                if codes.contains(&code) {
                    by_class.entry(class).or_default().push(period);
                }
            }
        }
    }

    by_class
        .into_iter()
        .flat_map(|(class, periods)| {
            group_consecutive(&periods)
                .into_iter()
                .map(move |(start, end)| TeachingBlock { day, class: class.clone(), start, end })
        })
        .collect()
}

/// Counts cells per code for a day; shown next to the filter checkboxes
pub fn codes_in_use(map: &AssignmentMap, day: Day) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for (_, code) in map.for_day(day) {
        *counts.entry(code.to_string()).or_insert(0) += 1;
    }
    counts
}
