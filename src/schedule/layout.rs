use std::collections::HashSet;
use std::fs;
use std::path::Path;

use tracing::info;

use super::slot_utils::{build_day, BellBlock};
use super::types::{ClassLabel, Day, Grade, WeekLayout};
use crate::error::AppError;

const LESSON_MINUTES: u32 = 40;

fn default_classes() -> Vec<ClassLabel> {
    [Grade::VII, Grade::VIII, Grade::IX]
        .iter()
        .flat_map(|&grade| ["A", "B", "C"].into_iter().map(move |l| ClassLabel::new(grade, l)))
        .collect()
}

/// Nine classes, six lessons a day with a break after the third.
/// Monday opens with the flag ceremony, Friday with morning exercise.
pub fn default_layout() -> WeekLayout {
    let days = Day::ALL
        .iter()
        .map(|&day| {
            let mut blocks = Vec::new();
            match day {
                Day::Senin => blocks.push(BellBlock::Activity { jam: "-", name: "UPACARA", minutes: 40 }),
                Day::Jumat => blocks.push(BellBlock::Activity { jam: "-", name: "SENAM PAGI", minutes: 30 }),
                _ => {}
            }
            blocks.extend([BellBlock::Lesson, BellBlock::Lesson, BellBlock::Lesson]);
            blocks.push(BellBlock::Activity { jam: "-", name: "ISTIRAHAT", minutes: 20 });
            blocks.extend([BellBlock::Lesson, BellBlock::Lesson, BellBlock::Lesson]);
            build_day(day, "07:00", LESSON_MINUTES, &blocks)
        })
        .collect();

    WeekLayout {
        classes: default_classes(),
        days,
    }
}

/// Each class, each day and each teaching period within a day may appear
/// only once, otherwise one booking would show up as a double booking
fn validate_layout(layout: &WeekLayout) -> Result<(), String> {
    if layout.classes.is_empty() || layout.days.is_empty() {
        return Err("needs at least one class and one day".to_string());
    }

    let mut classes = HashSet::new();
    if let Some(dup) = layout.classes.iter().find(|c| !classes.insert(*c)) {
        return Err(format!("class {} is listed twice", dup));
    }

    let mut days = HashSet::new();
    for template in &layout.days {
        if !days.insert(template.day) {
            return Err(format!("day {} is listed twice", template.day));
        }
        let mut periods = HashSet::new();
        if let Some(dup) = template.teaching_periods().find(|p| !periods.insert(*p)) {
            return Err(format!("period {} appears twice on {}", dup, template.day));
        }
    }
    Ok(())
}

/// Reads a layout from JSON, falling back to the built-in one when no path is set
pub fn load_layout(path: Option<&Path>) -> Result<WeekLayout, AppError> {
    let Some(path) = path else {
        return Ok(default_layout());
    };
    let text = fs::read_to_string(path)?;
    let layout: WeekLayout = serde_json::from_str(&text)?;
    validate_layout(&layout).map_err(|reason| AppError::Validation(format!("Layout {}: {}", path.display(), reason)))?;
    info!(path = %path.display(), classes = layout.classes.len(), days = layout.days.len(), "Loaded week layout");
    Ok(layout)
}
