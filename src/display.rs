use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::error::AppError;
use crate::roster::Roster;
use crate::schedule::monitor::{LoadState, TeacherLoad};
use crate::schedule::views::{DayGrid, GridRow};

/// Pastel colours handed out to teachers, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaletteColor {
    Red,
    Orange,
    Amber,
    Yellow,
    Lime,
    Green,
    Emerald,
    Teal,
    Cyan,
    Sky,
    Blue,
    Indigo,
    Violet,
    Purple,
    Fuchsia,
    Pink,
    Rose,
    Stone,
}

impl PaletteColor {
    pub const ALL: [PaletteColor; 18] = [
        PaletteColor::Red,
        PaletteColor::Orange,
        PaletteColor::Amber,
        PaletteColor::Yellow,
        PaletteColor::Lime,
        PaletteColor::Green,
        PaletteColor::Emerald,
        PaletteColor::Teal,
        PaletteColor::Cyan,
        PaletteColor::Sky,
        PaletteColor::Blue,
        PaletteColor::Indigo,
        PaletteColor::Violet,
        PaletteColor::Purple,
        PaletteColor::Fuchsia,
        PaletteColor::Pink,
        PaletteColor::Rose,
        PaletteColor::Stone,
    ];

    pub fn hex(&self) -> &'static str {
        match self {
            PaletteColor::Red => "#fee2e2",
            PaletteColor::Orange => "#ffedd5",
            PaletteColor::Amber => "#fef3c7",
            PaletteColor::Yellow => "#fef9c3",
            PaletteColor::Lime => "#ecfccb",
            PaletteColor::Green => "#dcfce7",
            PaletteColor::Emerald => "#d1fae5",
            PaletteColor::Teal => "#ccfbf1",
            PaletteColor::Cyan => "#cffafe",
            PaletteColor::Sky => "#e0f2fe",
            PaletteColor::Blue => "#dbeafe",
            PaletteColor::Indigo => "#e0e7ff",
            PaletteColor::Violet => "#ede9fe",
            PaletteColor::Purple => "#f3e8ff",
            PaletteColor::Fuchsia => "#fae8ff",
            PaletteColor::Pink => "#fce7f3",
            PaletteColor::Rose => "#ffe4e6",
            PaletteColor::Stone => "#e7e5e4",
        }
    }
}

/// How a grid cell is painted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "tone", content = "color", rename_all = "snake_case")]
pub enum CellTone {
    Empty,
    Teacher(PaletteColor),
    /// Code not in the roster
    Unknown,
    Conflict,
}

impl CellTone {
    pub fn hex(&self) -> &'static str {
        match self {
            CellTone::Empty => "#ffffff",
            CellTone::Teacher(color) => color.hex(),
            CellTone::Unknown => "#f3f4f6",
            CellTone::Conflict => "#ef4444",
        }
    }
}

pub fn load_state_hex(state: LoadState) -> &'static str {
    match state {
        LoadState::Inactive => "#9ca3af",
        LoadState::UnderAssigned => "#1e293b",
        LoadState::FullyAssigned => "#16a34a",
        LoadState::OverAssigned => "#dc2626",
    }
}

/// Colour per code: every distinct teacher name takes the next palette entry
/// in roster order, and all of that name's codes share it
pub fn code_palette(roster: &Roster) -> HashMap<String, PaletteColor> {
    let by_name: HashMap<&str, PaletteColor> = roster
        .names()
        .into_iter()
        .enumerate()
        .map(|(i, name)| (name, PaletteColor::ALL[i % PaletteColor::ALL.len()]))
        .collect();

    roster
        .teachers()
        .iter()
        .filter_map(|t| by_name.get(t.name.as_str()).map(|c| (t.code.clone(), *c)))
        .collect()
}

/// Formats a cell as "CODE (Name)", or the bare code when the roster lacks it
pub fn format_teacher_label(code: &str, name: Option<&str>) -> String {
    match name {
        Some(name) if !name.is_empty() => format!("{} ({})", code, name),
        _ => code.to_string(),
    }
}

fn grid_lines(grid: &DayGrid) -> Vec<String> {
    let mut lines = Vec::new();
    let header: Vec<String> = grid.classes.iter().map(|c| format!("{:<10}", c.to_string())).collect();
    lines.push(format!("{:<4} {:<15} {}", "Jam", "Waktu", header.join(" ")));

    for row in &grid.rows {
        match row {
            GridRow::Activity { jam, time, activity } => {
                lines.push(format!("{:<4} {:<15} == {} ==", jam, time, activity));
            }
            GridRow::Teaching { period, time, cells } => {
                let cols: Vec<String> = cells
                    .iter()
                    .map(|cell| {
                        let text = match &cell.code {
                            Some(code) if cell.conflict => format!("!{}", code),
                            Some(code) => code.clone(),
                            None => "-".to_string(),
                        };
                        format!("{:<10}", text)
                    })
                    .collect();
                lines.push(format!("{:<4} {:<15} {}", period, time, cols.join(" ")));
            }
        }
    }
    lines
}

/// Prints a day grid with its conflict summary
pub fn print_day_grid(grid: &DayGrid) {
    println!("\n=== {} ===", grid.day);
    if !grid.conflicts.is_clean() {
        println!(
            "⚠️  {} double-booked cells, {} extra subjects for one teacher in one class",
            grid.conflicts.cross_class, grid.conflicts.multi_subject
        );
    }
    for line in grid_lines(grid) {
        println!("  {}", line);
    }
}

/// Prints the remaining-hours table; problem cells are starred
pub fn print_load_monitor(rows: &[TeacherLoad]) {
    println!("\n=== Remaining teaching hours ===");
    for row in rows {
        let cells: Vec<String> = row
            .cells
            .iter()
            .filter(|c| c.state != LoadState::Inactive)
            .map(|c| {
                let mark = if c.state == LoadState::OverAssigned { "*" } else { "" };
                format!("{} {}{}", c.class, c.remaining, mark)
            })
            .collect();
        let flag = if row.has_problem() { "!" } else { " " };
        println!("{} {:>3} {:<30} {:<8} {}", flag, row.no, row.name, row.code, cells.join(", "));
    }
}

/// Writes day grids to a plain text file, one block per day
pub fn write_schedule_to_file<P: AsRef<Path>>(grids: &[DayGrid], path: P) -> Result<(), AppError> {
    let mut file = File::create(path)?;
    for grid in grids {
        writeln!(file, "** {} **", grid.day)?;
        for line in grid_lines(grid) {
            writeln!(file, "{}", line)?;
        }
        writeln!(file)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::Teacher;

    #[test]
    fn codes_of_one_name_share_a_colour() {
        let roster = Roster::new(vec![
            Teacher::new("Budi", "MTK-1", "Matematika"),
            Teacher::new("Sari", "IPA-1", "IPA"),
            Teacher::new("Budi", "TIK-1", "Informatika"),
        ]);
        let palette = code_palette(&roster);
        assert_eq!(palette["MTK-1"], PaletteColor::Red);
        assert_eq!(palette["TIK-1"], PaletteColor::Red);
        assert_eq!(palette["IPA-1"], PaletteColor::Orange);
    }

    #[test]
    fn palette_wraps_after_eighteen_names() {
        let teachers = (0..20)
            .map(|i| Teacher::new(&format!("Guru {}", i), &format!("G-{}", i), "Umum"))
            .collect();
        let palette = code_palette(&Roster::new(teachers));
        assert_eq!(palette["G-18"], PaletteColor::Red);
        assert_eq!(palette["G-19"], PaletteColor::Orange);
    }

    #[test]
    fn labels_unknown_codes_bare() {
        assert_eq!(format_teacher_label("MTK-1", Some("Budi")), "MTK-1 (Budi)");
        assert_eq!(format_teacher_label("ZZZ", None), "ZZZ");
    }
}
