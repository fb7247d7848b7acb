use super::types::{Day, DayTemplate, PeriodRow};

/// Parses a time string (HH:MM or HH.MM) to minutes since midnight
pub fn parse_time_to_minutes(time_str: &str) -> Option<u32> {
    let parts: Vec<&str> = time_str.trim().split(|c| c == ':' || c == '.').collect();
    if parts.len() != 2 {
        return None;
    }
    let hours: u32 = parts[0].parse().ok()?;
    let minutes: u32 = parts[1].parse().ok()?;
    if hours >= 24 || minutes >= 60 {
        return None;
    }
    Some(hours * 60 + minutes)
}

/// Formats minutes since midnight the way the bell schedule prints it (HH.MM)
pub fn minutes_to_time_string(minutes: u32) -> String {
    let hours = minutes / 60;
    let mins = minutes % 60;
    format!("{:02}.{:02}", hours % 24, mins)
}

pub fn time_range(start: u32, end: u32) -> String {
    format!("{} - {}", minutes_to_time_string(start), minutes_to_time_string(end))
}

/// A block in a day's bell schedule
#[derive(Debug, Clone)]
pub enum BellBlock<'a> {
    Lesson,
    Activity { jam: &'a str, name: &'a str, minutes: u32 },
}

/// Lays out a day from a start time, numbering lessons 1.. and giving each
/// `lesson_minutes`; activity blocks keep their own duration.
pub fn build_day(day: Day, start_time: &str, lesson_minutes: u32, blocks: &[BellBlock<'_>]) -> DayTemplate {
    let mut current = parse_time_to_minutes(start_time).unwrap_or(7 * 60);
    let mut period = 0u8;
    let mut rows = Vec::with_capacity(blocks.len());

    for block in blocks {
        match block {
            BellBlock::Lesson => {
                period += 1;
                rows.push(PeriodRow::Teaching {
                    period,
                    time: time_range(current, current + lesson_minutes),
                });
                current += lesson_minutes;
            }
            BellBlock::Activity { jam, name, minutes } => {
                rows.push(PeriodRow::Activity {
                    jam: jam.to_string(),
                    time: time_range(current, current + minutes),
                    activity: name.to_string(),
                });
                current += minutes;
            }
        }
    }

    DayTemplate { day, rows }
}

/// Splits period numbers into runs of consecutive periods.
/// Input need not be sorted; duplicates collapse.
pub fn group_consecutive(periods: &[u8]) -> Vec<(u8, u8)> {
    let mut sorted = periods.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut runs = Vec::new();
    let mut iter = sorted.into_iter();
    let Some(first) = iter.next() else {
        return runs;
    };
    let (mut start, mut prev) = (first, first);
    for p in iter {
        if p != prev + 1 {
            runs.push((start, prev));
            start = p;
        }
        prev = p;
    }
    runs.push((start, prev));
    runs
}

pub fn format_run(run: (u8, u8)) -> String {
    if run.0 == run.1 {
        run.0.to_string()
    } else {
        format!("{}-{}", run.0, run.1)
    }
}
