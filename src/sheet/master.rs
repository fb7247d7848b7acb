use std::io::Write;

use csv::WriterBuilder;

use super::{ACTIVITY_COLUMN, DAY_COLUMN, PERIOD_COLUMN, TIME_COLUMN};
use crate::error::AppError;
use crate::schedule::assignment::AssignmentMap;
use crate::schedule::types::{ClassLabel, PeriodRow, WeekLayout};

/// Writes the full master schedule, activity rows included. Activity rows
/// carry the activity name in the activity column and in every class column.
pub fn export_master<W: Write>(layout: &WeekLayout, map: &AssignmentMap, out: W) -> Result<usize, AppError> {
    let mut wtr = WriterBuilder::new().from_writer(out);

    let mut header = vec![
        DAY_COLUMN.to_string(),
        PERIOD_COLUMN.to_string(),
        TIME_COLUMN.to_string(),
        ACTIVITY_COLUMN.to_string(),
    ];
    header.extend(layout.classes.iter().map(ClassLabel::to_string));
    wtr.write_record(&header)?;

    let mut rows = 0;
    for template in &layout.days {
        for row in &template.rows {
            let mut record = vec![template.day.to_string(), row.jam(), row.time().to_string()];
            match row {
                PeriodRow::Activity { activity, .. } => {
                    record.push(activity.clone());
                    record.extend(layout.classes.iter().map(|_| activity.clone()));
                }
                PeriodRow::Teaching { period, .. } => {
                    record.push(String::new());
                    record.extend(
                        layout
                            .classes
                            .iter()
                            .map(|class| map.code_at(template.day, *period, class).unwrap_or("").to_string()),
                    );
                }
            }
            wtr.write_record(&record)?;
            rows += 1;
        }
    }

    wtr.flush()?;
    Ok(rows)
}
