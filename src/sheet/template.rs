use std::io::{Read, Write};

use csv::{ReaderBuilder, WriterBuilder};
use serde::Serialize;
use tracing::{debug, info};

use super::{CLEAR_SENTINELS, DAY_COLUMN, PERIOD_COLUMN, TIME_COLUMN};
use crate::error::AppError;
use crate::schedule::assignment::AssignmentMap;
use crate::schedule::types::{ClassLabel, Day, PeriodRow, SlotKey, WeekLayout};

/// Writes the editable template: one row per teaching period of every day,
/// one column per class holding the assigned code or nothing.
pub fn export_template<W: Write>(layout: &WeekLayout, map: &AssignmentMap, out: W) -> Result<usize, AppError> {
    let mut wtr = WriterBuilder::new().from_writer(out);

    let mut header = vec![DAY_COLUMN.to_string(), PERIOD_COLUMN.to_string(), TIME_COLUMN.to_string()];
    header.extend(layout.classes.iter().map(ClassLabel::to_string));
    wtr.write_record(&header)?;

    let mut rows = 0;
    for template in &layout.days {
        for row in &template.rows {
            // Skip non-teaching rows in template
            let PeriodRow::Teaching { period, time } = row else {
                continue;
            };
            let mut record = vec![template.day.to_string(), period.to_string(), time.clone()];
            record.extend(
                layout
                    .classes
                    .iter()
                    .map(|class| map.code_at(template.day, *period, class).unwrap_or("").to_string()),
            );
            wtr.write_record(&record)?;
            rows += 1;
        }
    }

    wtr.flush()?;
    Ok(rows)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub rows_read: usize,
    pub rows_skipped: usize,
    pub assigned: usize,
    pub cleared: usize,
}

/// Applies a filled-in template to `map`.
///
/// Rows without a readable day or period are skipped whole. For every class
/// column present in the sheet, "", "KOSONG" and "-" clear the cell; any other
/// value is trimmed, upper-cased and stored as is, known to the roster or not.
/// Columns missing from a short row leave their cells untouched.
pub fn import_template<R: Read>(source: R, layout: &WeekLayout, map: &mut AssignmentMap) -> Result<ImportSummary, AppError> {
    let mut reader = ReaderBuilder::new().flexible(true).from_reader(source);
    let headers = reader.headers()?.clone();

    let column = |name: &str| headers.iter().position(|h| h.trim().eq_ignore_ascii_case(name));
    let day_col = column(DAY_COLUMN)
        .ok_or_else(|| AppError::Validation(format!("Sheet has no {} column", DAY_COLUMN)))?;
    let period_col = column(PERIOD_COLUMN)
        .ok_or_else(|| AppError::Validation(format!("Sheet has no {} column", PERIOD_COLUMN)))?;

    let class_cols: Vec<(usize, ClassLabel)> = headers
        .iter()
        .enumerate()
        .filter_map(|(i, h)| h.parse::<ClassLabel>().ok().map(|c| (i, c)))
        .filter(|(_, c)| layout.has_class(c))
        .collect();

    let mut summary = ImportSummary::default();
    for result in reader.records() {
        let record = result?;
        summary.rows_read += 1;

        let hari = record.get(day_col).unwrap_or("").trim();
        let jam = record.get(period_col).unwrap_or("").trim();
        let parsed = (hari.parse::<Day>().ok(), jam.parse::<u8>().ok());
        let (Some(day), Some(period)) = parsed else {
            debug!(hari, jam, "Skipping sheet row without day or period");
            summary.rows_skipped += 1;
            continue;
        };

        for (col, class) in &class_cols {
            let Some(raw) = record.get(*col) else {
                continue;
            };
            let code = raw.trim().to_uppercase();
            let key = SlotKey::new(day, period, class.clone());
            if CLEAR_SENTINELS.contains(&code.as_str()) {
                map.clear(&key);
                summary.cleared += 1;
            } else {
                map.assign(key, &code);
                summary.assigned += 1;
            }
        }
    }

    info!(
        rows = summary.rows_read,
        skipped = summary.rows_skipped,
        assigned = summary.assigned,
        cleared = summary.cleared,
        "Imported schedule sheet"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::layout::default_layout;

    fn class(s: &str) -> ClassLabel {
        s.parse().unwrap()
    }

    fn sample_map() -> AssignmentMap {
        let mut map = AssignmentMap::new();
        map.assign(SlotKey::new(Day::Senin, 1, class("VII A")), "MTK-1");
        map.assign(SlotKey::new(Day::Senin, 1, class("IX C")), "IPA-3");
        map.assign(SlotKey::new(Day::Jumat, 6, class("VIII B")), "BIN-2");
        map.assign(SlotKey::new(Day::Sabtu, 3, class("VII A")), "PJOK-1");
        map
    }

    #[test]
    fn template_round_trips_through_import() {
        let layout = default_layout();
        let original = sample_map();
        let mut buf = Vec::new();
        let rows = export_template(&layout, &original, &mut buf).unwrap();
        assert_eq!(rows, 36);

        let mut restored = AssignmentMap::new();
        let summary = import_template(buf.as_slice(), &layout, &mut restored).unwrap();
        assert_eq!(restored, original);
        assert_eq!(summary.rows_read, 36);
        assert_eq!(summary.assigned, 4);
        assert_eq!(summary.rows_skipped, 0);
    }

    #[test]
    fn template_header_and_first_row() {
        let layout = default_layout();
        let mut buf = Vec::new();
        export_template(&layout, &sample_map(), &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "Hari,Jam,Waktu,VII A,VII B,VII C,VIII A,VIII B,VIII C,IX A,IX B,IX C"
        );
        assert_eq!(lines.next().unwrap(), "SENIN,1,07.40 - 08.20,MTK-1,,,,,,,,IPA-3");
    }

    #[test]
    fn sentinels_clear_and_other_values_are_normalised() {
        let layout = default_layout();
        let mut map = sample_map();
        let sheet = "Hari,Jam,Waktu,VII A,IX C,VIII B\n\
                     SENIN,1,07.40 - 08.20, kosong ,-,  xyz-9 \n\
                     JUM'AT,6,,,\n";
        let summary = import_template(sheet.as_bytes(), &layout, &mut map).unwrap();

        assert_eq!(map.get(&SlotKey::new(Day::Senin, 1, class("VII A"))), None);
        assert_eq!(map.get(&SlotKey::new(Day::Senin, 1, class("IX C"))), None);
        assert_eq!(map.get(&SlotKey::new(Day::Senin, 1, class("VIII B"))), Some("XYZ-9"));
        // short row: VII A and IX C cleared, VIII B column absent
        assert_eq!(map.get(&SlotKey::new(Day::Jumat, 6, class("VIII B"))), Some("BIN-2"));
        assert_eq!(summary.cleared, 4);
        assert_eq!(summary.assigned, 1);
    }

    #[test]
    fn rows_missing_day_or_period_are_skipped() {
        let layout = default_layout();
        let mut map = AssignmentMap::new();
        let sheet = "Hari,Jam,VII A\n,1,MTK-1\nSENIN,,MTK-1\nMINGGU,1,MTK-1\nRABU,2,mtk-1\n";
        let summary = import_template(sheet.as_bytes(), &layout, &mut map).unwrap();
        assert_eq!(summary.rows_skipped, 3);
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&SlotKey::new(Day::Rabu, 2, class("VII A"))), Some("MTK-1"));
    }

    #[test]
    fn sheet_without_day_column_is_rejected() {
        let mut map = AssignmentMap::new();
        let result = import_template("Jam,VII A\n1,MTK-1\n".as_bytes(), &default_layout(), &mut map);
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
