use csv::Reader;
use std::collections::{BTreeMap, HashMap};
use std::io::Read;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info};

use crate::error::AppError;
use crate::schedule::types::{ClassLabel, Grade};

/// Highest weekly quota accepted for one class; larger values are clamped
pub const MAX_QUOTA: u32 = 999;

/// Weekly hour quota per class letter for one grade.
/// Absent, non-numeric or negative entries count as 0.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClassHours(pub BTreeMap<String, u32>);

impl ClassHours {
    pub fn get(&self, letter: &str) -> u32 {
        self.0.get(letter).copied().unwrap_or(0)
    }

    pub fn set(&mut self, letter: &str, hours: u32) {
        self.0.insert(letter.trim().to_uppercase(), hours.min(MAX_QUOTA));
    }
}

impl<'de> Deserialize<'de> for ClassHours {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<BTreeMap<String, serde_json::Value>>::deserialize(deserializer)?;
        let hours = raw
            .unwrap_or_default()
            .into_iter()
            .map(|(letter, v)| (letter.trim().to_uppercase(), quota_value(&v)))
            .collect();
        Ok(ClassHours(hours))
    }
}

fn quota_value(value: &serde_json::Value) -> u32 {
    match value {
        serde_json::Value::Number(n) => n
            .as_u64()
            .map(|v| v.min(MAX_QUOTA as u64) as u32)
            .or_else(|| n.as_f64().filter(|f| *f > 0.0).map(|f| f.min(MAX_QUOTA as f64) as u32))
            .unwrap_or(0),
        _ => 0,
    }
}

/// One (teacher, subject) record. A person teaching two subjects has two
/// records sharing the name, each with its own code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    #[serde(default)]
    pub id: u32,
    #[serde(default)]
    pub no: u32,
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default, rename = "hoursVII")]
    pub hours_vii: ClassHours,
    #[serde(default, rename = "hoursVIII")]
    pub hours_viii: ClassHours,
    #[serde(default, rename = "hoursIX")]
    pub hours_ix: ClassHours,
    #[serde(default)]
    pub total_hours: u32,
    #[serde(default)]
    pub additional_task: Option<String>,
}

impl Teacher {
    pub fn new(name: &str, code: &str, subject: &str) -> Self {
        Teacher {
            id: 0,
            no: 0,
            name: name.to_string(),
            code: code.to_string(),
            subject: subject.to_string(),
            hours_vii: ClassHours::default(),
            hours_viii: ClassHours::default(),
            hours_ix: ClassHours::default(),
            total_hours: 0,
            additional_task: None,
        }
    }

    pub fn hours_for(&self, grade: Grade) -> &ClassHours {
        match grade {
            Grade::VII => &self.hours_vii,
            Grade::VIII => &self.hours_viii,
            Grade::IX => &self.hours_ix,
        }
    }

    pub fn hours_for_mut(&mut self, grade: Grade) -> &mut ClassHours {
        match grade {
            Grade::VII => &mut self.hours_vii,
            Grade::VIII => &mut self.hours_viii,
            Grade::IX => &mut self.hours_ix,
        }
    }

    pub fn quota(&self, class: &ClassLabel) -> u32 {
        self.hours_for(class.grade).get(&class.letter)
    }

    pub fn with_quota(mut self, class: &ClassLabel, hours: u32) -> Self {
        self.hours_for_mut(class.grade).set(&class.letter, hours);
        self.total_hours = [&self.hours_vii, &self.hours_viii, &self.hours_ix]
            .iter()
            .flat_map(|h| h.0.values())
            .fold(0u32, |total, h| total.saturating_add(*h));
        self
    }
}

/// The teacher list with code lookup. When two records share a code the
/// later one wins.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    teachers: Vec<Teacher>,
    by_code: HashMap<String, usize>,
}

impl Roster {
    pub fn new(teachers: Vec<Teacher>) -> Self {
        let by_code = teachers
            .iter()
            .enumerate()
            .map(|(i, t)| (t.code.clone(), i))
            .collect();
        Roster { teachers, by_code }
    }

    pub fn teachers(&self) -> &[Teacher] {
        &self.teachers
    }

    pub fn is_empty(&self) -> bool {
        self.teachers.is_empty()
    }

    pub fn by_code(&self, code: &str) -> Option<&Teacher> {
        self.by_code.get(code).map(|&i| &self.teachers[i])
    }

    pub fn name_of(&self, code: &str) -> Option<&str> {
        self.by_code(code).map(|t| t.name.as_str())
    }

    /// Teachers whose code is the effective owner of that code, in roster order
    pub fn unique_codes(&self) -> impl Iterator<Item = &Teacher> {
        self.teachers
            .iter()
            .enumerate()
            .filter(|(i, t)| self.by_code.get(&t.code) == Some(i))
            .map(|(_, t)| t)
    }

    pub fn codes_of_name<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.unique_codes()
            .filter(move |t| t.name == name)
            .map(|t| t.code.as_str())
    }

    /// Distinct teacher names in first-seen order
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for t in &self.teachers {
            if !names.contains(&t.name.as_str()) {
                names.push(&t.name);
            }
        }
        names
    }
}

/// Parses an hour count, returning 0 if empty or invalid
fn parse_hours(value: &str) -> u32 {
    value.trim().parse::<u32>().map_or(0, |h| h.min(MAX_QUOTA))
}

/// Loads a teacher list from CSV.
///
/// Columns are found by header: number ("no"), name ("nama"/"name"),
/// code ("kode"/"code") and subject ("mapel"/"subject"). Every header that
/// reads as a class label ("VII A") holds that class's weekly quota.
/// A later row with the same code replaces the earlier one.
pub fn load_teachers<R: Read>(source: R) -> Result<Vec<Teacher>, AppError> {
    let mut reader = Reader::from_reader(source);
    let headers = reader.headers()?.clone();

    let find = |needles: &[&str]| {
        headers.iter().position(|h| {
            let h = h.trim().to_lowercase();
            needles.iter().any(|n| h == *n || h.starts_with(&format!("{} ", n)))
        })
    };
    let no_col = find(&["no"]);
    let name_col = find(&["nama", "name"])
        .ok_or_else(|| AppError::Validation("Roster CSV has no name column".to_string()))?;
    let code_col = find(&["kode", "code"])
        .ok_or_else(|| AppError::Validation("Roster CSV has no code column".to_string()))?;
    let subject_col = find(&["mapel", "subject", "mata pelajaran"]);
    let task_col = find(&["tugas tambahan", "additional task"]);

    let class_cols: Vec<(usize, ClassLabel)> = headers
        .iter()
        .enumerate()
        .filter_map(|(i, h)| h.parse::<ClassLabel>().ok().map(|c| (i, c)))
        .collect();
    debug!(classes = class_cols.len(), "Detected quota columns");

    let mut order: Vec<String> = Vec::new();
    let mut by_code: HashMap<String, Teacher> = HashMap::new();

    for result in reader.records() {
        let record = result?;
        let name = record.get(name_col).unwrap_or("").trim().to_string();
        let code = record.get(code_col).unwrap_or("").trim().to_uppercase();

        // Skip if essential fields are missing
        if name.is_empty() || code.is_empty() {
            continue;
        }

        let subject = subject_col
            .and_then(|c| record.get(c))
            .unwrap_or("")
            .trim();
        let mut teacher = Teacher::new(&name, &code, subject);
        teacher.no = no_col
            .and_then(|c| record.get(c))
            .map(parse_hours)
            .unwrap_or(0);
        teacher.additional_task = task_col
            .and_then(|c| record.get(c))
            .map(str::trim)
            .filter(|s| !s.is_empty() && *s != "-")
            .map(str::to_string);

        for (col, class) in &class_cols {
            let hours = parse_hours(record.get(*col).unwrap_or(""));
            if hours > 0 {
                teacher = teacher.with_quota(class, hours);
            }
        }

        if !by_code.contains_key(&code) {
            order.push(code.clone());
        }
        by_code.insert(code, teacher);
    }

    let teachers: Vec<Teacher> = order
        .into_iter()
        .enumerate()
        .filter_map(|(i, code)| {
            by_code.remove(&code).map(|mut t| {
                t.id = i as u32 + 1;
                if t.no == 0 {
                    t.no = i as u32 + 1;
                }
                t
            })
        })
        .collect();

    info!(count = teachers.len(), "Loaded teacher roster");
    Ok(teachers)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class(s: &str) -> ClassLabel {
        s.parse().unwrap()
    }

    #[test]
    fn oversized_quotas_are_clamped() {
        let json = r#"{
            "name": "Budi", "code": "MTK-1",
            "hoursVII": {"A": 4294967295, "B": 1e12},
            "hoursIX": {"A": 99999999999}
        }"#;
        let t: Teacher = serde_json::from_str(json).unwrap();
        assert_eq!(t.quota(&class("VII A")), MAX_QUOTA);
        assert_eq!(t.quota(&class("VII B")), MAX_QUOTA);
        assert_eq!(t.quota(&class("IX A")), MAX_QUOTA);
        assert_eq!(parse_hours("4294967295"), MAX_QUOTA);

        let built = Teacher::new("Sari", "IPA-1", "IPA")
            .with_quota(&class("VII A"), u32::MAX)
            .with_quota(&class("VII B"), u32::MAX);
        assert_eq!(built.quota(&class("VII A")), MAX_QUOTA);
        assert_eq!(built.total_hours, 2 * MAX_QUOTA);
    }

    #[test]
    fn quota_tables_coerce_bad_values_to_zero() {
        let json = r#"{
            "name": "Budi", "code": "MTK-1", "subject": "Matematika",
            "hoursVII": {"A": 4, "B": "lots", "C": -2, "D": 2.0},
            "hoursVIII": null
        }"#;
        let t: Teacher = serde_json::from_str(json).unwrap();
        assert_eq!(t.quota(&class("VII A")), 4);
        assert_eq!(t.quota(&class("VII B")), 0);
        assert_eq!(t.quota(&class("VII C")), 0);
        assert_eq!(t.quota(&class("VII D")), 2);
        assert_eq!(t.quota(&class("VIII A")), 0);
        assert_eq!(t.quota(&class("IX E")), 0);
    }

    #[test]
    fn later_duplicate_code_wins_lookup() {
        let roster = Roster::new(vec![
            Teacher::new("Budi", "MTK-1", "Matematika"),
            Teacher::new("Sari", "MTK-1", "Matematika"),
            Teacher::new("Budi", "MTK-2", "Matematika"),
        ]);
        assert_eq!(roster.name_of("MTK-1"), Some("Sari"));
        assert_eq!(roster.unique_codes().count(), 2);
        assert_eq!(roster.codes_of_name("Budi").collect::<Vec<_>>(), vec!["MTK-2"]);
        assert_eq!(roster.names(), vec!["Budi", "Sari"]);
    }

    #[test]
    fn loads_roster_csv_with_class_columns() {
        let csv = "No,Nama Guru,Kode,Mapel,VII A,VII B,VIII A,Tugas Tambahan\n\
                   1,Budi,mtk-1,Matematika,4,,,-\n\
                   2,Sari,IPA-1,IPA,,5,3,Wali Kelas\n\
                   3,,X-1,Kosong,1,1,1,\n\
                   4,Budi Santoso,MTK-1,Matematika,2,2,,\n";
        let teachers = load_teachers(csv.as_bytes()).unwrap();
        assert_eq!(teachers.len(), 2);

        let budi = &teachers[0];
        assert_eq!(budi.code, "MTK-1");
        assert_eq!(budi.name, "Budi Santoso");
        assert_eq!(budi.quota(&class("VII A")), 2);
        assert_eq!(budi.quota(&class("VII B")), 2);
        assert_eq!(budi.total_hours, 4);

        let sari = &teachers[1];
        assert_eq!(sari.quota(&class("VIII A")), 3);
        assert_eq!(sari.additional_task.as_deref(), Some("Wali Kelas"));
        assert_eq!(sari.id, 2);
    }

    #[test]
    fn roster_csv_without_code_column_is_rejected() {
        let csv = "Nama,Mapel\nBudi,Matematika\n";
        assert!(matches!(load_teachers(csv.as_bytes()), Err(AppError::Validation(_))));
    }
}
