use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::AppError;

/// School day, Monday through Saturday
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Day {
    Senin,
    Selasa,
    Rabu,
    Kamis,
    Jumat,
    Sabtu,
}

impl Day {
    pub const ALL: [Day; 6] = [
        Day::Senin,
        Day::Selasa,
        Day::Rabu,
        Day::Kamis,
        Day::Jumat,
        Day::Sabtu,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Day::Senin => "SENIN",
            Day::Selasa => "SELASA",
            Day::Rabu => "RABU",
            Day::Kamis => "KAMIS",
            Day::Jumat => "JUM'AT",
            Day::Sabtu => "SABTU",
        }
    }

    /// Sunday has no school day
    pub fn from_weekday(weekday: Weekday) -> Option<Day> {
        match weekday {
            Weekday::Mon => Some(Day::Senin),
            Weekday::Tue => Some(Day::Selasa),
            Weekday::Wed => Some(Day::Rabu),
            Weekday::Thu => Some(Day::Kamis),
            Weekday::Fri => Some(Day::Jumat),
            Weekday::Sat => Some(Day::Sabtu),
            Weekday::Sun => None,
        }
    }

    pub fn from_date(date: NaiveDate) -> Option<Day> {
        Day::from_weekday(date.weekday())
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Day {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        Day::ALL
            .iter()
            .find(|d| d.name() == upper || (**d == Day::Jumat && upper == "JUMAT"))
            .copied()
            .ok_or_else(|| AppError::Validation(format!("Unknown day: {}", s.trim())))
    }
}

impl Serialize for Day {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Day {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Grade level; selects which quota table of a teacher applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Grade {
    VII,
    VIII,
    IX,
}

impl Grade {
    pub fn name(&self) -> &'static str {
        match self {
            Grade::VII => "VII",
            Grade::VIII => "VIII",
            Grade::IX => "IX",
        }
    }
}

impl FromStr for Grade {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "VII" => Ok(Grade::VII),
            "VIII" => Ok(Grade::VIII),
            "IX" => Ok(Grade::IX),
            other => Err(AppError::Validation(format!("Unknown grade: {}", other))),
        }
    }
}

/// A class label such as "VII A"
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClassLabel {
    pub grade: Grade,
    pub letter: String,
}

impl ClassLabel {
    pub fn new(grade: Grade, letter: &str) -> Self {
        ClassLabel {
            grade,
            letter: letter.trim().to_uppercase(),
        }
    }
}

impl fmt::Display for ClassLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.grade.name(), self.letter)
    }
}

impl FromStr for ClassLabel {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let (grade, letter) = match (parts.next(), parts.next(), parts.next()) {
            (Some(grade), Some(letter), None) => (grade, letter),
            _ => return Err(AppError::Validation(format!("Invalid class label: {}", s))),
        };
        Ok(ClassLabel::new(grade.parse()?, letter))
    }
}

impl Serialize for ClassLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ClassLabel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// One row of a day's bell schedule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PeriodRow {
    Teaching { period: u8, time: String },
    /// Spans all classes and never takes an assignment
    Activity { jam: String, time: String, activity: String },
}

impl PeriodRow {
    pub fn jam(&self) -> String {
        match self {
            PeriodRow::Teaching { period, .. } => period.to_string(),
            PeriodRow::Activity { jam, .. } => jam.clone(),
        }
    }

    pub fn time(&self) -> &str {
        match self {
            PeriodRow::Teaching { time, .. } | PeriodRow::Activity { time, .. } => time,
        }
    }

    pub fn period(&self) -> Option<u8> {
        match self {
            PeriodRow::Teaching { period, .. } => Some(*period),
            PeriodRow::Activity { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayTemplate {
    pub day: Day,
    pub rows: Vec<PeriodRow>,
}

impl DayTemplate {
    pub fn teaching_periods(&self) -> impl Iterator<Item = u8> + '_ {
        self.rows.iter().filter_map(PeriodRow::period)
    }
}

/// Classes plus the bell schedule of every school day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekLayout {
    pub classes: Vec<ClassLabel>,
    pub days: Vec<DayTemplate>,
}

impl WeekLayout {
    pub fn day(&self, day: Day) -> Option<&DayTemplate> {
        self.days.iter().find(|d| d.day == day)
    }

    pub fn has_class(&self, class: &ClassLabel) -> bool {
        self.classes.contains(class)
    }

    pub fn is_teaching_period(&self, day: Day, period: u8) -> bool {
        self.day(day)
            .map(|d| d.teaching_periods().any(|p| p == period))
            .unwrap_or(false)
    }
}

/// Address of one cell of the week grid
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotKey {
    pub day: Day,
    pub period: u8,
    pub class: ClassLabel,
}

impl SlotKey {
    pub fn new(day: Day, period: u8, class: ClassLabel) -> Self {
        SlotKey { day, period, class }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.day, self.period, self.class)
    }
}

impl FromStr for SlotKey {
    type Err = AppError;

    /// Parses the "DAY-PERIOD-CLASS" form, e.g. "SENIN-1-VII A"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, '-');
        let (day, period, class) = match (parts.next(), parts.next(), parts.next()) {
            (Some(day), Some(period), Some(class)) => (day, period, class),
            _ => return Err(AppError::Validation(format!("Invalid slot key: {}", s))),
        };
        let period = period
            .trim()
            .parse::<u8>()
            .map_err(|_| AppError::Validation(format!("Invalid period in slot key: {}", s)))?;
        Ok(SlotKey::new(day.parse()?, period, class.parse()?))
    }
}
