use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::roster::Teacher;
use crate::schedule::{AssignmentMap, Unavailability};

/// Names of the persisted documents, shared by the local and remote stores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum DocumentKey {
    AppSettings,
    AuthSettings,
    TeacherData,
    ScheduleMap,
    UnavailableConstraints,
}

impl DocumentKey {
    pub const ALL: [DocumentKey; 5] = [
        DocumentKey::AppSettings,
        DocumentKey::AuthSettings,
        DocumentKey::TeacherData,
        DocumentKey::ScheduleMap,
        DocumentKey::UnavailableConstraints,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKey::AppSettings => "appSettings",
            DocumentKey::AuthSettings => "authSettings",
            DocumentKey::TeacherData => "teacherData",
            DocumentKey::ScheduleMap => "scheduleMap",
            DocumentKey::UnavailableConstraints => "unavailableConstraints",
        }
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record type stored under a fixed key
pub trait Document: Serialize + DeserializeOwned + Default {
    const KEY: DocumentKey;

    /// True when the document holds nothing worth protecting
    fn is_blank(&self) -> bool;
}

/// Decodes a stored value, falling back to the default when it is missing or
/// doesn't fit the schema
pub fn decode<D: Document>(value: Option<serde_json::Value>) -> D {
    match value {
        None | Some(serde_json::Value::Null) => D::default(),
        Some(value) => serde_json::from_value(value).unwrap_or_else(|e| {
            warn!(key = %D::KEY, error = %e, "Stored document does not match its schema, using defaults");
            D::default()
        }),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppSettings {
    pub academic_year: String,
    pub semester: String,
    pub last_updated: String,
    pub logo_url: String,
    pub headmaster: String,
    pub headmaster_nip: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        AppSettings {
            academic_year: "2025/2026".to_string(),
            semester: "Genap".to_string(),
            last_updated: String::new(),
            logo_url: String::new(),
            headmaster: String::new(),
            headmaster_nip: String::new(),
        }
    }
}

impl Document for AppSettings {
    const KEY: DocumentKey = DocumentKey::AppSettings;

    fn is_blank(&self) -> bool {
        *self == AppSettings::default()
    }
}

/// Plaintext credentials. Teacher passwords are keyed by teacher name,
/// class passwords by class label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AuthSettings {
    pub admin_password: String,
    pub teacher_passwords: BTreeMap<String, String>,
    pub class_passwords: BTreeMap<String, String>,
}

impl Document for AuthSettings {
    const KEY: DocumentKey = DocumentKey::AuthSettings;

    fn is_blank(&self) -> bool {
        self.admin_password.is_empty() && self.teacher_passwords.is_empty() && self.class_passwords.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TeacherList(pub Vec<Teacher>);

impl Document for TeacherList {
    const KEY: DocumentKey = DocumentKey::TeacherData;

    fn is_blank(&self) -> bool {
        self.0.is_empty()
    }
}

impl Document for AssignmentMap {
    const KEY: DocumentKey = DocumentKey::ScheduleMap;

    fn is_blank(&self) -> bool {
        self.is_empty()
    }
}

impl Document for Unavailability {
    const KEY: DocumentKey = DocumentKey::UnavailableConstraints;

    fn is_blank(&self) -> bool {
        self.0.is_empty()
    }
}
