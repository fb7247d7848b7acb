use std::collections::BTreeSet;
use std::io::{Read, Write};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::documents::{decode, AppSettings, AuthSettings, Document, DocumentKey, TeacherList};
use crate::error::AppError;
use crate::roster::{load_teachers, Roster, Teacher};
use crate::schedule::views::{TeachingBlock, TimetableEntry};
use crate::schedule::{
    class_timetable, day_grid, eligible_codes, monitor_load, teacher_timetable, teaching_blocks_on, AssignmentMap,
    ClassLabel, Day, DayGrid, EligibleCode, SlotKey, TeacherLoad, Unavailability, WeekLayout,
};
use crate::sheet::{export_master, export_template, import_template, ImportSummary};
use crate::store::{PersistenceGateway, RemoteStore, SyncQueue};

/// Who is signed in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", content = "name", rename_all = "snake_case")]
pub enum Role {
    Admin,
    Teacher(String),
    Class(String),
}

impl Role {
    pub fn require_admin(&self) -> Result<(), AppError> {
        match self {
            Role::Admin => Ok(()),
            _ => Err(AppError::Authorization("Only the administrator can change data".to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshMode {
    /// Started by a person who can be asked to confirm
    Interactive,
    /// Started on its own, e.g. at startup
    Background,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RefreshOutcome {
    NotConfigured,
    Failed,
    Applied { documents: Vec<DocumentKey> },
    NeedsConfirmation { suspicious: Vec<DocumentKey> },
    Aborted { suspicious: Vec<DocumentKey> },
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncStatus {
    pub configured: bool,
    pub pending_writes: usize,
    pub last_sync: Option<DateTime<Utc>>,
}

/// Everything the application holds in memory, plus the gateway it persists
/// through. Every mutation is written locally before it returns.
pub struct AppState {
    layout: WeekLayout,
    settings: AppSettings,
    auth: AuthSettings,
    roster: Roster,
    map: AssignmentMap,
    unavailable: Unavailability,
    gateway: PersistenceGateway,
    fallback_admin_password: String,
    last_sync: Option<DateTime<Utc>>,
}

impl AppState {
    /// Restores every document from the local store
    pub fn load(layout: WeekLayout, gateway: PersistenceGateway, fallback_admin_password: &str) -> Self {
        let teachers: TeacherList = gateway.load();
        let map: AssignmentMap = gateway.load();
        info!(teachers = teachers.0.len(), assignments = map.len(), "Loaded local documents");

        AppState {
            layout,
            settings: gateway.load(),
            auth: gateway.load(),
            roster: Roster::new(teachers.0),
            map,
            unavailable: gateway.load(),
            gateway,
            fallback_admin_password: fallback_admin_password.to_string(),
            last_sync: None,
        }
    }

    pub fn layout(&self) -> &WeekLayout {
        &self.layout
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn assignments(&self) -> &AssignmentMap {
        &self.map
    }

    pub fn unavailability(&self) -> &Unavailability {
        &self.unavailable
    }

    pub fn remote(&self) -> Arc<dyn RemoteStore> {
        self.gateway.remote()
    }

    /// For flushing pending remote writes outside any lock on the state
    pub fn sync_queue(&self) -> SyncQueue {
        self.gateway.sync_queue()
    }

    pub fn sync_status(&self) -> SyncStatus {
        SyncStatus {
            configured: self.gateway.is_remote_configured(),
            pending_writes: self.gateway.pending_writes(),
            last_sync: self.last_sync,
        }
    }

    /// Plain comparison against stored passwords. No username, or "admin",
    /// means the administrator; otherwise a class label or a teacher name.
    pub fn authenticate(&self, username: Option<&str>, password: &str) -> Result<Role, AppError> {
        let denied = || AppError::Authentication("Wrong username or password".to_string());
        let username = username.map(str::trim).filter(|u| !u.is_empty());

        match username {
            None => {
                let admin = if self.auth.admin_password.is_empty() {
                    &self.fallback_admin_password
                } else {
                    &self.auth.admin_password
                };
                if !admin.is_empty() && password == admin {
                    Ok(Role::Admin)
                } else {
                    Err(denied())
                }
            }
            Some(user) if user.eq_ignore_ascii_case("admin") => self.authenticate(None, password),
            Some(user) => {
                if let Ok(class) = user.parse::<ClassLabel>() {
                    let label = class.to_string();
                    if self.auth.class_passwords.get(&label).map(String::as_str) == Some(password) {
                        return Ok(Role::Class(label));
                    }
                }
                match self.auth.teacher_passwords.get(user) {
                    Some(stored) if stored == password => Ok(Role::Teacher(user.to_string())),
                    _ => Err(denied()),
                }
            }
        }
    }

    fn persist<D: Document>(&self, doc: &D) -> Result<(), AppError> {
        self.gateway.store(doc).inspect_err(|e| e.log_and_record(D::KEY.as_str()))
    }

    fn check_slot(&self, slot: &SlotKey) -> Result<(), AppError> {
        if !self.layout.has_class(&slot.class) {
            return Err(AppError::NotFound(format!("Unknown class {}", slot.class)));
        }
        if !self.layout.is_teaching_period(slot.day, slot.period) {
            return Err(AppError::Validation(format!(
                "{} has no teaching period {}",
                slot.day, slot.period
            )));
        }
        Ok(())
    }

    /// Sets or clears one cell. Conflicts and exhausted quotas are reported
    /// by the views, never refused here. Returns the previous code.
    pub fn assign(&mut self, role: &Role, slot: SlotKey, code: &str) -> Result<Option<String>, AppError> {
        role.require_admin()?;
        self.check_slot(&slot)?;
        let mut map = self.map.clone();
        let previous = map.assign(slot, &code.trim().to_uppercase());
        self.persist(&map)?;
        self.map = map;
        Ok(previous)
    }

    /// Stores the schedule and hands back the queue so the caller can flush
    /// it without holding the state
    pub fn save_schedule(&self, role: &Role) -> Result<SyncQueue, AppError> {
        role.require_admin()?;
        self.persist(&self.map)?;
        info!(assignments = self.map.len(), "Schedule saved");
        Ok(self.sync_queue())
    }

    /// Returns whether the code is now blocked on that day
    pub fn toggle_unavailable(&mut self, role: &Role, code: &str, day: Day) -> Result<bool, AppError> {
        role.require_admin()?;
        let blocked = self.unavailable.toggle(&code.trim().to_uppercase(), day);
        self.persist(&self.unavailable)?;
        Ok(blocked)
    }

    pub fn replace_roster(&mut self, role: &Role, teachers: Vec<Teacher>) -> Result<(), AppError> {
        role.require_admin()?;
        let list = TeacherList(teachers);
        self.persist(&list)?;
        info!(teachers = list.0.len(), "Roster replaced");
        self.roster = Roster::new(list.0);
        Ok(())
    }

    pub fn import_roster<R: Read>(&mut self, role: &Role, source: R) -> Result<usize, AppError> {
        role.require_admin()?;
        let teachers = load_teachers(source)?;
        let count = teachers.len();
        self.replace_roster(role, teachers)?;
        Ok(count)
    }

    /// Applies a filled-in template sheet to the schedule
    pub fn import_sheet<R: Read>(&mut self, role: &Role, source: R) -> Result<ImportSummary, AppError> {
        role.require_admin()?;
        let mut map = self.map.clone();
        let summary = import_template(source, &self.layout, &mut map)?;
        self.persist(&map)?;
        self.map = map;
        Ok(summary)
    }

    pub fn update_settings(&mut self, role: &Role, settings: AppSettings) -> Result<(), AppError> {
        role.require_admin()?;
        self.persist(&settings)?;
        self.settings = settings;
        Ok(())
    }

    pub fn update_auth(&mut self, role: &Role, auth: AuthSettings) -> Result<(), AppError> {
        role.require_admin()?;
        self.persist(&auth)?;
        self.auth = auth;
        Ok(())
    }

    pub fn export_template<W: Write>(&self, out: W) -> Result<usize, AppError> {
        export_template(&self.layout, &self.map, out)
    }

    pub fn export_master<W: Write>(&self, out: W) -> Result<usize, AppError> {
        export_master(&self.layout, &self.map, out)
    }

    pub fn day_grid(&self, day: Day, filter: &BTreeSet<String>) -> Result<DayGrid, AppError> {
        let template = self
            .layout
            .day(day)
            .ok_or_else(|| AppError::NotFound(format!("No schedule for {}", day)))?;
        Ok(day_grid(&self.layout, &self.roster, &self.map, template, filter))
    }

    pub fn eligible(&self, slot: &SlotKey) -> Result<Vec<EligibleCode>, AppError> {
        self.check_slot(slot)?;
        Ok(eligible_codes(&self.roster, &self.map, &self.unavailable, slot))
    }

    pub fn monitor(&self) -> Vec<TeacherLoad> {
        monitor_load(&self.roster, &self.layout.classes, &self.map)
    }

    pub fn class_timetable(&self, class: &ClassLabel) -> Result<Vec<TimetableEntry>, AppError> {
        if !self.layout.has_class(class) {
            return Err(AppError::NotFound(format!("Unknown class {}", class)));
        }
        Ok(class_timetable(&self.layout, &self.roster, &self.map, class))
    }

    pub fn teacher_timetable(&self, name: &str) -> Result<Vec<TimetableEntry>, AppError> {
        if self.roster.codes_of_name(name).next().is_none() {
            return Err(AppError::NotFound(format!("Unknown teacher {}", name)));
        }
        Ok(teacher_timetable(&self.layout, &self.roster, &self.map, name))
    }

    pub fn teaching_blocks(&self, name: &str, date: NaiveDate) -> Vec<TeachingBlock> {
        teaching_blocks_on(&self.layout, &self.roster, &self.map, name, date)
    }

    /// Documents the snapshot would empty while local data exists
    fn suspicious_documents(&self, snapshot: &serde_json::Map<String, serde_json::Value>) -> Vec<DocumentKey> {
        let mut suspicious = Vec::new();
        if let Some(value) = snapshot.get(DocumentKey::TeacherData.as_str()) {
            if decode::<TeacherList>(Some(value.clone())).is_blank() && !self.roster.is_empty() {
                suspicious.push(DocumentKey::TeacherData);
            }
        }
        if let Some(value) = snapshot.get(DocumentKey::ScheduleMap.as_str()) {
            if decode::<AssignmentMap>(Some(value.clone())).is_blank() && !self.map.is_empty() {
                suspicious.push(DocumentKey::ScheduleMap);
            }
        }
        suspicious
    }

    /// Applies a fetched remote snapshot. `None` is a failed fetch and
    /// leaves everything as it was. Applied documents are written to the
    /// local store only.
    pub fn apply_remote(
        &mut self,
        snapshot: Option<serde_json::Map<String, serde_json::Value>>,
        mode: RefreshMode,
        confirmed: bool,
    ) -> Result<RefreshOutcome, AppError> {
        if !self.gateway.is_remote_configured() {
            return Ok(RefreshOutcome::NotConfigured);
        }
        let Some(snapshot) = snapshot else {
            warn!("Remote refresh failed, keeping local data");
            return Ok(RefreshOutcome::Failed);
        };

        let suspicious = self.suspicious_documents(&snapshot);
        if !suspicious.is_empty() {
            match mode {
                RefreshMode::Interactive if confirmed => {
                    warn!(?suspicious, "Overwriting local data with empty remote documents on request");
                }
                RefreshMode::Interactive => return Ok(RefreshOutcome::NeedsConfirmation { suspicious }),
                RefreshMode::Background => {
                    warn!(?suspicious, "Remote documents are empty while local data exists, refresh aborted");
                    return Ok(RefreshOutcome::Aborted { suspicious });
                }
            }
        }

        let mut documents = Vec::new();
        for key in DocumentKey::ALL {
            let Some(value) = snapshot.get(key.as_str()).cloned() else {
                continue;
            };
            match key {
                DocumentKey::AppSettings => {
                    self.settings = decode(Some(value));
                    self.gateway.store_local(&self.settings)?;
                }
                DocumentKey::AuthSettings => {
                    self.auth = decode(Some(value));
                    self.gateway.store_local(&self.auth)?;
                }
                DocumentKey::TeacherData => {
                    let list: TeacherList = decode(Some(value));
                    self.gateway.store_local(&list)?;
                    self.roster = Roster::new(list.0);
                }
                DocumentKey::ScheduleMap => {
                    self.map = decode(Some(value));
                    self.gateway.store_local(&self.map)?;
                }
                DocumentKey::UnavailableConstraints => {
                    self.unavailable = decode(Some(value));
                    self.gateway.store_local(&self.unavailable)?;
                }
            }
            documents.push(key);
        }

        self.last_sync = Some(Utc::now());
        info!(?documents, "Applied remote snapshot");
        Ok(RefreshOutcome::Applied { documents })
    }
}
