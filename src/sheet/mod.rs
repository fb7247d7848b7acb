pub mod template;
pub mod master;

pub use master::export_master;
pub use template::{export_template, import_template, ImportSummary};

pub const DAY_COLUMN: &str = "Hari";
pub const PERIOD_COLUMN: &str = "Jam";
pub const TIME_COLUMN: &str = "Waktu";
pub const ACTIVITY_COLUMN: &str = "Kegiatan";

/// Cell values that clear an assignment on import
pub const CLEAR_SENTINELS: [&str; 3] = ["", "KOSONG", "-"];
