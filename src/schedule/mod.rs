pub mod types;
pub mod slot_utils;
pub mod layout;
pub mod assignment;
pub mod eligibility;
pub mod conflicts;
pub mod monitor;
pub mod views;

pub use assignment::AssignmentMap;
pub use eligibility::{eligible_codes, EligibleCode, Unavailability};
pub use layout::{default_layout, load_layout};
pub use monitor::{monitor_load, TeacherLoad};
pub use types::{ClassLabel, Day, SlotKey, WeekLayout};
pub use views::{class_timetable, day_grid, teacher_timetable, teaching_blocks_on, DayGrid};
