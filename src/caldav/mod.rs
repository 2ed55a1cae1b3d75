pub mod report;
pub mod types;

pub use report::map_calendar_objects;
pub use types::CalendarObject;
