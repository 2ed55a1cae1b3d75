/// Calendar object (event or task) returned by a `calendar-query` REPORT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarObject {
    pub href: String,
    pub etag: Option<String>,
    /// Raw iCalendar payload, kept byte-exact.
    pub calendar_data: Option<String>,
    pub status: Option<String>,
}
