use chrono::NaiveDate;

/// Number of days since last activity for which a user still counts as active.
pub const ACTIVE_WINDOW_DAYS: i64 = 30;

/// Fixed date against which a whole run is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportContext {
    report_date: NaiveDate,
}

impl ReportContext {
    pub fn new(report_date: NaiveDate) -> Self {
        Self { report_date }
    }

    pub fn report_date(&self) -> NaiveDate {
        self.report_date
    }

    /// Returns `1` if `last_active_date` is at most [`ACTIVE_WINDOW_DAYS`] days before the report
    /// date, `0` otherwise. Dates after the report date count as active.
    pub fn activity_flag(&self, last_active_date: NaiveDate) -> u8 {
        let days = (self.report_date - last_active_date).num_days();
        u8::from(days <= ACTIVE_WINDOW_DAYS)
    }
}
