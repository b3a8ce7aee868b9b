use chrono::{Days, NaiveDate};

pub const HORIZON_DAYS: u64 = 3;

/// Last due date (inclusive) that still counts as "due soon".
pub fn horizon_end(today: NaiveDate) -> NaiveDate {
    today + Days::new(HORIZON_DAYS)
}
