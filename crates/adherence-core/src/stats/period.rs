//! Calendar helpers: inclusive date ranges and prescription windows.

use chrono::NaiveDate;

/// Every date from `start` to `end`, both included.
///
/// Empty when `start > end`.
pub fn date_range(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start.iter_days().take_while(|date| *date <= end).collect()
}

/// Whether `date` lies in the window `[start, end]`; a missing end means open-ended.
pub fn is_active_on(date: NaiveDate, start: NaiveDate, end: Option<NaiveDate>) -> bool {
    date >= start && end.map_or(true, |end| date <= end)
}

/// First and last day of a calendar month.
pub fn month_range(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next_month = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((first, next_month.pred_opt()?))
}
