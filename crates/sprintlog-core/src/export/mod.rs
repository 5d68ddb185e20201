//! Topic exports
//!
//! - `document`: paginated PDF report
//! - `spreadsheet`: `.xlsx` workbook export and import
//!
//! Both build a plain in-memory model first and render it in a second
//! step, so the layout and sheet contents can be checked without parsing
//! binary output.

pub mod document;
pub mod spreadsheet;

use chrono::{DateTime, SecondsFormat, Utc};
use chrono_tz::Tz;

/// `YYYY-MM-DD HH:MM:SS` in the given zone
pub fn format_local(ts: DateTime<Utc>, tz: Tz) -> String {
    ts.with_timezone(&tz).format("%Y-%m-%d %H:%M:%S").to_string()
}

/// RFC 3339 with whole seconds and the zone's offset
pub fn rfc3339_local(ts: DateTime<Utc>, tz: Tz) -> String {
    ts.with_timezone(&tz)
        .to_rfc3339_opts(SecondsFormat::Secs, false)
}
