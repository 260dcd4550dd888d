//! A collection of utility functions
use chrono::DateTime;
use chrono::Utc;

use crate::errors::Error;

/// Formats a timestamp into a RFC 3339 - Z format.
/// For example "2018-01-26T18:30:09.453Z"
pub fn format_timestamp(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Builds a UTC timestamp from a RFC 3339 formatted string. Offsets other
/// than `Z` are converted to UTC.
/// For example "2018-01-26T18:30:09+01:00"
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, Error> {
    let datetime = DateTime::parse_from_rfc3339(s).map_err(|e| Error::Decode {
        what: "timestamp".into(),
        how: e.to_string(),
    })?;
    Ok(datetime.with_timezone(&Utc))
}
