/// Simulation time window.
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Canonical timestamp format used in realizations.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const ACCEPTED_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawWindow", into = "RawWindow")]
pub struct SimulationWindow {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawWindow {
    start_time: String,
    end_time: String,
}

fn parse_timestamp(s: &str) -> Result<NaiveDateTime, Error> {
    let s = s.trim();
    for fmt in ACCEPTED_FORMATS {
        if let Ok(t) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(t);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| Error::InvalidTime(format!("cannot parse `{s}`")))
}

impl SimulationWindow {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self, Error> {
        if end <= start {
            return Err(Error::InvalidTime(format!(
                "end {end} is not after start {start}"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn parse(start: &str, end: &str) -> Result<Self, Error> {
        Self::new(parse_timestamp(start)?, parse_timestamp(end)?)
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    pub fn start_string(&self) -> String {
        self.start.format(TIME_FORMAT).to_string()
    }

    pub fn end_string(&self) -> String {
        self.end.format(TIME_FORMAT).to_string()
    }

    /// `YYYYMMDDhhmm`, the Noah-OWP namelist format.
    pub fn start_compact(&self) -> String {
        self.start.format("%Y%m%d%H%M").to_string()
    }

    pub fn end_compact(&self) -> String {
        self.end.format("%Y%m%d%H%M").to_string()
    }

    /// `YYYY-mm-dd_HH:MM:SS`, the t-route restart format.
    pub fn start_restart(&self) -> String {
        self.start.format("%Y-%m-%d_%H:%M:%S").to_string()
    }

    pub fn duration_seconds(&self) -> i64 {
        (self.end - self.start).num_seconds()
    }

    /// Calendar years covered, end exclusive.
    pub fn year_span(&self) -> (i32, i32) {
        (self.start.year(), self.end.year() + 1)
    }
}

impl TryFrom<RawWindow> for SimulationWindow {
    type Error = Error;

    fn try_from(raw: RawWindow) -> Result<Self, Self::Error> {
        Self::parse(&raw.start_time, &raw.end_time)
    }
}

impl From<SimulationWindow> for RawWindow {
    fn from(w: SimulationWindow) -> Self {
        RawWindow {
            start_time: w.start_string(),
            end_time: w.end_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window() -> SimulationWindow {
        SimulationWindow::parse("2010-10-01 00:00:00", "2011-10-01 00:00:00").unwrap()
    }

    // -- parsing --

    #[test]
    fn accepts_iso_and_date_only() {
        assert!(SimulationWindow::parse("2010-10-01T00:00:00", "2010-10-02").is_ok());
    }

    #[test]
    fn end_before_start_is_rejected() {
        assert!(SimulationWindow::parse("2011-01-01 00:00:00", "2010-01-01 00:00:00").is_err());
    }

    #[test]
    fn serde_round_trip_uses_canonical_format() {
        let json = serde_json::to_string(&window()).unwrap();
        assert_eq!(
            json,
            r#"{"start_time":"2010-10-01 00:00:00","end_time":"2011-10-01 00:00:00"}"#
        );
        let back: SimulationWindow = serde_json::from_str(&json).unwrap();
        assert_eq!(back, window());
    }

    // -- derived formats --

    #[test]
    fn derived_formats() {
        let w = window();
        assert_eq!(w.start_compact(), "201010010000");
        assert_eq!(w.start_restart(), "2010-10-01_00:00:00");
        assert_eq!(w.duration_seconds(), 365 * 86400);
        assert_eq!(w.year_span(), (2010, 2012));
    }
}
