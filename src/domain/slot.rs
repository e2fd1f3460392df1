use crate::error::AdmissionError;
use chrono::{Datelike, NaiveDate, NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};

/// An entrance-test appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSlot {
    pub date: NaiveDate,
    pub time: NaiveTime,
}

/// Business-hour rules for booking entrance tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotPolicy {
    pub earliest_hour: u32,
    pub latest_hour: u32,
    pub business_days: Vec<Weekday>,
}

impl Default for SlotPolicy {
    /// Half-day window from 09:00 to 12:59, Monday through Thursday.
    fn default() -> Self {
        Self {
            earliest_hour: 9,
            latest_hour: 12,
            business_days: vec![Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu],
        }
    }
}

impl SlotPolicy {
    /// Parses and checks a requested slot against `today`.
    ///
    /// `date` is `YYYY-MM-DD`; `time` is `HH`, `HH:MM` or `HH:MM:SS`.
    /// The hour is checked before the date.
    pub fn validate(&self, date: &str, time: &str, today: NaiveDate) -> Result<TestSlot, AdmissionError> {
        let time = self.parse_time(time)?;
        let date = self.parse_date(date, today)?;
        Ok(TestSlot { date, time })
    }

    fn parse_time(&self, raw: &str) -> Result<NaiveTime, AdmissionError> {
        let raw = raw.trim();
        let mut parts = raw.splitn(3, ':');
        let hour = parts
            .next()
            .and_then(|h| h.parse::<u32>().ok())
            .ok_or_else(|| AdmissionError::InvalidHour(format!("'{raw}' is not a time of day")))?;
        let minute = match parts.next() {
            Some(m) => m
                .parse::<u32>()
                .map_err(|_| AdmissionError::InvalidHour(format!("'{raw}' is not a time of day")))?,
            None => 0,
        };

        if !(self.earliest_hour..=self.latest_hour).contains(&hour) {
            return Err(AdmissionError::InvalidHour(format!(
                "hour must be between {:02} and {:02}, got {hour}",
                self.earliest_hour, self.latest_hour
            )));
        }

        NaiveTime::from_hms_opt(hour, minute, 0)
            .ok_or_else(|| AdmissionError::InvalidHour(format!("'{raw}' is not a time of day")))
    }

    fn parse_date(&self, raw: &str, today: NaiveDate) -> Result<NaiveDate, AdmissionError> {
        let raw = raw.trim();
        let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|_| AdmissionError::InvalidDate(format!("'{raw}' is not a YYYY-MM-DD date")))?;

        if date < today {
            return Err(AdmissionError::InvalidDate(format!("{date} is in the past")));
        }
        if !self.business_days.contains(&date.weekday()) {
            return Err(AdmissionError::InvalidDate(format!(
                "tests are not held on {}",
                date.weekday()
            )));
        }
        Ok(date)
    }

    pub fn is_within_hours(&self, time: NaiveTime) -> bool {
        (self.earliest_hour..=self.latest_hour).contains(&time.hour())
    }
}
