use crate::domain::application::ApplicationRecord;
use crate::error::{AdmissionError, Result};
use chrono::{NaiveDate, SecondsFormat};
use serde::Serialize;
use std::io::Write;

/// One exported row. Column order is the header order.
#[derive(Debug, Serialize)]
struct ApplicationRow<'a> {
    application_id: String,
    student_name: String,
    primary_email: &'a str,
    grade: &'a str,
    admission_period: &'a str,
    status: &'static str,
    payment_status: &'static str,
    test_date: Option<NaiveDate>,
    test_time: Option<String>,
    created_at: String,
}

impl<'a> From<&'a ApplicationRecord> for ApplicationRow<'a> {
    fn from(record: &'a ApplicationRecord) -> Self {
        Self {
            application_id: record.id.to_string(),
            student_name: record.profile.student_display_name().unwrap_or_default(),
            primary_email: record.primary_email(),
            grade: record.profile.grade.as_deref().unwrap_or_default(),
            admission_period: &record.admission_period,
            status: record.status.label(),
            payment_status: record.payment_status.label(),
            test_date: record.test_date,
            test_time: record.test_time.map(|t| t.format("%H:%M").to_string()),
            created_at: record.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

/// Writes applications as CSV for administrators.
///
/// Wraps `csv::Writer`; the header row is emitted even when there is
/// nothing to export.
pub struct ApplicationWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ApplicationWriter<W> {
    pub fn new(sink: W) -> Self {
        let writer = csv::WriterBuilder::new().has_headers(false).from_writer(sink);
        Self { writer }
    }

    pub fn write_applications<'a>(
        &mut self,
        records: impl IntoIterator<Item = &'a ApplicationRecord>,
    ) -> Result<()> {
        self.writer.write_record([
            "application_id",
            "student_name",
            "primary_email",
            "grade",
            "admission_period",
            "status",
            "payment_status",
            "test_date",
            "test_time",
            "created_at",
        ])?;
        for record in records {
            self.writer.serialize(ApplicationRow::from(record))?;
        }
        self.writer.flush().map_err(csv::Error::from)?;
        Ok(())
    }

    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| AdmissionError::Internal(e.to_string()))
    }
}

/// Renders `records` into an in-memory CSV document.
pub fn to_csv_bytes(records: &[ApplicationRecord]) -> Result<Vec<u8>> {
    let mut writer = ApplicationWriter::new(Vec::new());
    writer.write_applications(records)?;
    writer.into_inner()
}
