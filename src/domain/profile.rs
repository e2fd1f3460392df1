use crate::error::{AdmissionError, FieldError};
use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
});

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9][0-9 ()\-]{5,19}$").expect("phone pattern is valid"));

pub fn is_valid_email(value: &str) -> bool {
    EMAIL_RE.is_match(value)
}

pub fn is_valid_phone(value: &str) -> bool {
    PHONE_RE.is_match(value) && value.chars().filter(char::is_ascii_digit).count() >= 7
}

/// Contact and background details for one parent or guardian.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Guardian {
    pub name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub education: Option<String>,
    pub occupation: Option<String>,
    pub work_address: Option<String>,
    pub phone: Option<String>,
    pub mobile: Option<String>,
    pub email: Option<String>,
    pub religion: Option<String>,
    pub address: Option<String>,
}

impl Guardian {
    fn has_name(&self) -> bool {
        present(&self.name).is_some()
    }

    /// First usable contact number, landline preferred.
    pub fn contact_number(&self) -> Option<&str> {
        present(&self.phone).or_else(|| present(&self.mobile))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sibling {
    pub name: String,
    pub grade: Option<String>,
    pub age: Option<String>,
    pub attends_school: Option<bool>,
    pub school: Option<String>,
}

/// The admission form as submitted by a parent.
///
/// Only the primary email, a student name, and one guardian name and
/// contact number are required; every other field passes through as given.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicantProfile {
    pub primary_email: String,
    pub student_first_name: Option<String>,
    pub student_last_name: Option<String>,
    pub student_full_name: Option<String>,
    pub student_name_ar: Option<String>,
    pub gender: Option<String>,
    pub nationality: Option<String>,
    pub citizenship: Option<String>,
    pub religion: Option<String>,
    pub second_language: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub parent_passport_id: Option<String>,
    pub address: Option<String>,
    pub home_number: Option<String>,
    pub student_email: Option<String>,
    pub school: Option<String>,
    pub grade: Option<String>,
    pub previous_school: Option<String>,
    pub scholar_notes: Option<String>,
    pub father: Guardian,
    pub mother: Guardian,
    pub siblings: Vec<Sibling>,
    /// Admission period (academic year); the configured period applies when absent.
    pub academic_year: Option<String>,
}

impl ApplicantProfile {
    /// Trims the identifying fields and drops siblings without a name.
    pub fn normalized(mut self) -> Self {
        self.primary_email = self.primary_email.trim().to_string();
        for field in [
            &mut self.student_first_name,
            &mut self.student_last_name,
            &mut self.student_full_name,
            &mut self.student_email,
            &mut self.academic_year,
            &mut self.father.name,
            &mut self.father.email,
            &mut self.father.phone,
            &mut self.father.mobile,
            &mut self.mother.name,
            &mut self.mother.email,
            &mut self.mother.phone,
            &mut self.mother.mobile,
        ] {
            *field = field
                .take()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty());
        }
        self.siblings.retain(|s| !s.name.trim().is_empty());
        self
    }

    /// Checks every rule and reports all failing fields at once.
    pub fn validate(&self) -> Result<(), AdmissionError> {
        let mut errors = Vec::new();

        if self.primary_email.is_empty() {
            errors.push(FieldError::required("primary_email"));
        } else if !is_valid_email(&self.primary_email) {
            errors.push(FieldError::new("primary_email", "must be a valid email address"));
        }

        if self.student_display_name().is_none() {
            errors.push(FieldError::new(
                "student_name",
                "student first and last name (or full name) are required",
            ));
        }

        if !self.father.has_name() && !self.mother.has_name() {
            errors.push(FieldError::new(
                "guardian_name",
                "at least one parent or guardian name is required",
            ));
        }

        if self.guardian_phone().is_none() {
            errors.push(FieldError::new(
                "guardian_phone",
                "at least one parent or guardian phone number is required",
            ));
        }

        let optional_emails = [
            ("student_email", &self.student_email),
            ("father.email", &self.father.email),
            ("mother.email", &self.mother.email),
        ];
        for (field, value) in optional_emails {
            if let Some(email) = present(value)
                && !is_valid_email(email)
            {
                errors.push(FieldError::new(field, "must be a valid email address"));
            }
        }

        let phones = [
            ("home_number", &self.home_number),
            ("father.phone", &self.father.phone),
            ("father.mobile", &self.father.mobile),
            ("mother.phone", &self.mother.phone),
            ("mother.mobile", &self.mother.mobile),
        ];
        for (field, value) in phones {
            if let Some(phone) = present(value)
                && !is_valid_phone(phone)
            {
                errors.push(FieldError::new(field, "must be a valid phone number"));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(AdmissionError::Validation(errors))
        }
    }

    /// Billable name: first and last name, falling back to the full name.
    pub fn student_display_name(&self) -> Option<String> {
        let split = [&self.student_first_name, &self.student_last_name]
            .into_iter()
            .filter_map(present)
            .collect::<Vec<_>>()
            .join(" ");
        if !split.is_empty() {
            return Some(split);
        }
        present(&self.student_full_name).map(str::to_string)
    }

    pub fn guardian_phone(&self) -> Option<&str> {
        self.father
            .contact_number()
            .or_else(|| self.mother.contact_number())
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_profile() -> ApplicantProfile {
        ApplicantProfile {
            primary_email: "parent@example.com".into(),
            student_first_name: Some("Laila".into()),
            student_last_name: Some("Hassan".into()),
            father: Guardian {
                name: Some("Omar Hassan".into()),
                phone: Some("+20 100 555 1234".into()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn failing_fields(profile: &ApplicantProfile) -> Vec<String> {
        match profile.validate() {
            Err(AdmissionError::Validation(errors)) => {
                errors.into_iter().map(|e| e.field).collect()
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_profile_passes() {
        assert!(valid_profile().validate().is_ok());
    }

    #[test]
    fn test_reports_every_failing_field() {
        let profile = ApplicantProfile {
            primary_email: "not-an-email".into(),
            student_email: Some("also bad".into()),
            mother: Guardian {
                mobile: Some("12".into()),
                ..Default::default()
            },
            ..Default::default()
        };

        let fields = failing_fields(&profile);
        assert_eq!(
            fields,
            vec![
                "primary_email",
                "student_name",
                "guardian_name",
                "student_email",
                "mother.mobile",
            ]
        );
    }

    #[test]
    fn test_missing_required_fields() {
        let fields = failing_fields(&ApplicantProfile::default());
        assert_eq!(
            fields,
            vec!["primary_email", "student_name", "guardian_name", "guardian_phone"]
        );
    }

    #[test]
    fn test_full_name_satisfies_student_name() {
        let profile = ApplicantProfile {
            student_first_name: None,
            student_last_name: Some("   ".into()),
            student_full_name: Some("Laila Omar Hassan".into()),
            ..valid_profile()
        };
        assert!(profile.validate().is_ok());
        assert_eq!(
            profile.student_display_name().as_deref(),
            Some("Laila Omar Hassan")
        );
    }

    #[test]
    fn test_display_name_prefers_split_fields() {
        let profile = ApplicantProfile {
            student_full_name: Some("Someone Else".into()),
            ..valid_profile()
        };
        assert_eq!(profile.student_display_name().as_deref(), Some("Laila Hassan"));
    }

    #[test]
    fn test_normalized_trims_and_drops_empty() {
        let profile = ApplicantProfile {
            primary_email: "  parent@example.com ".into(),
            student_email: Some("   ".into()),
            siblings: vec![
                Sibling {
                    name: "Nour".into(),
                    ..Default::default()
                },
                Sibling::default(),
            ],
            ..valid_profile()
        }
        .normalized();

        assert_eq!(profile.primary_email, "parent@example.com");
        assert_eq!(profile.student_email, None);
        assert_eq!(profile.siblings.len(), 1);
    }

    #[test]
    fn test_phone_format() {
        assert!(is_valid_phone("+20 100 555 1234"));
        assert!(is_valid_phone("(02) 2345-6789"));
        assert!(!is_valid_phone("12345"));
        assert!(!is_valid_phone("call me"));
    }
}
