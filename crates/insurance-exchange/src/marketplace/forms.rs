//! Inbound form payloads and their field validation.
//!
//! Every form validates as a whole: either all fields pass and a cleaned value
//! comes back, or a [`ValidationError`] lists each failing field and nothing is
//! saved.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::{InsuranceTypeId, ProfileUpdate, ServiceDraft, ValidityTypeId};

const NAME_MAX: usize = 200;
const EMAIL_MAX: usize = 255;
const PHONE_MAX: usize = 20;
const PASSWORD_MIN: usize = 8;

/// Field level problem reported back to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// Rejected form submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub form: &'static str,
    pub fields: Vec<FieldError>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {} submission", self.form)?;
        for (index, issue) in self.fields.iter().enumerate() {
            let separator = if index == 0 { ": " } else { "; " };
            write!(f, "{separator}{} {}", issue.field, issue.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

impl ValidationError {
    pub fn has_field(&self, field: &str) -> bool {
        self.fields.iter().any(|issue| issue.field == field)
    }
}

struct FieldChecks {
    form: &'static str,
    fields: Vec<FieldError>,
}

impl FieldChecks {
    fn new(form: &'static str) -> Self {
        Self {
            form,
            fields: Vec::new(),
        }
    }

    fn fail(&mut self, field: &'static str, message: impl Into<String>) {
        self.fields.push(FieldError {
            field,
            message: message.into(),
        });
    }

    fn required(&mut self, field: &'static str, value: &str, max: usize) -> String {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            self.fail(field, "is required");
        } else if trimmed.chars().count() > max {
            self.fail(field, format!("must be at most {max} characters"));
        }
        trimmed.to_string()
    }

    fn email(&mut self, field: &'static str, value: &str) -> String {
        let email = self.required(field, value, EMAIL_MAX);
        if !email.is_empty() && !looks_like_email(&email) {
            self.fail(field, "must be a valid email address");
        }
        email
    }

    fn amount(&mut self, field: &'static str, value: f64) {
        if !value.is_finite() || value < 0.0 {
            self.fail(field, "must be a non-negative number");
        }
    }

    fn finish<T>(self, value: T) -> Result<T, ValidationError> {
        if self.fields.is_empty() {
            Ok(value)
        } else {
            Err(ValidationError {
                form: self.form,
                fields: self.fields,
            })
        }
    }
}

fn looks_like_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain
            .split_once('.')
            .is_some_and(|(head, tail)| !head.is_empty() && !tail.is_empty())
        && !value.chars().any(char::is_whitespace)
}

fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

/// Company sign-up payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationForm {
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(default)]
    pub description: Option<String>,
    pub password1: String,
    pub password2: String,
}

/// Registration fields after validation. The password is still plaintext and
/// must be hashed before storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanRegistration {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub description: Option<String>,
    pub password: String,
}

impl RegistrationForm {
    pub fn validate(self) -> Result<CleanRegistration, ValidationError> {
        let mut checks = FieldChecks::new("registration");
        let name = checks.required("name", &self.name, NAME_MAX);
        let email = checks.email("email", &self.email).to_ascii_lowercase();
        let phone = checks.required("phone", &self.phone, PHONE_MAX);

        if self.password1 != self.password2 {
            checks.fail("password2", "the two password fields didn't match");
        }
        if self.password1.chars().count() < PASSWORD_MIN {
            checks.fail(
                "password1",
                format!("must contain at least {PASSWORD_MIN} characters"),
            );
        } else if self.password1.chars().all(|c| c.is_ascii_digit()) {
            checks.fail("password1", "can't be entirely numeric");
        }

        checks.finish(CleanRegistration {
            name,
            email,
            phone,
            description: optional_text(self.description),
            password: self.password1,
        })
    }
}

/// Credentials submitted to `/login`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginForm {
    #[serde(alias = "username")]
    pub email: String,
    pub password: String,
}

impl LoginForm {
    pub fn validate(self) -> Result<LoginForm, ValidationError> {
        let mut checks = FieldChecks::new("login");
        let email = checks.required("email", &self.email, EMAIL_MAX);
        if self.password.is_empty() {
            checks.fail("password", "is required");
        }
        checks.finish(LoginForm {
            email: email.to_ascii_lowercase(),
            password: self.password,
        })
    }
}

impl ProfileUpdate {
    pub fn validate(self) -> Result<ProfileUpdate, ValidationError> {
        let mut checks = FieldChecks::new("profile");
        let name = checks.required("name", &self.name, NAME_MAX);
        let email = checks.email("email", &self.email).to_ascii_lowercase();
        let phone = checks.required("phone", &self.phone, PHONE_MAX);
        checks.finish(ProfileUpdate {
            name,
            email,
            phone,
            description: optional_text(self.description),
        })
    }
}

/// Service create/update payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceForm {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub type_id: InsuranceTypeId,
    #[serde(rename = "validity")]
    pub validity_id: ValidityTypeId,
    pub coverage_amount: f64,
    pub price: f64,
}

impl ServiceForm {
    /// Checks field shape only; referenced catalog entries are resolved by the
    /// marketplace against the store.
    pub fn validate(self) -> Result<ServiceDraft, ValidationError> {
        let mut checks = FieldChecks::new("service");
        let title = checks.required("title", &self.title, NAME_MAX);
        checks.amount("coverage_amount", self.coverage_amount);
        checks.amount("price", self.price);
        checks.finish(ServiceDraft {
            title,
            description: optional_text(self.description),
            coverage_amount: self.coverage_amount,
            price: self.price,
            type_id: self.type_id,
            validity_id: self.validity_id,
        })
    }
}

/// Client inquiry submitted on a service detail page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseForm {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub birth_date: NaiveDate,
}

/// Response fields after validation; the marketplace adds dates and owners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanResponse {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub birth_date: NaiveDate,
}

impl ResponseForm {
    pub fn validate(self, today: NaiveDate) -> Result<CleanResponse, ValidationError> {
        let mut checks = FieldChecks::new("response");
        let full_name = checks.required("full_name", &self.full_name, NAME_MAX);
        let email = checks.email("email", &self.email);
        let phone = checks.required("phone", &self.phone, PHONE_MAX);
        if self.birth_date > today {
            checks.fail("birth_date", "can't be in the future");
        }
        checks.finish(CleanResponse {
            full_name,
            email,
            phone,
            birth_date: self.birth_date,
        })
    }
}
