use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(
    /// Identifier of a registered company (the login principal).
    CompanyId
);
entity_id!(InsuranceTypeId);
entity_id!(ValidityTypeId);
entity_id!(
    /// Identifier of an insurance service listing.
    ServiceId
);
entity_id!(ResponseId);

/// Tenant of the marketplace. The email doubles as the login identity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Company {
    pub id: CompanyId,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub description: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_on: NaiveDate,
}

/// Company record before the store assigns an identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCompany {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub description: Option<String>,
    pub password_hash: String,
    pub created_on: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsuranceType {
    pub id: InsuranceTypeId,
    pub name: String,
    pub risks: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidityType {
    pub id: ValidityTypeId,
    pub name: String,
    pub time: f64,
}

/// Insurance product listing owned by a company.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub id: ServiceId,
    pub title: String,
    pub description: Option<String>,
    pub coverage_amount: f64,
    pub price: f64,
    pub type_id: InsuranceTypeId,
    pub validity_id: ValidityTypeId,
    pub company_id: CompanyId,
}

/// Validated, owner-less service fields shared by create and update.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceDraft {
    pub title: String,
    pub description: Option<String>,
    pub coverage_amount: f64,
    pub price: f64,
    pub type_id: InsuranceTypeId,
    pub validity_id: ValidityTypeId,
}

/// Prospective client inquiry against a service. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: ResponseId,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub birth_date: NaiveDate,
    pub response_date: NaiveDate,
    pub service_id: ServiceId,
    pub company_id: CompanyId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewResponse {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub birth_date: NaiveDate,
    pub response_date: NaiveDate,
    pub service_id: ServiceId,
    pub company_id: CompanyId,
}

/// Profile fields a company may change after registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Service projection handed to HTTP callers. `views` is only populated for
/// the owning company.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceView {
    pub id: ServiceId,
    pub title: String,
    pub description: Option<String>,
    pub coverage_amount: f64,
    pub price: f64,
    #[serde(rename = "type")]
    pub insurance_type: InsuranceType,
    pub validity: ValidityType,
    pub company: CompanySummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub views: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompanySummary {
    pub id: CompanyId,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub description: Option<String>,
}

impl From<&Company> for CompanySummary {
    fn from(company: &Company) -> Self {
        Self {
            id: company.id,
            name: company.name.clone(),
            email: company.email.clone(),
            phone: company.phone.clone(),
            description: company.description.clone(),
        }
    }
}

/// One page of listing results.
#[derive(Debug, Clone, Serialize)]
pub struct ServicePage {
    pub items: Vec<ServiceView>,
    pub total: usize,
    pub page: u32,
    pub page_size: usize,
    pub pages: usize,
}

/// Form choices for service creation.
#[derive(Debug, Clone, Serialize)]
pub struct Catalog {
    pub insurance_types: Vec<InsuranceType>,
    pub validity_types: Vec<ValidityType>,
}
