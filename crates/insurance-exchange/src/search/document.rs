use serde::{Deserialize, Serialize};

use super::query::FilterField;
use crate::marketplace::domain::{
    Company, CompanyId, InsuranceType, InsuranceTypeId, Service, ServiceId, ValidityType,
    ValidityTypeId,
};

/// Denormalized copy of a service and its related rows as held by the
/// search mirror. Rebuildable from the entity store at any time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDocument {
    pub id: ServiceId,
    pub title: String,
    pub description: Option<String>,
    pub coverage_amount: f64,
    pub price: f64,
    #[serde(rename = "type")]
    pub insurance_type: TypeFields,
    pub validity: ValidityFields,
    pub company: CompanyFields,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeFields {
    pub id: InsuranceTypeId,
    pub name: String,
    pub risks: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidityFields {
    pub id: ValidityTypeId,
    pub name: String,
    pub time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyFields {
    pub id: CompanyId,
    pub name: String,
    pub description: Option<String>,
    pub phone: String,
}

impl ServiceDocument {
    pub fn project(
        service: &Service,
        insurance_type: &InsuranceType,
        validity: &ValidityType,
        company: &Company,
    ) -> Self {
        Self {
            id: service.id,
            title: service.title.clone(),
            description: service.description.clone(),
            coverage_amount: service.coverage_amount,
            price: service.price,
            insurance_type: TypeFields {
                id: insurance_type.id,
                name: insurance_type.name.clone(),
                risks: insurance_type.risks.clone(),
            },
            validity: ValidityFields {
                id: validity.id,
                name: validity.name.clone(),
                time: validity.time,
            },
            company: CompanyFields {
                id: company.id,
                name: company.name.clone(),
                description: company.description.clone(),
                phone: company.phone.clone(),
            },
        }
    }

    pub fn filter_value(&self, field: FilterField) -> i64 {
        match field {
            FilterField::Type => self.insurance_type.id.0,
            FilterField::Validity => self.validity.id.0,
            FilterField::Company => self.company.id.0,
        }
    }

    /// Text of every full-text field: title, description, type name, risks,
    /// validity name, company name, company description, company phone.
    pub fn searchable_text(&self) -> impl Iterator<Item = &str> {
        [
            Some(self.title.as_str()),
            self.description.as_deref(),
            Some(self.insurance_type.name.as_str()),
            Some(self.validity.name.as_str()),
            Some(self.company.name.as_str()),
            self.company.description.as_deref(),
            Some(self.company.phone.as_str()),
        ]
        .into_iter()
        .flatten()
        .chain(self.insurance_type.risks.iter().map(String::as_str))
    }
}
