use super::domain::{
    Company, CompanyId, InsuranceType, InsuranceTypeId, NewCompany, NewResponse, Response,
    ResponseId, Service, ServiceDraft, ServiceId, ValidityType, ValidityTypeId,
};

/// Authoritative storage for marketplace entities.
pub trait MarketplaceRepository: Send + Sync {
    /// Fails with [`RepositoryError::Conflict`] when the email is taken.
    fn insert_company(&self, company: NewCompany) -> Result<Company, RepositoryError>;
    fn update_company(&self, company: Company) -> Result<(), RepositoryError>;
    fn company(&self, id: CompanyId) -> Result<Option<Company>, RepositoryError>;
    fn company_by_email(&self, email: &str) -> Result<Option<Company>, RepositoryError>;

    fn insert_insurance_type(
        &self,
        name: String,
        risks: Vec<String>,
    ) -> Result<InsuranceType, RepositoryError>;
    fn update_insurance_type(&self, insurance_type: InsuranceType) -> Result<(), RepositoryError>;
    fn insurance_type(&self, id: InsuranceTypeId)
        -> Result<Option<InsuranceType>, RepositoryError>;
    fn insurance_types(&self) -> Result<Vec<InsuranceType>, RepositoryError>;

    fn insert_validity_type(&self, name: String, time: f64)
        -> Result<ValidityType, RepositoryError>;
    fn update_validity_type(&self, validity: ValidityType) -> Result<(), RepositoryError>;
    fn validity_type(&self, id: ValidityTypeId) -> Result<Option<ValidityType>, RepositoryError>;
    fn validity_types(&self) -> Result<Vec<ValidityType>, RepositoryError>;

    fn insert_service(
        &self,
        draft: ServiceDraft,
        company_id: CompanyId,
    ) -> Result<Service, RepositoryError>;
    fn update_service(&self, service: Service) -> Result<(), RepositoryError>;
    /// Removes the service and every response recorded against it, returning
    /// the removed response identifiers.
    fn delete_service(&self, id: ServiceId) -> Result<Vec<ResponseId>, RepositoryError>;
    fn service(&self, id: ServiceId) -> Result<Option<Service>, RepositoryError>;
    fn services(&self) -> Result<Vec<Service>, RepositoryError>;
    fn services_matching(&self, scope: ServiceScope) -> Result<Vec<Service>, RepositoryError>;

    fn insert_response(&self, response: NewResponse) -> Result<Response, RepositoryError>;
    fn responses_for_company(&self, id: CompanyId) -> Result<Vec<Response>, RepositoryError>;
    fn responses_for_service(&self, id: ServiceId) -> Result<Vec<Response>, RepositoryError>;
}

/// Foreign-key selector used when re-projecting related services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceScope {
    Company(CompanyId),
    InsuranceType(InsuranceTypeId),
    Validity(ValidityTypeId),
}

impl ServiceScope {
    pub fn contains(self, service: &Service) -> bool {
        match self {
            ServiceScope::Company(id) => service.company_id == id,
            ServiceScope::InsuranceType(id) => service.type_id == id,
            ServiceScope::Validity(id) => service.validity_id == id,
        }
    }
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
