use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use super::domain::{
    Company, CompanyId, InsuranceType, InsuranceTypeId, NewCompany, NewResponse, Response,
    ResponseId, Service, ServiceDraft, ServiceId, ValidityType, ValidityTypeId,
};
use super::repository::{MarketplaceRepository, RepositoryError, ServiceScope};

/// Process-local entity store. Maps are ordered by identifier so listings are
/// stable across calls.
#[derive(Debug, Default)]
pub struct InMemoryMarketplaceStore {
    state: Mutex<StoreState>,
}

#[derive(Debug, Default)]
struct StoreState {
    sequence: i64,
    companies: BTreeMap<CompanyId, Company>,
    insurance_types: BTreeMap<InsuranceTypeId, InsuranceType>,
    validity_types: BTreeMap<ValidityTypeId, ValidityType>,
    services: BTreeMap<ServiceId, Service>,
    responses: BTreeMap<ResponseId, Response>,
}

impl StoreState {
    fn next_id(&mut self) -> i64 {
        self.sequence += 1;
        self.sequence
    }

    fn email_taken(&self, email: &str, except: Option<CompanyId>) -> bool {
        self.companies
            .values()
            .any(|company| Some(company.id) != except && company.email.eq_ignore_ascii_case(email))
    }
}

impl InMemoryMarketplaceStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".to_string()))
    }
}

impl MarketplaceRepository for InMemoryMarketplaceStore {
    fn insert_company(&self, company: NewCompany) -> Result<Company, RepositoryError> {
        let mut state = self.lock()?;
        if state.email_taken(&company.email, None) {
            return Err(RepositoryError::Conflict);
        }
        let record = Company {
            id: CompanyId(state.next_id()),
            name: company.name,
            email: company.email,
            phone: company.phone,
            description: company.description,
            password_hash: company.password_hash,
            created_on: company.created_on,
        };
        state.companies.insert(record.id, record.clone());
        Ok(record)
    }

    fn update_company(&self, company: Company) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        if !state.companies.contains_key(&company.id) {
            return Err(RepositoryError::NotFound);
        }
        if state.email_taken(&company.email, Some(company.id)) {
            return Err(RepositoryError::Conflict);
        }
        state.companies.insert(company.id, company);
        Ok(())
    }

    fn company(&self, id: CompanyId) -> Result<Option<Company>, RepositoryError> {
        Ok(self.lock()?.companies.get(&id).cloned())
    }

    fn company_by_email(&self, email: &str) -> Result<Option<Company>, RepositoryError> {
        Ok(self
            .lock()?
            .companies
            .values()
            .find(|company| company.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    fn insert_insurance_type(
        &self,
        name: String,
        risks: Vec<String>,
    ) -> Result<InsuranceType, RepositoryError> {
        let mut state = self.lock()?;
        let record = InsuranceType {
            id: InsuranceTypeId(state.next_id()),
            name,
            risks,
        };
        state.insurance_types.insert(record.id, record.clone());
        Ok(record)
    }

    fn update_insurance_type(&self, insurance_type: InsuranceType) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        match state.insurance_types.get_mut(&insurance_type.id) {
            Some(slot) => {
                *slot = insurance_type;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn insurance_type(
        &self,
        id: InsuranceTypeId,
    ) -> Result<Option<InsuranceType>, RepositoryError> {
        Ok(self.lock()?.insurance_types.get(&id).cloned())
    }

    fn insurance_types(&self) -> Result<Vec<InsuranceType>, RepositoryError> {
        Ok(self.lock()?.insurance_types.values().cloned().collect())
    }

    fn insert_validity_type(
        &self,
        name: String,
        time: f64,
    ) -> Result<ValidityType, RepositoryError> {
        let mut state = self.lock()?;
        let record = ValidityType {
            id: ValidityTypeId(state.next_id()),
            name,
            time,
        };
        state.validity_types.insert(record.id, record.clone());
        Ok(record)
    }

    fn update_validity_type(&self, validity: ValidityType) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        match state.validity_types.get_mut(&validity.id) {
            Some(slot) => {
                *slot = validity;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn validity_type(&self, id: ValidityTypeId) -> Result<Option<ValidityType>, RepositoryError> {
        Ok(self.lock()?.validity_types.get(&id).cloned())
    }

    fn validity_types(&self) -> Result<Vec<ValidityType>, RepositoryError> {
        Ok(self.lock()?.validity_types.values().cloned().collect())
    }

    fn insert_service(
        &self,
        draft: ServiceDraft,
        company_id: CompanyId,
    ) -> Result<Service, RepositoryError> {
        let mut state = self.lock()?;
        if !state.companies.contains_key(&company_id) {
            return Err(RepositoryError::NotFound);
        }
        let record = Service {
            id: ServiceId(state.next_id()),
            title: draft.title,
            description: draft.description,
            coverage_amount: draft.coverage_amount,
            price: draft.price,
            type_id: draft.type_id,
            validity_id: draft.validity_id,
            company_id,
        };
        state.services.insert(record.id, record.clone());
        Ok(record)
    }

    fn update_service(&self, service: Service) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        match state.services.get_mut(&service.id) {
            Some(slot) => {
                *slot = service;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn delete_service(&self, id: ServiceId) -> Result<Vec<ResponseId>, RepositoryError> {
        let mut state = self.lock()?;
        if state.services.remove(&id).is_none() {
            return Err(RepositoryError::NotFound);
        }
        let removed: Vec<ResponseId> = state
            .responses
            .values()
            .filter(|response| response.service_id == id)
            .map(|response| response.id)
            .collect();
        for response_id in &removed {
            state.responses.remove(response_id);
        }
        Ok(removed)
    }

    fn service(&self, id: ServiceId) -> Result<Option<Service>, RepositoryError> {
        Ok(self.lock()?.services.get(&id).cloned())
    }

    fn services(&self) -> Result<Vec<Service>, RepositoryError> {
        Ok(self.lock()?.services.values().cloned().collect())
    }

    fn services_matching(&self, scope: ServiceScope) -> Result<Vec<Service>, RepositoryError> {
        Ok(self
            .lock()?
            .services
            .values()
            .filter(|service| scope.contains(service))
            .cloned()
            .collect())
    }

    fn insert_response(&self, response: NewResponse) -> Result<Response, RepositoryError> {
        let mut state = self.lock()?;
        if !state.services.contains_key(&response.service_id) {
            return Err(RepositoryError::NotFound);
        }
        let record = Response {
            id: ResponseId(state.next_id()),
            full_name: response.full_name,
            email: response.email,
            phone: response.phone,
            birth_date: response.birth_date,
            response_date: response.response_date,
            service_id: response.service_id,
            company_id: response.company_id,
        };
        state.responses.insert(record.id, record.clone());
        Ok(record)
    }

    fn responses_for_company(&self, id: CompanyId) -> Result<Vec<Response>, RepositoryError> {
        Ok(self
            .lock()?
            .responses
            .values()
            .filter(|response| response.company_id == id)
            .cloned()
            .collect())
    }

    fn responses_for_service(&self, id: ServiceId) -> Result<Vec<Response>, RepositoryError> {
        Ok(self
            .lock()?
            .responses
            .values()
            .filter(|response| response.service_id == id)
            .cloned()
            .collect())
    }
}
