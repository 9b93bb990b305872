use std::sync::Arc;

use chrono::{Local, NaiveDate};
use tracing::{debug, info, warn};

use super::domain::{
    Catalog, Company, CompanyId, CompanySummary, InsuranceType, NewCompany, NewResponse,
    ProfileUpdate, Response, Service, ServiceDraft, ServiceId, ServicePage, ServiceView,
    ValidityType,
};
use super::forms::{
    FieldError, LoginForm, RegistrationForm, ResponseForm, ServiceForm, ValidationError,
};
use super::repository::{MarketplaceRepository, RepositoryError, ServiceScope};
use crate::auth::{hash_password, verify_password, PasswordError};
use crate::config::MarketplaceConfig;
use crate::notifications::{NotificationDispatcher, ResponseNotification};
use crate::search::{
    FilterField, IndexError, QueryError, SearchHits, SearchIndex, SearchQuery, ServiceDocument,
    PAGE_SIZE,
};
use crate::views::ViewCounter;

/// Coordinates the entity store with its side channels: the search mirror,
/// the view counters and the notification queue. The store is the only
/// authoritative dependency; the others degrade with a logged warning.
pub struct MarketplaceService {
    repository: Arc<dyn MarketplaceRepository>,
    index: Arc<dyn SearchIndex>,
    views: Arc<dyn ViewCounter>,
    notifications: Arc<dyn NotificationDispatcher>,
    config: MarketplaceConfig,
}

impl MarketplaceService {
    pub fn new(
        repository: Arc<dyn MarketplaceRepository>,
        index: Arc<dyn SearchIndex>,
        views: Arc<dyn ViewCounter>,
        notifications: Arc<dyn NotificationDispatcher>,
        config: MarketplaceConfig,
    ) -> Self {
        Self {
            repository,
            index,
            views,
            notifications,
            config,
        }
    }

    pub fn config(&self) -> &MarketplaceConfig {
        &self.config
    }

    /// Create a company account. The email must not be registered yet.
    pub fn register(&self, form: RegistrationForm) -> Result<Company, MarketplaceError> {
        let clean = form.validate()?;
        if self.repository.company_by_email(&clean.email)?.is_some() {
            return Err(MarketplaceError::Conflict("email already registered"));
        }

        let password_hash = hash_password(&clean.password)?;
        let company = self
            .repository
            .insert_company(NewCompany {
                name: clean.name,
                email: clean.email,
                phone: clean.phone,
                description: clean.description,
                password_hash,
                created_on: today(),
            })
            .map_err(|err| match err {
                RepositoryError::Conflict => {
                    MarketplaceError::Conflict("email already registered")
                }
                other => MarketplaceError::Repository(other),
            })?;

        info!(company = %company.id, "company registered");
        Ok(company)
    }

    /// Resolve login credentials to a company. Unknown emails and wrong
    /// passwords are indistinguishable to the caller.
    pub fn authenticate(&self, form: LoginForm) -> Result<Company, MarketplaceError> {
        let credentials = form.validate()?;
        let Some(company) = self.repository.company_by_email(&credentials.email)? else {
            debug!("login attempt for unknown email");
            return Err(MarketplaceError::InvalidCredentials);
        };
        if !verify_password(&credentials.password, &company.password_hash)? {
            debug!(company = %company.id, "login attempt with wrong password");
            return Err(MarketplaceError::InvalidCredentials);
        }
        Ok(company)
    }

    pub fn profile(&self, id: CompanyId) -> Result<Company, MarketplaceError> {
        self.repository
            .company(id)?
            .ok_or(MarketplaceError::NotFound("company"))
    }

    /// Update the profile and re-project every service of the company, since
    /// company fields are part of each search document.
    pub fn update_profile(
        &self,
        id: CompanyId,
        update: ProfileUpdate,
    ) -> Result<Company, MarketplaceError> {
        let update = update.validate()?;
        let mut company = self.profile(id)?;
        company.name = update.name;
        company.email = update.email;
        company.phone = update.phone;
        company.description = update.description;
        self.repository
            .update_company(company.clone())
            .map_err(|err| match err {
                RepositoryError::Conflict => {
                    MarketplaceError::Conflict("email already registered")
                }
                other => MarketplaceError::Repository(other),
            })?;

        self.resync(ServiceScope::Company(id));
        info!(company = %id, "company profile updated");
        Ok(company)
    }

    pub fn catalog(&self) -> Result<Catalog, MarketplaceError> {
        Ok(Catalog {
            insurance_types: self.repository.insurance_types()?,
            validity_types: self.repository.validity_types()?,
        })
    }

    pub fn add_insurance_type(
        &self,
        name: &str,
        risks: Vec<String>,
    ) -> Result<InsuranceType, MarketplaceError> {
        let name = catalog_name("insurance_type", name)?;
        let risks = risks
            .into_iter()
            .map(|risk| risk.trim().to_string())
            .filter(|risk| !risk.is_empty())
            .collect();
        Ok(self.repository.insert_insurance_type(name, risks)?)
    }

    pub fn update_insurance_type(
        &self,
        insurance_type: InsuranceType,
    ) -> Result<(), MarketplaceError> {
        let id = insurance_type.id;
        self.repository.update_insurance_type(insurance_type)?;
        self.resync(ServiceScope::InsuranceType(id));
        Ok(())
    }

    pub fn add_validity_type(
        &self,
        name: &str,
        time: f64,
    ) -> Result<ValidityType, MarketplaceError> {
        let name = catalog_name("validity_type", name)?;
        Ok(self.repository.insert_validity_type(name, time)?)
    }

    pub fn update_validity_type(&self, validity: ValidityType) -> Result<(), MarketplaceError> {
        let id = validity.id;
        self.repository.update_validity_type(validity)?;
        self.resync(ServiceScope::Validity(id));
        Ok(())
    }

    /// Publish a new service. The view counter starts at zero and the search
    /// mirror receives the projected document.
    pub fn create_service(
        &self,
        owner: CompanyId,
        form: ServiceForm,
    ) -> Result<ServiceView, MarketplaceError> {
        let draft = self.checked_draft(form)?;
        let service = self.repository.insert_service(draft, owner)?;

        if let Err(err) = self.views.initialize(service.id) {
            warn!(service = %service.id, error = %err, "view counter initialisation failed");
        }
        self.sync_service(&service);

        info!(service = %service.id, company = %owner, "service created");
        self.view_of(service, Some(0))
    }

    /// Replace the editable fields of a service. Ownership stays with the
    /// original company whoever edits it.
    pub fn update_service(
        &self,
        actor: CompanyId,
        id: ServiceId,
        form: ServiceForm,
    ) -> Result<ServiceView, MarketplaceError> {
        let existing = self
            .repository
            .service(id)?
            .ok_or(MarketplaceError::NotFound("service"))?;

        if existing.company_id != actor {
            if self.config.enforce_update_ownership {
                return Err(MarketplaceError::Forbidden(
                    "only the owning company may update this service",
                ));
            }
            warn!(
                service = %id,
                owner = %existing.company_id,
                actor = %actor,
                "service updated by a company that does not own it"
            );
        }

        let draft = self.checked_draft(form)?;
        let updated = Service {
            id,
            title: draft.title,
            description: draft.description,
            coverage_amount: draft.coverage_amount,
            price: draft.price,
            type_id: draft.type_id,
            validity_id: draft.validity_id,
            company_id: existing.company_id,
        };
        self.repository.update_service(updated.clone())?;
        self.sync_service(&updated);

        info!(service = %id, actor = %actor, "service updated");
        let views = (actor == updated.company_id).then(|| self.count(id)).flatten();
        self.view_of(updated, views)
    }

    /// Delete an owned service together with its responses, view counter and
    /// search document.
    pub fn delete_service(&self, actor: CompanyId, id: ServiceId) -> Result<(), MarketplaceError> {
        let service = self
            .repository
            .service(id)?
            .ok_or(MarketplaceError::NotFound("service"))?;
        if service.company_id != actor {
            return Err(MarketplaceError::Forbidden(
                "only the owning company may delete this service",
            ));
        }

        let removed = self.repository.delete_service(id)?;
        if let Err(err) = self.views.remove(id) {
            warn!(service = %id, error = %err, "view counter removal failed");
        }
        if let Err(err) = self.index.remove(id) {
            warn!(service = %id, error = %err, "search document removal failed");
        }

        info!(service = %id, responses = removed.len(), "service deleted");
        Ok(())
    }

    /// Public listing. Reads the search mirror and falls back to documents
    /// projected from the store when the mirror is unavailable.
    pub fn search(&self, query: &SearchQuery) -> Result<ServicePage, MarketplaceError> {
        let hits = self.hits(query)?;
        self.page_of(query, hits, false)
    }

    /// The company's own listings with view counts. Any `company` filter on
    /// the incoming query is replaced by the owner.
    pub fn company_services(
        &self,
        owner: CompanyId,
        query: &SearchQuery,
    ) -> Result<ServicePage, MarketplaceError> {
        let query = query.clone().with_filter(FilterField::Company, owner.0);
        let hits = self.hits(&query)?;
        self.page_of(&query, hits, true)
    }

    /// Detail page. A visit by anyone other than the owner counts as a view;
    /// only the owner gets to see the count.
    pub fn service_detail(
        &self,
        id: ServiceId,
        viewer: Option<CompanyId>,
    ) -> Result<ServiceView, MarketplaceError> {
        let service = self
            .repository
            .service(id)?
            .ok_or(MarketplaceError::NotFound("service"))?;

        let views = if viewer == Some(service.company_id) {
            self.count(id)
        } else {
            if let Err(err) = self.views.increment(id) {
                warn!(service = %id, error = %err, "view counter increment failed");
            }
            None
        };

        self.view_of(service, views)
    }

    /// Record a client inquiry and queue exactly one owner notification.
    /// Delivery problems never fail the submission.
    pub fn submit_response(
        &self,
        service_id: ServiceId,
        form: ResponseForm,
    ) -> Result<Response, MarketplaceError> {
        let service = self
            .repository
            .service(service_id)?
            .ok_or(MarketplaceError::NotFound("service"))?;
        let owner = self.profile(service.company_id)?;
        let today = today();
        let clean = form.validate(today)?;

        let response = self.repository.insert_response(NewResponse {
            full_name: clean.full_name,
            email: clean.email,
            phone: clean.phone,
            birth_date: clean.birth_date,
            response_date: today,
            service_id,
            company_id: service.company_id,
        })?;

        let notification = ResponseNotification::from_response(&response, &service, &owner);
        match self.notifications.dispatch(&notification) {
            Ok(job) => info!(
                response = %response.id,
                service = %service_id,
                job = %job,
                "response recorded, notification queued"
            ),
            Err(err) => warn!(
                response = %response.id,
                service = %service_id,
                error = %err,
                "response recorded but notification could not be queued"
            ),
        }

        Ok(response)
    }

    pub fn responses_for_company(&self, id: CompanyId) -> Result<Vec<Response>, MarketplaceError> {
        Ok(self.repository.responses_for_company(id)?)
    }

    /// Drop the mirror and re-project every service from the store.
    pub fn rebuild_index(&self) -> Result<usize, MarketplaceError> {
        self.index.clear()?;
        let documents = self.project_all()?;
        let count = documents.len();
        for document in documents {
            self.index.upsert(document)?;
        }
        info!(documents = count, "search index rebuilt");
        Ok(count)
    }

    fn checked_draft(&self, form: ServiceForm) -> Result<ServiceDraft, MarketplaceError> {
        let draft = form.validate()?;

        let mut missing = Vec::new();
        if self.repository.insurance_type(draft.type_id)?.is_none() {
            missing.push(FieldError {
                field: "type",
                message: format!("unknown insurance type {}", draft.type_id),
            });
        }
        if self.repository.validity_type(draft.validity_id)?.is_none() {
            missing.push(FieldError {
                field: "validity",
                message: format!("unknown validity type {}", draft.validity_id),
            });
        }
        if !missing.is_empty() {
            return Err(ValidationError {
                form: "service",
                fields: missing,
            }
            .into());
        }
        Ok(draft)
    }

    fn hits(&self, query: &SearchQuery) -> Result<SearchHits, MarketplaceError> {
        match self.index.search(query) {
            Ok(hits) => Ok(hits),
            Err(err) => {
                warn!(error = %err, "search index unavailable, querying storage directly");
                let documents = self.project_all()?;
                Ok(query.execute(&documents))
            }
        }
    }

    fn page_of(
        &self,
        query: &SearchQuery,
        hits: SearchHits,
        with_views: bool,
    ) -> Result<ServicePage, MarketplaceError> {
        let pages = hits.pages();
        let mut items = Vec::with_capacity(hits.ids.len());
        for id in hits.ids {
            // The mirror may briefly hold services the store has dropped.
            let Some(service) = self.repository.service(id)? else {
                debug!(service = %id, "skipping stale search hit");
                continue;
            };
            let views = if with_views { self.count(id) } else { None };
            items.push(self.view_of(service, views)?);
        }

        Ok(ServicePage {
            items,
            total: hits.total,
            page: query.page(),
            page_size: PAGE_SIZE,
            pages,
        })
    }

    fn count(&self, id: ServiceId) -> Option<u64> {
        match self.views.get(id) {
            Ok(count) => count,
            Err(err) => {
                warn!(service = %id, error = %err, "view counter unavailable");
                None
            }
        }
    }

    fn view_of(
        &self,
        service: Service,
        views: Option<u64>,
    ) -> Result<ServiceView, MarketplaceError> {
        let insurance_type = self
            .repository
            .insurance_type(service.type_id)?
            .ok_or(MarketplaceError::NotFound("insurance type"))?;
        let validity = self
            .repository
            .validity_type(service.validity_id)?
            .ok_or(MarketplaceError::NotFound("validity type"))?;
        let company = self.profile(service.company_id)?;

        Ok(ServiceView {
            id: service.id,
            title: service.title,
            description: service.description,
            coverage_amount: service.coverage_amount,
            price: service.price,
            insurance_type,
            validity,
            company: CompanySummary::from(&company),
            views,
        })
    }

    fn document_for(&self, service: &Service) -> Result<Option<ServiceDocument>, RepositoryError> {
        let Some(insurance_type) = self.repository.insurance_type(service.type_id)? else {
            return Ok(None);
        };
        let Some(validity) = self.repository.validity_type(service.validity_id)? else {
            return Ok(None);
        };
        let Some(company) = self.repository.company(service.company_id)? else {
            return Ok(None);
        };
        Ok(Some(ServiceDocument::project(
            service,
            &insurance_type,
            &validity,
            &company,
        )))
    }

    fn project_all(&self) -> Result<Vec<ServiceDocument>, RepositoryError> {
        let mut documents = Vec::new();
        for service in self.repository.services()? {
            if let Some(document) = self.document_for(&service)? {
                documents.push(document);
            }
        }
        Ok(documents)
    }

    fn sync_service(&self, service: &Service) {
        let outcome = match self.document_for(service) {
            Ok(Some(document)) => self.index.upsert(document).map_err(|err| err.to_string()),
            Ok(None) => Err("related records missing".to_string()),
            Err(err) => Err(err.to_string()),
        };
        if let Err(error) = outcome {
            warn!(service = %service.id, %error, "search document not refreshed");
        }
    }

    fn resync(&self, scope: ServiceScope) {
        match self.repository.services_matching(scope) {
            Ok(services) => {
                for service in &services {
                    self.sync_service(service);
                }
                debug!(?scope, services = services.len(), "search documents refreshed");
            }
            Err(err) => warn!(?scope, error = %err, "search documents not refreshed"),
        }
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn catalog_name(form: &'static str, name: &str) -> Result<String, ValidationError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationError {
            form,
            fields: vec![FieldError {
                field: "name",
                message: "is required".to_string(),
            }],
        });
    }
    Ok(name.to_string())
}

/// Error raised by marketplace operations.
#[derive(Debug, thiserror::Error)]
pub enum MarketplaceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error(transparent)]
    Password(#[from] PasswordError),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("{0}")]
    Conflict(&'static str),
    #[error("invalid email or password")]
    InvalidCredentials,
}
