//! Company accounts, service listings and client responses.
//!
//! The [`MarketplaceService`] owns the business rules and keeps the search
//! mirror, view counters and notification queue in step with the entity
//! store. [`marketplace_router`] exposes it over HTTP behind session guards.

pub mod domain;
pub mod extract;
pub mod forms;
pub mod guard;
pub mod repository;
pub mod router;
pub mod service;
pub mod store;

#[cfg(test)]
mod tests;

pub use domain::{
    Catalog, Company, CompanyId, CompanySummary, InsuranceType, InsuranceTypeId, NewCompany,
    NewResponse, ProfileUpdate, Response, ResponseId, Service, ServiceDraft, ServiceId,
    ServicePage, ServiceView, ValidityType, ValidityTypeId,
};
pub use extract::{JsonForm, ListingQuery, ServicePath};
pub use forms::{
    FieldError, LoginForm, RegistrationForm, ResponseForm, ServiceForm, ValidationError,
};
pub use guard::{identify_viewer, require_company, CurrentCompany, MarketplaceState, Viewer};
pub use repository::{MarketplaceRepository, RepositoryError, ServiceScope};
pub use router::marketplace_router;
pub use service::{MarketplaceError, MarketplaceService};
pub use store::InMemoryMarketplaceStore;
