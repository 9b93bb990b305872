use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::NaiveDate;
use serde_json::Value;

use crate::auth::SessionService;
use crate::config::{MarketplaceConfig, SessionConfig};
use crate::marketplace::domain::{
    Company, CompanyId, InsuranceType, NewCompany, ServiceId, ServiceView, ValidityType,
};
use crate::marketplace::forms::{ResponseForm, ServiceForm};
use crate::marketplace::guard::MarketplaceState;
use crate::marketplace::repository::MarketplaceRepository;
use crate::marketplace::service::MarketplaceService;
use crate::marketplace::store::InMemoryMarketplaceStore;
use crate::notifications::{JobId, NotificationDispatcher, QueueError, ResponseNotification};
use crate::search::{IndexError, InMemorySearchIndex, SearchHits, SearchIndex, SearchQuery, ServiceDocument};
use crate::views::{CounterError, InMemoryViewCounter, ViewCounter};

pub(super) struct Harness {
    pub(super) marketplace: Arc<MarketplaceService>,
    pub(super) store: Arc<InMemoryMarketplaceStore>,
    pub(super) index: Arc<InMemorySearchIndex>,
    pub(super) views: Arc<InMemoryViewCounter>,
    pub(super) outbox: Arc<MemoryOutbox>,
    pub(super) fire: InsuranceType,
    pub(super) flood: InsuranceType,
    pub(super) one_year: ValidityType,
    pub(super) six_months: ValidityType,
}

impl Harness {
    pub(super) fn new() -> Self {
        Self::with_config(MarketplaceConfig::default())
    }

    pub(super) fn with_config(config: MarketplaceConfig) -> Self {
        let store = Arc::new(InMemoryMarketplaceStore::new());
        let index = Arc::new(InMemorySearchIndex::new());
        let views = Arc::new(InMemoryViewCounter::new());
        let outbox = Arc::new(MemoryOutbox::default());
        let marketplace = Arc::new(MarketplaceService::new(
            store.clone(),
            index.clone(),
            views.clone(),
            outbox.clone(),
            config,
        ));

        let fire = marketplace
            .add_insurance_type("Fire", vec!["arson".to_string(), "lightning".to_string()])
            .expect("fire type");
        let flood = marketplace
            .add_insurance_type("Flood", vec!["storm surge".to_string()])
            .expect("flood type");
        let one_year = marketplace
            .add_validity_type("1 year", 12.0)
            .expect("validity");
        let six_months = marketplace
            .add_validity_type("6 months", 6.0)
            .expect("validity");

        Self {
            marketplace,
            store,
            index,
            views,
            outbox,
            fire,
            flood,
            one_year,
            six_months,
        }
    }

    /// Insert a company straight into the store; the hash is never verified.
    pub(super) fn company(&self, name: &str, email: &str) -> Company {
        self.store
            .insert_company(NewCompany {
                name: name.to_string(),
                email: email.to_string(),
                phone: "555-0100".to_string(),
                description: Some(format!("{name} underwrites property risks")),
                password_hash: "unused".to_string(),
                created_on: NaiveDate::from_ymd_opt(2025, 1, 1).expect("valid date"),
            })
            .expect("company inserted")
    }

    pub(super) fn fire_form(&self, title: &str, price: f64) -> ServiceForm {
        ServiceForm {
            title: title.to_string(),
            description: Some("Covers the building and contents".to_string()),
            type_id: self.fire.id,
            validity_id: self.one_year.id,
            coverage_amount: 50_000.0,
            price,
        }
    }

    pub(super) fn publish(&self, owner: CompanyId, title: &str, price: f64) -> ServiceView {
        self.marketplace
            .create_service(owner, self.fire_form(title, price))
            .expect("service created")
    }

    pub(super) fn sessions(&self) -> Arc<SessionService> {
        Arc::new(SessionService::new(&SessionConfig {
            secret: "routing-secret".to_string(),
            ttl_secs: 3600,
        }))
    }

    pub(super) fn state(&self) -> MarketplaceState {
        MarketplaceState {
            marketplace: self.marketplace.clone(),
            sessions: self.sessions(),
        }
    }
}

pub(super) fn response_form() -> ResponseForm {
    ResponseForm {
        full_name: "Jane Doe".to_string(),
        email: "jane@example.com".to_string(),
        phone: "555-0101".to_string(),
        birth_date: NaiveDate::from_ymd_opt(1990, 6, 15).expect("valid date"),
    }
}

pub(super) fn ids(items: &[ServiceView]) -> Vec<ServiceId> {
    items.iter().map(|item| item.id).collect()
}

#[derive(Default)]
pub(super) struct MemoryOutbox {
    sent: Mutex<Vec<ResponseNotification>>,
}

impl MemoryOutbox {
    pub(super) fn sent(&self) -> Vec<ResponseNotification> {
        self.sent.lock().expect("outbox mutex poisoned").clone()
    }
}

impl NotificationDispatcher for MemoryOutbox {
    fn dispatch(&self, notification: &ResponseNotification) -> Result<JobId, QueueError> {
        let mut sent = self.sent.lock().expect("outbox mutex poisoned");
        sent.push(notification.clone());
        Ok(JobId(sent.len() as u64))
    }
}

pub(super) struct ClosedOutbox;

impl NotificationDispatcher for ClosedOutbox {
    fn dispatch(&self, _notification: &ResponseNotification) -> Result<JobId, QueueError> {
        Err(QueueError::Closed)
    }
}

pub(super) struct UnavailableIndex;

impl SearchIndex for UnavailableIndex {
    fn upsert(&self, _document: ServiceDocument) -> Result<(), IndexError> {
        Err(IndexError::Unavailable("cluster offline".to_string()))
    }

    fn remove(&self, _id: ServiceId) -> Result<(), IndexError> {
        Err(IndexError::Unavailable("cluster offline".to_string()))
    }

    fn search(&self, _query: &SearchQuery) -> Result<SearchHits, IndexError> {
        Err(IndexError::Unavailable("cluster offline".to_string()))
    }

    fn clear(&self) -> Result<(), IndexError> {
        Err(IndexError::Unavailable("cluster offline".to_string()))
    }

    fn len(&self) -> Result<usize, IndexError> {
        Err(IndexError::Unavailable("cluster offline".to_string()))
    }
}

pub(super) struct UnavailableCounter;

impl ViewCounter for UnavailableCounter {
    fn initialize(&self, _id: ServiceId) -> Result<(), CounterError> {
        Err(CounterError::Unavailable("cache offline".to_string()))
    }

    fn increment(&self, _id: ServiceId) -> Result<u64, CounterError> {
        Err(CounterError::Unavailable("cache offline".to_string()))
    }

    fn get(&self, _id: ServiceId) -> Result<Option<u64>, CounterError> {
        Err(CounterError::Unavailable("cache offline".to_string()))
    }

    fn remove(&self, _id: ServiceId) -> Result<(), CounterError> {
        Err(CounterError::Unavailable("cache offline".to_string()))
    }

    fn persist_snapshot(&self) -> Result<(), CounterError> {
        Err(CounterError::Unavailable("cache offline".to_string()))
    }
}

/// Marketplace wired to the in-memory store but the given degraded adapters.
pub(super) fn degraded_marketplace(
    index: Arc<dyn SearchIndex>,
    views: Arc<dyn ViewCounter>,
    outbox: Arc<dyn NotificationDispatcher>,
) -> (Arc<MarketplaceService>, Arc<InMemoryMarketplaceStore>) {
    let store = Arc::new(InMemoryMarketplaceStore::new());
    let marketplace = Arc::new(MarketplaceService::new(
        store.clone(),
        index,
        views,
        outbox,
        MarketplaceConfig::default(),
    ));
    (marketplace, store)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
