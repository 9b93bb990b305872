use std::sync::Arc;

use chrono::Local;

use super::common::*;
use crate::config::MarketplaceConfig;
use crate::marketplace::domain::{CompanyId, ProfileUpdate, ServiceId};
use crate::marketplace::forms::{LoginForm, RegistrationForm};
use crate::marketplace::repository::MarketplaceRepository;
use crate::marketplace::service::MarketplaceError;
use crate::search::{FilterField, InMemorySearchIndex, SearchIndex, SearchQuery, SortField, SortKey};
use crate::views::{InMemoryViewCounter, RedisViewCounter, ViewCounter};

#[test]
fn created_service_starts_with_zero_views_and_is_indexed() {
    let harness = Harness::new();
    let acme = harness.company("Acme Mutual", "owner@acme.example");

    let view = harness.publish(acme.id, "Home Fire Cover", 100.0);

    assert_eq!(view.views, Some(0));
    assert_eq!(harness.views.get(view.id).expect("counter"), Some(0));
    let document = harness.index.document(view.id).expect("indexed");
    assert_eq!(document.company.name, "Acme Mutual");
    assert_eq!(document.insurance_type.name, "Fire");
}

#[test]
fn visitor_views_are_counted_and_shown_only_to_the_owner() {
    let harness = Harness::new();
    let acme = harness.company("Acme Mutual", "owner@acme.example");
    let rival = harness.company("Rival Re", "desk@rival.example");
    let service = harness.publish(acme.id, "Home Fire Cover", 100.0);

    for _ in 0..4 {
        let anonymous = harness
            .marketplace
            .service_detail(service.id, None)
            .expect("detail");
        assert!(anonymous.views.is_none());
    }
    let by_rival = harness
        .marketplace
        .service_detail(service.id, Some(rival.id))
        .expect("detail");
    assert!(by_rival.views.is_none());

    let by_owner = harness
        .marketplace
        .service_detail(service.id, Some(acme.id))
        .expect("detail");
    assert_eq!(by_owner.views, Some(5));
    // The owner's own visit is not a view.
    assert_eq!(harness.views.get(service.id).expect("counter"), Some(5));
}

#[test]
fn home_fire_cover_is_found_by_text_and_company() {
    let harness = Harness::new();
    let a = harness.company("Acme Mutual", "owner@acme.example");
    let b = harness.company("Borealis", "desk@borealis.example");
    let fire = harness.publish(a.id, "Home Fire Cover", 100.0);

    let search = |query: SearchQuery| harness.marketplace.search(&query).expect("search");

    assert_eq!(ids(&search(SearchQuery::new().with_text("fire")).items), vec![fire.id]);
    assert!(search(SearchQuery::new().with_text("flood")).items.is_empty());
    assert_eq!(
        ids(&search(SearchQuery::new().with_filter(FilterField::Company, a.id.0)).items),
        vec![fire.id]
    );
    assert!(search(SearchQuery::new().with_filter(FilterField::Company, b.id.0))
        .items
        .is_empty());
}

#[test]
fn price_sort_orders_hydrated_results() {
    let harness = Harness::new();
    let acme = harness.company("Acme Mutual", "owner@acme.example");
    let cheap = harness.publish(acme.id, "Basic", 10.0);
    let mid = harness.publish(acme.id, "Standard", 50.0);
    let dear = harness.publish(acme.id, "Premium", 90.0);

    let ascending = harness
        .marketplace
        .search(&SearchQuery::new().sorted_by(SortKey::ascending(SortField::Price)))
        .expect("search");
    let descending = harness
        .marketplace
        .search(&SearchQuery::new().sorted_by(SortKey::descending(SortField::Price)))
        .expect("search");

    assert_eq!(ids(&ascending.items), vec![cheap.id, mid.id, dear.id]);
    let mut reversed = ids(&descending.items);
    reversed.reverse();
    assert_eq!(reversed, ids(&ascending.items));
}

#[test]
fn page_past_the_end_is_empty_but_keeps_the_total() {
    let harness = Harness::new();
    let acme = harness.company("Acme Mutual", "owner@acme.example");
    for n in 0..12 {
        harness.publish(acme.id, &format!("Plan {n:02}"), 10.0);
    }

    let second = harness
        .marketplace
        .search(&SearchQuery::new().on_page(2))
        .expect("search");
    assert_eq!(second.items.len(), 2);
    assert_eq!(second.pages, 2);

    let beyond = harness
        .marketplace
        .search(&SearchQuery::new().on_page(9))
        .expect("search");
    assert!(beyond.items.is_empty());
    assert_eq!(beyond.total, 12);
    assert_eq!(beyond.page, 9);
}

#[test]
fn own_listing_is_scoped_to_the_company_and_carries_counts() {
    let harness = Harness::new();
    let acme = harness.company("Acme Mutual", "owner@acme.example");
    let rival = harness.company("Rival Re", "desk@rival.example");
    let mine = harness.publish(acme.id, "Home Fire Cover", 100.0);
    harness.publish(rival.id, "Rival Fire Cover", 80.0);
    harness
        .marketplace
        .service_detail(mine.id, None)
        .expect("detail");

    // A company filter smuggled into the query is overridden.
    let query = SearchQuery::new().with_filter(FilterField::Company, rival.id.0);
    let page = harness
        .marketplace
        .company_services(acme.id, &query)
        .expect("own services");

    assert_eq!(ids(&page.items), vec![mine.id]);
    assert_eq!(page.items[0].views, Some(1));
}

#[test]
fn deleting_a_service_cascades_to_responses_counter_and_index() {
    let harness = Harness::new();
    let acme = harness.company("Acme Mutual", "owner@acme.example");
    let service = harness.publish(acme.id, "Home Fire Cover", 100.0);
    let keeper = harness.publish(acme.id, "Flood Shield", 40.0);
    harness
        .marketplace
        .submit_response(service.id, response_form())
        .expect("response");
    harness
        .marketplace
        .submit_response(keeper.id, response_form())
        .expect("response");

    harness
        .marketplace
        .delete_service(acme.id, service.id)
        .expect("delete");

    assert!(harness.store.service(service.id).expect("store").is_none());
    assert!(harness
        .store
        .responses_for_service(service.id)
        .expect("store")
        .is_empty());
    assert_eq!(
        harness
            .marketplace
            .responses_for_company(acme.id)
            .expect("responses")
            .len(),
        1
    );
    assert_eq!(harness.views.get(service.id).expect("counter"), None);
    assert!(harness.index.document(service.id).is_none());
    assert!(harness.index.document(keeper.id).is_some());
}

#[test]
fn only_the_owner_may_delete_and_missing_ids_are_not_found() {
    let harness = Harness::new();
    let acme = harness.company("Acme Mutual", "owner@acme.example");
    let rival = harness.company("Rival Re", "desk@rival.example");
    let service = harness.publish(acme.id, "Home Fire Cover", 100.0);

    assert!(matches!(
        harness.marketplace.delete_service(rival.id, service.id),
        Err(MarketplaceError::Forbidden(_))
    ));
    assert!(harness.store.service(service.id).expect("store").is_some());
    assert!(matches!(
        harness.marketplace.delete_service(acme.id, ServiceId(9_999)),
        Err(MarketplaceError::NotFound("service"))
    ));
}

#[test]
fn non_owner_updates_keep_the_original_owner() {
    let harness = Harness::new();
    let acme = harness.company("Acme Mutual", "owner@acme.example");
    let rival = harness.company("Rival Re", "desk@rival.example");
    let service = harness.publish(acme.id, "Home Fire Cover", 100.0);

    let updated = harness
        .marketplace
        .update_service(rival.id, service.id, harness.fire_form("Home Fire Cover Plus", 120.0))
        .expect("legacy update allowed");

    assert_eq!(updated.company.id, acme.id);
    assert!(updated.views.is_none());
    let stored = harness.store.service(service.id).expect("store").expect("present");
    assert_eq!(stored.title, "Home Fire Cover Plus");
    assert_eq!(stored.company_id, acme.id);
    let document = harness.index.document(service.id).expect("indexed");
    assert_eq!(document.title, "Home Fire Cover Plus");
}

#[test]
fn enforced_ownership_rejects_non_owner_updates() {
    let harness = Harness::with_config(MarketplaceConfig {
        enforce_update_ownership: true,
        ..MarketplaceConfig::default()
    });
    let acme = harness.company("Acme Mutual", "owner@acme.example");
    let rival = harness.company("Rival Re", "desk@rival.example");
    let service = harness.publish(acme.id, "Home Fire Cover", 100.0);

    let result =
        harness
            .marketplace
            .update_service(rival.id, service.id, harness.fire_form("Hijacked", 1.0));
    assert!(matches!(result, Err(MarketplaceError::Forbidden(_))));

    let owner_update = harness
        .marketplace
        .update_service(acme.id, service.id, harness.fire_form("Home Fire Cover", 110.0))
        .expect("owner update");
    assert_eq!(owner_update.price, 110.0);
    assert_eq!(owner_update.views, Some(0));
}

#[test]
fn unknown_catalog_references_fail_validation() {
    let harness = Harness::new();
    let acme = harness.company("Acme Mutual", "owner@acme.example");
    let mut form = harness.fire_form("Home Fire Cover", 100.0);
    form.type_id = crate::marketplace::domain::InsuranceTypeId(404);

    match harness.marketplace.create_service(acme.id, form) {
        Err(MarketplaceError::Validation(error)) => {
            assert!(error.has_field("type"));
            assert!(!error.has_field("validity"));
        }
        other => panic!("expected validation error, got {other:?}"),
    }
    assert!(harness.store.services().expect("store").is_empty());
}

#[test]
fn each_response_queues_exactly_one_notification() {
    let harness = Harness::new();
    let acme = harness.company("Acme Mutual", "owner@acme.example");
    let service = harness.publish(acme.id, "Home Fire Cover", 100.0);

    let response = harness
        .marketplace
        .submit_response(service.id, response_form())
        .expect("response");

    assert_eq!(response.company_id, acme.id);
    assert_eq!(response.response_date, Local::now().date_naive());

    let sent = harness.outbox.sent();
    assert_eq!(sent.len(), 1);
    let notification = &sent[0];
    assert_eq!(notification.company, "owner@acme.example");
    assert_eq!(notification.service, "Home Fire Cover");
    assert_eq!(notification.email, "jane@example.com");
    assert_eq!(notification.phone, "555-0101");
    assert_eq!(notification.full_name, "Jane Doe");
}

#[test]
fn invalid_responses_are_neither_saved_nor_notified() {
    let harness = Harness::new();
    let acme = harness.company("Acme Mutual", "owner@acme.example");
    let service = harness.publish(acme.id, "Home Fire Cover", 100.0);
    let mut form = response_form();
    form.email = "nope".to_string();

    assert!(matches!(
        harness.marketplace.submit_response(service.id, form),
        Err(MarketplaceError::Validation(_))
    ));
    assert!(harness.outbox.sent().is_empty());
    assert!(harness
        .marketplace
        .responses_for_company(acme.id)
        .expect("responses")
        .is_empty());
}

#[test]
fn closed_queue_does_not_fail_the_submission() {
    let (marketplace, store) = degraded_marketplace(
        Arc::new(InMemorySearchIndex::new()),
        Arc::new(InMemoryViewCounter::new()),
        Arc::new(ClosedOutbox),
    );
    let fire = marketplace
        .add_insurance_type("Fire", Vec::new())
        .expect("type");
    let year = marketplace.add_validity_type("1 year", 12.0).expect("validity");
    let owner = store
        .insert_company(crate::marketplace::domain::NewCompany {
            name: "Acme".to_string(),
            email: "owner@acme.example".to_string(),
            phone: "555".to_string(),
            description: None,
            password_hash: "unused".to_string(),
            created_on: Local::now().date_naive(),
        })
        .expect("company");
    let form = crate::marketplace::forms::ServiceForm {
        title: "Home Fire Cover".to_string(),
        description: None,
        type_id: fire.id,
        validity_id: year.id,
        coverage_amount: 50_000.0,
        price: 100.0,
    };
    let service = marketplace.create_service(owner.id, form).expect("service");

    let response = marketplace
        .submit_response(service.id, response_form())
        .expect("submission survives the queue outage");
    assert_eq!(store.responses_for_service(service.id).expect("store"), vec![response]);
}

#[test]
fn listing_falls_back_to_storage_when_the_index_is_down() {
    let (marketplace, store) = degraded_marketplace(
        Arc::new(UnavailableIndex),
        Arc::new(UnavailableCounter),
        Arc::new(MemoryOutbox::default()),
    );
    let fire = marketplace
        .add_insurance_type("Fire", vec!["arson".to_string()])
        .expect("type");
    let year = marketplace.add_validity_type("1 year", 12.0).expect("validity");
    let owner = store
        .insert_company(crate::marketplace::domain::NewCompany {
            name: "Acme".to_string(),
            email: "owner@acme.example".to_string(),
            phone: "555".to_string(),
            description: None,
            password_hash: "unused".to_string(),
            created_on: Local::now().date_naive(),
        })
        .expect("company");
    let form = crate::marketplace::forms::ServiceForm {
        title: "Home Fire Cover".to_string(),
        description: None,
        type_id: fire.id,
        validity_id: year.id,
        coverage_amount: 50_000.0,
        price: 100.0,
    };

    let created = marketplace
        .create_service(owner.id, form)
        .expect("create survives index and cache outage");
    assert_eq!(created.views, Some(0));

    let page = marketplace
        .search(&SearchQuery::new().with_text("arson"))
        .expect("fallback search");
    assert_eq!(ids(&page.items), vec![created.id]);

    let detail = marketplace
        .service_detail(created.id, Some(owner.id))
        .expect("detail survives cache outage");
    assert!(detail.views.is_none());

    assert!(matches!(
        marketplace.rebuild_index(),
        Err(MarketplaceError::Index(_))
    ));
}

#[test]
fn unreachable_cache_omits_view_counts_without_stalling() {
    let counter = RedisViewCounter::connect(
        "redis://127.0.0.1:1/",
        std::time::Duration::from_millis(200),
    )
    .expect("url parses");
    let (marketplace, store) = degraded_marketplace(
        Arc::new(InMemorySearchIndex::new()),
        Arc::new(counter),
        Arc::new(MemoryOutbox::default()),
    );
    let fire = marketplace
        .add_insurance_type("Fire", vec!["arson".to_string()])
        .expect("type");
    let year = marketplace.add_validity_type("1 year", 12.0).expect("validity");
    let owner = store
        .insert_company(crate::marketplace::domain::NewCompany {
            name: "Acme".to_string(),
            email: "owner@acme.example".to_string(),
            phone: "555".to_string(),
            description: None,
            password_hash: "unused".to_string(),
            created_on: Local::now().date_naive(),
        })
        .expect("company");

    let started = std::time::Instant::now();
    let created = marketplace
        .create_service(
            owner.id,
            crate::marketplace::forms::ServiceForm {
                title: "Home Fire Cover".to_string(),
                description: None,
                type_id: fire.id,
                validity_id: year.id,
                coverage_amount: 50_000.0,
                price: 100.0,
            },
        )
        .expect("create survives cache outage");
    let anonymous = marketplace
        .service_detail(created.id, None)
        .expect("anonymous detail");
    let owned = marketplace
        .service_detail(created.id, Some(owner.id))
        .expect("owner detail");

    assert!(anonymous.views.is_none());
    assert!(owned.views.is_none());
    assert!(started.elapsed() < std::time::Duration::from_secs(5));
}

#[test]
fn profile_changes_are_projected_into_search_documents() {
    let harness = Harness::new();
    let acme = harness.company("Acme Mutual", "owner@acme.example");
    let first = harness.publish(acme.id, "Home Fire Cover", 100.0);
    let second = harness.publish(acme.id, "Garage Fire Cover", 60.0);

    harness
        .marketplace
        .update_profile(
            acme.id,
            ProfileUpdate {
                name: "Zephyr Assurance".to_string(),
                email: "Owner@Acme.example".to_string(),
                phone: "555-0199".to_string(),
                description: None,
            },
        )
        .expect("profile update");

    let page = harness
        .marketplace
        .search(&SearchQuery::new().with_text("zephyr"))
        .expect("search");
    let mut found = ids(&page.items);
    found.sort();
    assert_eq!(found, vec![first.id, second.id]);
    assert_eq!(
        harness.marketplace.profile(acme.id).expect("profile").email,
        "owner@acme.example"
    );
}

#[test]
fn profile_email_must_stay_unique() {
    let harness = Harness::new();
    let acme = harness.company("Acme Mutual", "owner@acme.example");
    harness.company("Rival Re", "desk@rival.example");

    let result = harness.marketplace.update_profile(
        acme.id,
        ProfileUpdate {
            name: "Acme Mutual".to_string(),
            email: "desk@rival.example".to_string(),
            phone: "555-0100".to_string(),
            description: None,
        },
    );
    assert!(matches!(result, Err(MarketplaceError::Conflict(_))));
}

#[test]
fn renaming_an_insurance_type_reprojects_its_services() {
    let harness = Harness::new();
    let acme = harness.company("Acme Mutual", "owner@acme.example");
    let service = harness.publish(acme.id, "Home Cover", 100.0);

    let mut renamed = harness.fire.clone();
    renamed.name = "Wildfire".to_string();
    harness
        .marketplace
        .update_insurance_type(renamed)
        .expect("rename");

    let page = harness
        .marketplace
        .search(&SearchQuery::new().with_text("wildfire"))
        .expect("search");
    assert_eq!(ids(&page.items), vec![service.id]);
}

#[test]
fn rebuild_restores_a_wiped_index() {
    let harness = Harness::new();
    let acme = harness.company("Acme Mutual", "owner@acme.example");
    harness.publish(acme.id, "Home Fire Cover", 100.0);
    harness.publish(acme.id, "Flood Shield", 40.0);
    harness.index.clear().expect("clear");
    assert_eq!(harness.index.len().expect("len"), 0);

    let rebuilt = harness.marketplace.rebuild_index().expect("rebuild");

    assert_eq!(rebuilt, 2);
    assert_eq!(harness.index.len().expect("len"), 2);
}

#[test]
fn registration_rejects_duplicate_emails_and_login_checks_passwords() {
    let harness = Harness::new();
    let form = RegistrationForm {
        name: "Acme Mutual".to_string(),
        email: "Owner@Acme.example".to_string(),
        phone: "555-0100".to_string(),
        description: None,
        password1: "correct-horse".to_string(),
        password2: "correct-horse".to_string(),
    };

    let company = harness.marketplace.register(form.clone()).expect("register");
    assert_eq!(company.email, "owner@acme.example");
    assert_ne!(company.password_hash, "correct-horse");
    assert!(matches!(
        harness.marketplace.register(form),
        Err(MarketplaceError::Conflict(_))
    ));

    let signed_in = harness
        .marketplace
        .authenticate(LoginForm {
            email: "owner@acme.example".to_string(),
            password: "correct-horse".to_string(),
        })
        .expect("login");
    assert_eq!(signed_in.id, company.id);

    for (email, password) in [
        ("owner@acme.example", "battery-staple"),
        ("nobody@acme.example", "correct-horse"),
    ] {
        assert!(matches!(
            harness.marketplace.authenticate(LoginForm {
                email: email.to_string(),
                password: password.to_string(),
            }),
            Err(MarketplaceError::InvalidCredentials)
        ));
    }
}

#[test]
fn detail_for_missing_service_is_not_found() {
    let harness = Harness::new();
    assert!(matches!(
        harness.marketplace.service_detail(ServiceId(77), Some(CompanyId(1))),
        Err(MarketplaceError::NotFound("service"))
    ));
    assert!(matches!(
        harness.marketplace.submit_response(ServiceId(77), response_form()),
        Err(MarketplaceError::NotFound("service"))
    ));
}

#[test]
fn catalog_lists_seeded_choices() {
    let harness = Harness::new();
    let catalog = harness.marketplace.catalog().expect("catalog");
    let types: Vec<_> = catalog.insurance_types.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(types, vec!["Fire", "Flood"]);
    assert_eq!(catalog.validity_types.len(), 2);
    assert!(catalog
        .validity_types
        .iter()
        .any(|validity| validity.id == harness.six_months.id));
    assert!(catalog
        .insurance_types
        .iter()
        .any(|insurance| insurance.id == harness.flood.id));
}
