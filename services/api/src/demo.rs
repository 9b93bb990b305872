use crate::infra::seed_catalog;
use async_trait::async_trait;
use chrono::NaiveDate;
use clap::Args;
use insurance_exchange::config::MarketplaceConfig;
use insurance_exchange::error::AppError;
use insurance_exchange::marketplace::{
    Company, InMemoryMarketplaceStore, MarketplaceError, MarketplaceService, RegistrationForm,
    ResponseForm, ServiceForm, ServicePage,
};
use insurance_exchange::notifications::{
    EmailGateway, EmailMessage, JobKind, JobQueue, MailerError, ResponseNotificationHandler,
    SenderIdentity, WorkerPool,
};
use insurance_exchange::search::{FilterField, InMemorySearchIndex, SearchQuery};
use insurance_exchange::views::InMemoryViewCounter;
use std::sync::{Arc, Mutex};

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Number of anonymous detail page visits to simulate
    #[arg(long, default_value_t = 3)]
    pub(crate) visits: u64,
}

/// Collects outgoing mail so the demo can print it instead of calling out.
#[derive(Default)]
struct OutboxGateway {
    sent: Mutex<Vec<EmailMessage>>,
}

#[async_trait]
impl EmailGateway for OutboxGateway {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailerError> {
        self.sent
            .lock()
            .map_err(|_| MailerError::Transport("outbox lock poisoned".to_string()))?
            .push(message.clone());
        Ok(())
    }
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let (queue, receiver) = JobQueue::channel();
    let outbox = Arc::new(OutboxGateway::default());
    let workers = WorkerPool::new(1)
        .register(
            JobKind::ResponseNotification,
            Arc::new(ResponseNotificationHandler::new(
                outbox.clone(),
                SenderIdentity {
                    name: "Insurance Exchange".to_string(),
                    email: "noreply@exchange.example".to_string(),
                },
            )),
        )
        .spawn(receiver);

    let views = Arc::new(InMemoryViewCounter::new());
    let marketplace = MarketplaceService::new(
        Arc::new(InMemoryMarketplaceStore::new()),
        Arc::new(InMemorySearchIndex::new()),
        views,
        Arc::new(queue),
        MarketplaceConfig::default(),
    );
    seed_catalog(&marketplace)?;

    println!("Insurance exchange demo");
    let company_a = register(&marketplace, "Acme Mutual", "owner@acme.example")?;
    let company_b = register(&marketplace, "Borealis Assurance", "desk@borealis.example")?;
    println!(
        "- registered companies: {} (#{}), {} (#{})",
        company_a.name, company_a.id, company_b.name, company_b.id
    );

    let catalog = marketplace.catalog()?;
    let fire = catalog
        .insurance_types
        .iter()
        .find(|insurance| insurance.name == "Fire")
        .ok_or(MarketplaceError::NotFound("insurance type"))?;
    let one_year = catalog
        .validity_types
        .iter()
        .find(|validity| validity.name == "1 year")
        .ok_or(MarketplaceError::NotFound("validity type"))?;

    let service = marketplace.create_service(
        company_a.id,
        ServiceForm {
            title: "Home Fire Cover".to_string(),
            description: Some("Rebuild and contents cover after fire damage".to_string()),
            type_id: fire.id,
            validity_id: one_year.id,
            coverage_amount: 50_000.0,
            price: 100.0,
        },
    )?;
    println!(
        "- {} published \"{}\" at {:.2} for {:.0} coverage ({}, {})",
        company_a.name,
        service.title,
        service.price,
        service.coverage_amount,
        service.insurance_type.name,
        service.validity.name
    );

    println!("\nSearch");
    let searches = [
        ("query=fire", SearchQuery::new().with_text("fire")),
        ("query=flood", SearchQuery::new().with_text("flood")),
        (
            "company=A",
            SearchQuery::new().with_filter(FilterField::Company, company_a.id.0),
        ),
        (
            "company=B",
            SearchQuery::new().with_filter(FilterField::Company, company_b.id.0),
        ),
    ];
    for (label, query) in searches {
        let page = marketplace.search(&query)?;
        println!("- {label}: {}", describe(&page));
    }

    println!("\nViews");
    for _ in 0..args.visits {
        marketplace.service_detail(service.id, None)?;
    }
    let owner_view = marketplace.service_detail(service.id, Some(company_a.id))?;
    println!(
        "- {} anonymous visits, owner sees {} views",
        args.visits,
        owner_view.views.unwrap_or_default()
    );

    println!("\nResponses");
    let response = marketplace.submit_response(
        service.id,
        ResponseForm {
            full_name: "Jane Doe".to_string(),
            email: "jane@example.com".to_string(),
            phone: "555-0101".to_string(),
            birth_date: NaiveDate::from_ymd_opt(1988, 3, 9)
                .ok_or(MarketplaceError::NotFound("birth date"))?,
        },
    )?;
    println!(
        "- {} responded on {}",
        response.full_name, response.response_date
    );

    // Dropping the marketplace releases the queue so the worker can finish.
    drop(marketplace);
    for worker in workers {
        if let Err(err) = worker.await {
            eprintln!("notification worker failed: {err}");
        }
    }

    let sent = outbox
        .sent
        .lock()
        .map(|sent| sent.clone())
        .unwrap_or_default();
    println!("\nNotifications ({} sent)", sent.len());
    for message in sent {
        println!("- to {}: {}", message.recipient, message.subject);
    }

    Ok(())
}

fn register(
    marketplace: &MarketplaceService,
    name: &str,
    email: &str,
) -> Result<Company, MarketplaceError> {
    marketplace.register(RegistrationForm {
        name: name.to_string(),
        email: email.to_string(),
        phone: "555-0100".to_string(),
        description: None,
        password1: "demo-password".to_string(),
        password2: "demo-password".to_string(),
    })
}

fn describe(page: &ServicePage) -> String {
    if page.items.is_empty() {
        return "no services".to_string();
    }
    page.items
        .iter()
        .map(|item| format!("\"{}\" by {}", item.title, item.company.name))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn demo_runs_against_in_memory_adapters() {
        run_demo(DemoArgs { visits: 2 }).await.expect("demo completes");
    }
}
