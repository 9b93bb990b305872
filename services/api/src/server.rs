use crate::cli::ServeArgs;
use crate::infra::{seed_catalog, view_counter, AppState};
use crate::routes::with_marketplace_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use insurance_exchange::auth::SessionService;
use insurance_exchange::config::AppConfig;
use insurance_exchange::error::AppError;
use insurance_exchange::marketplace::{
    InMemoryMarketplaceStore, MarketplaceService, MarketplaceState,
};
use insurance_exchange::notifications::{
    JobKind, JobQueue, ResponseNotificationHandler, SenderIdentity, UnisenderGateway, WorkerPool,
};
use insurance_exchange::search::InMemorySearchIndex;
use insurance_exchange::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let views = view_counter(&config.cache)?;
    let (queue, receiver) = JobQueue::channel();
    let notifier = ResponseNotificationHandler::new(
        Arc::new(UnisenderGateway::new(&config.notifications)?),
        SenderIdentity {
            name: config.notifications.sender_name.clone(),
            email: config.notifications.sender_email.clone(),
        },
    );
    let snapshot_views = views.clone();
    let workers = WorkerPool::new(config.notifications.workers)
        .register(JobKind::ResponseNotification, Arc::new(notifier))
        .on_startup(move || {
            if let Err(err) = snapshot_views.persist_snapshot() {
                warn!(error = %err, "view counter snapshot failed");
            }
        })
        .spawn(receiver);

    let marketplace = Arc::new(MarketplaceService::new(
        Arc::new(InMemoryMarketplaceStore::new()),
        Arc::new(InMemorySearchIndex::new()),
        views,
        Arc::new(queue),
        config.marketplace.clone(),
    ));
    if config.marketplace.seed_catalog {
        seed_catalog(&marketplace)?;
    }
    marketplace.rebuild_index()?;

    let sessions = Arc::new(SessionService::new(&config.session));
    let app = with_marketplace_routes(MarketplaceState {
        marketplace,
        sessions,
    })
    .layer(Extension(app_state))
    .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        workers = workers.len(),
        enforce_update_ownership = config.marketplace.enforce_update_ownership,
        "insurance exchange ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
