use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use serde_json::json;
use tracing::error;

use super::domain::{CompanySummary, ProfileUpdate};
use super::extract::{JsonForm, ListingQuery, ServicePath, FORM_ERROR};
use super::forms::{LoginForm, RegistrationForm, ResponseForm, ServiceForm};
use super::guard::{
    identify_viewer, require_company, CurrentCompany, MarketplaceState, Viewer,
};
use super::repository::RepositoryError;
use super::service::MarketplaceError;
use crate::auth::{cleared_session_cookie, session_cookie, token_from_headers};
use crate::search::SearchQuery;

/// Router exposing the public listing, account and service management routes.
pub fn marketplace_router(state: MarketplaceState) -> Router {
    let company_only = Router::new()
        .route("/profile", get(profile_handler).post(update_profile_handler))
        .route("/services", get(own_services_handler))
        .route("/create_service", post(create_service_handler))
        .route("/update_service/:id", post(update_service_handler))
        .route("/delete_service/:id", post(delete_service_handler))
        .route("/responses", get(responses_handler))
        .route_layer(middleware::from_fn(require_company));

    Router::new()
        .route("/", get(listing_handler))
        .route("/catalog", get(catalog_handler))
        .route("/login", post(login_handler))
        .route("/register", post(register_handler))
        .route("/logout", post(logout_handler))
        .route(
            "/services/:id",
            get(service_detail_handler).post(submit_response_handler),
        )
        .merge(company_only)
        .layer(middleware::from_fn_with_state(state.clone(), identify_viewer))
        .with_state(state)
}

pub(crate) async fn listing_handler(
    State(state): State<MarketplaceState>,
    ListingQuery(params): ListingQuery,
) -> Response {
    let result = SearchQuery::from_params(&params)
        .map_err(MarketplaceError::from)
        .and_then(|query| state.marketplace.search(&query));
    match result {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn catalog_handler(State(state): State<MarketplaceState>) -> Response {
    match state.marketplace.catalog() {
        Ok(catalog) => (StatusCode::OK, Json(catalog)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn login_handler(
    State(state): State<MarketplaceState>,
    JsonForm(form): JsonForm<LoginForm>,
) -> Response {
    let company = match state.marketplace.authenticate(form) {
        Ok(company) => company,
        Err(err) => return error_response(err),
    };
    signed_in(&state, StatusCode::OK, "Successfully logged in", CompanySummary::from(&company))
}

pub(crate) async fn register_handler(
    State(state): State<MarketplaceState>,
    JsonForm(form): JsonForm<RegistrationForm>,
) -> Response {
    let company = match state.marketplace.register(form) {
        Ok(company) => company,
        Err(err) => return error_response(err),
    };
    signed_in(
        &state,
        StatusCode::CREATED,
        "Successfully registered",
        CompanySummary::from(&company),
    )
}

fn signed_in(
    state: &MarketplaceState,
    status: StatusCode,
    message: &str,
    company: CompanySummary,
) -> Response {
    match state.sessions.issue(company.id) {
        Ok(session) => {
            let cookie = session_cookie(&session, state.sessions.ttl_secs());
            let payload = json!({
                "message": message,
                "company": company,
                "token": session.token,
                "expires_at": session.expires_at,
            });
            (status, [(header::SET_COOKIE, cookie)], Json(payload)).into_response()
        }
        Err(err) => {
            error!(company = %company.id, error = %err, "session could not be issued");
            let payload = json!({ "error": "session could not be issued" });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
        }
    }
}

pub(crate) async fn logout_handler(
    State(state): State<MarketplaceState>,
    headers: HeaderMap,
) -> Response {
    if let Some(token) = token_from_headers(&headers) {
        // Already invalid tokens need no revocation.
        let _ = state.sessions.revoke(&token);
    }
    let payload = json!({ "message": "Successfully logged out" });
    (
        StatusCode::OK,
        [(header::SET_COOKIE, cleared_session_cookie())],
        Json(payload),
    )
        .into_response()
}

pub(crate) async fn profile_handler(
    State(state): State<MarketplaceState>,
    CurrentCompany(company): CurrentCompany,
) -> Response {
    match state.marketplace.profile(company) {
        Ok(company) => (StatusCode::OK, Json(company)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn update_profile_handler(
    State(state): State<MarketplaceState>,
    CurrentCompany(company): CurrentCompany,
    JsonForm(update): JsonForm<ProfileUpdate>,
) -> Response {
    match state.marketplace.update_profile(company, update) {
        Ok(company) => {
            let payload = json!({ "message": "Profile updated", "company": company });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn own_services_handler(
    State(state): State<MarketplaceState>,
    CurrentCompany(company): CurrentCompany,
    ListingQuery(params): ListingQuery,
) -> Response {
    let result = SearchQuery::from_params(&params)
        .map_err(MarketplaceError::from)
        .and_then(|query| state.marketplace.company_services(company, &query));
    match result {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn create_service_handler(
    State(state): State<MarketplaceState>,
    CurrentCompany(company): CurrentCompany,
    JsonForm(form): JsonForm<ServiceForm>,
) -> Response {
    match state.marketplace.create_service(company, form) {
        Ok(service) => {
            let payload = json!({ "message": "Service created", "service": service });
            (StatusCode::CREATED, Json(payload)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn update_service_handler(
    State(state): State<MarketplaceState>,
    CurrentCompany(company): CurrentCompany,
    ServicePath(id): ServicePath,
    JsonForm(form): JsonForm<ServiceForm>,
) -> Response {
    match state.marketplace.update_service(company, id, form) {
        Ok(service) => {
            let payload = json!({ "message": "Service updated", "service": service });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn delete_service_handler(
    State(state): State<MarketplaceState>,
    CurrentCompany(company): CurrentCompany,
    ServicePath(id): ServicePath,
) -> Response {
    match state.marketplace.delete_service(company, id) {
        Ok(()) => {
            let payload = json!({ "message": "Service deleted", "service_id": id });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn service_detail_handler(
    State(state): State<MarketplaceState>,
    Extension(viewer): Extension<Viewer>,
    ServicePath(id): ServicePath,
) -> Response {
    match state.marketplace.service_detail(id, viewer.company) {
        Ok(service) => (StatusCode::OK, Json(service)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn submit_response_handler(
    State(state): State<MarketplaceState>,
    ServicePath(id): ServicePath,
    JsonForm(form): JsonForm<ResponseForm>,
) -> Response {
    match state.marketplace.submit_response(id, form) {
        Ok(response) => {
            let payload = json!({
                "message": "Your response has been sent",
                "response": response,
            });
            (StatusCode::CREATED, Json(payload)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn responses_handler(
    State(state): State<MarketplaceState>,
    CurrentCompany(company): CurrentCompany,
) -> Response {
    match state.marketplace.responses_for_company(company) {
        Ok(responses) => (StatusCode::OK, Json(responses)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) fn error_response(err: MarketplaceError) -> Response {
    match err {
        MarketplaceError::Validation(error) => {
            let payload = json!({
                "error": FORM_ERROR,
                "fields": error.fields,
            });
            (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response()
        }
        MarketplaceError::Query(error) => {
            let payload = json!({ "error": error.to_string() });
            (StatusCode::BAD_REQUEST, Json(payload)).into_response()
        }
        MarketplaceError::InvalidCredentials => {
            let payload = json!({ "error": err.to_string() });
            (StatusCode::UNAUTHORIZED, Json(payload)).into_response()
        }
        MarketplaceError::Forbidden(reason) => {
            let payload = json!({ "error": reason });
            (StatusCode::FORBIDDEN, Json(payload)).into_response()
        }
        MarketplaceError::NotFound(_) | MarketplaceError::Repository(RepositoryError::NotFound) => {
            let payload = json!({ "error": err.to_string() });
            (StatusCode::NOT_FOUND, Json(payload)).into_response()
        }
        MarketplaceError::Conflict(_) | MarketplaceError::Repository(RepositoryError::Conflict) => {
            let payload = json!({ "error": err.to_string() });
            (StatusCode::CONFLICT, Json(payload)).into_response()
        }
        other => {
            error!(error = %other, "marketplace request failed");
            let payload = json!({ "error": other.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
        }
    }
}
