use std::sync::Arc;

use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use tracing::debug;

use super::domain::CompanyId;
use super::service::MarketplaceService;
use crate::auth::{token_from_headers, SessionService};

pub const LOGIN_PATH: &str = "/login";

/// Shared state behind every marketplace route.
#[derive(Clone)]
pub struct MarketplaceState {
    pub marketplace: Arc<MarketplaceService>,
    pub sessions: Arc<SessionService>,
}

/// Who is making the request. Anonymous visitors carry `company: None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Viewer {
    pub company: Option<CompanyId>,
}

/// Resolve the session token, if any, into a [`Viewer`] request extension.
/// Invalid, expired and revoked tokens all leave the visitor anonymous.
pub async fn identify_viewer(
    State(state): State<MarketplaceState>,
    mut request: Request,
    next: Next,
) -> Response {
    let company = token_from_headers(request.headers()).and_then(|token| {
        state
            .sessions
            .validate(&token)
            .map_err(|err| debug!(error = %err, "ignoring session token"))
            .ok()
    });
    request.extensions_mut().insert(Viewer { company });
    next.run(request).await
}

/// Send anonymous visitors to the login page.
pub async fn require_company(request: Request, next: Next) -> Response {
    let signed_in = request
        .extensions()
        .get::<Viewer>()
        .is_some_and(|viewer| viewer.company.is_some());
    if signed_in {
        next.run(request).await
    } else {
        Redirect::to(LOGIN_PATH).into_response()
    }
}

/// Extractor for handlers that only make sense for a signed-in company.
#[derive(Debug, Clone, Copy)]
pub struct CurrentCompany(pub CompanyId);

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentCompany
where
    S: Send + Sync,
{
    type Rejection = Redirect;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Viewer>()
            .and_then(|viewer| viewer.company)
            .map(CurrentCompany)
            .ok_or_else(|| Redirect::to(LOGIN_PATH))
    }
}
