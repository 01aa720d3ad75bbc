//! Route handlers.
//!
//! ```text
//! GET /                                 sign-in entry, or the feed URL once signed in
//! GET /token?code=..&state=..           OAuth redirect target
//! GET /success                          subscription URLs
//! GET /calendar?token=..&full=..&google=..
//! GET /attachment/{att_id}/{file_name}  mirrored attachment
//! GET /health                           liveness and refresher progress
//! ```

use std::sync::Arc;

use axum::{Json, Router};
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum_extra::extract::cookie::{Cookie, CookieJar};
use chrono::Utc;
use o365ical_core::OutputMode;
use o365ical_providers::{GraphClient, OAuthSession, ProviderError, generate_state};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, error, info, warn};

use super::AppState;
use crate::error::{ServerError, ServerResult};
use crate::registry::UserHandle;

/// Name of the session cookie.
pub const COOKIE_NAME: &str = "o365toical";

const CALENDAR_CONTENT_TYPE: &str = "text/calendar; charset=utf-8";

/// Creates the application routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/token", get(token))
        .route("/success", get(success))
        .route("/calendar", get(calendar))
        .route("/attachment/{att_id}/{file_name}", get(attachment))
        .route("/health", get(health))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "refresher": state.refresher.state().await,
    }))
}

async fn index(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> ServerResult<Response> {
    if let Some(token) = session_cookie(&jar)
        && state.registry.resolve(&token).await.is_ok()
    {
        return Ok(feed_url(&state.base_url(&headers), &token).into_response());
    }

    let oauth_state = generate_state();
    let authorize_url = state.oauth.authorize_url(&oauth_state)?;
    let token = state.registry.create_pending(oauth_state).await;
    info!("new session, redirecting to sign-in");

    Ok((jar.add(build_cookie(token)), Redirect::temporary(&authorize_url)).into_response())
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

async fn token(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<TokenQuery>,
) -> ServerResult<Response> {
    let session = session_cookie(&jar).ok_or(ServerError::Unauthenticated)?;

    if let Some(code) = query.error {
        warn!(error = %code, "sign-in was rejected");
        return Err(ProviderError::authorization(format!(
            "{}: {}",
            code,
            query.error_description.unwrap_or_default()
        ))
        .into());
    }
    let code = query
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ServerError::bad_request("missing authorization code"))?;

    state
        .registry
        .check_pending(&session, query.state.as_deref().unwrap_or_default())
        .await?;

    let tokens = state.oauth.exchange_code(&code).await?;
    let client = GraphClient::new(
        &state.graph,
        Arc::new(OAuthSession::new(state.oauth.clone(), tokens)),
    )?;
    let identity = client.me().await?.into_identity()?;
    let username = identity.username.clone();

    let active = state
        .registry
        .activate(&session, UserHandle::new(identity, client))
        .await;
    info!(user = %username, "signed in");
    if let Err(e) = state.refresher.refresh_now() {
        debug!(error = %e, "refresher did not take the sign-in refresh");
    }

    let jar = if active != session {
        jar.add(build_cookie(active))
    } else {
        jar
    };
    Ok((jar, Redirect::temporary("/success")).into_response())
}

async fn success(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> ServerResult<String> {
    let token = session_cookie(&jar).ok_or(ServerError::Unauthenticated)?;
    let user = state.registry.resolve(&token).await?;

    state.store.upsert_user_token(user.username(), &token)?;

    Ok(subscription_text(&feed_url(
        &state.base_url(&headers),
        &token,
    )))
}

#[derive(Debug, Default, Deserialize)]
struct CalendarQuery {
    token: Option<String>,
    full: Option<String>,
    google: Option<String>,
}

async fn calendar(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Query(query): Query<CalendarQuery>,
) -> ServerResult<Response> {
    let token = query
        .token
        .filter(|t| !t.is_empty())
        .or_else(|| session_cookie(&jar))
        .ok_or(ServerError::Unauthenticated)?;
    let user = state.registry.resolve(&token).await?;

    let mode = OutputMode::new(is_true(query.full), is_true(query.google));
    let body = state
        .calendar
        .render(&user, mode, &state.base_url(&headers), Utc::now())
        .await
        .inspect_err(|e| error!(user = %user.username(), error = %e, "calendar request failed"))?;

    Ok(([(CONTENT_TYPE, CALENDAR_CONTENT_TYPE)], body).into_response())
}

async fn attachment(
    State(state): State<AppState>,
    Path((att_id, file_name)): Path<(String, String)>,
) -> ServerResult<Response> {
    let record = state.mirror.record(&att_id)?;
    if record.file_name != file_name {
        return Err(ServerError::not_found(format!("attachment {}", att_id)));
    }

    let path = state.mirror.local_path(&record.attachment_id, &record.file_name);
    let bytes = tokio::fs::read(&path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ServerError::not_found(format!("attachment {} is not downloaded yet", att_id))
        } else {
            e.into()
        }
    })?;

    Ok(([(CONTENT_TYPE, record.content_type)], bytes).into_response())
}

fn session_cookie(jar: &CookieJar) -> Option<String> {
    jar.get(COOKIE_NAME)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

fn build_cookie(token: String) -> Cookie<'static> {
    Cookie::build((COOKIE_NAME, token))
        .path("/")
        .http_only(true)
        .build()
}

/// Only the literal `true` turns a flag on.
fn is_true(value: Option<String>) -> bool {
    value.as_deref() == Some("true")
}

fn feed_url(base_url: &str, token: &str) -> String {
    format!("{}/calendar?token={}", base_url, token)
}

fn subscription_text(url: &str) -> String {
    format!(
        "For regular devices:\n\
         {url}\n\
         {url}&full=true    # Includes tentatives and marked as 'Free' on the calendar\n\
         \n\
         For Google Calendar:\n\
         {url}&google=true\n\
         {url}&google=true&full=true    # Includes tentatives and marked as 'Free' on the calendar\n"
    )
}
