use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::Serialize;
use uuid::Uuid;

use super::error::{Result as WebResult, WebError};
use crate::content::is_safe_segment;
use crate::practice::{AvailableSets, PageParams, SessionSnapshot, discover_sets};
use crate::session::SessionDetails;
use crate::state::AppState;

#[derive(Serialize, Debug)]
pub struct SetsResponse {
    pub topic: String,
    pub level: String,
    pub available_sets: AvailableSets,
}

fn check_params(params: &PageParams) -> WebResult<()> {
    for segment in [params.topic(), params.level()] {
        if !is_safe_segment(segment) {
            return Err(WebError::BadRequest(format!(
                "Invalid subject or level: '{segment}'"
            )));
        }
    }
    Ok(())
}

pub async fn create_session_handler(
    State(app_state): State<AppState>,
    Query(params): Query<PageParams>,
) -> WebResult<Json<SessionDetails>> {
    tracing::info!(request.params = ?params, "HTTP: Received create_session request");
    check_params(&params)?;

    let details = app_state
        .session_manager
        .create_session(params)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to create session");
            WebError::from(e)
        })?;

    Ok(Json(details))
}

pub async fn get_session_handler(
    State(app_state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> WebResult<Json<SessionSnapshot>> {
    let handle = app_state
        .session_manager
        .get_session_handle(session_id)
        .await
        .ok_or(WebError::SessionNotFound(session_id))?;

    Ok(Json(handle.snapshot().await?))
}

pub async fn list_sets_handler(
    State(app_state): State<AppState>,
    Query(params): Query<PageParams>,
) -> WebResult<Json<SetsResponse>> {
    check_params(&params)?;
    let topic = params.topic().to_string();
    let level = params.level().to_string();

    let available_sets = discover_sets(
        app_state.store.as_ref(),
        &topic,
        &level,
        app_state.practice.discovery_limit,
    )
    .await;

    Ok(Json(SetsResponse {
        topic,
        level,
        available_sets,
    }))
}
