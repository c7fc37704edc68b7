use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    challenges::{
        dto::{assign_ranks, ChallengeResponse, CreateChallengeRequest, LeaderboardEntry},
        repo,
    },
    error::ApiError,
    meals::dto::parse_day,
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct ChallengesQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    20
}

#[instrument(skip(state, body))]
pub async fn create_challenge(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<CreateChallengeRequest>,
) -> Result<(StatusCode, Json<ChallengeResponse>), ApiError> {
    let name = body.name.trim();
    if name.is_empty() {
        return Err(ApiError::validation("challenge name is required"));
    }
    let starts_on = parse_day(&body.starts_on)?;
    let ends_on = parse_day(&body.ends_on)?;
    if ends_on < starts_on {
        return Err(ApiError::validation("ends_on must not precede starts_on"));
    }

    let challenge = repo::create(&state.db, name, starts_on, ends_on, user_id).await?;
    info!(challenge_id = %challenge.id, %user_id, "challenge created");
    Ok((StatusCode::CREATED, Json(challenge.into())))
}

#[instrument(skip(state))]
pub async fn list_challenges(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Query(q): Query<ChallengesQuery>,
) -> Result<Json<Vec<ChallengeResponse>>, ApiError> {
    let challenges = repo::list(&state.db, q.limit, q.offset).await?;
    Ok(Json(challenges.into_iter().map(Into::into).collect()))
}

#[instrument(skip(state))]
pub async fn join_challenge(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if repo::get(&state.db, id).await?.is_none() {
        return Err(ApiError::NotFound("challenge"));
    }
    if !repo::join(&state.db, id, user_id).await? {
        return Err(ApiError::Conflict("already joined".into()));
    }
    info!(challenge_id = %id, %user_id, "challenge joined");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn leaderboard(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<LeaderboardEntry>>, ApiError> {
    if repo::get(&state.db, id).await?.is_none() {
        return Err(ApiError::NotFound("challenge"));
    }
    let scores = repo::participant_scores(&state.db, id).await?;
    Ok(Json(assign_ranks(scores)))
}
