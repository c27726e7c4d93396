//! Axum route handlers for the relationship read API.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::relationship::{MenteeSummary, MentorSummary};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct MenteeListResponse {
    pub mentor_id: Uuid,
    pub mentees: Vec<MenteeSummary>,
}

#[derive(Debug, Serialize)]
pub struct MentorResponse {
    pub mentee_id: Uuid,
    pub mentor: Option<MentorSummary>,
}

/// GET /api/v1/mentors/:mentor_id/mentees
pub async fn handle_get_mentees(
    State(state): State<AppState>,
    Path(mentor_id): Path<Uuid>,
) -> Result<Json<MenteeListResponse>, AppError> {
    let mentees = state.reader.get_mentees(mentor_id).await?;
    Ok(Json(MenteeListResponse { mentor_id, mentees }))
}

/// GET /api/v1/mentees/:mentee_id/mentor
pub async fn handle_get_mentor(
    State(state): State<AppState>,
    Path(mentee_id): Path<Uuid>,
) -> Result<Json<MentorResponse>, AppError> {
    let mentor = state.reader.get_mentor(mentee_id).await?;
    Ok(Json(MentorResponse { mentee_id, mentor }))
}
