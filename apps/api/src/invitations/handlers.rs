//! Axum route handlers for the invitation API.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::invitations::acceptance::{
    InvitationStatusResponse, MentorInvitationAccepted, TeamInvitationAccepted,
};
use crate::models::invitation::{MentorInvitationStatus, TeamInvitationStatus};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AcceptInvitationRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct ActorRequest {
    pub actor_id: Uuid,
}

/// POST /api/v1/invitations/team/:token/accept
pub async fn handle_accept_team_invitation(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(req): Json<AcceptInvitationRequest>,
) -> Result<Json<TeamInvitationAccepted>, AppError> {
    let accepted = state
        .invitations
        .accept_team_invitation(&token, req.user_id)
        .await?;
    Ok(Json(accepted))
}

/// POST /api/v1/invitations/team/:token/cancel
pub async fn handle_cancel_team_invitation(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(req): Json<ActorRequest>,
) -> Result<Json<InvitationStatusResponse<TeamInvitationStatus>>, AppError> {
    let cancelled = state
        .invitations
        .cancel_team_invitation(&token, req.actor_id)
        .await?;
    Ok(Json(cancelled))
}

/// POST /api/v1/invitations/mentor/:token/accept
pub async fn handle_accept_mentor_invitation(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(req): Json<AcceptInvitationRequest>,
) -> Result<Json<MentorInvitationAccepted>, AppError> {
    let accepted = state
        .invitations
        .accept_mentor_invitation(&token, req.user_id)
        .await?;
    Ok(Json(accepted))
}

/// POST /api/v1/invitations/mentor/:token/decline
pub async fn handle_decline_mentor_invitation(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<InvitationStatusResponse<MentorInvitationStatus>>, AppError> {
    let declined = state.invitations.decline_mentor_invitation(&token).await?;
    Ok(Json(declined))
}
