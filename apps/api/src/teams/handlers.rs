//! Axum route handlers for team membership changes.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::team::TeamRole;
use crate::state::AppState;
use crate::teams::membership::MembershipChange;

#[derive(Debug, Deserialize)]
pub struct ChangeRoleRequest {
    pub actor_id: Uuid,
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct RemoveMemberRequest {
    pub actor_id: Uuid,
}

/// PATCH /api/v1/teams/:team_id/members/:user_id/role
pub async fn handle_change_role(
    State(state): State<AppState>,
    Path((team_id, user_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<ChangeRoleRequest>,
) -> Result<Json<MembershipChange>, AppError> {
    let role: TeamRole = req
        .role
        .parse()
        .map_err(|e| AppError::Validation(format!("{e}")))?;
    let change = state
        .teams
        .change_member_role(team_id, req.actor_id, user_id, role)
        .await?;
    Ok(Json(change))
}

/// DELETE /api/v1/teams/:team_id/members/:user_id
pub async fn handle_remove_member(
    State(state): State<AppState>,
    Path((team_id, user_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<RemoveMemberRequest>,
) -> Result<Json<MembershipChange>, AppError> {
    let change = state
        .teams
        .remove_member(team_id, req.actor_id, user_id)
        .await?;
    Ok(Json(change))
}
