pub mod health;

use axum::{
    routing::{delete, get, patch, post},
    Router,
};

use crate::invitations::handlers as invitations;
use crate::relationships::handlers as relationships;
use crate::state::AppState;
use crate::teams::handlers as teams;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Relationship reads (with read-repair)
        .route(
            "/api/v1/mentors/:mentor_id/mentees",
            get(relationships::handle_get_mentees),
        )
        .route(
            "/api/v1/mentees/:mentee_id/mentor",
            get(relationships::handle_get_mentor),
        )
        // Invitations
        .route(
            "/api/v1/invitations/team/:token/accept",
            post(invitations::handle_accept_team_invitation),
        )
        .route(
            "/api/v1/invitations/team/:token/cancel",
            post(invitations::handle_cancel_team_invitation),
        )
        .route(
            "/api/v1/invitations/mentor/:token/accept",
            post(invitations::handle_accept_mentor_invitation),
        )
        .route(
            "/api/v1/invitations/mentor/:token/decline",
            post(invitations::handle_decline_mentor_invitation),
        )
        // Team membership
        .route(
            "/api/v1/teams/:team_id/members/:user_id/role",
            patch(teams::handle_change_role),
        )
        .route(
            "/api/v1/teams/:team_id/members/:user_id",
            delete(teams::handle_remove_member),
        )
        .with_state(state)
}
