use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::invitations::lifecycle::{
    effective_mentor_status, effective_team_status, mentor_status_error, team_status_error,
};
use crate::invitations::store::InvitationStore;
use crate::models::invitation::{
    MentorInvitationRow, MentorInvitationStatus, TeamInvitationRow, TeamInvitationStatus,
};
use crate::models::relationship::{EdgeKey, RelationshipType};
use crate::models::team::TeamRole;
use crate::relationships::driver::{BatchResult, RelationshipSync};
use crate::relationships::reconciler::Trigger;
use crate::relationships::store::MembershipStore;
use crate::relationships::verification::VerificationReport;

#[derive(Debug, Serialize)]
pub struct TeamInvitationAccepted {
    pub team_id: Uuid,
    pub user_id: Uuid,
    pub role: TeamRole,
    pub relationships: BatchResult,
    pub verification: Option<VerificationReport>,
}

#[derive(Debug, Serialize)]
pub struct MentorInvitationAccepted {
    pub mentor_id: Uuid,
    pub mentee_id: Uuid,
    pub relationship_type: RelationshipType,
    pub relationships: BatchResult,
}

#[derive(Debug, Serialize)]
pub struct InvitationStatusResponse<S> {
    pub invitation_id: Uuid,
    pub status: S,
}

#[derive(Clone)]
pub struct InvitationService {
    invitations: Arc<dyn InvitationStore>,
    memberships: Arc<dyn MembershipStore>,
    sync: RelationshipSync,
}

impl InvitationService {
    pub fn new(
        invitations: Arc<dyn InvitationStore>,
        memberships: Arc<dyn MembershipStore>,
        sync: RelationshipSync,
    ) -> Self {
        Self {
            invitations,
            memberships,
            sync,
        }
    }

    /// Claims the invitation, joins `user_id` to its team and reconciles their
    /// edges. Losing the claim leaves membership and relationships untouched.
    pub async fn accept_team_invitation(
        &self,
        token: &str,
        user_id: Uuid,
    ) -> Result<TeamInvitationAccepted, AppError> {
        let invitation = self.pending_team_invitation(token).await?;
        let role: TeamRole = invitation
            .role
            .parse()
            .map_err(|e| AppError::Validation(format!("{e}")))?;
        let team_id = invitation.team_id;

        let claimed = self
            .invitations
            .transition_team_invitation(invitation.id, TeamInvitationStatus::Accepted, Utc::now())
            .await?;
        if !claimed {
            warn!(
                "Team invitation {} changed state before user {} could accept it",
                invitation.id, user_id
            );
            return Err(AppError::Conflict(
                "team invitation is no longer pending".to_string(),
            ));
        }

        let previous = self
            .memberships
            .get_member(team_id, user_id)
            .await?
            .filter(|m| m.active);

        self.memberships.upsert_member(team_id, user_id, role).await?;

        let trigger = match previous {
            Some(member) if member.role != role => Trigger::RoleChanged {
                user_id,
                old_role: member.role,
                new_role: role,
            },
            _ => Trigger::MemberJoined { user_id, role },
        };
        let outcome = self.sync.sync_team_member(team_id, trigger).await?;

        info!(
            "User {} joined team {} as {} ({} relationship change(s))",
            user_id,
            team_id,
            role,
            outcome.batch.succeeded()
        );

        Ok(TeamInvitationAccepted {
            team_id,
            user_id,
            role,
            relationships: outcome.batch,
            verification: outcome.verification,
        })
    }

    /// Admin-only. Pending ⇒ cancelled.
    pub async fn cancel_team_invitation(
        &self,
        token: &str,
        actor_id: Uuid,
    ) -> Result<InvitationStatusResponse<TeamInvitationStatus>, AppError> {
        let invitation = self.find_team_invitation(token).await?;

        let actor_role = self
            .memberships
            .get_role(invitation.team_id, actor_id)
            .await?;
        if actor_role != Some(TeamRole::Admin) {
            return Err(AppError::Forbidden(
                "only team admins can cancel invitations".to_string(),
            ));
        }

        let invitation = self.ensure_team_pending(invitation).await?;
        let moved = self
            .invitations
            .transition_team_invitation(invitation.id, TeamInvitationStatus::Cancelled, Utc::now())
            .await?;
        if !moved {
            return Err(AppError::Conflict(
                "team invitation is no longer pending".to_string(),
            ));
        }

        info!("Team invitation {} cancelled by {}", invitation.id, actor_id);
        Ok(InvitationStatusResponse {
            invitation_id: invitation.id,
            status: TeamInvitationStatus::Cancelled,
        })
    }

    /// Creates (or reactivates) the explicit mentor -> mentee edge, then marks
    /// the invitation accepted. A failed edge write leaves the invitation pending.
    pub async fn accept_mentor_invitation(
        &self,
        token: &str,
        mentor_id: Uuid,
    ) -> Result<MentorInvitationAccepted, AppError> {
        let invitation = self.pending_mentor_invitation(token).await?;
        if invitation.mentee_id == mentor_id {
            return Err(AppError::Validation(
                "a user cannot mentor themselves".to_string(),
            ));
        }
        let relationship_type = RelationshipType::parse(&invitation.relationship_type)
            .ok_or_else(|| {
                AppError::Internal(anyhow::anyhow!(
                    "mentor invitation {} has unknown relationship type '{}'",
                    invitation.id,
                    invitation.relationship_type
                ))
            })?;

        let key = EdgeKey::new(mentor_id, invitation.mentee_id);
        let batch = self.sync.ensure_edge(key, relationship_type).await;
        if let Some(failure) = batch.failed.first() {
            return Err(AppError::Internal(anyhow::anyhow!(
                "could not activate relationship {}: {}",
                failure.key,
                failure.message
            )));
        }

        let moved = self
            .invitations
            .transition_mentor_invitation(
                invitation.id,
                MentorInvitationStatus::Accepted,
                Utc::now(),
            )
            .await?;
        if !moved {
            warn!(
                "Mentor invitation {} changed state while {} was accepting",
                invitation.id, mentor_id
            );
        }

        info!("Mentor invitation {} accepted: {}", invitation.id, key);
        Ok(MentorInvitationAccepted {
            mentor_id,
            mentee_id: invitation.mentee_id,
            relationship_type,
            relationships: batch,
        })
    }

    pub async fn decline_mentor_invitation(
        &self,
        token: &str,
    ) -> Result<InvitationStatusResponse<MentorInvitationStatus>, AppError> {
        let invitation = self.pending_mentor_invitation(token).await?;
        let moved = self
            .invitations
            .transition_mentor_invitation(
                invitation.id,
                MentorInvitationStatus::Declined,
                Utc::now(),
            )
            .await?;
        if !moved {
            return Err(AppError::Conflict(
                "mentor invitation is no longer pending".to_string(),
            ));
        }

        info!("Mentor invitation {} declined", invitation.id);
        Ok(InvitationStatusResponse {
            invitation_id: invitation.id,
            status: MentorInvitationStatus::Declined,
        })
    }

    async fn find_team_invitation(&self, token: &str) -> Result<TeamInvitationRow, AppError> {
        self.invitations
            .find_team_invitation(token)
            .await?
            .ok_or_else(|| AppError::NotFound("team invitation not found".to_string()))
    }

    async fn pending_team_invitation(&self, token: &str) -> Result<TeamInvitationRow, AppError> {
        let invitation = self.find_team_invitation(token).await?;
        self.ensure_team_pending(invitation).await
    }

    /// Persists lazy expiry before reporting it.
    async fn ensure_team_pending(
        &self,
        invitation: TeamInvitationRow,
    ) -> Result<TeamInvitationRow, AppError> {
        let now = Utc::now();
        match effective_team_status(&invitation, now)? {
            TeamInvitationStatus::Pending => Ok(invitation),
            TeamInvitationStatus::Expired => {
                if invitation.status == TeamInvitationStatus::Pending.as_str() {
                    self.invitations
                        .transition_team_invitation(
                            invitation.id,
                            TeamInvitationStatus::Expired,
                            now,
                        )
                        .await?;
                }
                Err(team_status_error(TeamInvitationStatus::Expired))
            }
            other => Err(team_status_error(other)),
        }
    }

    async fn pending_mentor_invitation(
        &self,
        token: &str,
    ) -> Result<MentorInvitationRow, AppError> {
        let invitation = self
            .invitations
            .find_mentor_invitation(token)
            .await?
            .ok_or_else(|| AppError::NotFound("mentor invitation not found".to_string()))?;

        let now = Utc::now();
        match effective_mentor_status(&invitation, now)? {
            MentorInvitationStatus::Pending => Ok(invitation),
            MentorInvitationStatus::Expired => {
                if invitation.status == MentorInvitationStatus::Pending.as_str() {
                    self.invitations
                        .transition_mentor_invitation(
                            invitation.id,
                            MentorInvitationStatus::Expired,
                            now,
                        )
                        .await?;
                }
                Err(mentor_status_error(MentorInvitationStatus::Expired))
            }
            other => Err(mentor_status_error(other)),
        }
    }
}
