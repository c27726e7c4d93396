use chrono::{DateTime, Utc};

use crate::errors::AppError;
use crate::models::invitation::{
    MentorInvitationRow, MentorInvitationStatus, TeamInvitationRow, TeamInvitationStatus,
};

/// Status as seen at `now`: a pending invitation past its deadline reads as expired.
pub fn effective_team_status(
    row: &TeamInvitationRow,
    now: DateTime<Utc>,
) -> Result<TeamInvitationStatus, AppError> {
    let status = TeamInvitationStatus::parse(&row.status).ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!(
            "team invitation {} has unknown status '{}'",
            row.id,
            row.status
        ))
    })?;
    Ok(match status {
        TeamInvitationStatus::Pending if row.expires_at <= now => TeamInvitationStatus::Expired,
        other => other,
    })
}

pub fn effective_mentor_status(
    row: &MentorInvitationRow,
    now: DateTime<Utc>,
) -> Result<MentorInvitationStatus, AppError> {
    let status = MentorInvitationStatus::parse(&row.status).ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!(
            "mentor invitation {} has unknown status '{}'",
            row.id,
            row.status
        ))
    })?;
    Ok(match status {
        MentorInvitationStatus::Pending if row.expires_at <= now => {
            MentorInvitationStatus::Expired
        }
        other => other,
    })
}

/// Error for an invitation that can no longer be answered.
pub fn team_status_error(status: TeamInvitationStatus) -> AppError {
    match status {
        TeamInvitationStatus::Expired => {
            AppError::InvitationExpired("team invitation has expired".to_string())
        }
        TeamInvitationStatus::Accepted => {
            AppError::Conflict("team invitation was already accepted".to_string())
        }
        TeamInvitationStatus::Cancelled => {
            AppError::Conflict("team invitation was cancelled".to_string())
        }
        TeamInvitationStatus::Pending => {
            AppError::Conflict("team invitation is still pending".to_string())
        }
    }
}

pub fn mentor_status_error(status: MentorInvitationStatus) -> AppError {
    match status {
        MentorInvitationStatus::Expired => {
            AppError::InvitationExpired("mentor invitation has expired".to_string())
        }
        MentorInvitationStatus::Accepted => {
            AppError::Conflict("mentor invitation was already accepted".to_string())
        }
        MentorInvitationStatus::Declined => {
            AppError::Conflict("mentor invitation was declined".to_string())
        }
        MentorInvitationStatus::Pending => {
            AppError::Conflict("mentor invitation is still pending".to_string())
        }
    }
}
