use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamInvitationStatus {
    Pending,
    Accepted,
    Expired,
    Cancelled,
}

impl TeamInvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TeamInvitationStatus::Pending => "pending",
            TeamInvitationStatus::Accepted => "accepted",
            TeamInvitationStatus::Expired => "expired",
            TeamInvitationStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TeamInvitationStatus::Pending),
            "accepted" => Some(TeamInvitationStatus::Accepted),
            "expired" => Some(TeamInvitationStatus::Expired),
            "cancelled" => Some(TeamInvitationStatus::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MentorInvitationStatus {
    Pending,
    Accepted,
    Declined,
    Expired,
}

impl MentorInvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MentorInvitationStatus::Pending => "pending",
            MentorInvitationStatus::Accepted => "accepted",
            MentorInvitationStatus::Declined => "declined",
            MentorInvitationStatus::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(MentorInvitationStatus::Pending),
            "accepted" => Some(MentorInvitationStatus::Accepted),
            "declined" => Some(MentorInvitationStatus::Declined),
            "expired" => Some(MentorInvitationStatus::Expired),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TeamInvitationRow {
    pub id: Uuid,
    pub team_id: Uuid,
    pub token: String,
    pub invitee_email: String,
    pub role: String,
    pub invited_by: Uuid,
    pub status: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

/// A mentee inviting their own mentor, outside any team.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MentorInvitationRow {
    pub id: Uuid,
    pub mentee_id: Uuid,
    pub token: String,
    pub mentor_email: String,
    pub relationship_type: String,
    pub status: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}
