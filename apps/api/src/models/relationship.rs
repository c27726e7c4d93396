use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    General,
    CareerCoaching,
}

impl RelationshipType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipType::General => "general",
            RelationshipType::CareerCoaching => "career_coaching",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "general" => Some(RelationshipType::General),
            "career_coaching" => Some(RelationshipType::CareerCoaching),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Declined,
}

impl InvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvitationStatus::Pending => "pending",
            InvitationStatus::Accepted => "accepted",
            InvitationStatus::Declined => "declined",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(InvitationStatus::Pending),
            "accepted" => Some(InvitationStatus::Accepted),
            "declined" => Some(InvitationStatus::Declined),
            _ => None,
        }
    }
}

/// Capabilities a mentee grants their mentor. Persisted as a JSONB object
/// with camelCase keys; every capability defaults to granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct Permissions {
    pub can_view_resumes: bool,
    pub can_view_cover_letters: bool,
    pub can_view_applications: bool,
    pub can_provide_feedback: bool,
    pub can_assign_tasks: bool,
}

impl Default for Permissions {
    fn default() -> Self {
        Self {
            can_view_resumes: true,
            can_view_cover_letters: true,
            can_view_applications: true,
            can_provide_feedback: true,
            can_assign_tasks: true,
        }
    }
}

impl Permissions {
    /// Decodes the stored blob. NULL means "created before permissions were
    /// recorded" and yields the defaults.
    pub fn from_stored(value: Option<&Value>) -> Result<Self, String> {
        match value {
            None | Some(Value::Null) => Ok(Self::default()),
            Some(v @ Value::Object(_)) => serde_json::from_value(v.clone())
                .map_err(|e| format!("invalid permissions object: {e}")),
            Some(other) => Err(format!("permissions must be a JSON object, got {other}")),
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Ordered (mentor, mentee) pair. At most one relationship row exists per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EdgeKey {
    pub mentor_id: Uuid,
    pub mentee_id: Uuid,
}

impl EdgeKey {
    pub fn new(mentor_id: Uuid, mentee_id: Uuid) -> Self {
        Self {
            mentor_id,
            mentee_id,
        }
    }

    pub fn touches(&self, user_id: Uuid) -> bool {
        self.mentor_id == user_id || self.mentee_id == user_id
    }
}

impl fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.mentor_id, self.mentee_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RelationshipRow {
    pub id: Uuid,
    pub mentor_id: Uuid,
    pub mentee_id: Uuid,
    pub relationship_type: String,
    pub invitation_status: String,
    /// NULL on rows written before the flag existed.
    pub active: Option<bool>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub permissions_granted: Option<Value>,
    pub created_at: DateTime<Utc>,
}

impl RelationshipRow {
    pub fn key(&self) -> EdgeKey {
        EdgeKey::new(self.mentor_id, self.mentee_id)
    }

    pub fn is_declined(&self) -> bool {
        InvitationStatus::parse(&self.invitation_status) == Some(InvitationStatus::Declined)
    }

    /// Active flag with legacy NULLs resolved: missing means active unless the
    /// invitation was declined.
    pub fn is_effectively_active(&self) -> bool {
        self.active.unwrap_or(!self.is_declined())
    }
}

/// Fields for inserting a fresh relationship row.
#[derive(Debug, Clone)]
pub struct NewRelationship {
    pub mentor_id: Uuid,
    pub mentee_id: Uuid,
    pub relationship_type: RelationshipType,
    pub permissions: Permissions,
    pub accepted_at: DateTime<Utc>,
}

/// Active relationship joined with the mentee's profile.
#[derive(Debug, Clone, FromRow)]
pub struct MenteeSummaryRow {
    pub mentee_id: Uuid,
    pub relationship_id: Uuid,
    pub relationship_type: String,
    pub permissions_granted: Option<Value>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub display_name: Option<String>,
    pub email: Option<String>,
}

/// Active relationship joined with the mentor's profile.
#[derive(Debug, Clone, FromRow)]
pub struct MentorSummaryRow {
    pub mentor_id: Uuid,
    pub relationship_id: Uuid,
    pub relationship_type: String,
    pub permissions_granted: Option<Value>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub display_name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MenteeSummary {
    pub mentee_id: Uuid,
    pub relationship_id: Uuid,
    pub relationship_type: RelationshipType,
    pub permissions: Permissions,
    pub accepted_at: Option<DateTime<Utc>>,
    pub display_name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MentorSummary {
    pub mentor_id: Uuid,
    pub relationship_id: Uuid,
    pub relationship_type: RelationshipType,
    pub permissions: Permissions,
    pub accepted_at: Option<DateTime<Utc>>,
    pub display_name: Option<String>,
    pub email: Option<String>,
}

impl TryFrom<MenteeSummaryRow> for MenteeSummary {
    type Error = String;

    fn try_from(row: MenteeSummaryRow) -> Result<Self, Self::Error> {
        Ok(MenteeSummary {
            mentee_id: row.mentee_id,
            relationship_id: row.relationship_id,
            relationship_type: RelationshipType::parse(&row.relationship_type)
                .ok_or_else(|| format!("unknown relationship type '{}'", row.relationship_type))?,
            permissions: Permissions::from_stored(row.permissions_granted.as_ref())?,
            accepted_at: row.accepted_at,
            display_name: row.display_name,
            email: row.email,
        })
    }
}

impl TryFrom<MentorSummaryRow> for MentorSummary {
    type Error = String;

    fn try_from(row: MentorSummaryRow) -> Result<Self, Self::Error> {
        Ok(MentorSummary {
            mentor_id: row.mentor_id,
            relationship_id: row.relationship_id,
            relationship_type: RelationshipType::parse(&row.relationship_type)
                .ok_or_else(|| format!("unknown relationship type '{}'", row.relationship_type))?,
            permissions: Permissions::from_stored(row.permissions_granted.as_ref())?,
            accepted_at: row.accepted_at,
            display_name: row.display_name,
            email: row.email,
        })
    }
}
