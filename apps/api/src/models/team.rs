use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use uuid::Uuid;

/// A member's role within a team. Stored as TEXT in `team_members.role`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamRole {
    Admin,
    Mentor,
    CareerCoach,
    Peer,
    Candidate,
}

/// Which side of an automatic mentor → mentee edge a role can occupy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleClass {
    MentorCapable,
    MenteeCapable,
    Neither,
}

impl TeamRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TeamRole::Admin => "admin",
            TeamRole::Mentor => "mentor",
            TeamRole::CareerCoach => "career_coach",
            TeamRole::Peer => "peer",
            TeamRole::Candidate => "candidate",
        }
    }

    pub fn class(&self) -> RoleClass {
        match self {
            TeamRole::Mentor | TeamRole::CareerCoach => RoleClass::MentorCapable,
            TeamRole::Peer | TeamRole::Candidate => RoleClass::MenteeCapable,
            TeamRole::Admin => RoleClass::Neither,
        }
    }

    pub fn is_mentor_capable(&self) -> bool {
        self.class() == RoleClass::MentorCapable
    }
}

impl fmt::Display for TeamRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown team role '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for TeamRole {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(TeamRole::Admin),
            "mentor" => Ok(TeamRole::Mentor),
            "career_coach" => Ok(TeamRole::CareerCoach),
            "peer" => Ok(TeamRole::Peer),
            "candidate" => Ok(TeamRole::Candidate),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TeamMemberRow {
    pub team_id: Uuid,
    pub user_id: Uuid,
    pub role: String,
    pub active: bool,
    pub joined_at: DateTime<Utc>,
}

/// A membership row with its role parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamMember {
    pub team_id: Uuid,
    pub user_id: Uuid,
    pub role: TeamRole,
    pub active: bool,
    pub joined_at: DateTime<Utc>,
}

impl TryFrom<TeamMemberRow> for TeamMember {
    type Error = UnknownRole;

    fn try_from(row: TeamMemberRow) -> Result<Self, Self::Error> {
        Ok(TeamMember {
            team_id: row.team_id,
            user_id: row.user_id,
            role: row.role.parse()?,
            active: row.active,
            joined_at: row.joined_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_classes() {
        assert_eq!(TeamRole::Mentor.class(), RoleClass::MentorCapable);
        assert_eq!(TeamRole::CareerCoach.class(), RoleClass::MentorCapable);
        assert_eq!(TeamRole::Candidate.class(), RoleClass::MenteeCapable);
        assert_eq!(TeamRole::Peer.class(), RoleClass::MenteeCapable);
        assert_eq!(TeamRole::Admin.class(), RoleClass::Neither);
    }

    #[test]
    fn test_role_parse_is_case_insensitive() {
        assert_eq!("Career_Coach".parse::<TeamRole>(), Ok(TeamRole::CareerCoach));
        assert_eq!(" peer ".parse::<TeamRole>(), Ok(TeamRole::Peer));
    }

    #[test]
    fn test_unknown_role_is_rejected() {
        let err = "owner".parse::<TeamRole>().unwrap_err();
        assert_eq!(err.to_string(), "unknown team role 'owner'");
    }

    #[test]
    fn test_role_serde_matches_storage_strings() {
        let json = serde_json::to_string(&TeamRole::CareerCoach).unwrap();
        assert_eq!(json, "\"career_coach\"");
        for role in [
            TeamRole::Admin,
            TeamRole::Mentor,
            TeamRole::CareerCoach,
            TeamRole::Peer,
            TeamRole::Candidate,
        ] {
            assert_eq!(role.as_str().parse::<TeamRole>(), Ok(role));
        }
    }
}
