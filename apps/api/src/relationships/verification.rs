//! Verification guard for a write path that failed wholesale.
//!
//! Individual edge failures are tolerated and reported in the batch result.
//! A sync that should have left the member with edges but left none active at
//! all is treated as a structural fault and surfaces as an error.

use std::collections::HashSet;

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::models::relationship::{EdgeKey, RelationshipRow};
use crate::relationships::store::{RelationshipStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VerificationReport {
    pub expected: usize,
    pub actual: usize,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error(
    "relationship sync for user {user_id} in team {team_id} left 0 of {expected} expected edges active"
)]
pub struct VerificationFailure {
    pub team_id: Uuid,
    pub user_id: Uuid,
    pub expected: usize,
}

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error(transparent)]
    Failed(#[from] VerificationFailure),

    #[error("could not re-read relationships for verification: {0}")]
    Store(#[from] StoreError),
}

/// Counts how many `required` edges are active in `rows`.
pub fn evaluate(
    team_id: Uuid,
    user_id: Uuid,
    required: &[EdgeKey],
    rows: &[RelationshipRow],
) -> Result<VerificationReport, VerificationFailure> {
    let required: HashSet<EdgeKey> = required.iter().copied().collect();
    let actual = rows
        .iter()
        .filter(|row| row.is_effectively_active() && required.contains(&row.key()))
        .count();
    let expected = required.len();

    if expected > 0 && actual == 0 {
        return Err(VerificationFailure {
            team_id,
            user_id,
            expected,
        });
    }
    Ok(VerificationReport { expected, actual })
}

/// Re-reads the member's edges from the store and evaluates them.
pub async fn verify_member_edges(
    store: &dyn RelationshipStore,
    team_id: Uuid,
    user_id: Uuid,
    required: &[EdgeKey],
) -> Result<VerificationReport, VerifyError> {
    if required.is_empty() {
        return Ok(VerificationReport {
            expected: 0,
            actual: 0,
        });
    }
    let rows = store.list_edges_for_user(user_id).await?;
    Ok(evaluate(team_id, user_id, required, &rows)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn row(mentor: Uuid, mentee: Uuid, active: Option<bool>) -> RelationshipRow {
        RelationshipRow {
            id: Uuid::new_v4(),
            mentor_id: mentor,
            mentee_id: mentee,
            relationship_type: "general".to_string(),
            invitation_status: "accepted".to_string(),
            active,
            accepted_at: None,
            permissions_granted: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_nothing_expected_passes() {
        let report = evaluate(Uuid::new_v4(), Uuid::new_v4(), &[], &[]).unwrap();
        assert_eq!(report, VerificationReport { expected: 0, actual: 0 });
    }

    #[test]
    fn test_partial_success_passes() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let required = [EdgeKey::new(a, b), EdgeKey::new(a, c)];
        let rows = [row(a, b, Some(true))];
        let report = evaluate(Uuid::new_v4(), a, &required, &rows).unwrap();
        assert_eq!(report, VerificationReport { expected: 2, actual: 1 });
    }

    #[test]
    fn test_zero_of_expected_fails() {
        let (team, a, b) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let required = [EdgeKey::new(a, b)];
        let rows = [row(a, b, Some(false))];
        let err = evaluate(team, a, &required, &rows).unwrap_err();
        assert_eq!(err.expected, 1);
        assert_eq!(err.team_id, team);
        assert!(err.to_string().contains("0 of 1"));
    }

    #[test]
    fn test_unrelated_active_edges_do_not_count() {
        let (a, b, x) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let required = [EdgeKey::new(a, b)];
        let rows = [row(a, x, Some(true))];
        assert!(evaluate(Uuid::new_v4(), a, &required, &rows).is_err());
    }
}
