use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use super::repo_types::{Challenge, ParticipantScore};

#[derive(Debug, Deserialize)]
pub struct CreateChallengeRequest {
    pub name: String,
    pub starts_on: String,
    pub ends_on: String,
}

#[derive(Debug, Serialize)]
pub struct ChallengeResponse {
    pub id: Uuid,
    pub name: String,
    pub starts_on: Date,
    pub ends_on: Date,
    pub created_by: Uuid,
    pub created_at: OffsetDateTime,
}

impl From<Challenge> for ChallengeResponse {
    fn from(c: Challenge) -> Self {
        Self {
            id: c.id,
            name: c.name,
            starts_on: c.starts_on,
            ends_on: c.ends_on,
            created_by: c.created_by,
            created_at: c.created_at,
        }
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct LeaderboardEntry {
    pub rank: i64,
    pub user_id: Uuid,
    pub username: String,
    pub days_achieved: i64,
    pub days_logged: i64,
}

/// Competition ranking over scores already sorted by the repo query
/// (days_achieved descending): ties share a rank, the next distinct score
/// skips past them.
pub fn assign_ranks(scores: Vec<ParticipantScore>) -> Vec<LeaderboardEntry> {
    let mut out = Vec::with_capacity(scores.len());
    let mut last_score: Option<i64> = None;
    let mut rank = 0i64;
    for (i, s) in scores.into_iter().enumerate() {
        if last_score != Some(s.days_achieved) {
            rank = (i as i64) + 1;
            last_score = Some(s.days_achieved);
        }
        out.push(LeaderboardEntry {
            rank,
            user_id: s.user_id,
            username: s.username,
            days_achieved: s.days_achieved,
            days_logged: s.days_logged,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(username: &str, days_achieved: i64) -> ParticipantScore {
        ParticipantScore {
            user_id: Uuid::new_v4(),
            username: username.into(),
            days_achieved,
            days_logged: days_achieved,
        }
    }

    #[test]
    fn distinct_scores_rank_in_order() {
        let ranked = assign_ranks(vec![score("a", 5), score("b", 3), score("c", 1)]);
        let ranks: Vec<i64> = ranked.iter().map(|e| e.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
    }

    #[test]
    fn tied_scores_share_rank_and_skip() {
        let ranked = assign_ranks(vec![score("a", 5), score("b", 5), score("c", 2)]);
        let ranks: Vec<i64> = ranked.iter().map(|e| e.rank).collect();
        assert_eq!(ranks, vec![1, 1, 3]);
    }

    #[test]
    fn empty_board_is_empty() {
        assert!(assign_ranks(Vec::new()).is_empty());
    }
}
