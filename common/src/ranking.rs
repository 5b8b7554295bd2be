//! Rank users by the sum of their best submission scores.

use crate::store::SubmissionStore;
use crate::{
    DEFAULT_MIN_SUBMISSIONS, DEFAULT_TOP_N, RankedUser, RankingError, UserSubmissionCount,
    compare_usernames,
};
use log::{debug, info, warn};
use std::collections::HashMap;

/// Parameters for a ranking run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankingConfig {
    /// Users need at least this many submissions to be ranked (inclusive).
    pub min_submissions: u32,
    /// At most this many of each user's scores are summed.
    pub top_n: u32,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            min_submissions: DEFAULT_MIN_SUBMISSIONS,
            top_n: DEFAULT_TOP_N,
        }
    }
}

impl RankingConfig {
    /// Build a config from untrusted input.
    ///
    /// # Errors
    /// Returns `InvalidConfiguration` if `min_submissions` is negative or `top_n` is below one.
    pub fn new(min_submissions: i64, top_n: i64) -> Result<Self, RankingError> {
        if min_submissions < 0 {
            return Err(RankingError::InvalidConfiguration(format!(
                "min_submissions must not be negative, got {min_submissions}"
            )));
        }
        if top_n < 1 {
            return Err(RankingError::InvalidConfiguration(format!(
                "top_n must be at least 1, got {top_n}"
            )));
        }
        let min_submissions = u32::try_from(min_submissions).map_err(|_| {
            RankingError::InvalidConfiguration(format!(
                "min_submissions exceeds {}, got {min_submissions}",
                u32::MAX
            ))
        })?;
        let top_n = u32::try_from(top_n).map_err(|_| {
            RankingError::InvalidConfiguration(format!("top_n exceeds {}, got {top_n}", u32::MAX))
        })?;
        Ok(Self {
            min_submissions,
            top_n,
        })
    }
}

/// Computes the leaderboard from a submission store.
#[derive(Debug, Clone, Copy, Default)]
pub struct RankingEngine {
    config: RankingConfig,
}

impl RankingEngine {
    pub fn new(config: RankingConfig) -> Self {
        Self { config }
    }

    /// The parameters this engine ranks with.
    pub fn config(&self) -> RankingConfig {
        self.config
    }

    /// Rank every qualifying user in the store.
    ///
    /// Both reads happen inside one snapshot, so a submission written
    /// mid-run is either fully counted or not at all.
    ///
    /// # Errors
    /// Returns `DataAccess` if the store fails. Nothing is returned in that case.
    pub fn rank<S: SubmissionStore>(
        &self,
        store: &mut S,
    ) -> Result<Vec<RankedUser>, RankingError> {
        let RankingConfig {
            min_submissions,
            top_n,
        } = self.config;
        debug!("Ranking users with min_submissions={min_submissions}, top_n={top_n}");

        let (users, scores) = store
            .with_snapshot(|snapshot| {
                let users = snapshot.qualifying_users(min_submissions)?;
                let user_ids: Vec<u64> = users.iter().map(|u| u.user_id).collect();
                let scores = snapshot.top_submission_scores(&user_ids, top_n)?;
                Ok((users, scores))
            })
            .inspect_err(|err| warn!("Could not read submissions for ranking: {err}"))?;

        let rankings = aggregate_rankings(users, &scores, top_n);
        info!("Ranked {} users", rankings.len());
        Ok(rankings)
    }
}

/// Sum each user's best `top_n` scores, sort, and number the result from 1.
///
/// Equal totals are ordered by username (case-insensitive, then exact) and
/// finally by user id, so every user gets a distinct rank and repeated runs
/// agree. Users missing from `scores_by_user` total zero.
pub fn aggregate_rankings(
    users: Vec<UserSubmissionCount>,
    scores_by_user: &HashMap<u64, Vec<u32>>,
    top_n: u32,
) -> Vec<RankedUser> {
    let mut totals: Vec<(UserSubmissionCount, u64)> = users
        .into_iter()
        .map(|user| {
            let total = scores_by_user
                .get(&user.user_id)
                .map_or(0, |scores| sum_top_scores(scores, top_n));
            (user, total)
        })
        .collect();

    totals.sort_by(|(a, a_total), (b, b_total)| {
        b_total
            .cmp(a_total)
            .then_with(|| compare_usernames(&a.username, &b.username))
            .then_with(|| a.user_id.cmp(&b.user_id))
    });

    totals
        .into_iter()
        .zip(1u32..)
        .map(|((user, total_score), rank)| RankedUser {
            user_id: user.user_id,
            username: user.username,
            total_score,
            rank,
        })
        .collect()
}

/// Sum the `top_n` highest scores. Does not trust the input to be sorted.
fn sum_top_scores(scores: &[u32], top_n: u32) -> u64 {
    let top_n = usize::try_from(top_n).unwrap_or(usize::MAX);
    if scores.len() <= top_n {
        return scores.iter().map(|&s| u64::from(s)).sum();
    }
    let mut sorted = scores.to_vec();
    sorted.sort_unstable_by(|a, b| b.cmp(a));
    sorted.iter().take(top_n).map(|&s| u64::from(s)).sum()
}
