//! The data access seam the ranking engine reads through.

use crate::{StoreError, UserSubmissionCount};
use std::collections::HashMap;

/// A consistent point-in-time view of users and their submissions.
pub trait SubmissionSnapshot {
    /// Every user with at least `min_submissions` submissions.
    /// With a threshold of zero this includes users who never submitted.
    fn qualifying_users(
        &mut self,
        min_submissions: u32,
    ) -> Result<Vec<UserSubmissionCount>, StoreError>;

    /// How many submissions a user has made. Unknown users have none.
    fn count_submissions(&mut self, user_id: u64) -> Result<u64, StoreError>;

    /// The best `limit` scores for each requested user, highest first.
    /// Ties at the cutoff are broken by submission id, lowest first.
    /// Users without submissions may be missing from the map.
    fn top_submission_scores(
        &mut self,
        user_ids: &[u64],
        limit: u32,
    ) -> Result<HashMap<u64, Vec<u32>>, StoreError>;
}

/// Something that can hand out snapshots of submission data.
pub trait SubmissionStore {
    /// Run `f` against a single snapshot. Writes committed while `f` runs
    /// are not visible to it.
    ///
    /// # Errors
    /// Returns any error raised while opening the snapshot or by `f`.
    fn with_snapshot<T, F>(&mut self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut dyn SubmissionSnapshot) -> Result<T, StoreError>;
}
