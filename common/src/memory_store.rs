//! An in-memory submission store with copy-on-write snapshots.
//!
//! Readers take a reference to the current dataset and never block writers.
//! Writers modify a copy and swap it in, so a running ranking never sees a
//! half-applied write.

use crate::store::{SubmissionSnapshot, SubmissionStore};
use crate::{
    CompetitionRecord, StoreError, SubmissionRecord, UserRecord, UserSubmissionCount,
    compare_usernames, usernames_match, validate_score,
};
use chrono::Utc;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

/// Every record held by a [`MemoryStore`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub users: Vec<UserRecord>,
    #[serde(default)]
    pub competitions: Vec<CompetitionRecord>,
    #[serde(default)]
    pub submissions: Vec<SubmissionRecord>,
}

impl Dataset {
    /// Check the uniqueness, range, and reference rules a store enforces on insert.
    ///
    /// # Errors
    /// Returns the first rule violation found.
    pub fn validate(&self) -> Result<(), StoreError> {
        let mut user_ids = HashSet::new();
        let mut usernames = HashSet::new();
        for user in &self.users {
            if !user_ids.insert(user.user_id) {
                return Err(StoreError::Duplicate(format!("User #{}", user.user_id)));
            }
            if !usernames.insert(user.username.to_lowercase()) {
                return Err(StoreError::Duplicate(format!("Username {}", user.username)));
            }
        }

        let mut competition_ids = HashSet::new();
        let mut competition_names = HashSet::new();
        for competition in &self.competitions {
            if !competition_ids.insert(competition.competition_id) {
                return Err(StoreError::Duplicate(format!(
                    "Competition #{}",
                    competition.competition_id
                )));
            }
            if !competition_names.insert(competition.name.as_str()) {
                return Err(StoreError::Duplicate(format!(
                    "Competition {}",
                    competition.name
                )));
            }
        }

        let mut submission_ids = HashSet::new();
        let mut submission_names = HashSet::new();
        for sub in &self.submissions {
            if !submission_ids.insert(sub.submission_id) {
                return Err(StoreError::Duplicate(format!(
                    "Submission #{}",
                    sub.submission_id
                )));
            }
            if !submission_names.insert((sub.competition_id, sub.name.as_str())) {
                return Err(StoreError::Duplicate(format!(
                    "Submission {} in competition #{}",
                    sub.name, sub.competition_id
                )));
            }
            if !user_ids.contains(&sub.user_id) {
                return Err(StoreError::NotFound(format!(
                    "User #{} for submission #{}",
                    sub.user_id, sub.submission_id
                )));
            }
            if !competition_ids.contains(&sub.competition_id) {
                return Err(StoreError::NotFound(format!(
                    "Competition #{} for submission #{}",
                    sub.competition_id, sub.submission_id
                )));
            }
            validate_score(sub.score)?;
        }
        Ok(())
    }
}

/// A cloneable handle to a shared in-memory dataset.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    data: Arc<RwLock<Arc<Dataset>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing dataset after validating it.
    ///
    /// # Errors
    /// Returns an error if the dataset breaks any store rule.
    pub fn from_dataset(dataset: Dataset) -> Result<Self, StoreError> {
        dataset.validate()?;
        Ok(Self {
            data: Arc::new(RwLock::new(Arc::new(dataset))),
        })
    }

    /// Parse and validate a JSON encoded [`Dataset`].
    ///
    /// # Errors
    /// Returns a validation error if the JSON is malformed, or any store rule violation.
    pub fn from_json_str(json: &str) -> Result<Self, StoreError> {
        let dataset: Dataset =
            serde_json::from_str(json).map_err(|e| StoreError::Validation(e.to_string()))?;
        Self::from_dataset(dataset)
    }

    /// The current state of the store. Later writes do not affect it.
    ///
    /// # Errors
    /// Returns `Unavailable` if a writer panicked while holding the lock.
    pub fn dataset(&self) -> Result<Arc<Dataset>, StoreError> {
        let guard = self
            .data
            .read()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(Arc::clone(&guard))
    }

    fn write<T>(
        &self,
        f: impl FnOnce(&mut Dataset) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut guard = self
            .data
            .write()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        // Work on a copy so a failed write leaves nothing behind.
        let mut draft = Dataset::clone(&guard);
        let result = f(&mut draft)?;
        *guard = Arc::new(draft);
        Ok(result)
    }

    /// Create a new user. Usernames are unique regardless of case.
    ///
    /// # Errors
    /// Returns `Validation` for a blank username and `Duplicate` if it is taken.
    pub fn create_user(&self, username: &str) -> Result<UserRecord, StoreError> {
        log::info!("Creating user {username}");
        if username.trim().is_empty() {
            return Err(StoreError::Validation(
                "Username must not be blank".to_string(),
            ));
        }
        self.write(|data| {
            if data.users.iter().any(|u| usernames_match(&u.username, username)) {
                return Err(StoreError::Duplicate(format!("Username {username}")));
            }
            let user = UserRecord {
                user_id: next_id("User", data.users.iter().map(|u| u.user_id))?,
                username: username.to_string(),
                created_at: Utc::now(),
            };
            data.users.push(user.clone());
            Ok(user)
        })
    }

    /// # Errors
    /// Returns `NotFound` if no user has this id.
    pub fn get_user(&self, user_id: u64) -> Result<UserRecord, StoreError> {
        log::debug!("Getting user #{user_id}");
        self.dataset()?
            .users
            .iter()
            .find(|u| u.user_id == user_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("User #{user_id}")))
    }

    /// Look up a user by username, ignoring case.
    ///
    /// # Errors
    /// Returns `NotFound` if no user has this username.
    pub fn get_user_by_username(&self, username: &str) -> Result<UserRecord, StoreError> {
        log::debug!("Getting user {username}");
        self.dataset()?
            .users
            .iter()
            .find(|u| usernames_match(&u.username, username))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("Username {username}")))
    }

    /// # Errors
    /// Returns any error raised while creating the user.
    pub fn get_or_create_user_by_username(
        &self,
        username: &str,
    ) -> Result<UserRecord, StoreError> {
        match self.get_user_by_username(username) {
            Err(StoreError::NotFound(_)) => self.create_user(username),
            other => other,
        }
    }

    /// All users, ordered by username ignoring case.
    ///
    /// # Errors
    /// Returns `Unavailable` if the store lock is poisoned.
    pub fn get_users(&self) -> Result<Vec<UserRecord>, StoreError> {
        Ok(self
            .dataset()?
            .users
            .iter()
            .sorted_by(|a, b| compare_usernames(&a.username, &b.username))
            .cloned()
            .collect())
    }

    /// Remove a user along with all of their submissions.
    ///
    /// # Errors
    /// Returns `NotFound` if no user has this id.
    pub fn delete_user(&self, user_id: u64) -> Result<(), StoreError> {
        log::info!("Deleting user #{user_id}");
        self.write(|data| {
            let before = data.users.len();
            data.users.retain(|u| u.user_id != user_id);
            if data.users.len() == before {
                return Err(StoreError::NotFound(format!("User #{user_id}")));
            }
            data.submissions.retain(|s| s.user_id != user_id);
            Ok(())
        })
    }

    /// # Errors
    /// Returns `Validation` for a blank name and `Duplicate` if it is taken.
    pub fn create_competition(&self, name: &str) -> Result<CompetitionRecord, StoreError> {
        log::info!("Creating competition {name}");
        if name.trim().is_empty() {
            return Err(StoreError::Validation(
                "Competition name must not be blank".to_string(),
            ));
        }
        self.write(|data| {
            if data.competitions.iter().any(|c| c.name == name) {
                return Err(StoreError::Duplicate(format!("Competition {name}")));
            }
            let competition = CompetitionRecord {
                competition_id: next_id(
                    "Competition",
                    data.competitions.iter().map(|c| c.competition_id),
                )?,
                name: name.to_string(),
                created_at: Utc::now(),
            };
            data.competitions.push(competition.clone());
            Ok(competition)
        })
    }

    /// # Errors
    /// Returns `NotFound` if no competition has this name.
    pub fn get_competition_by_name(&self, name: &str) -> Result<CompetitionRecord, StoreError> {
        self.dataset()?
            .competitions
            .iter()
            .find(|c| c.name == name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("Competition {name}")))
    }

    /// # Errors
    /// Returns `NotFound` if no competition has this id.
    pub fn get_competition(&self, competition_id: u64) -> Result<CompetitionRecord, StoreError> {
        log::debug!("Getting competition #{competition_id}");
        self.dataset()?
            .competitions
            .iter()
            .find(|c| c.competition_id == competition_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("Competition #{competition_id}")))
    }

    /// # Errors
    /// Returns any error raised while creating the competition.
    pub fn get_or_create_competition(&self, name: &str) -> Result<CompetitionRecord, StoreError> {
        match self.get_competition_by_name(name) {
            Err(StoreError::NotFound(_)) => self.create_competition(name),
            other => other,
        }
    }

    /// All competitions, ordered by name.
    ///
    /// # Errors
    /// Returns `Unavailable` if the store lock is poisoned.
    pub fn get_competitions(&self) -> Result<Vec<CompetitionRecord>, StoreError> {
        Ok(self
            .dataset()?
            .competitions
            .iter()
            .sorted_by(|a, b| a.name.cmp(&b.name))
            .cloned()
            .collect())
    }

    /// Remove a competition along with every submission made to it.
    ///
    /// # Errors
    /// Returns `NotFound` if no competition has this id.
    pub fn delete_competition(&self, competition_id: u64) -> Result<(), StoreError> {
        log::info!("Deleting competition #{competition_id}");
        self.write(|data| {
            let before = data.competitions.len();
            data.competitions.retain(|c| c.competition_id != competition_id);
            if data.competitions.len() == before {
                return Err(StoreError::NotFound(format!("Competition #{competition_id}")));
            }
            data.submissions.retain(|s| s.competition_id != competition_id);
            Ok(())
        })
    }

    /// Record a scored submission.
    ///
    /// # Errors
    /// Returns `Validation` for an out of range score, `NotFound` if the user or
    /// competition does not exist, and `Duplicate` if the competition already has
    /// a submission with this name.
    pub fn create_submission(
        &self,
        user_id: u64,
        competition_id: u64,
        name: &str,
        score: u32,
    ) -> Result<SubmissionRecord, StoreError> {
        log::info!("Creating submission {name}");
        let score = validate_score(score)?;
        self.write(|data| {
            if !data.users.iter().any(|u| u.user_id == user_id) {
                return Err(StoreError::NotFound(format!("User #{user_id}")));
            }
            if !data
                .competitions
                .iter()
                .any(|c| c.competition_id == competition_id)
            {
                return Err(StoreError::NotFound(format!("Competition #{competition_id}")));
            }
            if data
                .submissions
                .iter()
                .any(|s| s.competition_id == competition_id && s.name == name)
            {
                return Err(StoreError::Duplicate(format!(
                    "Submission {name} in competition #{competition_id}"
                )));
            }
            let submission = SubmissionRecord {
                submission_id: next_id(
                    "Submission",
                    data.submissions.iter().map(|s| s.submission_id),
                )?,
                user_id,
                competition_id,
                name: name.to_string(),
                score,
                created_at: Utc::now(),
            };
            data.submissions.push(submission.clone());
            Ok(submission)
        })
    }

    /// All submissions, lowest score first.
    ///
    /// # Errors
    /// Returns `Unavailable` if the store lock is poisoned.
    pub fn get_submissions(&self) -> Result<Vec<SubmissionRecord>, StoreError> {
        Ok(self
            .dataset()?
            .submissions
            .iter()
            .sorted_by_key(|s| (s.score, s.submission_id))
            .cloned()
            .collect())
    }

    /// # Errors
    /// Returns `NotFound` if no submission has this id.
    pub fn get_submission(&self, submission_id: u64) -> Result<SubmissionRecord, StoreError> {
        log::debug!("Getting submission #{submission_id}");
        self.dataset()?
            .submissions
            .iter()
            .find(|s| s.submission_id == submission_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("Submission #{submission_id}")))
    }

    /// # Errors
    /// Returns `Unavailable` if the store lock is poisoned.
    pub fn get_submissions_for_user(
        &self,
        user_id: u64,
    ) -> Result<Vec<SubmissionRecord>, StoreError> {
        Ok(self
            .dataset()?
            .submissions
            .iter()
            .filter(|s| s.user_id == user_id)
            .sorted_by_key(|s| (s.score, s.submission_id))
            .cloned()
            .collect())
    }
}

/// One past the highest id in use.
fn next_id(kind: &str, ids: impl Iterator<Item = u64>) -> Result<u64, StoreError> {
    match ids.max() {
        None => Ok(1),
        Some(max) => max
            .checked_add(1)
            .ok_or_else(|| StoreError::Validation(format!("{kind} ids are exhausted"))),
    }
}

/// A frozen view of one [`Dataset`].
struct DatasetView {
    data: Arc<Dataset>,
}

impl SubmissionSnapshot for DatasetView {
    fn qualifying_users(
        &mut self,
        min_submissions: u32,
    ) -> Result<Vec<UserSubmissionCount>, StoreError> {
        let counts = self.data.submissions.iter().counts_by(|s| s.user_id);
        Ok(self
            .data
            .users
            .iter()
            .map(|u| UserSubmissionCount {
                user_id: u.user_id,
                username: u.username.clone(),
                submission_count: counts.get(&u.user_id).copied().unwrap_or(0) as u64,
            })
            .filter(|u| u.submission_count >= u64::from(min_submissions))
            .collect())
    }

    fn count_submissions(&mut self, user_id: u64) -> Result<u64, StoreError> {
        Ok(self
            .data
            .submissions
            .iter()
            .filter(|s| s.user_id == user_id)
            .count() as u64)
    }

    fn top_submission_scores(
        &mut self,
        user_ids: &[u64],
        limit: u32,
    ) -> Result<HashMap<u64, Vec<u32>>, StoreError> {
        let wanted: HashSet<u64> = user_ids.iter().copied().collect();
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        let mut top: HashMap<u64, Vec<u32>> = HashMap::new();
        for (user_id, group) in &self
            .data
            .submissions
            .iter()
            .filter(|s| wanted.contains(&s.user_id))
            .sorted_by(|a, b| {
                a.user_id
                    .cmp(&b.user_id)
                    .then_with(|| b.score.cmp(&a.score))
                    .then_with(|| a.submission_id.cmp(&b.submission_id))
            })
            .chunk_by(|s| s.user_id)
        {
            top.insert(user_id, group.take(limit).map(|s| s.score).collect());
        }
        Ok(top)
    }
}

impl SubmissionStore for MemoryStore {
    fn with_snapshot<T, F>(&mut self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut dyn SubmissionSnapshot) -> Result<T, StoreError>,
    {
        let mut view = DatasetView {
            data: self.dataset()?,
        };
        f(&mut view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RankingEngine;

    fn create_test_store() -> (MemoryStore, UserRecord, CompetitionRecord) {
        let store = MemoryStore::new();
        let user = store.create_user("Jane.Doe").unwrap();
        let competition = store.create_competition("Portraits").unwrap();
        (store, user, competition)
    }

    #[test_log::test]
    fn test_usernames_are_case_insensitive() {
        let (store, user, _) = create_test_store();

        assert_eq!(store.get_user_by_username("jane.doe").unwrap(), user);
        assert!(matches!(
            store.create_user("JANE.DOE"),
            Err(StoreError::Duplicate(_))
        ));
        assert!(matches!(
            store.get_user_by_username("ghljj"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test_log::test]
    fn test_get_or_create_user() {
        let (store, user, _) = create_test_store();

        assert_eq!(store.get_or_create_user_by_username("jane.doe").unwrap(), user);
        let created = store.get_or_create_user_by_username("john.smith").unwrap();
        assert_ne!(created.user_id, user.user_id);
        assert_eq!(store.get_users().unwrap().len(), 2);
    }

    #[test_log::test]
    fn test_get_users_ordered_by_username() {
        let store = MemoryStore::new();
        for name in ["mike", "Zoe", "alice", "Bob"] {
            store.create_user(name).unwrap();
        }
        let names: Vec<String> = store
            .get_users()
            .unwrap()
            .into_iter()
            .map(|u| u.username)
            .collect();
        assert_eq!(names, vec!["alice", "Bob", "mike", "Zoe"]);
    }

    #[test_log::test]
    fn test_get_competition_and_submission_by_id() {
        let (store, user, competition) = create_test_store();
        let submission = store
            .create_submission(user.user_id, competition.competition_id, "Sunrise", 500)
            .unwrap();

        assert_eq!(
            store.get_competition(competition.competition_id).unwrap(),
            competition
        );
        assert_eq!(
            store.get_submission(submission.submission_id).unwrap(),
            submission
        );
        assert!(matches!(
            store.get_competition(999),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.get_submission(999),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test_log::test]
    fn test_create_fails_cleanly_when_ids_are_exhausted() {
        let dataset = Dataset {
            users: vec![UserRecord {
                user_id: u64::MAX,
                username: "last".to_string(),
                created_at: Utc::now(),
            }],
            ..Dataset::default()
        };
        let mut store = MemoryStore::from_dataset(dataset).unwrap();

        assert!(matches!(
            store.create_user("next"),
            Err(StoreError::Validation(_))
        ));
        // the failed write must leave the store usable
        assert_eq!(store.get_users().unwrap().len(), 1);
        let rankings = RankingEngine::new(crate::RankingConfig::new(0, 24).unwrap())
            .rank(&mut store)
            .unwrap();
        assert_eq!(rankings.len(), 1);
    }

    #[test_log::test]
    fn test_get_user_not_found() {
        let (store, _, _) = create_test_store();
        assert!(matches!(store.get_user(999), Err(StoreError::NotFound(_))));
    }

    #[test_log::test]
    fn test_submission_rules() {
        let (store, user, competition) = create_test_store();

        store
            .create_submission(user.user_id, competition.competition_id, "Sunrise", 500)
            .unwrap();
        assert!(matches!(
            store.create_submission(user.user_id, competition.competition_id, "Sunrise", 700),
            Err(StoreError::Duplicate(_))
        ));
        assert!(matches!(
            store.create_submission(user.user_id, competition.competition_id, "Dusk", 99),
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(
            store.create_submission(user.user_id, competition.competition_id, "Dusk", 10001),
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(
            store.create_submission(42, competition.competition_id, "Dusk", 500),
            Err(StoreError::NotFound(_))
        ));

        // the same name is fine in another competition
        let other = store.get_or_create_competition("Landscapes").unwrap();
        store
            .create_submission(user.user_id, other.competition_id, "Sunrise", 700)
            .unwrap();

        let scores: Vec<u32> = store
            .get_submissions()
            .unwrap()
            .iter()
            .map(|s| s.score)
            .collect();
        assert_eq!(scores, vec![500, 700]);
    }

    #[test_log::test]
    fn test_delete_cascades_to_submissions() {
        let (store, user, competition) = create_test_store();
        let other_user = store.create_user("john.smith").unwrap();
        let other_competition = store.create_competition("Landscapes").unwrap();
        store
            .create_submission(user.user_id, competition.competition_id, "A", 500)
            .unwrap();
        store
            .create_submission(other_user.user_id, competition.competition_id, "B", 500)
            .unwrap();
        store
            .create_submission(other_user.user_id, other_competition.competition_id, "C", 500)
            .unwrap();

        store.delete_user(user.user_id).unwrap();
        assert_eq!(store.get_submissions().unwrap().len(), 2);

        store.delete_competition(competition.competition_id).unwrap();
        let remaining = store.get_submissions().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].name, "C");

        assert!(matches!(
            store.delete_user(user.user_id),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test_log::test]
    fn test_top_scores_are_capped_and_descending() {
        let (mut store, user, competition) = create_test_store();
        for (i, score) in [300, 900, 100, 700].iter().enumerate() {
            store
                .create_submission(user.user_id, competition.competition_id, &i.to_string(), *score)
                .unwrap();
        }

        let (count, top) = store
            .with_snapshot(|snapshot| {
                let count = snapshot.count_submissions(user.user_id)?;
                let top = snapshot.top_submission_scores(&[user.user_id], 3)?;
                Ok((count, top))
            })
            .unwrap();

        assert_eq!(count, 4);
        assert_eq!(top[&user.user_id], vec![900, 700, 300]);
    }

    #[test_log::test]
    fn test_snapshot_ignores_concurrent_writes() {
        let (mut store, user, competition) = create_test_store();
        let writer = store.clone();

        let (before, after) = store
            .with_snapshot(|snapshot| {
                let before = snapshot.count_submissions(user.user_id)?;
                writer.create_submission(user.user_id, competition.competition_id, "Late", 500)?;
                let after = snapshot.count_submissions(user.user_id)?;
                Ok((before, after))
            })
            .unwrap();

        assert_eq!((before, after), (0, 0));
        assert_eq!(store.get_submissions_for_user(user.user_id).unwrap().len(), 1);
    }

    #[test_log::test]
    fn test_concurrent_rankings_agree() {
        let (store, user, competition) = create_test_store();
        for i in 0..5 {
            store
                .create_submission(user.user_id, competition.competition_id, &i.to_string(), 1000)
                .unwrap();
        }

        let results: Vec<_> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let mut store = store.clone();
                    scope.spawn(move || RankingEngine::default().rank(&mut store).unwrap())
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        for rankings in &results {
            assert_eq!(rankings, &results[0]);
            assert_eq!(rankings[0].total_score, 5000);
        }
    }

    #[test_log::test]
    fn test_from_json_validates() {
        let json = r#"{
            "users": [
                {"user_id": 1, "username": "jane", "created_at": "2024-01-01T00:00:00Z"}
            ],
            "competitions": [
                {"competition_id": 1, "name": "Portraits", "created_at": "2024-01-01T00:00:00Z"}
            ],
            "submissions": [
                {"submission_id": 1, "user_id": 1, "competition_id": 1, "name": "A",
                 "score": 50, "created_at": "2024-01-01T00:00:00Z"}
            ]
        }"#;
        assert!(matches!(
            MemoryStore::from_json_str(json),
            Err(StoreError::Validation(_))
        ));

        let fixed = json.replace("\"score\": 50", "\"score\": 500");
        let store = MemoryStore::from_json_str(&fixed).unwrap();
        assert_eq!(store.get_submissions().unwrap()[0].score, 500);
        assert!(MemoryStore::from_json_str("not json").is_err());
    }

    #[test_log::test]
    fn test_validate_rejects_usernames_differing_only_in_case() {
        let user = |user_id: u64, username: &str| UserRecord {
            user_id,
            username: username.to_string(),
            created_at: Utc::now(),
        };
        let dataset = Dataset {
            users: vec![user(1, "Jane.Doe"), user(2, "jane.doe")],
            ..Dataset::default()
        };

        assert!(matches!(dataset.validate(), Err(StoreError::Duplicate(_))));
        assert!(matches!(
            MemoryStore::from_dataset(dataset),
            Err(StoreError::Duplicate(_))
        ));
    }
}
