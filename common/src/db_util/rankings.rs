//! Ranking reads against the database.

use super::*;
use crate::UserSubmissionCount;
use crate::store::{SubmissionSnapshot, SubmissionStore};
use diesel::sql_query;
use diesel::sql_types::{Array, BigInt, Integer, Text};
use std::collections::HashMap;

#[derive(Debug, QueryableByName)]
struct UserCountRow {
    #[diesel(sql_type = BigInt)]
    id: i64,
    #[diesel(sql_type = Text)]
    username: String,
    #[diesel(sql_type = BigInt)]
    submission_count: i64,
}

#[derive(Debug, QueryableByName)]
struct TopScoreRow {
    #[diesel(sql_type = BigInt)]
    user_id: i64,
    #[diesel(sql_type = Integer)]
    score: i32,
}

impl SubmissionSnapshot for PgConnection {
    fn qualifying_users(
        &mut self,
        min_submissions: u32,
    ) -> Result<Vec<UserSubmissionCount>, StoreError> {
        let query = "SELECT u.id, u.username, COUNT(s.id) AS submission_count
            FROM users u
            LEFT JOIN submissions s ON s.user_id = u.id
            GROUP BY u.id, u.username
            HAVING COUNT(s.id) >= $1;";

        let rows: Vec<UserCountRow> = sql_query(query)
            .bind::<BigInt, _>(conversions::u32_to_i64(min_submissions))
            .load(self)?;

        rows.into_iter()
            .map(|row| {
                Ok(UserSubmissionCount {
                    user_id: conversions::i64_to_u64(row.id)?,
                    username: row.username,
                    submission_count: conversions::i64_to_u64(row.submission_count)?,
                })
            })
            .collect()
    }

    fn count_submissions(&mut self, user_id: u64) -> Result<u64, StoreError> {
        count_submissions_for_user(self, user_id)
    }

    fn top_submission_scores(
        &mut self,
        user_ids: &[u64],
        limit: u32,
    ) -> Result<HashMap<u64, Vec<u32>>, StoreError> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let user_ids = user_ids
            .iter()
            .map(|&i| conversions::u64_to_i64(i))
            .collect::<Result<Vec<i64>, StoreError>>()?;

        // Rows come back grouped by user, best first.
        let query = "SELECT ranked.user_id, ranked.score
            FROM (
                SELECT s.user_id, s.score,
                    ROW_NUMBER() OVER (PARTITION BY s.user_id ORDER BY s.score DESC, s.id ASC) AS position
                FROM submissions s
                WHERE s.user_id = ANY($1)
            ) ranked
            WHERE ranked.position <= $2
            ORDER BY ranked.user_id, ranked.position;";

        let rows: Vec<TopScoreRow> = sql_query(query)
            .bind::<Array<BigInt>, _>(user_ids)
            .bind::<BigInt, _>(conversions::u32_to_i64(limit))
            .load(self)?;

        let mut top: HashMap<u64, Vec<u32>> = HashMap::new();
        for row in rows {
            top.entry(conversions::i64_to_u64(row.user_id)?)
                .or_default()
                .push(conversions::i32_to_u32(row.score)?);
        }
        Ok(top)
    }
}

impl SubmissionStore for PgConnection {
    /// Each snapshot is a read-only `REPEATABLE READ` transaction, so both
    /// ranking queries see the same committed data and never block writers.
    fn with_snapshot<T, F>(&mut self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut dyn SubmissionSnapshot) -> Result<T, StoreError>,
    {
        self.build_transaction()
            .read_only()
            .repeatable_read()
            .run(|conn| f(conn))
    }
}

impl SubmissionStore for PgPool {
    /// Concurrent callers each check out their own connection.
    fn with_snapshot<T, F>(&mut self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut dyn SubmissionSnapshot) -> Result<T, StoreError>,
    {
        let mut conn = get_pooled_database_connection(self)?;
        SubmissionStore::with_snapshot(&mut *conn, f)
    }
}
