//! Interfaces between the application code and database.

use crate::{CompetitionRecord, StoreError, SubmissionRecord, UserRecord};
use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use std::env;

mod competitions;
mod conversions;
mod rankings;
mod submissions;
mod users;

pub use competitions::{
    get_all_competitions, get_competition_by_id, get_competition_by_name, insert_competition,
};
pub use submissions::{
    count_submissions_for_user, get_submission_by_id, get_submissions_for_user, insert_submission,
};
pub use users::{delete_user, get_all_users, get_user_by_id, get_user_by_username, insert_user};

pub type PgPool = Pool<ConnectionManager<PgConnection>>;
pub type PgPooledConnection = PooledConnection<ConnectionManager<PgConnection>>;

fn get_database_url() -> Result<String, StoreError> {
    dotenvy::dotenv().ok();
    env::var("DATABASE_URL")
        .map_err(|_| StoreError::Unavailable("DATABASE_URL must be set".to_string()))
}

/// Open a single connection to the database at `DATABASE_URL`.
///
/// # Errors
/// Returns `Unavailable` if the variable is missing or the database cannot be reached.
pub fn get_database_connection() -> Result<PgConnection, StoreError> {
    let url = get_database_url()?;
    log::debug!("Connecting to the database");
    Ok(PgConnection::establish(&url)?)
}

/// Build a connection pool for the database at `DATABASE_URL`.
/// Each ranking run should take its own connection from the pool.
///
/// # Errors
/// Returns `Unavailable` if the variable is missing or the pool cannot connect.
pub fn get_database_pool() -> Result<PgPool, StoreError> {
    let url = get_database_url()?;
    let manager = ConnectionManager::<PgConnection>::new(url);
    Ok(Pool::builder().build(manager)?)
}

/// # Errors
/// Returns `Unavailable` if no connection could be checked out in time.
pub fn get_pooled_database_connection(pool: &PgPool) -> Result<PgPooledConnection, StoreError> {
    Ok(pool.get()?)
}
