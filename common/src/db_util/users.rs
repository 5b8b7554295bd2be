use super::*;

table! {
    users (id) {
        id -> BigInt,
        username -> Varchar,
        created_at -> Timestamptz,
    }
}

#[derive(Queryable, QueryableByName)]
#[diesel(table_name = users)]
struct UserPrivate {
    id: i64,
    username: String,
    created_at: DateTime<Utc>,
}

#[derive(Insertable)]
#[diesel(table_name = users)]
struct UserPrivateNew<'a> {
    username: &'a str,
}

fn private_to_public(p: UserPrivate) -> Result<UserRecord, StoreError> {
    use conversions::*;
    Ok(UserRecord {
        user_id: i64_to_u64(p.id)?,
        username: p.username,
        created_at: p.created_at,
    })
}

/// Create a new user.
/// Usernames are unique regardless of case, enforced by an index on `lower(username)`.
pub fn insert_user(
    conn: &mut PgConnection,
    input_username: &str,
) -> Result<UserRecord, StoreError> {
    use self::users::dsl::*;

    log::info!("Creating user {input_username}");
    let insert_row = UserPrivateNew {
        username: input_username,
    };

    let result: UserPrivate = diesel::insert_into(users)
        .values(&insert_row)
        .get_result(conn)?;
    private_to_public(result)
}

pub fn get_user_by_id(conn: &mut PgConnection, row_id: u64) -> Result<UserRecord, StoreError> {
    use self::users::dsl::*;

    let row_id = conversions::u64_to_i64(row_id)?;

    let result = users.filter(id.eq(row_id)).first::<UserPrivate>(conn)?;
    private_to_public(result)
}

/// Look up a user by username, ignoring case.
pub fn get_user_by_username(
    conn: &mut PgConnection,
    input_username: &str,
) -> Result<UserRecord, StoreError> {
    use diesel::sql_query;
    use diesel::sql_types::Text;

    let query = "SELECT * FROM users WHERE lower(username) = lower($1) LIMIT 1;";

    let mut items: Vec<UserPrivate> = sql_query(query)
        .bind::<Text, _>(input_username)
        .load(conn)?;
    match items.pop() {
        Some(item) => private_to_public(item),
        None => Err(StoreError::NotFound(format!("Username {input_username}"))),
    }
}

/// All users, ordered by username ignoring case.
pub fn get_all_users(conn: &mut PgConnection) -> Result<Vec<UserRecord>, StoreError> {
    use diesel::sql_query;

    let query = "SELECT * FROM users ORDER BY lower(username), username;";

    sql_query(query)
        .load::<UserPrivate>(conn)?
        .into_iter()
        .map(private_to_public)
        .collect()
}

/// Remove a user. Their submissions go with them via `ON DELETE CASCADE`.
pub fn delete_user(conn: &mut PgConnection, row_id: u64) -> Result<(), StoreError> {
    use self::users::dsl::*;

    let row_id = conversions::u64_to_i64(row_id)?;
    match diesel::delete(users.filter(id.eq(row_id))).execute(conn)? {
        0 => Err(StoreError::NotFound(format!("User #{row_id}"))),
        _ => Ok(()),
    }
}
