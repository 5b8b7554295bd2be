use super::*;

table! {
    submissions (id) {
        id -> BigInt,
        competition_id -> BigInt,
        user_id -> BigInt,
        name -> Varchar,
        score -> Integer,
        created_at -> Timestamptz,
    }
}

#[derive(Queryable)]
#[diesel(table_name = submissions)]
struct SubmissionPrivate {
    id: i64,
    competition_id: i64,
    user_id: i64,
    name: String,
    score: i32,
    created_at: DateTime<Utc>,
}

#[derive(Insertable)]
#[diesel(table_name = submissions)]
struct SubmissionPrivateNew<'a> {
    competition_id: i64,
    user_id: i64,
    name: &'a str,
    score: i32,
}

fn private_to_public(p: SubmissionPrivate) -> Result<SubmissionRecord, StoreError> {
    use conversions::*;
    Ok(SubmissionRecord {
        submission_id: i64_to_u64(p.id)?,
        user_id: i64_to_u64(p.user_id)?,
        competition_id: i64_to_u64(p.competition_id)?,
        name: p.name,
        score: i32_to_u32(p.score)?,
        created_at: p.created_at,
    })
}

fn build_new_row(
    input_user_id: u64,
    input_competition_id: u64,
    input_name: &str,
    input_score: u32,
) -> Result<SubmissionPrivateNew<'_>, StoreError> {
    use conversions::*;
    let input_score = crate::validate_score(input_score)?;
    Ok(SubmissionPrivateNew {
        competition_id: u64_to_i64(input_competition_id)?,
        user_id: u64_to_i64(input_user_id)?,
        name: input_name,
        score: u32_to_i32(input_score)?,
    })
}

/// Push a new scored submission to the database.
/// Names are unique per competition, enforced by the table.
pub fn insert_submission(
    conn: &mut PgConnection,
    input_user_id: u64,
    input_competition_id: u64,
    input_name: &str,
    input_score: u32,
) -> Result<SubmissionRecord, StoreError> {
    use self::submissions::dsl::*;

    log::info!("Creating submission {input_name}");
    let insert_row = build_new_row(input_user_id, input_competition_id, input_name, input_score)?;

    let result: SubmissionPrivate = diesel::insert_into(submissions)
        .values(&insert_row)
        .get_result(conn)?;
    private_to_public(result)
}

pub fn get_submission_by_id(
    conn: &mut PgConnection,
    row_id: u64,
) -> Result<SubmissionRecord, StoreError> {
    use self::submissions::dsl::*;

    let row_id = conversions::u64_to_i64(row_id)?;

    let result = submissions
        .filter(id.eq(row_id))
        .first::<SubmissionPrivate>(conn)?;
    private_to_public(result)
}

/// All submissions by one user, lowest score first.
pub fn get_submissions_for_user(
    conn: &mut PgConnection,
    input_user_id: u64,
) -> Result<Vec<SubmissionRecord>, StoreError> {
    use self::submissions::dsl::*;

    let input_user_id = conversions::u64_to_i64(input_user_id)?;

    submissions
        .filter(user_id.eq(input_user_id))
        .order((score.asc(), id.asc()))
        .load::<SubmissionPrivate>(conn)?
        .into_iter()
        .map(private_to_public)
        .collect()
}

pub fn count_submissions_for_user(
    conn: &mut PgConnection,
    input_user_id: u64,
) -> Result<u64, StoreError> {
    use self::submissions::dsl::*;

    let input_user_id = conversions::u64_to_i64(input_user_id)?;
    let count: i64 = submissions
        .filter(user_id.eq(input_user_id))
        .count()
        .get_result(conn)?;
    conversions::i64_to_u64(count)
}
