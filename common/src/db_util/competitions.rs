use super::*;

table! {
    competitions (id) {
        id -> BigInt,
        name -> Varchar,
        created_at -> Timestamptz,
    }
}

#[derive(Queryable)]
#[diesel(table_name = competitions)]
struct CompetitionPrivate {
    id: i64,
    name: String,
    created_at: DateTime<Utc>,
}

#[derive(Insertable)]
#[diesel(table_name = competitions)]
struct CompetitionPrivateNew<'a> {
    name: &'a str,
}

fn private_to_public(p: CompetitionPrivate) -> Result<CompetitionRecord, StoreError> {
    Ok(CompetitionRecord {
        competition_id: conversions::i64_to_u64(p.id)?,
        name: p.name,
        created_at: p.created_at,
    })
}

pub fn insert_competition(
    conn: &mut PgConnection,
    input_name: &str,
) -> Result<CompetitionRecord, StoreError> {
    use self::competitions::dsl::*;

    log::info!("Creating competition {input_name}");
    let result: CompetitionPrivate = diesel::insert_into(competitions)
        .values(&CompetitionPrivateNew { name: input_name })
        .get_result(conn)?;
    private_to_public(result)
}

pub fn get_competition_by_id(
    conn: &mut PgConnection,
    row_id: u64,
) -> Result<CompetitionRecord, StoreError> {
    use self::competitions::dsl::*;

    let row_id = conversions::u64_to_i64(row_id)?;

    let result = competitions
        .filter(id.eq(row_id))
        .first::<CompetitionPrivate>(conn)?;
    private_to_public(result)
}

pub fn get_competition_by_name(
    conn: &mut PgConnection,
    input_name: &str,
) -> Result<CompetitionRecord, StoreError> {
    use self::competitions::dsl::*;

    let result = competitions
        .filter(name.eq(input_name))
        .first::<CompetitionPrivate>(conn)?;
    private_to_public(result)
}

/// All competitions, ordered by name.
pub fn get_all_competitions(conn: &mut PgConnection) -> Result<Vec<CompetitionRecord>, StoreError> {
    use self::competitions::dsl::*;

    competitions
        .order(name.asc())
        .load::<CompetitionPrivate>(conn)?
        .into_iter()
        .map(private_to_public)
        .collect()
}
