use sqlx::PgPool;

const MIGRATIONS: &[(&str, &str)] = &[
    (
        "000_migration_tracking.sql",
        include_str!("../../../../migrations/000_migration_tracking.sql"),
    ),
    (
        "001_create_patterns.sql",
        include_str!("../../../../migrations/001_create_patterns.sql"),
    ),
    (
        "002_create_pattern_alerts.sql",
        include_str!("../../../../migrations/002_create_pattern_alerts.sql"),
    ),
    (
        "003_create_auctions.sql",
        include_str!("../../../../migrations/003_create_auctions.sql"),
    ),
];

async fn applied(pool: &PgPool) -> Result<Vec<String>, sqlx::Error> {
    // Bootstrap the tracking table itself before querying it.
    sqlx::raw_sql(MIGRATIONS[0].1).execute(pool).await?;
    sqlx::query_scalar("SELECT filename FROM _migrations")
        .fetch_all(pool)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<Vec<String>, sqlx::Error> {
    let done = applied(pool).await?;
    let mut newly_applied = Vec::new();

    for (filename, sql) in &MIGRATIONS[1..] {
        if done.iter().any(|a| a == filename) {
            continue;
        }
        sqlx::raw_sql(sql).execute(pool).await?;
        sqlx::query("INSERT INTO _migrations (filename) VALUES ($1)")
            .bind(filename)
            .execute(pool)
            .await?;
        newly_applied.push(filename.to_string());
    }

    Ok(newly_applied)
}

pub async fn pending_migrations(pool: &PgPool) -> Result<Vec<String>, sqlx::Error> {
    let done = applied(pool).await?;
    Ok(MIGRATIONS[1..]
        .iter()
        .filter(|(name, _)| !done.iter().any(|a| a == name))
        .map(|(name, _)| name.to_string())
        .collect())
}
