use sqlx::PgPool;

const MIGRATIONS: &[(&str, &str)] = &[
    (
        "000_migration_tracking.sql",
        include_str!("../../../../migrations/000_migration_tracking.sql"),
    ),
    (
        "001_create_alerts.sql",
        include_str!("../../../../migrations/001_create_alerts.sql"),
    ),
    (
        "002_create_alert_configurations.sql",
        include_str!("../../../../migrations/002_create_alert_configurations.sql"),
    ),
    (
        "003_create_notification_deliveries.sql",
        include_str!("../../../../migrations/003_create_notification_deliveries.sql"),
    ),
    (
        "004_index_pending_deliveries.sql",
        include_str!("../../../../migrations/004_index_pending_deliveries.sql"),
    ),
];

async fn applied(pool: &PgPool) -> Result<Vec<String>, sqlx::Error> {
    sqlx::raw_sql(MIGRATIONS[0].1).execute(pool).await?;
    sqlx::query_scalar("SELECT filename FROM _migrations")
        .fetch_all(pool)
        .await
}

/// Applies every migration not yet recorded, in file order.
pub async fn run_migrations(pool: &PgPool) -> Result<Vec<String>, sqlx::Error> {
    let applied = applied(pool).await?;
    let mut newly_applied = Vec::new();

    for (filename, sql) in &MIGRATIONS[1..] {
        if applied.iter().any(|a| a == filename) {
            continue;
        }
        let mut tx = pool.begin().await?;
        sqlx::raw_sql(sql).execute(&mut *tx).await?;
        sqlx::query("INSERT INTO _migrations (filename) VALUES ($1)")
            .bind(filename)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        tracing::info!(migration = filename, "migration applied");
        newly_applied.push(filename.to_string());
    }

    Ok(newly_applied)
}

pub async fn pending_migrations(pool: &PgPool) -> Result<Vec<String>, sqlx::Error> {
    let applied = applied(pool).await?;
    Ok(MIGRATIONS[1..]
        .iter()
        .filter(|(name, _)| !applied.iter().any(|a| a == name))
        .map(|(name, _)| name.to_string())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::MIGRATIONS;

    #[test]
    fn migrations_are_ordered_and_unique() {
        let names: Vec<&str> = MIGRATIONS.iter().map(|(n, _)| *n).collect();
        let mut sorted = names.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(names, sorted);
    }

    #[test]
    fn every_table_is_created() {
        let all: String = MIGRATIONS.iter().map(|(_, sql)| *sql).collect();
        for table in ["alerts", "alert_configurations", "notification_deliveries"] {
            assert!(all.contains(&format!("CREATE TABLE IF NOT EXISTS {table}")));
        }
    }
}
