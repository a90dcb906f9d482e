use sqlx::PgPool;

/// Full bootstrap test: connect, migrate, verify lookup seeds.
#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires a PostgreSQL DATABASE_URL"]
async fn test_full_bootstrap(pool: PgPool) {
    crawlq_db::health_check(&pool).await.unwrap();

    for (table, expected) in [("project_statuses", 2_i64), ("task_statuses", 4)] {
        let count: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&pool)
            .await
            .unwrap_or_else(|e| panic!("{table} query failed: {e}"));
        assert_eq!(count.0, expected, "{table} seed rows");
    }
}

/// Lookup ids must agree with the status enums in crawlq-core.
#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires a PostgreSQL DATABASE_URL"]
async fn test_task_status_seeds_match_enum(pool: PgPool) {
    use crawlq_core::status::TaskStatus;

    let rows: Vec<(i16, String)> = sqlx::query_as("SELECT id, name FROM task_statuses ORDER BY id")
        .fetch_all(&pool)
        .await
        .unwrap();

    for (id, name) in rows {
        let status = TaskStatus::from_id(id).unwrap_or_else(|| panic!("unknown id {id}"));
        assert_eq!(status.as_str(), name);
    }
}
