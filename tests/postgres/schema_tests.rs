//! `PostgreSQL` integration tests for schema bootstrap and stored payloads.

use diesel::connection::SimpleConnection;
use rstest::rstest;
use taskdeck::task::{adapters::postgres::initialise_schema, ports::TaskRepository};

use crate::postgres::helpers::{BoxError, PostgresContext, context, timestamp};

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn postgres_schema_initialisation_is_idempotent(
    context: Result<PostgresContext, BoxError>,
) -> Result<(), BoxError> {
    let ctx = context?;
    initialise_schema(&ctx.pool)?;
    initialise_schema(&ctx.pool)?;
    assert!(ctx.service.list().await?.is_empty());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn postgres_check_constraints_reject_invalid_rows(
    context: Result<PostgresContext, BoxError>,
) -> Result<(), BoxError> {
    let ctx = context?;
    let mut connection = ctx.pool.get()?;

    let empty_title = connection.batch_execute(
        "INSERT INTO tasks (title, created_at, updated_at, last_request_ts) \
         VALUES ('', NOW(), NOW(), NOW())",
    );
    assert!(empty_title.is_err());

    let create_with_target = connection.batch_execute(
        "INSERT INTO deferred_ops (task_id, op_type, payload, execute_at, request_ts, created_at) \
         VALUES (1, 'create', '{}', NOW(), NOW(), NOW())",
    );
    assert!(create_with_target.is_err());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn postgres_purges_undecodable_deferred_rows(
    context: Result<PostgresContext, BoxError>,
) -> Result<(), BoxError> {
    let ctx = context?;
    {
        let mut connection = ctx.pool.get()?;
        connection.batch_execute(
            "INSERT INTO deferred_ops (task_id, op_type, payload, execute_at, request_ts, created_at) \
             VALUES (NULL, 'create', '{\"bogus\": true}', \
                     '2025-09-25T19:00:00Z', '2025-09-25T19:00:00Z', '2025-09-25T18:00:00Z')",
        )?;
    }

    let due = ctx
        .repository
        .due_operations(timestamp("2025-09-25T20:00:00Z")?)
        .await?;
    assert!(due.is_empty());
    assert!(ctx.repository.pending_operations().await?.is_empty());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn postgres_users_table_allows_missing_email_and_unique_usernames(
    context: Result<PostgresContext, BoxError>,
) -> Result<(), BoxError> {
    let ctx = context?;
    let mut connection = ctx.pool.get()?;

    connection.batch_execute(
        "INSERT INTO users (username, email, password_hash) VALUES ('ada', NULL, 'x')",
    )?;
    let duplicate = connection.batch_execute(
        "INSERT INTO users (username, email, password_hash) VALUES ('ada', 'ada@example.com', 'y')",
    );
    assert!(duplicate.is_err());

    let long_name = "n".repeat(255);
    connection.batch_execute(&format!(
        "INSERT INTO users (username, password_hash) VALUES ('{long_name}', 'z')"
    ))?;
    Ok(())
}
