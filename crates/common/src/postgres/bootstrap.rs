use anyhow::{Context, Result};
use tokio_postgres::error::SqlState;
use tokio_postgres::NoTls;
use tracing::{info, warn};

/// Creates the target database if it does not exist yet.
///
/// Connects to the administrative `postgres` database, checks `pg_database`,
/// and issues `CREATE DATABASE` when the target is missing. A concurrent
/// creation by another process is tolerated: the duplicate-database error is
/// treated as success.
pub async fn ensure_database(
    host: &str,
    port: u16,
    database: &str,
    username: &str,
    password: &str,
) -> Result<()> {
    let admin_conn_str = format!(
        "host={host} port={port} dbname=postgres user={username} password={password}"
    );
    let (client, connection) = tokio_postgres::connect(&admin_conn_str, NoTls)
        .await
        .context("failed to connect to administrative database")?;

    let conn_task = tokio::spawn(async move {
        if let Err(e) = connection.await {
            warn!(error = %e, "Administrative connection error");
        }
    });

    let exists = client
        .query_opt("SELECT 1 FROM pg_database WHERE datname = $1", &[&database])
        .await
        .context("failed to check database existence")?
        .is_some();

    if !exists {
        // Database names cannot be bound as parameters; the name comes from
        // trusted configuration, not message data.
        let create = format!("CREATE DATABASE \"{}\"", database.replace('"', "\"\""));
        match client.execute(create.as_str(), &[]).await {
            Ok(_) => info!(database = %database, "Created database"),
            Err(e) if e.code() == Some(&SqlState::DUPLICATE_DATABASE) => {
                info!(database = %database, "Database created concurrently");
            }
            Err(e) => return Err(e).context("failed to create database"),
        }
    }

    drop(client);
    let _ = conn_task.await;
    Ok(())
}
