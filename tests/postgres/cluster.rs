//! Database server lifecycle for `PostgreSQL` integration tests.
//!
//! Tests run against a shared embedded cluster started through
//! `pg-embed-setup-unpriv`. Each test gets its own database cloned from a
//! template that already carries the schema. Setting
//! [`TEST_DATABASE_URL_VAR`] points the tests at an existing server instead.

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use pg_embedded_setup_unpriv::test_support::shared_test_cluster;
use pg_embedded_setup_unpriv::{ExecutionPrivileges, TestCluster, detect_execution_privileges};
use std::env;
use std::sync::OnceLock;
use taskdeck::task::adapters::postgres::SCHEMA_SQL;
use uuid::Uuid;

/// Boxed error type returned by test helpers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Environment variable naming an external server to test against.
pub const TEST_DATABASE_URL_VAR: &str = "TASKDECK_TEST_DATABASE_URL";

/// Template database holding the applied schema.
pub const TEMPLATE_DB: &str = "taskdeck_test_template";

const WORKER_VAR: &str = "PG_EMBEDDED_WORKER";

static WORKER_CONFIGURED: OnceLock<()> = OnceLock::new();

/// Server that hosts per-test databases.
#[derive(Clone, Copy)]
pub enum DatabaseServer {
    /// Shared embedded cluster.
    Embedded(&'static TestCluster),
    /// External server reachable through an administrative URL.
    External(&'static str),
}

impl DatabaseServer {
    /// Resolves the server for this test run.
    ///
    /// Starts the embedded cluster on first use unless
    /// [`TEST_DATABASE_URL_VAR`] is set.
    #[must_use]
    pub fn resolve() -> Self {
        static EXTERNAL: OnceLock<Option<String>> = OnceLock::new();
        let external = EXTERNAL.get_or_init(|| {
            env::var(TEST_DATABASE_URL_VAR)
                .ok()
                .filter(|url| !url.trim().is_empty())
        });
        external.as_deref().map_or_else(
            || {
                configure_worker();
                Self::Embedded(outside_runtime(shared_test_cluster))
            },
            Self::External,
        )
    }

    fn database_url(self, name: &str) -> Result<String, BoxError> {
        match self {
            Self::Embedded(cluster) => Ok(cluster.connection().database_url(name)),
            Self::External(admin_url) => admin_url
                .rsplit_once('/')
                .map(|(server, _)| format!("{server}/{name}"))
                .ok_or_else(|| format!("database URL has no path: {admin_url}").into()),
        }
    }

    fn admin_url(self) -> Result<String, BoxError> {
        match self {
            Self::Embedded(cluster) => Ok(cluster.connection().database_url("postgres")),
            Self::External(admin_url) => Ok(admin_url.to_owned()),
        }
    }

    /// Creates a fresh database carrying the task schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the template or the database cannot be created.
    pub fn temporary_database(self) -> Result<TemporaryDatabase, BoxError> {
        let name = format!("taskdeck_test_{}", Uuid::new_v4().simple());
        outside_runtime(|| match self {
            Self::Embedded(cluster) => {
                ensure_template(cluster)?;
                cluster
                    .create_database_from_template(name.as_str(), TEMPLATE_DB)
                    .map_err(|err| Box::new(err) as BoxError)
            }
            Self::External(admin_url) => {
                let mut admin = PgConnection::establish(admin_url)?;
                admin.batch_execute(&format!("CREATE DATABASE {}", quote_identifier(&name)))?;
                let mut connection = PgConnection::establish(&self.database_url(&name)?)?;
                connection.batch_execute(SCHEMA_SQL)?;
                Ok(())
            }
        })?;
        Ok(TemporaryDatabase {
            url: self.database_url(&name)?,
            admin_url: self.admin_url()?,
            name,
        })
    }
}

/// Database created for a single test and dropped with it.
pub struct TemporaryDatabase {
    admin_url: String,
    name: String,
    url: String,
}

impl TemporaryDatabase {
    /// Returns the connection URL of the database.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Drop for TemporaryDatabase {
    fn drop(&mut self) {
        let sql = format!(
            "DROP DATABASE IF EXISTS {} WITH (FORCE)",
            quote_identifier(&self.name)
        );
        if let Ok(mut admin) = PgConnection::establish(&self.admin_url) {
            drop(admin.batch_execute(&sql));
        }
    }
}

fn ensure_template(cluster: &TestCluster) -> Result<(), BoxError> {
    cluster
        .ensure_template_exists(TEMPLATE_DB, |db_name| {
            let url = cluster.connection().database_url(db_name);
            let mut conn = PgConnection::establish(&url).map_err(|e| eyre::eyre!("{e}"))?;
            conn.batch_execute(SCHEMA_SQL)
                .map_err(|e| eyre::eyre!("schema setup failed: {e}"))?;
            Ok(())
        })
        .map_err(|err| Box::new(err) as BoxError)
}

/// Points a root-run cluster at this package's `pg_worker` binary.
fn configure_worker() {
    WORKER_CONFIGURED.get_or_init(|| {
        let needs_worker = matches!(detect_execution_privileges(), ExecutionPrivileges::Root);
        if needs_worker && env::var_os(WORKER_VAR).is_none() {
            // SAFETY: runs once, before the cluster bootstrap reads the
            // environment.
            unsafe {
                env::set_var(WORKER_VAR, env!("CARGO_BIN_EXE_pg_worker"));
            }
        }
    });
}

/// Runs blocking setup code, stepping out of the test's runtime if needed.
fn outside_runtime<T>(f: impl FnOnce() -> T) -> T {
    if tokio::runtime::Handle::try_current().is_ok() {
        tokio::task::block_in_place(f)
    } else {
        f()
    }
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
