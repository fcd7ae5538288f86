//! Database connection handling
//!
//! There is no pool: every request opens its own connection through
//! [`Database::open`] and hands it back with [`ScopedConnection::close`].

pub mod queries;

use crate::config::{DatabaseConfig, SslMode};
use crate::error::AppError;
use serde::Serialize;
use std::future::Future;
use std::time::Instant;
use tokio::task::JoinHandle;
use tokio_postgres::{Client, NoTls};
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::{debug, warn};

/// Connection factory for the patient database
#[derive(Clone)]
pub struct Database {
    config: DatabaseConfig,
    tls: Option<MakeRustlsConnect>,
}

impl Database {
    pub fn new(config: DatabaseConfig) -> Self {
        let tls = match config.ssl_mode {
            SslMode::Require => Some(rustls_connector()),
            SslMode::Disable => None,
        };
        Self { config, tls }
    }

    /// `user@host:port/db` of the configured database
    pub fn target(&self) -> String {
        self.config.target()
    }

    fn pg_config(&self) -> tokio_postgres::Config {
        let mut pg = tokio_postgres::Config::new();
        pg.host(&self.config.host)
            .port(self.config.port)
            .user(&self.config.user)
            .password(&self.config.password)
            .dbname(&self.config.database)
            .connect_timeout(self.config.connect_timeout())
            .application_name(env!("CARGO_PKG_NAME"));
        if self.tls.is_some() {
            pg.ssl_mode(tokio_postgres::config::SslMode::Require);
        }
        pg
    }

    /// Open a fresh connection. The caller owns it until `close`.
    pub async fn open(&self) -> Result<ScopedConnection, AppError> {
        let pg = self.pg_config();
        let connect_error = |e: tokio_postgres::Error| {
            AppError::Connection(format!("Failed to connect to {}: {}", self.target(), e))
        };

        let (client, driver) = match &self.tls {
            Some(tls) => {
                let (client, connection) = pg.connect(tls.clone()).await.map_err(connect_error)?;
                (client, spawn_driver(connection))
            }
            None => {
                let (client, connection) = pg.connect(NoTls).await.map_err(connect_error)?;
                (client, spawn_driver(connection))
            }
        };

        debug!("Opened connection to {}", self.target());
        Ok(ScopedConnection { client, driver })
    }

    /// Open a connection, ask for the server version, close it again
    pub async fn ping(&self) -> Result<ConnectionCheck, AppError> {
        let start = Instant::now();
        let conn = self.open().await?;

        let version = conn
            .client()
            .query_one(queries::SERVER_VERSION, &[])
            .await
            .map_err(AppError::query(queries::SERVER_VERSION_NAME))
            .and_then(|row| {
                row.try_get::<_, String>(0)
                    .map_err(|e| AppError::Serialization(e.to_string()))
            });
        conn.close().await;

        Ok(ConnectionCheck {
            success: true,
            latency_ms: start.elapsed().as_millis() as u64,
            server_version: version?,
            database: self.config.database.clone(),
            host: self.config.host.clone(),
        })
    }
}

/// A single live connection, closed on every path by its owner
pub struct ScopedConnection {
    client: Client,
    driver: JoinHandle<()>,
}

impl ScopedConnection {
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Drop the client and wait for the connection task to send Terminate
    pub async fn close(self) {
        let ScopedConnection { client, driver } = self;
        drop(client);
        if let Err(e) = driver.await {
            warn!("Connection task ended abnormally: {}", e);
        }
        debug!("Connection closed");
    }
}

/// Result of a readiness check
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionCheck {
    pub success: bool,
    pub latency_ms: u64,
    pub server_version: String,
    pub database: String,
    pub host: String,
}

fn spawn_driver<F>(connection: F) -> JoinHandle<()>
where
    F: Future<Output = Result<(), tokio_postgres::Error>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            warn!("Database connection error: {}", e);
        }
    })
}

fn rustls_connector() -> MakeRustlsConnect {
    let certs = rustls_native_certs::load_native_certs();
    for e in &certs.errors {
        warn!("Failed to load a native root certificate: {}", e);
    }

    let mut root_store = rustls::RootCertStore::empty();
    let (added, ignored) = root_store.add_parsable_certificates(certs.certs);
    debug!("Loaded {} native root certificates ({} ignored)", added, ignored);

    let tls_config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    MakeRustlsConnect::new(tls_config)
}
