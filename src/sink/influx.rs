//! InfluxDB 1.x HTTP writer

use reqwest::Client;
use tracing::{debug, info};

use super::Point;
use crate::config::SinkConfig;

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("HTTP request to InfluxDB failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("InfluxDB rejected {what} with status {status}: {body}")]
    Rejected {
        what: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },
}

/// Writes points to one InfluxDB database
pub struct InfluxSink {
    client: Client,
    url: String,
    database: String,
    database_ready: bool,
}

impl InfluxSink {
    pub fn new(config: &SinkConfig) -> Self {
        Self {
            client: Client::new(),
            url: config.url.trim_end_matches('/').to_string(),
            database: config.database.clone(),
            database_ready: false,
        }
    }

    /// Create the database if it does not exist. Done once per sink.
    pub async fn ensure_database(&mut self) -> Result<(), SinkError> {
        if self.database_ready {
            return Ok(());
        }

        let query = format!("CREATE DATABASE \"{}\"", self.database);
        let response = self
            .client
            .post(format!("{}/query", self.url))
            .query(&[("q", query.as_str())])
            .send()
            .await?;
        check(response, "CREATE DATABASE").await?;

        info!("InfluxDB database {} ready", self.database);
        self.database_ready = true;
        Ok(())
    }

    /// Write one point with second precision.
    ///
    /// A point without fields is not valid line protocol and is skipped.
    pub async fn write(&mut self, point: &Point) -> Result<(), SinkError> {
        if point.is_empty() {
            debug!("Point has no fields, nothing to write");
            return Ok(());
        }
        self.ensure_database().await?;

        let body = point.to_line_protocol();
        debug!("Writing to InfluxDB: {}", body);

        let response = self
            .client
            .post(format!("{}/write", self.url))
            .query(&[("db", self.database.as_str()), ("precision", "s")])
            .body(body)
            .send()
            .await?;
        check(response, "write").await
    }
}

async fn check(response: reqwest::Response, what: &'static str) -> Result<(), SinkError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(SinkError::Rejected { what, status, body })
}
