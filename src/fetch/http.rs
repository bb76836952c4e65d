//! Blocking HTTP fetcher.
//!
//! No timeout or retry policy is applied here: a hung transfer blocks the
//! caller, and any failure aborts the population that requested it.

use std::path::Path;

use reqwest::blocking::Client;
use tracing::{debug, info};

use super::{place_atomically, Fetcher};
use crate::{Error, Result};

/// Downloads raw files over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Fetcher with a default client.
    ///
    /// # Errors
    /// Returns error if the TLS backend cannot be initialised
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("snist/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Other(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Fetcher using a caller-configured client.
    #[must_use]
    pub const fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str, destination: &Path) -> Result<()> {
        if destination.exists() {
            debug!(url, path = %destination.display(), "already present, skipping");
            return Ok(());
        }

        info!(url, "downloading");
        let bytes = self
            .client
            .get(url)
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .and_then(reqwest::blocking::Response::bytes)
            .map_err(|e| Error::fetch(url, e))?;

        place_atomically(url, destination, &bytes)?;
        debug!(url, path = %destination.display(), bytes = bytes.len(), "downloaded");
        Ok(())
    }
}
