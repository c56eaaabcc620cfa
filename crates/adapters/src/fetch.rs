// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ref fetching: the upstream host's advertised refs, one snapshot per call.

use async_trait::async_trait;
use rw_core::Ref;
use std::time::Duration;
use thiserror::Error;

/// Errors from fetching a ref snapshot. All of them skip the current tick.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {0}")]
    Status(reqwest::StatusCode),

    #[error("malformed snapshot: {0}")]
    Malformed(String),
}

/// Adapter producing ref snapshots on demand.
///
/// One call, one atomic snapshot. The monitor never holds a snapshot across
/// ticks and never issues overlapping calls.
#[async_trait]
pub trait RefFetcher: Clone + Send + Sync + 'static {
    async fn fetch_refs(&self) -> Result<Vec<Ref>, FetchError>;
}

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Ref fetcher backed by the GitHub matching-refs endpoint.
#[derive(Clone)]
pub struct GithubRefFetcher {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
}

impl GithubRefFetcher {
    /// `api_base` is typically `https://api.github.com`; an enterprise host
    /// substitutes its own. `token` is sent as a bearer credential when set.
    pub fn new(
        api_base: &str,
        owner: &str,
        repo: &str,
        token: Option<String>,
    ) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .user_agent("refwatch")
            .build()?;
        let url = format!("{}/repos/{}/{}/git/matching-refs/", api_base.trim_end_matches('/'), owner, repo);
        Ok(Self { client, url, token })
    }
}

#[async_trait]
impl RefFetcher for GithubRefFetcher {
    async fn fetch_refs(&self) -> Result<Vec<Ref>, FetchError> {
        let mut req = self
            .client
            .get(&self.url)
            .header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let resp = req.send().await?;
        if !resp.status().is_success() {
            return Err(FetchError::Status(resp.status()));
        }

        let body = resp.text().await?;
        let refs: Vec<Ref> =
            serde_json::from_str(&body).map_err(|e| FetchError::Malformed(e.to_string()))?;
        tracing::debug!(url = %self.url, n = refs.len(), "fetched refs");
        Ok(refs)
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::{FetchError, RefFetcher};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use rw_core::Ref;
    use std::sync::Arc;
    use tokio::sync::Semaphore;

    struct FakeFetchState {
        refs: Vec<Ref>,
        error: Option<String>,
        calls: u64,
        gate: Option<Arc<Semaphore>>,
    }

    /// In-memory fetcher whose response is swappable between ticks.
    #[derive(Clone)]
    pub struct FakeRefFetcher {
        state: Arc<Mutex<FakeFetchState>>,
    }

    impl FakeRefFetcher {
        pub fn new(refs: Vec<Ref>) -> Self {
            Self {
                state: Arc::new(Mutex::new(FakeFetchState {
                    refs,
                    error: None,
                    calls: 0,
                    gate: None,
                })),
            }
        }

        /// Replace the snapshot returned by subsequent calls.
        pub fn set_refs(&self, refs: Vec<Ref>) {
            let mut state = self.state.lock();
            state.refs = refs;
            state.error = None;
        }

        /// Make subsequent calls fail with a malformed-snapshot error.
        pub fn set_error(&self, error: impl Into<String>) {
            self.state.lock().error = Some(error.into());
        }

        /// Hold subsequent calls open until [`release`](Self::release).
        pub fn hold(&self) {
            self.state.lock().gate = Some(Arc::new(Semaphore::new(0)));
        }

        /// Release the held call and stop holding subsequent ones.
        pub fn release(&self) {
            if let Some(gate) = self.state.lock().gate.take() {
                gate.add_permits(1);
            }
        }

        /// Number of fetch calls issued so far.
        pub fn fetch_count(&self) -> u64 {
            self.state.lock().calls
        }
    }

    #[async_trait]
    impl RefFetcher for FakeRefFetcher {
        async fn fetch_refs(&self) -> Result<Vec<Ref>, FetchError> {
            let gate = {
                let mut state = self.state.lock();
                state.calls += 1;
                state.gate.clone()
            };
            if let Some(gate) = gate {
                let permit = gate.acquire_owned().await.map_err(|_| {
                    FetchError::Malformed("fetch gate closed".to_string())
                })?;
                permit.forget();
            }
            let state = self.state.lock();
            match &state.error {
                Some(e) => Err(FetchError::Malformed(e.clone())),
                None => Ok(state.refs.clone()),
            }
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeRefFetcher;

#[cfg(test)]
#[path = "fetch_tests.rs"]
mod tests;
