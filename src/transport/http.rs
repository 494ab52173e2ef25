//! HTTP transport on reqwest.
//!
//! One GET per request, spawned on the bridge runtime. Whether the server
//! answered is all that matters here: any response is reported with its
//! status and whatever body arrived, a missing response is a failure.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use bytes::Bytes;
use reqwest::Client;
use tokio::runtime::Handle as RuntimeHandle;
use tracing::{debug, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::protocol::HttpCompletion;

use super::{HttpCompleter, HttpTransport};

// ============================================================================
// Constants
// ============================================================================

/// Largest body a C host can be told the length of.
pub const MAX_BODY_LEN: usize = i32::MAX as usize;

// ============================================================================
// ReqwestTransport
// ============================================================================

/// [`HttpTransport`] backed by reqwest.
///
/// Redirects, pooling and TLS follow reqwest's defaults.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
    runtime: RuntimeHandle,
}

impl fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReqwestTransport").finish_non_exhaustive()
    }
}

impl ReqwestTransport {
    /// Creates a transport with a default client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`](crate::Error::Http) if the TLS backend cannot
    /// be initialized.
    pub fn new(runtime: RuntimeHandle, user_agent: Option<&str>) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(user_agent) = user_agent {
            builder = builder.user_agent(user_agent);
        }

        Ok(Self::with_client(builder.build()?, runtime))
    }

    /// Creates a transport around an existing client.
    #[inline]
    #[must_use]
    pub fn with_client(client: Client, runtime: RuntimeHandle) -> Self {
        Self { client, runtime }
    }
}

impl HttpTransport for ReqwestTransport {
    fn request(&self, url: &Url, completer: HttpCompleter) {
        let client = self.client.clone();
        let url = url.clone();

        self.runtime.spawn(async move {
            let request = completer.request();
            debug!(%request, url = %url, "Executing HTTP request");

            let completion = fetch(&client, url).await;
            if let HttpCompletion::Response { status, body } = &completion {
                debug!(%request, status, bytes = body.len(), "HTTP response received");
            }
            completer.complete(completion);
        });
    }
}

async fn fetch(client: &Client, url: Url) -> HttpCompletion {
    let response = match client.get(url).send().await {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, timeout = e.is_timeout(), connect = e.is_connect(), "HTTP request failed");
            return HttpCompletion::Failed {
                message: Error::from(e).to_string(),
            };
        }
    };

    let status = response.status().as_u16();

    if let Some(declared) = response.content_length()
        && declared > MAX_BODY_LEN as u64
    {
        warn!(status, declared, "HTTP body too large");
        return too_large(status);
    }

    // A response arrived; a broken body still counts as one.
    let body = match response.bytes().await {
        Ok(body) => body,
        Err(e) => {
            warn!(status, error = %e, "HTTP body read failed");
            Bytes::new()
        }
    };

    if body.len() > MAX_BODY_LEN {
        warn!(status, bytes = body.len(), "HTTP body too large");
        return too_large(status);
    }

    HttpCompletion::Response { status, body }
}

fn too_large(status: u16) -> HttpCompletion {
    HttpCompletion::Failed {
        message: format!("response body exceeds {MAX_BODY_LEN} bytes (status {status})"),
    }
}

// ============================================================================
// Tests
// ============================================================================
