//! Redirect target normalization and liveness check.

use reqwest::redirect::Policy;
use shortpath_common::UrlError;
use std::time::Duration;
use tokio::time::timeout;
use url::Url;

/// Checks that a submitted target is reachable before it gets stored
pub struct UrlChecker {
    client: reqwest::Client,
    /// Hostname of this service; targets pointing back at it would loop
    public_host: String,
    timeout: Duration,
}

fn has_scheme(raw: &str) -> bool {
    ["http://", "https://"].iter().any(|scheme| {
        raw.get(..scheme.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
    })
}

/// Prepend `http://` when no scheme was given
pub fn normalize(raw: &str) -> String {
    let raw = raw.trim();
    if has_scheme(raw) {
        raw.to_string()
    } else {
        format!("http://{raw}")
    }
}

impl UrlChecker {
    pub fn new(public_host: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        // Redirects are reported, never followed
        let client = reqwest::Client::builder().redirect(Policy::none()).build()?;

        Ok(Self {
            client,
            public_host: public_host.trim().to_ascii_lowercase(),
            timeout,
        })
    }

    /// Normalize `raw` and make sure it answers with a 2xx in time.
    ///
    /// Returns the normalized URL. There is no retry: a transient failure is
    /// reported to the submitter like any other.
    pub async fn verify(&self, raw: &str) -> Result<String, UrlError> {
        let candidate = normalize(raw);

        let parsed = Url::parse(&candidate).map_err(|_| UrlError::InvalidLink)?;
        let host = parsed
            .host_str()
            .ok_or(UrlError::InvalidLink)?
            .to_ascii_lowercase();

        if !self.public_host.is_empty() && host.contains(&self.public_host) {
            tracing::debug!(url = %candidate, "Refusing link back to this service");
            return Err(UrlError::InvalidLink);
        }

        let response = timeout(self.timeout, self.client.get(parsed).send())
            .await
            .map_err(|_| UrlError::UrlTimeout)?
            .map_err(|e| {
                if e.is_timeout() {
                    UrlError::UrlTimeout
                } else {
                    UrlError::Unreachable(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_redirection() {
            return Err(UrlError::UrlRedirects);
        }
        if !status.is_success() {
            return Err(UrlError::UrlStatusCode(status.as_u16()));
        }

        Ok(candidate)
    }
}
