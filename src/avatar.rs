use std::time::Duration;

use bytes::Bytes;
use md5::{Digest, Md5};
use thiserror::Error;

use crate::ui::prelude::*;

pub const AVATAR_HOST: &str = "https://seccdn.libravatar.org";
pub const AVATAR_SIZE: u32 = 512;

// The avatar CDN can stall; cap the request rather than block the boot unit
// forever. The unit's restart policy covers transient failures.
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("avatar host returned HTTP status {0}")]
    Status(u16),
    #[error("avatar request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Hex MD5 of the trimmed, lowercased email address — the key Libravatar
/// serves avatars under.
pub fn email_hash(email: &str) -> String {
    let normalized = email.trim().to_lowercase();
    format!("{:x}", Md5::digest(normalized.as_bytes()))
}

/// Resource path for an email address, requesting a 512px rendition.
pub fn avatar_path(email: &str) -> String {
    format!("/avatar/{}?s={}", email_hash(email), AVATAR_SIZE)
}

/// Downloads avatars from a Libravatar-compatible host.
pub struct AvatarFetcher {
    base_url: String,
}

impl AvatarFetcher {
    pub fn new() -> Self {
        Self::with_base_url(AVATAR_HOST)
    }

    /// Point the fetcher at a different host (used by tests).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    /// Fetch the avatar registered for `email`, returning the raw image
    /// bytes. Any status other than 200 is a failure; there are no retries.
    pub fn fetch(&self, email: &str) -> Result<Bytes, FetchError> {
        let url = format!("{}{}", self.base_url, avatar_path(email));
        emit(
            Level::Debug,
            "avatar.fetch.url",
            &format!("Downloading from {}", url),
            None,
        );

        let client = reqwest::blocking::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()?;

        let response = client.get(&url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        Ok(response.bytes()?)
    }
}

impl Default for AvatarFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_email_hash_known_value() {
        assert_eq!(
            email_hash("test@example.com"),
            "55502f40dc8b7c769880b10874abc9d0"
        );
    }

    #[test]
    fn test_email_hash_normalizes() {
        let canonical = email_hash("alice@example.com");
        assert_eq!(canonical, "c160f8cc69a4f0bf2b0362752353d060");
        assert_eq!(email_hash(" Alice@Example.com "), canonical);
        assert_eq!(email_hash("ALICE@EXAMPLE.COM\n"), canonical);
    }

    #[test]
    fn test_avatar_path() {
        assert_eq!(
            avatar_path("test@example.com"),
            "/avatar/55502f40dc8b7c769880b10874abc9d0?s=512"
        );
    }

    #[test]
    fn test_fetch_returns_body_on_200() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let server = rt.block_on(async {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/avatar/c160f8cc69a4f0bf2b0362752353d060"))
                .and(query_param("s", "512"))
                .respond_with(ResponseTemplate::new(200).set_body_bytes(b"PNGDATA".to_vec()))
                .mount(&server)
                .await;
            server
        });

        let fetcher = AvatarFetcher::with_base_url(server.uri());
        let body = fetcher.fetch(" Alice@Example.com ").unwrap();
        assert_eq!(&body[..], b"PNGDATA");
    }

    #[test]
    fn test_fetch_fails_on_non_200() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let server = rt.block_on(async {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(404).set_body_bytes(b"not found".to_vec()))
                .mount(&server)
                .await;
            server
        });

        let fetcher = AvatarFetcher::with_base_url(server.uri());
        match fetcher.fetch("test@example.com") {
            Err(FetchError::Status(404)) => {}
            other => panic!(
                "expected FetchError::Status(404), got {:?}",
                other.map(|b| b.len())
            ),
        }
    }
}
