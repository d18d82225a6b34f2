//! HTTP download of runtime archives.
//!
//! Response bodies are exposed as streams so large archives never have to be
//! buffered in memory.

use crate::packager::{
    Error, Result,
    cache::{ArchiveSource, ArchiveStream},
};
use futures_lite::StreamExt;
use tokio_util::io::StreamReader;

/// Fetches archives over HTTP(S) with `reqwest`.
#[derive(Clone, Debug, Default)]
pub struct HttpArchiveSource {
    client: reqwest::Client,
}

impl HttpArchiveSource {
    /// Creates a source with a default client.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ArchiveSource for HttpArchiveSource {
    async fn open(&self, url: &str) -> Result<ArchiveStream> {
        log::info!("Downloading {}", url);

        let user_agent = format!("kodegen-bundler-sea/{}", env!("CARGO_PKG_VERSION"));
        let response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, user_agent)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Fetch {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        if response.content_length() == Some(0) {
            return Err(Error::MissingBody {
                url: url.to_string(),
            });
        }

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(std::io::Error::other));
        Ok(Box::pin(StreamReader::new(body)))
    }
}
