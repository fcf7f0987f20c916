use async_trait::async_trait;
use futures_util::stream::{BoxStream, StreamExt};
use reqwest::{Client, Url};
use tracing::{debug, info};

use crate::core::error::{LauncherError, LauncherResult, TransferFailure};

use super::manifest::{ModManifest, VersionDescriptor};

/// An open response body.
pub struct RemoteBody {
    /// Announced length, when the transport provided one.
    pub total: Option<u64>,
    pub chunks: BoxStream<'static, LauncherResult<Vec<u8>>>,
}

impl std::fmt::Debug for RemoteBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteBody")
            .field("total", &self.total)
            .finish_non_exhaustive()
    }
}

/// The server that defines builds.
///
/// Each call is a single request; retry policy belongs to the caller.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    async fn fetch_mod_manifest(&self, build: &str) -> LauncherResult<ModManifest>;

    async fn fetch_version_descriptor(&self, build: &str) -> LauncherResult<VersionDescriptor>;

    /// Start streaming a resource. Non-2xx answers fail with `TransferFailed`.
    async fn open(&self, url: &str) -> LauncherResult<RemoteBody>;

    fn mod_url(&self, build: &str, mod_name: &str) -> LauncherResult<String>;

    fn archive_url(&self, descriptor: &VersionDescriptor) -> LauncherResult<String>;
}

/// `RemoteSource` over the launcher HTTP API.
pub struct HttpRemote {
    client: Client,
    base: Url,
}

impl HttpRemote {
    pub fn new(client: Client, base_url: &str) -> LauncherResult<Self> {
        let base = Url::parse(base_url)
            .map_err(|e| LauncherError::Config(format!("api_base_url {base_url:?}: {e}")))?;
        if base.cannot_be_a_base() || !matches!(base.scheme(), "http" | "https") {
            return Err(LauncherError::Config(format!(
                "api_base_url {base_url:?} is not an http(s) URL"
            )));
        }
        Ok(Self { client, base })
    }

    /// `{base}/seg1/seg2/...`, each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> LauncherResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| LauncherError::Config(format!("{} cannot take a path", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_document(&self, url: Url) -> LauncherResult<String> {
        let unavailable = |reason: String| LauncherError::RemoteUnavailable {
            url: url.to_string(),
            reason,
        };

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(unavailable(format!("HTTP {}", status.as_u16())));
        }

        response.text().await.map_err(|e| unavailable(e.to_string()))
    }
}

#[async_trait]
impl RemoteSource for HttpRemote {
    async fn fetch_mod_manifest(&self, build: &str) -> LauncherResult<ModManifest> {
        let url = self.endpoint(&["manifest", build])?;
        info!("Fetching mod manifest for {} from {}", build, url);

        let body = self.get_document(url.clone()).await?;
        let manifest = ModManifest::parse(&body).map_err(|reason| {
            LauncherError::RemoteUnavailable {
                url: url.to_string(),
                reason,
            }
        })?;

        info!("Manifest for {} lists {} mods", build, manifest.len());
        Ok(manifest)
    }

    async fn fetch_version_descriptor(&self, build: &str) -> LauncherResult<VersionDescriptor> {
        let url = self.endpoint(&["version", build])?;
        info!("Fetching version descriptor for {} from {}", build, url);

        let body = self.get_document(url.clone()).await?;
        serde_json::from_str(&body).map_err(|e| LauncherError::RemoteUnavailable {
            url: url.to_string(),
            reason: format!("bad version descriptor: {e}"),
        })
    }

    async fn open(&self, url: &str) -> LauncherResult<RemoteBody> {
        let network = |e: reqwest::Error| LauncherError::TransferFailed {
            url: url.to_string(),
            failure: TransferFailure::Network(e.to_string()),
        };

        let response = self.client.get(url).send().await.map_err(network)?;

        let status = response.status();
        if !status.is_success() {
            return Err(LauncherError::TransferFailed {
                url: url.to_string(),
                failure: TransferFailure::Status(status.as_u16()),
            });
        }

        let total = response.content_length().filter(|len| *len > 0);
        debug!("Opened {} (Content-Length: {:?})", url, total);

        let owned_url = url.to_string();
        let chunks = response
            .bytes_stream()
            .map(move |chunk| {
                chunk
                    .map(|bytes| bytes.to_vec())
                    .map_err(|e| LauncherError::TransferFailed {
                        url: owned_url.clone(),
                        failure: TransferFailure::Network(e.to_string()),
                    })
            })
            .boxed();

        Ok(RemoteBody { total, chunks })
    }

    fn mod_url(&self, build: &str, mod_name: &str) -> LauncherResult<String> {
        Ok(self.endpoint(&["mod", build, mod_name])?.to_string())
    }

    fn archive_url(&self, descriptor: &VersionDescriptor) -> LauncherResult<String> {
        if descriptor.archive_is_absolute() {
            return Ok(descriptor.archive.clone());
        }
        Ok(self.endpoint(&["archive", &descriptor.archive])?.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn remote(base: &str) -> HttpRemote {
        let client = crate::core::http::build_http_client(Duration::from_secs(5)).unwrap();
        HttpRemote::new(client, base).unwrap()
    }

    #[test]
    fn endpoints_follow_route_layout() {
        let remote = remote("https://yummy.example/launcher/");
        assert_eq!(
            remote.endpoint(&["manifest", "survival"]).unwrap().as_str(),
            "https://yummy.example/launcher/manifest/survival"
        );
        assert_eq!(
            remote.mod_url("survival", "sodium 0.5.jar").unwrap(),
            "https://yummy.example/launcher/mod/survival/sodium%200.5.jar"
        );
    }

    #[test]
    fn archive_url_resolution() {
        let remote = remote("https://yummy.example");
        let mut descriptor = VersionDescriptor {
            id: "1.20.1".into(),
            archive: "base_fabric.zip".into(),
            sha256: None,
            size: None,
        };
        assert_eq!(
            remote.archive_url(&descriptor).unwrap(),
            "https://yummy.example/archive/base_fabric.zip"
        );

        descriptor.archive = "https://cdn.example/base.zip".into();
        assert_eq!(
            remote.archive_url(&descriptor).unwrap(),
            "https://cdn.example/base.zip"
        );
    }

    #[test]
    fn rejects_non_http_base() {
        let client = crate::core::http::build_http_client(Duration::from_secs(5)).unwrap();
        assert!(matches!(
            HttpRemote::new(client.clone(), "ftp://host"),
            Err(LauncherError::Config(_))
        ));
        assert!(HttpRemote::new(client, "not a url").is_err());
    }
}
