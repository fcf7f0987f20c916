//! In-memory `RemoteSource` for tests.

use std::collections::HashMap;
use std::io::Write;
use std::sync::Mutex;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};

use crate::core::error::{LauncherError, LauncherResult, TransferFailure};
use crate::core::hasher::sha256_bytes;
use crate::core::remote::{ModManifest, RemoteBody, RemoteSource, VersionDescriptor};

const CHUNK: usize = 1024;

#[derive(Debug, Clone)]
pub enum FakeResource {
    Bytes { data: Vec<u8>, announce_len: bool },
    Status(u16),
    /// Delivers `prefix`, then the connection drops.
    DropAfter { prefix: Vec<u8>, total: u64 },
}

#[derive(Default)]
pub struct FakeRemote {
    manifests: Mutex<HashMap<String, Option<ModManifest>>>,
    versions: Mutex<HashMap<String, VersionDescriptor>>,
    resources: Mutex<HashMap<String, FakeResource>>,
    opened: Mutex<Vec<String>>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `mods` for `build`, with manifest digests matching the bytes.
    pub fn with_mods(self, build: &str, mods: &[(&str, &[u8])]) -> Self {
        for (name, data) in mods {
            self.put_mod(build, name, data);
        }
        self
    }

    pub fn put_mod(&self, build: &str, name: &str, data: &[u8]) {
        self.put_manifest_entry(build, name, &sha256_bytes(data));
        self.put_resource(
            &self.mod_url(build, name).unwrap(),
            FakeResource::Bytes {
                data: data.to_vec(),
                announce_len: true,
            },
        );
    }

    pub fn remove_mod(&self, build: &str, name: &str) {
        let mut manifests = self.manifests.lock().unwrap();
        if let Some(Some(manifest)) = manifests.get_mut(build) {
            let mut entries = manifest.entries().clone();
            entries.remove(name);
            *manifest = ModManifest::new(entries);
        }
    }

    pub fn put_manifest_entry(&self, build: &str, name: &str, digest: &str) {
        let mut manifests = self.manifests.lock().unwrap();
        let slot = manifests
            .entry(build.to_string())
            .or_insert_with(|| Some(ModManifest::default()));
        let mut entries = slot.as_ref().map(|m| m.entries().clone()).unwrap_or_default();
        entries.insert(name.to_string(), digest.to_string());
        *slot = Some(ModManifest::new(entries));
    }

    /// An empty but valid manifest.
    pub fn with_empty_manifest(self, build: &str) -> Self {
        self.manifests
            .lock()
            .unwrap()
            .insert(build.to_string(), Some(ModManifest::default()));
        self
    }

    /// Make the manifest endpoint fail.
    pub fn manifest_unavailable(&self, build: &str) {
        self.manifests.lock().unwrap().insert(build.to_string(), None);
    }

    pub fn put_resource(&self, url: &str, resource: FakeResource) {
        self.resources
            .lock()
            .unwrap()
            .insert(url.to_string(), resource);
    }

    pub fn with_version(self, build: &str, id: &str, archive: Vec<u8>) -> Self {
        let descriptor = VersionDescriptor {
            id: id.to_string(),
            archive: format!("{build}-{id}.zip"),
            sha256: Some(sha256_bytes(&archive)),
            size: Some(archive.len() as u64),
        };
        self.put_resource(
            &self.archive_url(&descriptor).unwrap(),
            FakeResource::Bytes {
                data: archive,
                announce_len: true,
            },
        );
        self.versions
            .lock()
            .unwrap()
            .insert(build.to_string(), descriptor);
        self
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }

    pub fn clear_opened(&self) {
        self.opened.lock().unwrap().clear();
    }
}

#[async_trait]
impl RemoteSource for FakeRemote {
    async fn fetch_mod_manifest(&self, build: &str) -> LauncherResult<ModManifest> {
        match self.manifests.lock().unwrap().get(build) {
            Some(Some(manifest)) => Ok(manifest.clone()),
            _ => Err(LauncherError::RemoteUnavailable {
                url: format!("fake://manifest/{build}"),
                reason: "HTTP 503".into(),
            }),
        }
    }

    async fn fetch_version_descriptor(&self, build: &str) -> LauncherResult<VersionDescriptor> {
        self.versions
            .lock()
            .unwrap()
            .get(build)
            .cloned()
            .ok_or_else(|| LauncherError::RemoteUnavailable {
                url: format!("fake://version/{build}"),
                reason: "HTTP 404".into(),
            })
    }

    async fn open(&self, url: &str) -> LauncherResult<RemoteBody> {
        self.opened.lock().unwrap().push(url.to_string());
        let resource = self
            .resources
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or(FakeResource::Status(404));

        match resource {
            FakeResource::Status(code) => Err(LauncherError::TransferFailed {
                url: url.to_string(),
                failure: TransferFailure::Status(code),
            }),
            FakeResource::Bytes { data, announce_len } => {
                let total = announce_len.then_some(data.len() as u64);
                let chunks: Vec<LauncherResult<Vec<u8>>> =
                    data.chunks(CHUNK).map(|c| Ok(c.to_vec())).collect();
                Ok(RemoteBody {
                    total,
                    chunks: stream::iter(chunks).boxed(),
                })
            }
            FakeResource::DropAfter { prefix, total } => {
                let mut chunks: Vec<LauncherResult<Vec<u8>>> =
                    prefix.chunks(CHUNK).map(|c| Ok(c.to_vec())).collect();
                chunks.push(Err(LauncherError::TransferFailed {
                    url: url.to_string(),
                    failure: TransferFailure::Network("connection reset".into()),
                }));
                Ok(RemoteBody {
                    total: Some(total),
                    chunks: stream::iter(chunks).boxed(),
                })
            }
        }
    }

    fn mod_url(&self, build: &str, mod_name: &str) -> LauncherResult<String> {
        Ok(format!("fake://mod/{build}/{mod_name}"))
    }

    fn archive_url(&self, descriptor: &VersionDescriptor) -> LauncherResult<String> {
        Ok(format!("fake://archive/{}", descriptor.archive))
    }
}

/// Build a zip holding `versions/<id>/<id>.json` plus `extra` files.
pub fn version_archive(id: &str, extra: &[(&str, &[u8])]) -> Vec<u8> {
    let mut buf = std::io::Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut buf);
        let options = zip::write::SimpleFileOptions::default();
        writer
            .start_file(format!("versions/{id}/{id}.json"), options)
            .unwrap();
        writer
            .write_all(format!(r#"{{"id": "{id}"}}"#).as_bytes())
            .unwrap();
        for (name, data) in extra {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap();
    }
    buf.into_inner()
}
