// ─── Remote documents ───
// The mod manifest and the version descriptor served per build.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Authoritative mapping of mod file name to expected SHA-256 (lowercase hex).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModManifest {
    entries: BTreeMap<String, String>,
}

impl ModManifest {
    pub fn new(entries: BTreeMap<String, String>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|(name, digest)| (name, normalize_digest(&digest)))
                .collect(),
        }
    }

    /// Parse the `{ "name.jar": "hex", ... }` body served by the remote.
    ///
    /// Anything other than an object of strings keyed by plain file names is
    /// rejected as a whole: a partially understood manifest must not drive
    /// deletions.
    pub fn parse(body: &str) -> Result<Self, String> {
        let value: serde_json::Value =
            serde_json::from_str(body).map_err(|e| format!("manifest is not JSON: {e}"))?;
        let object = value
            .as_object()
            .ok_or_else(|| "manifest is not a JSON object".to_string())?;

        let mut entries = BTreeMap::new();
        for (name, digest) in object {
            if !is_plain_file_name(name) {
                return Err(format!("manifest names an unsafe file: {name:?}"));
            }
            let digest = digest
                .as_str()
                .ok_or_else(|| format!("digest for {name} is not a string"))?;
            entries.insert(name.clone(), normalize_digest(digest));
        }
        Ok(Self { entries })
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, digest)| (name.as_str(), digest.as_str()))
    }

    pub fn entries(&self) -> &BTreeMap<String, String> {
        &self.entries
    }
}

/// Which runtime version a build needs and where its archive lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionDescriptor {
    pub id: String,
    /// Resource name under `/archive/`, or an absolute http(s) URL.
    pub archive: String,
    #[serde(default)]
    pub sha256: Option<String>,
    /// Archive length, used for progress when the server omits `Content-Length`.
    #[serde(default)]
    pub size: Option<u64>,
}

impl VersionDescriptor {
    pub fn archive_is_absolute(&self) -> bool {
        self.archive.starts_with("http://") || self.archive.starts_with("https://")
    }
}

fn normalize_digest(digest: &str) -> String {
    digest.trim().to_ascii_lowercase()
}

/// A single path component that stays inside the directory it is joined to.
pub fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
        && !name.contains(':')
}
