// ============================================================
// Layer 6 — Kaggle Dataset Download
// ============================================================
// Makes a public Kaggle dataset available locally, then copies
// it into the project once.
//
// Cache layout (modelled on kagglehub's, minus its versions/<n>
// level, so the two caches are not interchangeable):
//
//   $KAGGLEHUB_CACHE or <user cache dir>/kagglehub
//     datasets/<owner>/<slug>/
//       .complete            ← written after a full extract
//       NEU-DET/...
//
// A dataset directory without the marker is a leftover from an
// interrupted run and is downloaded again from scratch.
//
// Credentials are optional for public datasets. When present
// they are sent as HTTP basic auth:
//   1. KAGGLE_USERNAME + KAGGLE_KEY environment variables
//   2. ~/.kaggle/kaggle.json  {"username": ..., "key": ...}

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::domain::traits::DatasetProvider;

/// The NEU surface defect database
pub const DEFAULT_DATASET: &str = "kaustubhdikshit/neu-surface-defect-database";

/// Marks a fully extracted dataset directory
pub const COMPLETE_MARKER: &str = ".complete";

const API_BASE: &str = "https://www.kaggle.com/api/v1";
const ARCHIVE_NAME: &str = "archive.zip";
const USER_AGENT: &str = concat!("defect-classifier/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct KaggleCredentials {
    pub username: String,
    pub key:      String,
}

impl KaggleCredentials {
    /// Environment variables first, then ~/.kaggle/kaggle.json.
    pub fn resolve() -> Option<Self> {
        if let (Ok(username), Ok(key)) = (std::env::var("KAGGLE_USERNAME"), std::env::var("KAGGLE_KEY")) {
            if !username.is_empty() && !key.is_empty() {
                return Some(Self { username, key });
            }
        }

        let path = dirs::home_dir()?.join(".kaggle").join("kaggle.json");
        if !path.exists() {
            return None;
        }
        match Self::from_file(&path) {
            Ok(creds) => Some(creds),
            Err(e) => {
                tracing::warn!("Ignoring Kaggle credentials: {e:#}");
                None
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Cannot read '{}'", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("'{}' must hold \"username\" and \"key\"", path.display()))
    }
}

/// Split "owner/slug" into its parts.
pub fn parse_handle(handle: &str) -> Result<(&str, &str)> {
    let parts: Vec<&str> = handle.split('/').collect();
    match parts.as_slice() {
        [owner, slug] if !owner.is_empty() && !slug.is_empty() => Ok((*owner, *slug)),
        _ => bail!("Dataset handle must look like 'owner/dataset', got '{handle}'"),
    }
}

/// Downloads datasets into a kagglehub-style cache.
pub struct KaggleClient {
    cache_root:  PathBuf,
    credentials: Option<KaggleCredentials>,
    api_base:    String,
}

impl KaggleClient {
    pub fn new(cache_root: impl Into<PathBuf>) -> Self {
        Self {
            cache_root:  cache_root.into(),
            credentials: None,
            api_base:    API_BASE.to_string(),
        }
    }

    /// Client using the default cache root and whatever credentials
    /// the environment provides.
    pub fn from_env() -> Self {
        let client = Self::new(Self::default_cache_root());
        match KaggleCredentials::resolve() {
            Some(creds) => client.with_credentials(creds),
            None        => client,
        }
    }

    pub fn with_credentials(mut self, credentials: KaggleCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn default_cache_root() -> PathBuf {
        match std::env::var_os("KAGGLEHUB_CACHE") {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from(".cache"))
                .join("kagglehub"),
        }
    }

    pub fn dataset_dir(&self, handle: &str) -> Result<PathBuf> {
        let (owner, slug) = parse_handle(handle)?;
        Ok(self.cache_root.join("datasets").join(owner).join(slug))
    }

    fn download_archive(&self, handle: &str, dest: &Path) -> Result<()> {
        let url = format!("{}/datasets/download/{handle}", self.api_base);
        tracing::info!("Downloading {}", url);

        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to create HTTP client")?;

        let mut request = client.get(&url);
        if let Some(creds) = &self.credentials {
            request = request.basic_auth(&creds.username, Some(&creds.key));
        }

        let mut response = request
            .send()
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("Download of '{handle}' failed"))?;

        let mut file = fs::File::create(dest)
            .with_context(|| format!("Cannot create '{}'", dest.display()))?;
        let bytes = response
            .copy_to(&mut file)
            .with_context(|| format!("Cannot write '{}'", dest.display()))?;

        tracing::info!("Downloaded {} bytes", bytes);
        Ok(())
    }
}

impl DatasetProvider for KaggleClient {
    fn fetch(&self, handle: &str) -> Result<PathBuf> {
        let dir = self.dataset_dir(handle)?;

        if dir.join(COMPLETE_MARKER).exists() {
            tracing::info!("Using cached dataset '{}'", handle);
            return Ok(dir);
        }

        if dir.exists() {
            tracing::warn!("Removing incomplete download in '{}'", dir.display());
            fs::remove_dir_all(&dir)
                .with_context(|| format!("Cannot clear '{}'", dir.display()))?;
        }
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create '{}'", dir.display()))?;

        let archive = dir.join(ARCHIVE_NAME);
        self.download_archive(handle, &archive)?;
        extract_archive(&archive, &dir)?;
        fs::remove_file(&archive)
            .with_context(|| format!("Cannot remove '{}'", archive.display()))?;

        fs::write(dir.join(COMPLETE_MARKER), "")
            .with_context(|| format!("Cannot mark '{}' complete", dir.display()))?;
        Ok(dir)
    }
}

/// Unpack a zip archive into `dest`.
pub fn extract_archive(archive: &Path, dest: &Path) -> Result<()> {
    let file = fs::File::open(archive)
        .with_context(|| format!("Cannot open '{}'", archive.display()))?;
    let mut zip = zip::ZipArchive::new(file)
        .with_context(|| format!("'{}' is not a zip archive", archive.display()))?;

    tracing::info!("Extracting {} entries into '{}'", zip.len(), dest.display());
    zip.extract(dest)
        .with_context(|| format!("Cannot extract '{}'", archive.display()))?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    Copied,
    AlreadyPresent,
}

/// Copy `source` into `dest` unless `dest` already has entries.
///
/// `dest` is created when missing. The cache's completion marker
/// is not copied.
pub fn copy_once(source: &Path, dest: &Path) -> Result<CopyOutcome> {
    fs::create_dir_all(dest)
        .with_context(|| format!("Cannot create '{}'", dest.display()))?;

    let has_entries = fs::read_dir(dest)
        .with_context(|| format!("Cannot read '{}'", dest.display()))?
        .next()
        .is_some();
    if has_entries {
        return Ok(CopyOutcome::AlreadyPresent);
    }

    let files = copy_tree(source, dest, true)?;
    tracing::debug!("Copied {} files into '{}'", files, dest.display());
    Ok(CopyOutcome::Copied)
}

fn copy_tree(source: &Path, dest: &Path, top_level: bool) -> Result<usize> {
    let mut files = 0;
    let entries = fs::read_dir(source)
        .with_context(|| format!("Cannot read '{}'", source.display()))?;

    for entry in entries {
        let entry = entry?;
        let name  = entry.file_name();
        if top_level && name == COMPLETE_MARKER {
            continue;
        }

        let from = entry.path();
        let to   = dest.join(&name);
        if entry.file_type()?.is_dir() {
            fs::create_dir_all(&to)
                .with_context(|| format!("Cannot create '{}'", to.display()))?;
            files += copy_tree(&from, &to, false)?;
        } else {
            fs::copy(&from, &to)
                .with_context(|| format!("Cannot copy '{}'", from.display()))?;
            files += 1;
        }
    }
    Ok(files)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn cached_dataset(root: &Path) -> PathBuf {
        let dir = root
            .join("datasets")
            .join("kaustubhdikshit")
            .join("neu-surface-defect-database");
        let class_dir = dir.join("NEU-DET").join("train").join("images").join("crazing");
        fs::create_dir_all(&class_dir).unwrap();
        fs::write(class_dir.join("crazing_1.jpg"), b"jpg").unwrap();
        fs::write(dir.join(COMPLETE_MARKER), "").unwrap();
        dir
    }

    #[test]
    fn test_parse_handle() {
        assert_eq!(parse_handle("owner/slug").unwrap(), ("owner", "slug"));
        assert!(parse_handle("owner").is_err());
        assert!(parse_handle("owner/").is_err());
        assert!(parse_handle("a/b/c").is_err());
    }

    #[test]
    fn test_cached_dataset_needs_no_network() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = cached_dataset(tmp.path());

        let mut client = KaggleClient::new(tmp.path());
        client.api_base = "http://127.0.0.1:9".to_string();

        assert_eq!(client.fetch(DEFAULT_DATASET).unwrap(), dir);
    }

    #[test]
    fn test_copy_once_is_idempotent() {
        let cache = tempfile::tempdir().unwrap();
        let proj  = tempfile::tempdir().unwrap();
        let src   = cached_dataset(cache.path());
        let dest  = proj.path().join("dataset");

        assert_eq!(copy_once(&src, &dest).unwrap(), CopyOutcome::Copied);
        let copied = dest.join("NEU-DET/train/images/crazing/crazing_1.jpg");
        assert!(copied.exists());
        assert!(!dest.join(COMPLETE_MARKER).exists());

        // A second run leaves the copy alone, even if the cache changed
        fs::write(src.join("extra.txt"), "new").unwrap();
        assert_eq!(copy_once(&src, &dest).unwrap(), CopyOutcome::AlreadyPresent);
        assert!(!dest.join("extra.txt").exists());
        assert_eq!(fs::read(&copied).unwrap(), b"jpg");
    }

    #[test]
    fn test_extract_archive() {
        let tmp     = tempfile::tempdir().unwrap();
        let archive = tmp.path().join(ARCHIVE_NAME);
        {
            let mut zip = zip::ZipWriter::new(fs::File::create(&archive).unwrap());
            let options = zip::write::SimpleFileOptions::default();
            zip.start_file("NEU-DET/validation/images/patches/p_1.jpg", options).unwrap();
            zip.write_all(b"pixels").unwrap();
            zip.finish().unwrap();
        }

        let out = tmp.path().join("out");
        extract_archive(&archive, &out).unwrap();
        let file = out.join("NEU-DET/validation/images/patches/p_1.jpg");
        assert_eq!(fs::read(file).unwrap(), b"pixels");
    }

    #[test]
    fn test_credentials_file() {
        let tmp  = tempfile::tempdir().unwrap();
        let path = tmp.path().join("kaggle.json");
        fs::write(&path, r#"{"username": "neu", "key": "abc123"}"#).unwrap();

        let creds = KaggleCredentials::from_file(&path).unwrap();
        assert_eq!(creds, KaggleCredentials { username: "neu".into(), key: "abc123".into() });

        fs::write(&path, r#"{"username": "neu"}"#).unwrap();
        assert!(KaggleCredentials::from_file(&path).is_err());
    }
}
