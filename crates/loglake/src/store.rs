//! Object-store construction from configured source URLs.
//!
//! Supported forms:
//! - `https://<account>.blob.core.windows.net/<container>?<sas>` -
//!   Azure container with a SAS token in the query string
//! - `file:///path` or a bare directory path - local store, used by
//!   tests and offline runs

use std::sync::{Arc, OnceLock};

use anyhow::{Context, Result, anyhow};
use object_store::ObjectStore;
use object_store::azure::{AzureConfigKey, MicrosoftAzureBuilder};
use object_store::local::LocalFileSystem;
use object_store::path::Path as StorePath;
use regex::Regex;
use url::Url;

/// A ready-to-list handle for one remote source.
pub struct SourceStore {
    pub store: Arc<dyn ObjectStore>,
    /// Listing prefix inside the container, when the URL carried one.
    pub prefix: Option<StorePath>,
    /// Container (or directory) name the URL points at.
    pub container: String,
}

fn container_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"https?://[^/]+/([^/?]+)").expect("container pattern is valid"))
}

/// Extract the container name from an Azure blob container URL.
pub fn container_name_from_url(url: &str) -> Option<String> {
    container_pattern()
        .captures(url)
        .map(|captures| captures[1].to_string())
}

/// Build an object store for `raw_url`.
pub fn build_source_store(raw_url: &str) -> Result<SourceStore> {
    if raw_url.starts_with("https://") || raw_url.starts_with("http://") {
        build_azure_store(raw_url)
    } else if raw_url.contains("://") && !raw_url.starts_with("file://") {
        Err(anyhow!("Unsupported source URL scheme: {raw_url}"))
    } else {
        build_local_store(raw_url)
    }
}

fn build_azure_store(raw_url: &str) -> Result<SourceStore> {
    let url = Url::parse(raw_url).with_context(|| format!("Invalid source URL: {raw_url}"))?;
    let host = url
        .host_str()
        .ok_or_else(|| anyhow!("Source URL has no host: {raw_url}"))?;
    let account = host
        .split('.')
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow!("Cannot determine storage account from host {host}"))?;
    let container = container_name_from_url(raw_url)
        .ok_or_else(|| anyhow!("Cannot determine container name from URL"))?;

    let mut builder = MicrosoftAzureBuilder::new()
        .with_account(account)
        .with_container_name(&container);
    if let Some(query) = url.query() {
        builder = builder.with_config(AzureConfigKey::SasKey, query);
    }
    let store = builder
        .build()
        .with_context(|| format!("Failed to build Azure store for container {container}"))?;

    // Path components after the container become the listing prefix
    let prefix: Vec<&str> = url
        .path_segments()
        .map(|segments| segments.skip(1).filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();
    let prefix = if prefix.is_empty() {
        None
    } else {
        Some(StorePath::from(prefix.join("/")))
    };

    Ok(SourceStore {
        store: Arc::new(store),
        prefix,
        container,
    })
}

fn build_local_store(raw_url: &str) -> Result<SourceStore> {
    let path = raw_url.strip_prefix("file://").unwrap_or(raw_url);
    let store = LocalFileSystem::new_with_prefix(path)
        .with_context(|| format!("Failed to open local store at {path}"))?;
    let container = std::path::Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string());
    Ok(SourceStore {
        store: Arc::new(store),
        prefix: None,
        container,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_name_extraction() {
        assert_eq!(
            container_name_from_url(
                "https://logs.blob.core.windows.net/insights-logs-signinlogs?sv=2024&sig=abc"
            ),
            Some("insights-logs-signinlogs".to_string())
        );
        assert_eq!(
            container_name_from_url("https://logs.blob.core.windows.net/container/deeper/path"),
            Some("container".to_string())
        );
        assert_eq!(container_name_from_url("not a url"), None);
        assert_eq!(container_name_from_url("https://host-only.example.com"), None);
    }

    #[test]
    fn test_azure_store_from_sas_url() {
        let handle = build_source_store(
            "https://logs.blob.core.windows.net/insights-logs-signinlogs/tenants/x?sv=2024-01-01&sig=abc",
        )
        .unwrap();
        assert_eq!(handle.container, "insights-logs-signinlogs");
        assert_eq!(
            handle.prefix.as_ref().map(|p| p.as_ref()),
            Some("tenants/x")
        );
    }

    #[test]
    fn test_local_store_from_directory() {
        let tmp = tempfile::TempDir::new().unwrap();
        let handle = build_source_store(&tmp.path().to_string_lossy()).unwrap();
        assert!(handle.prefix.is_none());
        assert!(!handle.container.is_empty());
    }

    #[test]
    fn test_unsupported_scheme_is_rejected() {
        assert!(build_source_store("gopher://example.com/x").is_err());
    }
}
