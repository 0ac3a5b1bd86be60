//! Writing captures to disk
//!
//! Layout: `<output_dir>/<domain>/capture-<timestamp>{.png,.html,-metadata.json}`.
//! Repeated captures of one site land in the same domain folder; the shared
//! timestamped base name keeps the three artifacts of one capture together.

use crate::{CaptureError, CaptureResult, PageInfo};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use url::Url;

/// Folder name used when the URL has no usable hostname.
pub const UNKNOWN_DOMAIN: &str = "unknown-domain";

const BASE_NAME_PREFIX: &str = "capture";

/// Paths of the artifacts written for one capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedFiles {
    pub screenshot: PathBuf,
    pub html: PathBuf,
    pub metadata: PathBuf,
    pub domain_folder: PathBuf,
}

/// Sidecar JSON written next to the screenshot and HTML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureMetadata {
    pub url: String,
    pub title: String,
    pub timestamp: String,
    pub domain: String,
    #[serde(rename = "pageInfo")]
    pub page_info: PageInfo,
    pub files: MetadataFiles,
}

/// Sibling file names, never full paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataFiles {
    pub screenshot: String,
    pub html: String,
}

/// Hostname of `url` without a leading `www.`, or [`UNKNOWN_DOMAIN`].
///
/// ```rust
/// use page_capture::extract_domain;
///
/// assert_eq!(extract_domain("https://www.example.com/a?b=c"), "example.com");
/// assert_eq!(extract_domain("not a url"), "unknown-domain");
/// ```
pub fn extract_domain(url: &str) -> String {
    let host = Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()));

    match host {
        Some(host) if !host.is_empty() => match host.strip_prefix("www.") {
            Some(stripped) if !stripped.is_empty() => stripped.to_string(),
            _ => host,
        },
        _ => UNKNOWN_DOMAIN.to_string(),
    }
}

/// `capture-2026-10-16T09-30-12-345` for `2026-10-16T09:30:12.345Z`.
pub fn base_file_name(now: DateTime<Utc>) -> String {
    let stamp = crate::iso_timestamp(now).replace(|c: char| c == ':' || c == '.', "-");
    let stamp = stamp.strip_suffix('Z').unwrap_or(&stamp);
    format!("{BASE_NAME_PREFIX}-{stamp}")
}

/// Write `result` under `output_dir`, naming files after the current time.
pub async fn save_capture(
    result: &CaptureResult,
    output_dir: &Path,
) -> Result<SavedFiles, CaptureError> {
    save_capture_at(result, output_dir, Utc::now()).await
}

/// [`save_capture`] with an explicit clock reading for the base name.
///
/// Existing files with the same name are replaced. Each file is swapped into
/// place whole, but the three writes are not atomic as a set.
pub async fn save_capture_at(
    result: &CaptureResult,
    output_dir: &Path,
    now: DateTime<Utc>,
) -> Result<SavedFiles, CaptureError> {
    let domain = extract_domain(&result.url);
    let domain_folder = output_dir.join(&domain);

    let existed = tokio::fs::metadata(&domain_folder).await.is_ok();
    tokio::fs::create_dir_all(&domain_folder).await?;
    if !existed {
        info!("Created domain folder: {}", domain_folder.display());
    }

    let base = base_file_name(now);
    let screenshot_name = format!("{base}.png");
    let html_name = format!("{base}.html");
    let metadata_name = format!("{base}-metadata.json");

    let screenshot_path = domain_folder.join(&screenshot_name);
    write_replacing(&screenshot_path, &result.screenshot).await?;
    info!("Screenshot saved: {}", screenshot_path.display());

    let html_path = domain_folder.join(&html_name);
    write_replacing(&html_path, result.html.as_bytes()).await?;
    info!("HTML saved: {}", html_path.display());

    let metadata = CaptureMetadata {
        url: result.url.clone(),
        title: result.title.clone(),
        timestamp: result.timestamp_iso(),
        domain,
        page_info: result.page_info,
        files: MetadataFiles {
            screenshot: screenshot_name,
            html: html_name,
        },
    };
    let metadata_path = domain_folder.join(&metadata_name);
    let json = serde_json::to_string_pretty(&metadata)?;
    write_replacing(&metadata_path, json.as_bytes()).await?;
    info!("Metadata saved: {}", metadata_path.display());

    Ok(SavedFiles {
        screenshot: screenshot_path,
        html: html_path,
        metadata: metadata_path,
        domain_folder,
    })
}

/// Write to a hidden sibling then rename over `path`.
async fn write_replacing(path: &Path, bytes: &[u8]) -> Result<(), CaptureError> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| CaptureError::IoError(format!("Bad file path: {}", path.display())))?;
    let tmp_path = path.with_file_name(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4()));

    let written = match tokio::fs::write(&tmp_path, bytes).await {
        Ok(()) => tokio::fs::rename(&tmp_path, path).await,
        Err(e) => Err(e),
    };
    if let Err(e) = written {
        // A short write or a failed rename can both leave the sibling behind
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(e.into());
    }

    debug!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration;
    use tempfile::TempDir;

    fn sample_result(url: &str) -> CaptureResult {
        CaptureResult {
            url: url.to_string(),
            title: "Example Domain".to_string(),
            html: "<html><body><h1>Example</h1></body></html>".to_string(),
            screenshot: vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a],
            timestamp: Utc.with_ymd_and_hms(2026, 10, 16, 9, 30, 12).unwrap(),
            page_info: PageInfo {
                width: 1280,
                height: 720,
                document_width: 1280,
                document_height: 1900,
            },
            duration: Duration::from_secs(3),
        }
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 9, 30, 15).unwrap() + chrono::Duration::milliseconds(42)
    }

    #[test]
    fn test_extract_domain() {
        assert_eq!(extract_domain("https://example.com"), "example.com");
        assert_eq!(extract_domain("https://www.example.com/path"), "example.com");
        assert_eq!(extract_domain("http://sub.example.com:8080/x?y=1"), "sub.example.com");
        assert_eq!(extract_domain("https://wwwexample.com"), "wwwexample.com");
        assert_eq!(extract_domain("https://api.www.example.com"), "api.www.example.com");
        assert_eq!(extract_domain("http://127.0.0.1:3000"), "127.0.0.1");
    }

    #[test]
    fn test_extract_domain_falls_back_to_placeholder() {
        assert_eq!(extract_domain("invalid-url"), UNKNOWN_DOMAIN);
        assert_eq!(extract_domain(""), UNKNOWN_DOMAIN);
        assert_eq!(extract_domain("mailto:someone@example.com"), UNKNOWN_DOMAIN);
    }

    #[test]
    fn test_base_file_name() {
        assert_eq!(base_file_name(fixed_now()), "capture-2026-10-16T09-30-15-042");
    }

    #[tokio::test]
    async fn test_save_capture_writes_three_files() {
        let dir = TempDir::new().unwrap();
        let result = sample_result("https://example.com");

        let saved = save_capture_at(&result, dir.path(), fixed_now()).await.unwrap();

        assert_eq!(saved.domain_folder, dir.path().join("example.com"));
        assert_eq!(
            saved.screenshot,
            saved.domain_folder.join("capture-2026-10-16T09-30-15-042.png")
        );
        assert_eq!(
            saved.html,
            saved.domain_folder.join("capture-2026-10-16T09-30-15-042.html")
        );
        assert_eq!(
            saved.metadata,
            saved
                .domain_folder
                .join("capture-2026-10-16T09-30-15-042-metadata.json")
        );

        assert_eq!(std::fs::read(&saved.screenshot).unwrap(), result.screenshot);
        assert_eq!(std::fs::read_to_string(&saved.html).unwrap(), result.html);

        let leftovers: Vec<_> = std::fs::read_dir(&saved.domain_folder)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .filter(|n| n.ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_metadata_json_shape() {
        let dir = TempDir::new().unwrap();
        let result = sample_result("https://www.example.com/docs");

        let saved = save_capture_at(&result, dir.path(), fixed_now()).await.unwrap();
        let raw = std::fs::read_to_string(&saved.metadata).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();

        assert!(raw.contains("\n  \"url\""), "metadata should be pretty-printed");
        assert_eq!(json["url"], "https://www.example.com/docs");
        assert_eq!(json["title"], "Example Domain");
        assert_eq!(json["timestamp"], "2026-10-16T09:30:12.000Z");
        assert_eq!(json["domain"], "example.com");
        assert_eq!(json["pageInfo"]["width"], 1280);
        assert_eq!(json["pageInfo"]["height"], 720);
        assert_eq!(json["pageInfo"]["documentWidth"], 1280);
        assert_eq!(json["pageInfo"]["documentHeight"], 1900);
        assert_eq!(json["files"]["screenshot"], "capture-2026-10-16T09-30-15-042.png");
        assert_eq!(json["files"]["html"], "capture-2026-10-16T09-30-15-042.html");

        let metadata: CaptureMetadata = serde_json::from_str(&raw).unwrap();
        assert!(!metadata.files.screenshot.contains('/'));
        assert!(!metadata.files.html.contains('/'));
    }

    #[tokio::test]
    async fn test_save_capture_is_idempotent_for_folder() {
        let dir = TempDir::new().unwrap();
        let result = sample_result("https://example.com");

        let first = save_capture_at(&result, dir.path(), fixed_now()).await.unwrap();
        let later = fixed_now() + chrono::Duration::seconds(1);
        let second = save_capture_at(&result, dir.path(), later).await.unwrap();

        assert_eq!(first.domain_folder, second.domain_folder);
        assert_ne!(first.screenshot, second.screenshot);
        assert!(first.screenshot.exists());
        assert!(second.screenshot.exists());
    }

    #[tokio::test]
    async fn test_same_base_name_overwrites() {
        let dir = TempDir::new().unwrap();
        let mut result = sample_result("https://example.com");

        save_capture_at(&result, dir.path(), fixed_now()).await.unwrap();
        result.html = "<html>second</html>".to_string();
        let saved = save_capture_at(&result, dir.path(), fixed_now()).await.unwrap();

        assert_eq!(std::fs::read_to_string(&saved.html).unwrap(), "<html>second</html>");
    }

    #[tokio::test]
    async fn test_unparsable_url_goes_to_placeholder_folder() {
        let dir = TempDir::new().unwrap();
        let result = sample_result("not a url");

        let saved = save_capture_at(&result, dir.path(), fixed_now()).await.unwrap();

        assert_eq!(saved.domain_folder, dir.path().join(UNKNOWN_DOMAIN));
    }

    #[tokio::test]
    async fn test_unwritable_output_dir_is_persistence_error() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let result = sample_result("https://example.com");

        let err = save_capture_at(&result, &blocker, fixed_now())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), crate::ErrorKind::Persistence);
    }

    #[tokio::test]
    async fn test_failed_write_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let folder = dir.path().join("example.com");
        // A directory squatting on the screenshot name makes the swap fail
        std::fs::create_dir_all(folder.join("capture-2026-10-16T09-30-15-042.png/x")).unwrap();
        let result = sample_result("https://example.com");

        let err = save_capture_at(&result, dir.path(), fixed_now())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), crate::ErrorKind::Persistence);
        let leftovers: Vec<_> = std::fs::read_dir(&folder)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .filter(|n| n.ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty(), "{leftovers:?}");
    }

    #[tokio::test]
    async fn test_write_replacing_cleans_up_when_write_fails() {
        let dir = TempDir::new().unwrap();
        let missing_parent = dir.path().join("gone").join("page.html");

        let err = write_replacing(&missing_parent, b"<html></html>").await.unwrap_err();

        assert!(matches!(err, CaptureError::IoError(_)));
        assert!(!dir.path().join("gone").exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
