//! Media resolution and the three-step upload pipeline
//!
//! Uploading runs through three sequential steps, each classified
//! independently on failure:
//!
//! 1. `signed_url`: request a one-time upload slot from the API
//! 2. `s3_upload`: PUT the raw bytes to the signed storage URL
//! 3. `confirmation`: poll the API for the reusable upload token
//!
//! File resolution failures (bad path, unreachable URL, download errors) are
//! classified at the `signed_url` step. The resolved file's backing resources
//! are released exactly once when `upload` returns or errors: local files are
//! left untouched, remote downloads land in a temp file that is removed when
//! the `ResolvedFile` drops.

use std::io::Write;
use std::path::{Path, PathBuf};

use futures::StreamExt;
use serde_json::json;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::client::SocialBuClient;
use crate::error::{Result, SocialBuError, UploadStep};
use crate::types::{pick_str, MediaUpload};

/// A media input resolved to readable bytes with known name, size and type.
///
/// Dropping the value releases whatever backs it; for remote URLs that means
/// deleting the private temp file the body was streamed into.
#[derive(Debug)]
pub struct ResolvedFile {
    pub name: String,
    pub mime_type: String,
    pub size: u64,
    backing: Backing,
}

#[derive(Debug)]
enum Backing {
    Local(PathBuf),
    Temp(NamedTempFile),
}

impl ResolvedFile {
    pub fn path(&self) -> &Path {
        match &self.backing {
            Backing::Local(path) => path,
            Backing::Temp(file) => file.path(),
        }
    }

    pub(crate) async fn read_bytes(&self) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(self.path()).await
    }
}

/// Turns a user-supplied path-or-URL into a [`ResolvedFile`].
#[derive(Debug, Clone)]
pub struct FileResolver {
    http: reqwest::Client,
}

impl FileResolver {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Resolve a local filesystem path or a remote URL.
    ///
    /// Failures are tagged at the `signed_url` step: nothing has been sent
    /// to the API yet, so the upload fails before its first step completes.
    pub async fn resolve(&self, source: &str) -> Result<ResolvedFile> {
        let path = Path::new(source);
        if path.is_file() {
            return self.resolve_local(path);
        }

        if let Ok(url) = reqwest::Url::parse(source) {
            if matches!(url.scheme(), "http" | "https") {
                return self.resolve_remote(url).await;
            }
        }

        Err(SocialBuError::upload(
            UploadStep::SignedUrl,
            format!("File not found: {}", source),
        ))
    }

    fn resolve_local(&self, path: &Path) -> Result<ResolvedFile> {
        let metadata = std::fs::metadata(path).map_err(|e| {
            SocialBuError::upload(
                UploadStep::SignedUrl,
                format!("Cannot open file: {}: {}", path.display(), e),
            )
        })?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "file".to_string());

        Ok(ResolvedFile {
            mime_type: detect_mime_type(path),
            size: metadata.len(),
            name,
            backing: Backing::Local(path.to_path_buf()),
        })
    }

    /// Probe the URL with HEAD, then stream the body to a private temp file
    /// so large media never sits in memory.
    async fn resolve_remote(&self, url: reqwest::Url) -> Result<ResolvedFile> {
        let head = self
            .http
            .head(url.clone())
            .send()
            .await
            .ok()
            .filter(|resp| resp.status().is_success())
            .ok_or_else(|| {
                SocialBuError::upload(
                    UploadStep::SignedUrl,
                    format!("Cannot access remote file: {}", url),
                )
            })?;

        let content_length = head.content_length().unwrap_or(0);
        let mime_type = head
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();

        let name = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|segment| !segment.is_empty())
            .unwrap_or("file")
            .to_string();

        let mut temp = NamedTempFile::new().map_err(|e| {
            SocialBuError::upload(
                UploadStep::SignedUrl,
                format!("Cannot create temp file: {}", e),
            )
        })?;

        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .ok()
            .filter(|resp| resp.status().is_success())
            .ok_or_else(|| {
                SocialBuError::upload(
                    UploadStep::SignedUrl,
                    format!("Cannot download remote file: {}", url),
                )
            })?;

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                SocialBuError::upload(
                    UploadStep::SignedUrl,
                    format!("Cannot download remote file: {}: {}", url, e),
                )
            })?;
            temp.write_all(&chunk).map_err(|e| {
                SocialBuError::upload(
                    UploadStep::SignedUrl,
                    format!("Cannot write temp file: {}", e),
                )
            })?;
        }
        temp.flush().map_err(|e| {
            SocialBuError::upload(
                UploadStep::SignedUrl,
                format!("Cannot write temp file: {}", e),
            )
        })?;

        let size = if content_length > 0 {
            content_length
        } else {
            temp.as_file()
                .metadata()
                .map(|m| m.len())
                .unwrap_or_default()
        };

        debug!(name, size, "downloaded remote media to temp file");

        Ok(ResolvedFile {
            name,
            mime_type,
            size,
            backing: Backing::Temp(temp),
        })
    }
}

/// A signed upload slot returned by the API.
#[derive(Debug, Clone)]
struct SignedSlot {
    signed_url: String,
    key: String,
    url: String,
    secure_key: String,
}

impl SocialBuClient {
    /// Upload a media file (local path or remote URL) and return the
    /// reusable attachment token.
    pub async fn upload_media_source(&self, source: &str) -> Result<MediaUpload> {
        let file = FileResolver::new(self.http.clone()).resolve(source).await?;
        self.upload_resolved(file).await
    }

    /// Run the three pipeline steps for an already-resolved file.
    ///
    /// `file` is owned here, so its backing resources are released when this
    /// call returns or errors at any step, including on cancellation.
    pub async fn upload_resolved(&self, file: ResolvedFile) -> Result<MediaUpload> {
        let slot = self.request_upload_slot(&file).await?;
        self.transfer_to_storage(&slot, &file).await?;
        let upload = self.confirm_upload(&slot, &file).await?;
        info!(name = %file.name, key = %upload.key, "media upload complete");
        Ok(upload)
    }

    /// Step 1: request a signed upload slot.
    async fn request_upload_slot(&self, file: &ResolvedFile) -> Result<SignedSlot> {
        let response = self
            .post(
                "/upload_media",
                &json!({
                    "name": file.name,
                    "mime_type": file.mime_type,
                }),
            )
            .await
            .map_err(|e| SocialBuError::at_upload_step(UploadStep::SignedUrl, e))?;

        let map = response.as_object().cloned().unwrap_or_default();
        let signed_url = pick_str(&map, &["signed_url", "signedUrl"])
            .filter(|url| !url.is_empty())
            .ok_or_else(|| {
                SocialBuError::upload(
                    UploadStep::SignedUrl,
                    "Upload slot response did not include a signed URL",
                )
            })?;

        Ok(SignedSlot {
            signed_url,
            key: pick_str(&map, &["key"]).unwrap_or_default(),
            url: pick_str(&map, &["url"]).unwrap_or_default(),
            secure_key: pick_str(&map, &["secure_key", "secureKey"]).unwrap_or_default(),
        })
    }

    /// Step 2: PUT the raw bytes to the signed URL.
    ///
    /// The signed URL is pre-authorized; no bearer token is sent.
    async fn transfer_to_storage(&self, slot: &SignedSlot, file: &ResolvedFile) -> Result<()> {
        let bytes = file.read_bytes().await.map_err(|e| {
            SocialBuError::upload(
                UploadStep::S3Upload,
                format!("Cannot read file {}: {}", file.name, e),
            )
        })?;

        let response = self
            .http
            .put(&slot.signed_url)
            .header(reqwest::header::CONTENT_TYPE, &file.mime_type)
            .header(reqwest::header::CONTENT_LENGTH, file.size)
            .header("x-amz-acl", "private")
            .body(bytes)
            .send()
            .await
            .map_err(|e| {
                SocialBuError::at_upload_step(UploadStep::S3Upload, SocialBuError::from(e))
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SocialBuError::MediaUpload {
                step: UploadStep::S3Upload,
                message: format!("Failed to upload to storage: {}", body),
                status,
                response: None,
            });
        }

        Ok(())
    }

    /// Step 3: confirm the upload and obtain the token.
    ///
    /// The token may not be available immediately after the transfer; the
    /// API answers with an empty token while the file is still processing,
    /// which is surfaced as a confirmation failure rather than retried.
    async fn confirm_upload(&self, slot: &SignedSlot, file: &ResolvedFile) -> Result<MediaUpload> {
        let response = self
            .get("/upload_media/status", &[("key", slot.key.clone())])
            .await
            .map_err(|e| SocialBuError::at_upload_step(UploadStep::Confirmation, e))?;

        let upload_token = response
            .get("upload_token")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_string();

        if upload_token.is_empty() {
            return Err(SocialBuError::upload(
                UploadStep::Confirmation,
                "Media upload confirmation did not return an upload token. \
                 The file may still be processing.",
            ));
        }

        Ok(MediaUpload {
            upload_token,
            key: slot.key.clone(),
            url: slot.url.clone(),
            secure_key: slot.secure_key.clone(),
            mime_type: file.mime_type.clone(),
            name: file.name.clone(),
        })
    }
}

/// Detect a mime type by sniffing magic bytes, falling back to the file
/// extension and finally `application/octet-stream`.
fn detect_mime_type(path: &Path) -> String {
    if let Ok(bytes) = read_prefix(path, 16) {
        if let Some(mime) = sniff_magic(&bytes) {
            return mime.to_string();
        }
    }

    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase());
    match extension.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("mp4") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
    .to_string()
}

fn read_prefix(path: &Path, len: usize) -> std::io::Result<Vec<u8>> {
    use std::io::Read;
    let mut file = std::fs::File::open(path)?;
    let mut buffer = vec![0u8; len];
    let read = file.read(&mut buffer)?;
    buffer.truncate(read);
    Ok(buffer)
}

fn sniff_magic(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("image/jpeg");
    }
    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        return Some("image/png");
    }
    if bytes.starts_with(b"GIF8") {
        return Some("image/gif");
    }
    if bytes.len() >= 12 && bytes.starts_with(b"RIFF") && &bytes[8..12] == b"WEBP" {
        return Some("image/webp");
    }
    if bytes.len() >= 8 && &bytes[4..8] == b"ftyp" {
        return Some("video/mp4");
    }
    if bytes.starts_with(b"%PDF") {
        return Some("application/pdf");
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn resolver() -> FileResolver {
        FileResolver::new(reqwest::Client::new())
    }

    #[tokio::test]
    async fn test_resolve_local_file() {
        let mut file = NamedTempFile::with_suffix(".png").unwrap();
        file.write_all(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A])
            .unwrap();
        file.flush().unwrap();

        let resolved = resolver()
            .resolve(file.path().to_str().unwrap())
            .await
            .unwrap();

        assert_eq!(resolved.mime_type, "image/png");
        assert_eq!(resolved.size, 8);
        assert!(resolved.name.ends_with(".png"));
        assert_eq!(resolved.path(), file.path());
    }

    #[tokio::test]
    async fn test_resolve_missing_path_fails_at_signed_url_step() {
        let err = resolver()
            .resolve("/definitely/not/a/file.jpg")
            .await
            .unwrap_err();

        assert_eq!(err.upload_step(), Some(UploadStep::SignedUrl));
        assert!(err.to_string().contains("File not found"));
    }

    #[tokio::test]
    async fn test_resolve_rejects_non_http_schemes() {
        let err = resolver().resolve("ftp://example.com/a.png").await.unwrap_err();
        assert_eq!(err.upload_step(), Some(UploadStep::SignedUrl));
    }

    #[test]
    fn test_sniff_magic_bytes() {
        assert_eq!(sniff_magic(&[0xFF, 0xD8, 0xFF, 0xE0]), Some("image/jpeg"));
        assert_eq!(sniff_magic(b"GIF89a"), Some("image/gif"));
        assert_eq!(sniff_magic(b"RIFF\x00\x00\x00\x00WEBPVP8 "), Some("image/webp"));
        assert_eq!(sniff_magic(b"%PDF-1.7"), Some("application/pdf"));
        assert_eq!(sniff_magic(b"\x00\x00\x00\x18ftypmp42"), Some("video/mp4"));
        assert_eq!(sniff_magic(b"plain text"), None);
    }

    #[test]
    fn test_detect_mime_type_extension_fallback() {
        let mut file = NamedTempFile::with_suffix(".webp").unwrap();
        // Content that matches no magic signature
        file.write_all(b"xx").unwrap();
        file.flush().unwrap();
        assert_eq!(detect_mime_type(file.path()), "image/webp");

        let plain = NamedTempFile::with_suffix(".bin").unwrap();
        assert_eq!(detect_mime_type(plain.path()), "application/octet-stream");
    }
}
