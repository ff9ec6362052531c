//! Evidence object storage.
//!
//! Violations are persisted as JPEGs under a deterministic date-sharded
//! path; the store returns the public URL recorded in the database. The
//! production backend is a Supabase storage bucket spoken to over its REST
//! API; the trait keeps the pipeline and the maintenance jobs testable.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use regex::Regex;
use reqwest::header;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

use crate::error::{CoreError, Result};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EvidenceStore: Send + Sync {
    /// Upload bytes under `path`, overwriting any existing object
    /// (idempotent upsert), and return the public URL.
    async fn upload(&self, bytes: Vec<u8>, content_type: &str, path: &str) -> Result<String>;

    /// A time-limited read URL for a relative object path.
    async fn signed_url(&self, path: &str, expires_secs: u32) -> Result<String>;

    /// Delete the object a public URL points at. Unparseable URLs are
    /// logged and treated as already gone.
    async fn delete_by_url(&self, url: &str) -> Result<()>;

    /// Download an object by its relative path (used for ROI documents
    /// stored as files).
    async fn fetch(&self, path: &str) -> Result<Vec<u8>>;

    /// Relative object path of a public URL belonging to this store.
    fn object_path(&self, public_url: &str) -> Option<String>;
}

/// Evidence object path:
/// `cctv/{id}/{YYYY}/{MM}/{DD}/{class}_{HHMMSS}_{8hex}.jpg`.
///
/// The random suffix carries 32 bits, enough to make collisions between
/// same-second events negligible.
pub fn evidence_path(cctv_id: i32, class_name: &str, at: DateTime<FixedOffset>) -> String {
    let unique = Uuid::new_v4().simple().to_string();
    format!(
        "cctv/{}/{}/{}_{}_{}.jpg",
        cctv_id,
        at.format("%Y/%m/%d"),
        class_name,
        at.format("%H%M%S"),
        &unique[..8],
    )
}

/// Supabase storage bucket client.
#[derive(Debug, Clone)]
pub struct SupabaseStore {
    http: reqwest::Client,
    base_url: String,
    bucket: String,
    service_key: String,
}

impl SupabaseStore {
    pub fn new(base_url: impl Into<String>, bucket: impl Into<String>, service_key: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bucket: bucket.into(),
            service_key: service_key.into(),
        })
    }

    fn object_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url, self.bucket, path
        )
    }

    pub fn public_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, self.bucket, path
        )
    }

    /// Relative object path parsed from a public URL, if it belongs to this
    /// bucket.
    fn path_from_public_url(&self, url: &str) -> Option<String> {
        static PUBLIC_RE: OnceLock<Regex> = OnceLock::new();
        let re = PUBLIC_RE.get_or_init(|| {
            Regex::new(r"/public/(.+)$").unwrap_or_else(|e| unreachable!("static regex: {e}"))
        });
        let full = re.captures(url)?.get(1)?.as_str();
        let (bucket, path) = full.split_once('/')?;
        if bucket != self.bucket {
            return None;
        }
        Some(path.to_string())
    }
}

#[async_trait]
impl EvidenceStore for SupabaseStore {
    async fn upload(&self, bytes: Vec<u8>, content_type: &str, path: &str) -> Result<String> {
        let response = self
            .http
            .post(self.object_url(path))
            .bearer_auth(&self.service_key)
            .header(header::CONTENT_TYPE, content_type)
            .header(header::CACHE_CONTROL, "3600")
            .header("x-upsert", "true")
            .body(bytes)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(CoreError::Storage(format!(
                "upload of {path} failed (status={status}): {detail}"
            )));
        }

        Ok(self.public_url(path))
    }

    async fn signed_url(&self, path: &str, expires_secs: u32) -> Result<String> {
        let response = self
            .http
            .post(format!(
                "{}/storage/v1/object/sign/{}/{}",
                self.base_url, self.bucket, path
            ))
            .bearer_auth(&self.service_key)
            .json(&serde_json::json!({ "expiresIn": expires_secs }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(CoreError::Storage(format!(
                "signing {path} failed (status={})",
                response.status()
            )));
        }

        #[derive(serde::Deserialize)]
        struct Signed {
            #[serde(rename = "signedURL")]
            signed_url: String,
        }
        let signed: Signed = response.json().await?;
        Ok(format!(
            "{}/storage/v1{}",
            self.base_url,
            signed.signed_url
        ))
    }

    fn object_path(&self, public_url: &str) -> Option<String> {
        self.path_from_public_url(public_url)
    }

    async fn delete_by_url(&self, url: &str) -> Result<()> {
        let Some(path) = self.path_from_public_url(url) else {
            warn!("Could not extract object path from URL {url}; skipping delete");
            return Ok(());
        };

        let response = self
            .http
            .delete(self.object_url(&path))
            .bearer_auth(&self.service_key)
            .send()
            .await?;

        // A 404 means the object is already gone; the caller's goal holds.
        if !response.status().is_success() && response.status() != reqwest::StatusCode::NOT_FOUND {
            return Err(CoreError::Storage(format!(
                "delete of {path} failed (status={})",
                response.status()
            )));
        }
        Ok(())
    }

    async fn fetch(&self, path: &str) -> Result<Vec<u8>> {
        let response = self
            .http
            .get(self.object_url(path))
            .bearer_auth(&self.service_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(CoreError::Storage(format!(
                "fetch of {path} failed (status={})",
                response.status()
            )));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn store() -> SupabaseStore {
        SupabaseStore::new("https://proj.supabase.co", "violations", "service-key").unwrap()
    }

    #[test]
    fn evidence_path_matches_the_template() {
        let at = FixedOffset::east_opt(7 * 3600)
            .unwrap()
            .with_ymd_and_hms(2025, 3, 9, 14, 5, 33)
            .unwrap();
        let path = evidence_path(12, "no-helmet", at);
        assert!(
            path.starts_with("cctv/12/2025/03/09/no-helmet_140533_"),
            "unexpected path {path}"
        );
        assert!(path.ends_with(".jpg"));
        // 8-hex random suffix.
        let suffix = path
            .rsplit('_')
            .next()
            .unwrap()
            .trim_end_matches(".jpg");
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn evidence_paths_are_unique() {
        let at = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2025, 1, 1, 0, 0, 0)
            .unwrap();
        let a = evidence_path(1, "no-vest", at);
        let b = evidence_path(1, "no-vest", at);
        assert_ne!(a, b);
    }

    #[test]
    fn public_url_round_trips_to_path() {
        let store = store();
        let url = store.public_url("cctv/3/2025/01/02/no-helmet_101500_abcd1234.jpg");
        assert_eq!(
            store.path_from_public_url(&url).as_deref(),
            Some("cctv/3/2025/01/02/no-helmet_101500_abcd1234.jpg")
        );
    }

    #[test]
    fn foreign_urls_do_not_parse() {
        let store = store();
        assert!(store.path_from_public_url("https://elsewhere/img.jpg").is_none());
        assert!(store
            .path_from_public_url("https://proj.supabase.co/storage/v1/object/public/other-bucket/x.jpg")
            .is_none());
    }
}
