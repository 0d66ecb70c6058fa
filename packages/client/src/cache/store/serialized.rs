//! Adapter from [`CacheStore`] to byte-oriented backends
//!
//! Durable or remote caches speak keys and blobs. [`SerializedStore`]
//! encodes each [`CacheKey`] as JSON and each [`CacheEntry`] as a JSON
//! [`EntryRecord`] keeping every field exactly: raw header bytes, the body,
//! both exchange timestamps to the nanosecond and the freshness lifetime.
//! A record that cannot be decoded, or whose derived validators disagree
//! with the recorded ones, is corrupt: it is removed and reported.

use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use dashmap::DashMap;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode, Version};
use serde::{Deserialize, Serialize};

use super::{CacheStore, KeyPredicate};
use crate::cache::cache_entry::{CacheEntry, EntryParts};
use crate::cache::cache_key::CacheKey;
use crate::error::{self, BoxError, Result};

const RECORD_FORMAT: u32 = 1;

/// Async key/blob storage
#[async_trait]
pub trait BlobBackend: Send + Sync + 'static {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn save(&self, key: String, value: Vec<u8>) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<bool>;
    async fn keys(&self) -> Result<Vec<String>>;
}

/// Blob backend held in a concurrent hash map
#[derive(Debug, Default)]
pub struct MemoryBlobBackend {
    blobs: DashMap<String, Vec<u8>>,
}

impl MemoryBlobBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

#[async_trait]
impl BlobBackend for MemoryBlobBackend {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.blobs.get(key).map(|blob| blob.value().clone()))
    }

    async fn save(&self, key: String, value: Vec<u8>) -> Result<()> {
        self.blobs.insert(key, value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        Ok(self.blobs.remove(key).is_some())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.blobs.iter().map(|blob| blob.key().clone()).collect())
    }
}

/// One header field line, value kept as raw bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderRecord {
    pub name: String,
    /// Base64 of the raw value bytes
    pub value: String,
}

/// Persisted form of a [`CacheEntry`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRecord {
    pub format: u32,
    pub status: u16,
    pub version: String,
    pub response_headers: Vec<HeaderRecord>,
    pub request_headers: Vec<HeaderRecord>,
    /// Base64 body
    pub body: String,
    pub request_time_nanos: u64,
    pub response_time_nanos: u64,
    pub freshness_lifetime_nanos: u64,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub age_value_secs: u64,
}

impl EntryRecord {
    #[must_use]
    pub fn from_entry(entry: &CacheEntry) -> Self {
        Self {
            format: RECORD_FORMAT,
            status: entry.status().as_u16(),
            version: version_name(entry.version()).to_string(),
            response_headers: header_records(entry.response_headers()),
            request_headers: header_records(entry.request_headers()),
            body: STANDARD.encode(entry.body()),
            request_time_nanos: nanos_since_epoch(entry.request_time()),
            response_time_nanos: nanos_since_epoch(entry.response_time()),
            freshness_lifetime_nanos: duration_nanos(entry.freshness_lifetime()),
            etag: entry.etag().map(str::to_string),
            last_modified: entry.last_modified().map(str::to_string),
            age_value_secs: entry.age_value().as_secs(),
        }
    }

    /// Rebuild and validate the entry
    pub fn into_entry(self) -> std::result::Result<CacheEntry, BoxError> {
        if self.format != RECORD_FORMAT {
            return Err(format!("unsupported record format {}", self.format).into());
        }
        let status = StatusCode::from_u16(self.status)?;
        let version = parse_version(&self.version)
            .ok_or_else(|| format!("unknown HTTP version `{}`", self.version))?;
        let body = Bytes::from(STANDARD.decode(self.body.as_bytes())?);

        let entry = CacheEntry::from_parts(EntryParts {
            status,
            version,
            response_headers: header_map(&self.response_headers)?,
            body,
            request_headers: header_map(&self.request_headers)?,
            request_time: SystemTime::UNIX_EPOCH + Duration::from_nanos(self.request_time_nanos),
            response_time: SystemTime::UNIX_EPOCH + Duration::from_nanos(self.response_time_nanos),
            freshness_lifetime: Duration::from_nanos(self.freshness_lifetime_nanos),
        });

        if entry.etag() != self.etag.as_deref()
            || entry.last_modified() != self.last_modified.as_deref()
            || entry.age_value().as_secs() != self.age_value_secs
        {
            return Err("recorded validators disagree with stored headers".into());
        }
        Ok(entry)
    }
}

/// [`CacheStore`] over any [`BlobBackend`]
#[derive(Debug, Default)]
pub struct SerializedStore<B> {
    backend: B,
}

impl<B: BlobBackend> SerializedStore<B> {
    #[must_use]
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Backend key for a cache key
    pub fn blob_key(key: &CacheKey) -> Result<String> {
        serde_json::to_string(key).map_err(error::store)
    }

    async fn drop_corrupt(&self, blob_key: &str, source: BoxError) -> error::Error {
        tracing::warn!(
            target: "revcache::cache::store",
            key = blob_key,
            error = %source,
            "Dropping corrupt cache record"
        );
        if let Err(err) = self.backend.remove(blob_key).await {
            tracing::warn!(
                target: "revcache::cache::store",
                key = blob_key,
                error = %err,
                "Failed to remove corrupt cache record"
            );
        }
        error::cache_corruption(source)
    }
}

#[async_trait]
impl<B: BlobBackend> CacheStore for SerializedStore<B> {
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        let blob_key = Self::blob_key(key)?;
        let Some(blob) = self.backend.load(&blob_key).await? else {
            return Ok(None);
        };

        let decoded = serde_json::from_slice::<EntryRecord>(&blob)
            .map_err(BoxError::from)
            .and_then(EntryRecord::into_entry);
        match decoded {
            Ok(entry) => Ok(Some(entry)),
            Err(source) => Err(self.drop_corrupt(&blob_key, source).await),
        }
    }

    async fn put(&self, key: CacheKey, entry: CacheEntry) -> Result<()> {
        let blob_key = Self::blob_key(&key)?;
        let record = serde_json::to_vec(&EntryRecord::from_entry(&entry)).map_err(error::store)?;
        self.backend.save(blob_key, record).await
    }

    async fn remove(&self, key: &CacheKey) -> Result<bool> {
        self.backend.remove(&Self::blob_key(key)?).await
    }

    async fn invalidate(&self, predicate: KeyPredicate<'_>) -> Result<usize> {
        let mut removed = 0;
        for blob_key in self.backend.keys().await? {
            let matches = match serde_json::from_str::<CacheKey>(&blob_key) {
                Ok(key) => predicate(&key),
                Err(err) => {
                    // Unreadable keys can never be looked up again
                    self.drop_corrupt(&blob_key, Box::new(err)).await;
                    continue;
                }
            };
            if matches && self.backend.remove(&blob_key).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

fn header_records(headers: &HeaderMap) -> Vec<HeaderRecord> {
    headers
        .iter()
        .map(|(name, value)| HeaderRecord {
            name: name.as_str().to_string(),
            value: STANDARD.encode(value.as_bytes()),
        })
        .collect()
}

fn header_map(records: &[HeaderRecord]) -> std::result::Result<HeaderMap, BoxError> {
    let mut headers = HeaderMap::with_capacity(records.len());
    for record in records {
        let name = HeaderName::from_bytes(record.name.as_bytes())?;
        let value = HeaderValue::from_bytes(&STANDARD.decode(record.value.as_bytes())?)?;
        headers.append(name, value);
    }
    Ok(headers)
}

fn version_name(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_2 => "HTTP/2.0",
        Version::HTTP_3 => "HTTP/3.0",
        _ => "HTTP/1.1",
    }
}

fn parse_version(name: &str) -> Option<Version> {
    match name {
        "HTTP/0.9" => Some(Version::HTTP_09),
        "HTTP/1.0" => Some(Version::HTTP_10),
        "HTTP/1.1" => Some(Version::HTTP_11),
        "HTTP/2.0" => Some(Version::HTTP_2),
        "HTTP/3.0" => Some(Version::HTTP_3),
        _ => None,
    }
}

fn nanos_since_epoch(time: SystemTime) -> u64 {
    duration_nanos(time.duration_since(SystemTime::UNIX_EPOCH).unwrap_or_default())
}

fn duration_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}
