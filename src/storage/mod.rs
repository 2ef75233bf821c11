//! Object storage abstraction.
//!
//! Provides a unified write interface over S3 and the local filesystem.
//! The target is addressed by a URL or a bare bucket name; bare names
//! resolve to S3, matching the queue-to-S3 deployment this tool ships in.

mod local;
mod s3;

use bytes::Bytes;
use object_store::path::Path;
use object_store::{Attribute, Attributes, ObjectStore, PutOptions, PutPayload};
use regex::Regex;
use snafu::prelude::*;
use std::borrow::Cow;
use std::sync::{Arc, LazyLock};
use std::time::Instant;

use crate::emit;
use crate::error::{InvalidUrlSnafu, ObjectStoreSnafu, StorageError};
use crate::metrics::events::{RequestStatus, StorageRequest, StorageRequestDuration};

pub use local::LocalConfig;
pub use s3::S3Config;

/// A reference-counted storage provider.
pub type StorageProviderRef = Arc<StorageProvider>;

// URL patterns for supported storage targets
const S3_URL: &str = r"^[sS]3[aA]?://(?P<bucket>[a-z0-9\-\.]+)(/(?P<key>.+))?$";
const S3_PATH: &str =
    r"^https://s3\.(?P<region>[\w\-]+)\.amazonaws\.com/(?P<bucket>[a-z0-9\-\.]+)(/(?P<key>.+))?$";
const S3_VIRTUAL: &str =
    r"^https://(?P<bucket>[a-z0-9\-\.]+)\.s3\.(?P<region>[\w\-]+)\.amazonaws\.com(/(?P<key>.+))?$";
const S3_BARE_BUCKET: &str = r"^(?P<bucket>[a-z0-9][a-z0-9\-\.]*[a-z0-9])$";

const FILE_URI: &str = r"^file://(?P<path>.*)$";
const FILE_PATH: &str = r"^/(?P<path>.*)$";

static S3_MATCHERS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(S3_URL).unwrap(),
        Regex::new(S3_PATH).unwrap(),
        Regex::new(S3_VIRTUAL).unwrap(),
        Regex::new(S3_BARE_BUCKET).unwrap(),
    ]
});

static LOCAL_MATCHERS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![Regex::new(FILE_URI).unwrap(), Regex::new(FILE_PATH).unwrap()]
});

/// Parsed storage target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    S3(S3Config),
    Local(LocalConfig),
}

impl BackendConfig {
    /// Parse a URL or bare bucket name into a backend configuration.
    pub fn parse_url(url: &str) -> Result<Self, StorageError> {
        // Local patterns require an absolute path or file scheme, so the
        // two matcher sets are disjoint.
        if let Some(matches) = LOCAL_MATCHERS.iter().filter_map(|r| r.captures(url)).next() {
            return Ok(Self::parse_local(matches));
        }

        if let Some(matches) = S3_MATCHERS.iter().filter_map(|r| r.captures(url)).next() {
            return Ok(Self::parse_s3(matches));
        }

        InvalidUrlSnafu {
            url: url.to_string(),
        }
        .fail()
    }

    fn parse_s3(matches: regex::Captures) -> Self {
        let bucket = matches
            .name("bucket")
            .expect("bucket should always be available")
            .as_str()
            .to_string();

        let region = std::env::var("AWS_DEFAULT_REGION")
            .ok()
            .or_else(|| matches.name("region").map(|m| m.as_str().to_string()));

        let endpoint = std::env::var("AWS_ENDPOINT").ok();

        let key = matches.name("key").map(|m| m.as_str().into());

        BackendConfig::S3(S3Config {
            endpoint,
            region,
            bucket,
            key,
        })
    }

    fn parse_local(matches: regex::Captures) -> Self {
        let path = matches
            .name("path")
            .expect("path regex must contain a path group")
            .as_str();

        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };

        BackendConfig::Local(LocalConfig { path })
    }
}

/// Storage provider wrapping an [`ObjectStore`] for a single container.
///
/// Safe for concurrent use; batch workers share one provider through
/// [`StorageProviderRef`].
pub struct StorageProvider {
    object_store: Arc<dyn ObjectStore>,
    /// Key prefix within the container, when the URL carried one.
    prefix: Option<Path>,
    /// Whether the backend accepts per-object attributes. S3 does; the
    /// local filesystem rejects attribute-carrying writes.
    supports_attributes: bool,
    canonical_url: String,
}

impl std::fmt::Debug for StorageProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StorageProvider<{}>", self.canonical_url)
    }
}

impl StorageProvider {
    /// Create a storage provider for the given URL or bare bucket name.
    pub async fn for_url(url: &str) -> Result<Self, StorageError> {
        match BackendConfig::parse_url(url)? {
            BackendConfig::S3(config) => Self::construct_s3(config),
            BackendConfig::Local(config) => Self::construct_local(config).await,
        }
    }

    /// Wrap an existing object store.
    ///
    /// Used by tests to inject instrumented stores; production code goes
    /// through [`StorageProvider::for_url`].
    pub fn with_object_store(object_store: Arc<dyn ObjectStore>, canonical_url: &str) -> Self {
        Self {
            object_store,
            prefix: None,
            supports_attributes: true,
            canonical_url: canonical_url.to_string(),
        }
    }

    /// The resolved target URL, for logging.
    pub fn canonical_url(&self) -> &str {
        &self.canonical_url
    }

    /// Write an object with side-channel metadata attached.
    ///
    /// Metadata is carried as store-level attributes so operators can
    /// inspect objects without parsing their bodies.
    pub async fn put_with_metadata(
        &self,
        path: &Path,
        payload: Bytes,
        metadata: Vec<(&'static str, String)>,
    ) -> Result<(), StorageError> {
        let mut attributes = Attributes::new();
        if self.supports_attributes {
            for (name, value) in metadata {
                attributes.insert(Attribute::Metadata(name.into()), value.into());
            }
        }

        let options = PutOptions {
            attributes,
            ..Default::default()
        };

        let path = self.qualify_path(path);
        let start = Instant::now();
        let result = self
            .object_store
            .put_opts(&path, PutPayload::from(payload), options)
            .await;

        let status = if result.is_ok() {
            RequestStatus::Success
        } else {
            RequestStatus::Error
        };
        emit!(StorageRequest { status });
        emit!(StorageRequestDuration {
            duration: start.elapsed(),
        });

        result.context(ObjectStoreSnafu)?;
        Ok(())
    }

    /// Get the contents of an object.
    #[cfg(test)]
    pub async fn get(&self, path: &Path) -> Result<Bytes, StorageError> {
        let bytes = self
            .object_store
            .get(&self.qualify_path(path))
            .await
            .context(ObjectStoreSnafu)?
            .bytes()
            .await
            .context(ObjectStoreSnafu)?;
        Ok(bytes)
    }

    /// Qualify a path with the configured key prefix.
    fn qualify_path<'a>(&self, path: &'a Path) -> Cow<'a, Path> {
        match &self.prefix {
            Some(prefix) => Cow::Owned(prefix.parts().chain(path.parts()).collect()),
            None => Cow::Borrowed(path),
        }
    }
}
