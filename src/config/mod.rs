//! Runtime configuration.
//!
//! The archiver is configured through the environment, the way the hosting
//! runtime injects settings. The concurrency cap is a compile-time constant
//! rather than per-call configuration.

use std::env;

/// Maximum number of messages archived concurrently within one batch.
///
/// Batches smaller than this use one worker per message.
pub const MAX_CONCURRENT_MESSAGES: usize = 10;

/// Environment variable naming the target bucket (or storage URL).
pub const BUCKET_ENV_VAR: &str = "ARCHIVE_BUCKET";

/// Bucket used when [`BUCKET_ENV_VAR`] is unset or empty.
const DEFAULT_BUCKET: &str = "default-bucket";

/// Archiver configuration resolved from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Target bucket name or storage URL.
    pub bucket: String,
}

impl Config {
    /// Resolve configuration from the environment.
    ///
    /// Falls back to [`DEFAULT_BUCKET`] when the variable is unset or empty,
    /// so a bare invocation always has a valid target.
    pub fn from_env() -> Self {
        let bucket = env::var(BUCKET_ENV_VAR)
            .ok()
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_BUCKET.to_string());

        Self { bucket }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Tests share one variable, so they must not interleave
    static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

    fn with_env_var<F, R>(key: &str, value: Option<&str>, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let _guard = ENV_LOCK.lock().unwrap();
        let original = env::var(key).ok();

        // SAFETY: these tests run serially and the original value is restored
        match value {
            Some(v) => unsafe { env::set_var(key, v) },
            None => unsafe { env::remove_var(key) },
        }

        let result = f();

        // SAFETY: restoring original environment state
        match original {
            Some(v) => unsafe { env::set_var(key, v) },
            None => unsafe { env::remove_var(key) },
        }

        result
    }

    #[test]
    fn test_bucket_from_env() {
        with_env_var(BUCKET_ENV_VAR, Some("archive-prod"), || {
            let config = Config::from_env();
            assert_eq!(config.bucket, "archive-prod");
        });
    }

    #[test]
    fn test_bucket_default_when_unset() {
        with_env_var(BUCKET_ENV_VAR, None, || {
            let config = Config::from_env();
            assert_eq!(config.bucket, "default-bucket");
        });
    }

    #[test]
    fn test_bucket_default_when_empty() {
        with_env_var(BUCKET_ENV_VAR, Some(""), || {
            let config = Config::from_env();
            assert_eq!(config.bucket, "default-bucket");
        });
    }
}
