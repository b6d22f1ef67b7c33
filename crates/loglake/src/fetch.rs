//! Retrying object fetch with bounded exponential backoff.

use std::time::Duration;

use anyhow::{Context, Result};
use backon::{ExponentialBuilder, Retryable};
use bytes::Bytes;
use object_store::{ObjectStore, path::Path};

use diagnostics::*;

/// Default number of attempts per object (one initial try plus two
/// retries, waiting 2^attempt seconds in between).
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;

/// Fetch the full byte content of one object, retrying transient
/// failures. After `max_attempts` tries the last error propagates;
/// the caller decides whether that is fatal to the run.
pub async fn fetch_object(
    store: &dyn ObjectStore,
    location: &Path,
    max_attempts: usize,
) -> Result<Bytes> {
    let backoff = ExponentialBuilder::default()
        .with_min_delay(Duration::from_secs(1))
        .with_factor(2.0)
        .with_max_times(max_attempts.saturating_sub(1));

    let fetch = || async {
        let result = store.get(location).await?;
        result.bytes().await
    };

    fetch
        .retry(backoff)
        .notify(|err: &object_store::Error, delay: Duration| {
            let name: &str = location.as_ref();
            let seconds = delay.as_secs();
            let message = err.to_string();
            warn!(
                "Error downloading object {name}, retrying in {seconds}s: {message}",
                name,
                seconds,
                message,
            );
        })
        .await
        .with_context(|| format!("Failed to download object {location}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::PutPayload;
    use object_store::memory::InMemory;

    #[tokio::test]
    async fn test_fetches_object_bytes() {
        let store = InMemory::new();
        let location = Path::from("y=2024/m=06/d=18/part-0.json");
        store
            .put(&location, PutPayload::from_static(b"{\"a\":1}\n"))
            .await
            .unwrap();

        let bytes = fetch_object(&store, &location, DEFAULT_MAX_ATTEMPTS)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"{\"a\":1}\n");
    }

    #[tokio::test]
    async fn test_missing_object_fails_after_retries() {
        let store = InMemory::new();
        let location = Path::from("absent.json");
        // Single attempt keeps the test fast
        let result = fetch_object(&store, &location, 1).await;
        assert!(result.is_err());
    }
}
