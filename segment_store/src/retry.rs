//! Retry driver wiring [`backoff::RetryLoop`] around [`flush_once`].

use crate::chunk::ColumnVectorCodec;
use crate::error::Result;
use crate::flush::{flush_once, FlushRequest};
use crate::store::PersistentStore;
use backoff::{RetriesExhausted, RetryConfig, RetryLoop};
use data_types::ChunkIdGenerator;
use observability_deps::tracing::warn;

impl From<RetriesExhausted> for crate::error::Error {
    fn from(source: RetriesExhausted) -> Self {
        warn!(
            attempts = source.attempts,
            "giving up on flush after exhausting the retry budget"
        );
        crate::error::Error::RetriesExhausted {
            attempts: source.attempts,
        }
    }
}

/// Flush `request`, retrying on compare-and-swap conflicts until it lands or
/// `config.max_attempts` is exhausted.
pub async fn flush_with_retry(
    store: &dyn PersistentStore,
    request: &FlushRequest,
    id_generator: &ChunkIdGenerator,
    codec: &dyn ColumnVectorCodec,
    config: RetryConfig,
) -> Result<()> {
    RetryLoop::new(config)
        .run("flush", || flush_once(store, request, id_generator, codec))
        .await
}
