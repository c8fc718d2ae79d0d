//! Draining runtime progress streams.
//!
//! Pull and push responses are streams of status events. Leaving one
//! unread can leave the operation half-done on the runtime side, so each is
//! consumed to the end, under a time bound.

use std::fmt::{Debug, Display};
use std::time::Duration;

use futures::{Stream, StreamExt};
use imagefs_core::error::{ImagefsError, Result};

/// Consume `stream` until it ends, logging each event.
///
/// Returns the number of events seen. The first error event aborts with
/// `RuntimeFailure`; exceeding `limit` aborts with `Timeout`.
pub async fn drain_stream<S, T, E>(operation: &str, stream: S, limit: Duration) -> Result<usize>
where
    S: Stream<Item = std::result::Result<T, E>>,
    T: Debug,
    E: Display,
{
    let drain = async {
        let mut stream = std::pin::pin!(stream);
        let mut events = 0usize;
        while let Some(item) = stream.next().await {
            match item {
                Ok(event) => {
                    events += 1;
                    tracing::debug!(operation, ?event, "Runtime progress");
                }
                Err(e) => return Err(ImagefsError::runtime(operation, e.to_string())),
            }
        }
        Ok(events)
    };

    match tokio::time::timeout(limit, drain).await {
        Ok(result) => result,
        Err(_) => Err(ImagefsError::Timeout(format!(
            "{} did not finish within {}s",
            operation,
            limit.as_secs()
        ))),
    }
}
