//! The producer-side callback seam.

use std::future::Future;

use async_trait::async_trait;

use crate::channel::Inlet;
use crate::error::BoxError;

/// A single-shot streaming computation.
///
/// The owning task invokes [`produce`](Producer::produce) exactly once,
/// handing over the producer facet of its result channel. Returning `Ok(())`
/// ends the stream normally; returning an error records it as the stream's
/// failure terminal and fails every subsequent pull.
///
/// Any async closure taking the inlet is a producer:
///
/// ```
/// use taskstream::{BoxError, Inlet, StreamingTask};
///
/// let task = StreamingTask::new(|inlet: Inlet<u32>| async move {
///     inlet.put(1).await?;
///     inlet.put(2).await?;
///     Ok::<(), BoxError>(())
/// });
/// # let _ = task;
/// ```
#[async_trait]
pub trait Producer<T>: Send + 'static {
    /// Runs the computation, depositing values through `inlet`.
    async fn produce(self: Box<Self>, inlet: Inlet<T>) -> Result<(), BoxError>;
}

#[async_trait]
impl<T, F, Fut> Producer<T> for F
where
    T: Send + 'static,
    F: FnOnce(Inlet<T>) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    async fn produce(self: Box<Self>, inlet: Inlet<T>) -> Result<(), BoxError> {
        (*self)(inlet).await
    }
}
