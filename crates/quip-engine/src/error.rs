//! Error type for `quip-engine`, generic over the backing store's error.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum EngineError<E: std::error::Error + 'static> {
  #[error("store error: {0}")]
  Store(#[source] E),

  /// A delivery row references a joke no longer present in the corpus.
  #[error("delivered joke {0} is missing from the corpus")]
  MissingJoke(Uuid),

  /// The on-demand lookup exceeded its deadline.
  #[error("daily joke lookup timed out")]
  Timeout,
}
