use crate::{Assembler, ChunkedUploadError};
use tokio::sync::watch;

/// Terminal outcome of writing one chunk.
///
/// `Ok(Some(_))` is returned for the chunk completing the upload, carrying
/// the deferred [Assembler] for it.
pub type ChunkOutcome = Result<Option<Assembler>, ChunkedUploadError>;

/// Write side of a [ChunkCompletion].
///
/// Completing consumes the completer, so an outcome can only ever be stored
/// once. Dropping it without completing resolves the outcome to
/// [ChunkedUploadError::MissingChunk].
#[derive(Debug)]
pub struct ChunkCompleter(watch::Sender<Option<ChunkOutcome>>);

impl ChunkCompleter {
    pub fn complete(self, outcome: ChunkOutcome) {
        self.0.send_replace(Some(outcome));
    }
}

/// Handle resolving to the outcome of a chunk write.
///
/// The outcome can be awaited any number of times, from any clone of the
/// handle, before or after the write finished; every call yields the same
/// stored outcome.
#[derive(Debug, Clone)]
pub struct ChunkCompletion(watch::Receiver<Option<ChunkOutcome>>);

impl ChunkCompletion {
    pub fn channel() -> (ChunkCompleter, ChunkCompletion) {
        let (tx, rx) = watch::channel(None);
        (ChunkCompleter(tx), ChunkCompletion(rx))
    }

    /// Wait until the outcome is stored, then return a copy of it.
    pub async fn outcome(&self) -> ChunkOutcome {
        let mut rx = self.0.clone();
        let outcome = match rx.wait_for(Option::is_some).await {
            Ok(outcome) => outcome.clone(),
            Err(_) => None,
        };
        outcome.unwrap_or(Err(ChunkedUploadError::MissingChunk))
    }

    /// Return the outcome if it is already stored, without waiting.
    pub fn try_outcome(&self) -> Option<ChunkOutcome> {
        self.0.borrow().clone()
    }
}
