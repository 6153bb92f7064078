//! The per-document history stack: an ordered state sequence with two independent
//! pointers. Setting either pointer is a command round-trip, never a local
//! mutation - moving the active pointer changes host-rendered content.
//!
//! The model is a single linear undo sequence: selecting an older state and then
//! performing a new edit truncates the forward portion. That truncation happens
//! host-side; this proxy only observes it on the next fetch.

use std::sync::Arc;

use crate::channel::CommandChannel;
use crate::commands::{Command, Payload};
use crate::registry::DocumentHandle;
use crate::state::HistorySnapshot;
use crate::Error;

/// One recorded state, annotated with where the pointers sat at fetch time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoryState {
    pub index: usize,
    pub label: String,
    /// Whether this state is the current undo position.
    pub active: bool,
    /// Whether the history brush sources from this state.
    pub brush_source: bool,
}

#[derive(Clone)]
pub struct History {
    document: DocumentHandle,
    channel: Arc<CommandChannel>,
}
impl History {
    pub(crate) fn new(channel: Arc<CommandChannel>, document: DocumentHandle) -> Self {
        Self { document, channel }
    }

    /// Fetch the authoritative sequence and both pointers.
    pub async fn snapshot(&self) -> Result<HistorySnapshot, Error> {
        let payload = self
            .channel
            .send(self.document, Command::FetchHistory)
            .await?;
        match payload {
            Payload::History(history) => Ok(history),
            _ => Err(Error::malformed_response("fetchHistory")),
        }
    }
    /// The recorded states in chronological order, annotated with the pointers.
    pub async fn states(&self) -> Result<Vec<HistoryState>, Error> {
        let snapshot = self.snapshot().await?;
        Ok(snapshot
            .states
            .into_iter()
            .enumerate()
            .map(|(index, state)| HistoryState {
                index,
                label: state.label,
                active: index == snapshot.active,
                brush_source: index == snapshot.brush_source,
            })
            .collect())
    }

    /// Move the active pointer: the document's visible content jumps to that
    /// state, as if undoing/redoing there. An index beyond the host's sequence is
    /// a host rejection - the authoritative length lives host-side and our last
    /// fetch may already be stale.
    pub async fn set_active(&self, index: usize) -> Result<(), Error> {
        let payload = self
            .channel
            .send(self.document, Command::SetActiveHistoryState { index })
            .await?;
        match payload {
            Payload::None => Ok(()),
            _ => Err(Error::malformed_response("setActiveHistoryState")),
        }
    }
    /// Move the brush-source pointer. Independent of the active pointer; may
    /// reference any recorded state.
    pub async fn set_brush_source(&self, index: usize) -> Result<(), Error> {
        let payload = self
            .channel
            .send(self.document, Command::SetActiveHistoryBrushSource { index })
            .await?;
        match payload {
            Payload::None => Ok(()),
            _ => Err(Error::malformed_response("setActiveHistoryBrushSource")),
        }
    }
}
