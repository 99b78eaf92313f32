//! Queue of style edits requested from outside the foreground flow.

use std::sync::{Mutex, MutexGuard, PoisonError};

/// An edit applied later by [`super::StyleService::apply_pending_commands`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StyleCommand {
    /// Remove a style (qualified name) everywhere it is stored.
    Delete(String),
    /// Re-qualify a style under `prefix` (`""` for unprefixed).
    Move {
        /// Qualified name of the style.
        style: String,
        /// Target partition prefix.
        prefix: String,
    },
}

/// Lock-protected FIFO of [`StyleCommand`]s.
#[derive(Debug, Default)]
pub struct CommandQueue {
    commands: Mutex<Vec<StyleCommand>>,
}

impl CommandQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn commands(&self) -> MutexGuard<'_, Vec<StyleCommand>> {
        self.commands.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a command.
    pub fn enqueue(&self, command: StyleCommand) {
        tracing::debug!(?command, "Queued style command");
        self.commands().push(command);
    }

    /// Removes and returns every queued command in arrival order.
    #[must_use]
    pub fn drain(&self) -> Vec<StyleCommand> {
        std::mem::take(&mut *self.commands())
    }

    /// Number of queued commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands().len()
    }

    /// Returns `true` if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands().is_empty()
    }
}
