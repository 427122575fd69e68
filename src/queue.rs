//! Playback command queue
//!
//! Multi-producer/single-consumer FIFO carrying playback requests from any
//! thread into the engine tick. Producers only ever enqueue; the engine is
//! the sole consumer and drains at most one command per tick, in strict
//! arrival order.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

/// A playback request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start streaming the raw PCM file at the given path, superseding any
    /// current playback
    Play(PathBuf),
    /// Reserved; currently accepted and ignored
    Pause,
    /// Stop playback and close the current file
    Stop,
}

/// Cloneable MPSC FIFO of playback commands
///
/// Clones share the same underlying queue, so any number of producer
/// threads can hold a handle while the engine holds the consuming one.
#[derive(Clone, Default)]
pub struct CommandQueue {
    inner: Arc<Mutex<VecDeque<Command>>>,
}

impl CommandQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a command; never blocks the caller
    pub fn push(&self, cmd: Command) {
        self.inner.lock().push_back(cmd);
    }

    /// Dequeue the oldest command without blocking
    pub fn try_pop(&self) -> Option<Command> {
        self.inner.lock().pop_front()
    }

    /// Number of commands waiting
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// True if no commands are waiting
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
