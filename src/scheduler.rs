//! Periodic tick scheduling
//!
//! The engine is single-threaded by design: exactly one thread owns it and
//! calls [`tick`](crate::StreamingEngine::tick) on a fixed period.
//! [`TickDriver`] hosts that loop on a dedicated thread, taking ownership
//! of the engine so it can never be touched from anywhere else; other
//! threads interact with it purely through the command queue.

use crate::device::DeviceBuffer;
use crate::engine::StreamingEngine;
use crate::queue::{Command, CommandQueue};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Hosts a [`StreamingEngine`] tick loop on a dedicated thread
///
/// Dropping the driver shuts the loop down and joins the thread.
pub struct TickDriver {
    queue: CommandQueue,
    stop_flag: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl TickDriver {
    /// Move `engine` to a new thread and tick it every `period`
    ///
    /// The period must be strictly shorter than the real-time playback
    /// duration of one buffer region, or the device underruns before a
    /// refill lands; [`crate::StreamConfig::validate`] checks this for
    /// engines built from a [`crate::StreamConfig`].
    pub fn spawn<B>(mut engine: StreamingEngine<B>, period: Duration) -> Self
    where
        B: DeviceBuffer + Send + 'static,
    {
        let queue = engine.queue();
        let stop_flag = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop_flag);

        let thread = std::thread::spawn(move || {
            while !flag.load(Ordering::Relaxed) {
                engine.tick();
                std::thread::sleep(period);
            }
        });

        TickDriver {
            queue,
            stop_flag,
            thread: Some(thread),
        }
    }

    /// Queue a request to stream the raw PCM file at `path`
    pub fn play(&self, path: impl Into<PathBuf>) {
        self.queue.push(Command::Play(path.into()));
    }

    /// Queue a pause request (reserved; currently ignored)
    pub fn pause(&self) {
        self.queue.push(Command::Pause);
    }

    /// Queue a request to stop playback
    pub fn stop(&self) {
        self.queue.push(Command::Stop);
    }

    /// Clone of the command queue, for other producer threads
    pub fn queue(&self) -> CommandQueue {
        self.queue.clone()
    }

    /// Stop the tick loop and join its thread
    pub fn shutdown(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for TickDriver {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StreamConfig;
    use crate::device::MemoryDevice;
    use std::io::Write;

    fn spawn_driver(period_ms: u64) -> TickDriver {
        let config = StreamConfig {
            seconds: 1,
            notify_positions: [25, 75],
            tick_period_ms: 100,
        };
        let mut device = MemoryDevice;
        let engine = StreamingEngine::new(&mut device, &config).expect("construct engine");
        TickDriver::spawn(engine, Duration::from_millis(period_ms))
    }

    #[test]
    fn test_shutdown_joins_the_thread() {
        let mut driver = spawn_driver(1);
        driver.shutdown();
        assert!(driver.thread.is_none());
        // Idempotent.
        driver.shutdown();
    }

    #[test]
    fn test_commands_are_consumed_by_the_loop() {
        let driver = spawn_driver(1);
        let mut file = tempfile::NamedTempFile::new().expect("create fixture");
        file.write_all(&[0x11; 4096]).expect("write fixture");
        file.flush().expect("flush fixture");

        driver.play(file.path());
        driver.stop();

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while !driver.queue().is_empty() && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(driver.queue().is_empty(), "tick thread drains the queue");
    }

    #[test]
    fn test_drop_shuts_down() {
        let driver = spawn_driver(1);
        drop(driver);
    }
}
