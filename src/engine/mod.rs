//! Streaming engine
//!
//! Owns the circular buffer, the chunk reader and the command queue, and
//! advances them from a single periodic tick. Each tick performs at most
//! one unit of work: it drains one queued command, or refills one buffer
//! region, or does nothing. Producers on other threads only ever enqueue
//! commands; the tick is the sole consumer of the queue and the sole
//! mutator of playback state, so no locking is needed beyond the queue
//! itself.
//!
//! When the play cursor crosses a notification position, the region that
//! *was* playing before the crossing is refilled, so writing behind the
//! cursor never races it. The first end-of-file read records which
//! position will be signaled once the zero-padded tail has played out;
//! when that signal arrives, playback stops gracefully instead of cutting
//! off mid-region.

use crate::buffer::CircularNotifyBuffer;
use crate::config::StreamConfig;
use crate::device::{DeviceBuffer, OutputDevice};
use crate::queue::{Command, CommandQueue};
use crate::reader::{ChunkReader, ReadStatus};
use crate::{Result, StreamError};
use log::{debug, error, warn};
use std::fs::File;
use std::path::{Path, PathBuf};

/// One open audio file being streamed
///
/// Created by a `Play` command, destroyed by `Stop`, by a superseding
/// `Play`, or by the end-of-stream shutdown. Dropping the session closes
/// the file.
struct Session {
    path: PathBuf,
    reader: ChunkReader<File>,
    /// Position that, once signaled, means the zero-padded tail has been
    /// played and nothing real is left.
    eof_region: Option<usize>,
}

/// Double-buffered PCM streaming engine
///
/// Commands are asynchronous: `play`, `pause` and `stop` enqueue a request
/// whose effect is observed on a later [`tick`](StreamingEngine::tick).
pub struct StreamingEngine<B> {
    buffer: CircularNotifyBuffer<B>,
    queue: CommandQueue,
    session: Option<Session>,
    playing: bool,
}

/// The region safe to refill after `sig_pos` was signaled
///
/// The region whose start the cursor just crossed is now playing; the
/// opposite one finished playing before the crossing.
fn opposite_region(sig_pos: usize) -> usize {
    1 - sig_pos
}

impl<B: DeviceBuffer> StreamingEngine<B> {
    /// Create an engine with a buffer allocated from `device`
    ///
    /// Fails if the configuration is invalid or the device cannot allocate
    /// and register the buffer; no engine comes into existence in that
    /// case.
    pub fn new<D>(device: &mut D, config: &StreamConfig) -> Result<Self>
    where
        D: OutputDevice<Buffer = B>,
    {
        config.validate()?;
        let buffer = CircularNotifyBuffer::new(
            device,
            crate::format::AudioFormat::pcm_mono_44100(),
            config.seconds,
            config.notify_positions,
        )?;

        Ok(StreamingEngine {
            buffer,
            queue: CommandQueue::new(),
            session: None,
            playing: false,
        })
    }

    /// Queue a request to stream the raw PCM file at `path`
    pub fn play(&self, path: impl Into<PathBuf>) {
        self.queue.push(Command::Play(path.into()));
    }

    /// Queue a pause request (reserved; currently ignored by the tick)
    pub fn pause(&self) {
        self.queue.push(Command::Pause);
    }

    /// Queue a request to stop playback and close the current file
    pub fn stop(&self) {
        self.queue.push(Command::Stop);
    }

    /// Clone of the command queue, for producers on other threads
    pub fn queue(&self) -> CommandQueue {
        self.queue.clone()
    }

    /// True while a stream is playing
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Path of the file currently being streamed, if any
    pub fn current_path(&self) -> Option<&Path> {
        self.session.as_ref().map(|session| session.path.as_path())
    }

    /// Mutable access to the circular buffer, for host-paced devices
    pub fn buffer_mut(&mut self) -> &mut CircularNotifyBuffer<B> {
        &mut self.buffer
    }

    /// Shared access to the circular buffer
    pub fn buffer(&self) -> &CircularNotifyBuffer<B> {
        &self.buffer
    }

    /// One scheduling step: handle one command, or perform one refill
    ///
    /// Must be called periodically from a single thread, with a period
    /// strictly shorter than the playback duration of one buffer region.
    pub fn tick(&mut self) {
        if self.handle_one_command() {
            return;
        }
        self.check_buffer_update();
    }

    /// Pop and handle at most one queued command
    ///
    /// Returns true if a command was handled; the buffer refill is skipped
    /// for that tick.
    fn handle_one_command(&mut self) -> bool {
        let Some(cmd) = self.queue.try_pop() else {
            return false;
        };

        match cmd {
            Command::Play(path) => {
                if let Err(err) = self.handle_play(&path) {
                    error!("cannot start streaming '{}': {}", path.display(), err);
                }
            }
            Command::Pause => {
                // Reserved for future use.
                debug!("pause requested; not implemented");
            }
            Command::Stop => self.stop_playing(),
        }

        true
    }

    /// Refill the buffer if the play cursor crossed a notification position
    fn check_buffer_update(&mut self) {
        if !self.playing {
            return;
        }

        let Some(sig_pos) = self.buffer.position_signaled() else {
            return;
        };

        let reached_padded_tail = self
            .session
            .as_ref()
            .is_some_and(|session| session.eof_region == Some(sig_pos));
        if reached_padded_tail {
            debug!("padded tail played out; stopping");
            self.stop_playing();
            return;
        }

        // Past EOF but not at the recorded position yet: the transfer
        // below queues a region of silence.
        self.transfer_chunk(sig_pos);
    }

    /// Read one chunk and write it into the region opposite `sig_pos`
    fn transfer_chunk(&mut self, sig_pos: usize) {
        let region = opposite_region(sig_pos);
        let size = self.buffer.region_size(region);

        let status = match self.session.as_mut() {
            Some(session) => session.reader.read(size),
            None => return,
        };

        match status {
            ReadStatus::Ok => {}
            ReadStatus::EndOfFile => self.note_eof(sig_pos),
            ReadStatus::Failed => {
                error!("error while reading the audio file; stopping playback");
                self.stop_playing();
                return;
            }
        }

        let result = match self.session.as_ref() {
            Some(session) => self.buffer.write_to_region(region, session.reader.data()),
            None => return,
        };

        if let Err(err) = result {
            error!("device write failed: {}", err);
            self.stop_playing();
        }
    }

    /// Record the position whose next signal means the stream is done
    fn note_eof(&mut self, sig_pos: usize) {
        if let Some(session) = self.session.as_mut() {
            if session.eof_region.is_none() {
                session.eof_region = Some(sig_pos);
                debug!(
                    "end of file reached; region {} holds the padded tail",
                    opposite_region(sig_pos)
                );
            }
        }
    }

    /// Open a file, prime the buffer and start playback
    ///
    /// Always tears down the previous session first, so two files are
    /// never open at once. On failure the engine is left stopped with no
    /// session, still accepting new commands.
    fn handle_play(&mut self, path: &Path) -> Result<()> {
        self.stop_playing();

        let file = File::open(path)?;

        // Prime everything from offset 0 up to the start of region 1:
        // region 1's wrapped tail plus the whole of region 0. Region 1 can
        // be larger than that span when both positions sit low in the
        // buffer, and later refills must still fit the reader.
        let prime_size = self.buffer.region_start(1);
        let reader_capacity = prime_size.max(self.buffer.region_size(1));
        let mut reader = ChunkReader::new(reader_capacity, file);

        let eof_region = match reader.read(prime_size) {
            ReadStatus::Ok => None,
            // The whole file fit in the initial span; position 1 will be
            // signaled once the cursor reaches the padded data.
            ReadStatus::EndOfFile => Some(1),
            ReadStatus::Failed => {
                return Err(StreamError::Other(format!(
                    "read error while priming the buffer from '{}'",
                    path.display()
                )));
            }
        };

        self.buffer.write(0, reader.data())?;

        self.session = Some(Session {
            path: path.to_path_buf(),
            reader,
            eof_region,
        });

        debug!("play '{}'", path.display());
        self.buffer.play()?;
        self.playing = true;

        Ok(())
    }

    /// Halt the device, close the file and clear the session state
    fn stop_playing(&mut self) {
        if self.playing {
            debug!("stop");
        }
        if let Err(err) = self.buffer.stop() {
            warn!("device stop failed: {}", err);
        }
        self.session = None;
        self.playing = false;
    }

    /// Make the current session's next read fail.
    #[cfg(test)]
    fn poison_reader(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.reader.poison();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{MemoryBuffer, MemoryDevice, NUM_NOTIFY_POSITIONS};
    use crate::format::AudioFormat;
    use std::io::Write;

    const CONFIG: StreamConfig = StreamConfig {
        seconds: 1,
        notify_positions: [25, 75],
        tick_period_ms: 100,
    };

    fn make_engine() -> StreamingEngine<MemoryBuffer> {
        let mut device = MemoryDevice;
        StreamingEngine::new(&mut device, &CONFIG).expect("construct engine")
    }

    fn pcm_file(len: usize) -> tempfile::NamedTempFile {
        let data: Vec<u8> = (0..len).map(|i| (i % 249) as u8 | 1).collect();
        let mut file = tempfile::NamedTempFile::new().expect("create fixture");
        file.write_all(&data).expect("write fixture");
        file.flush().expect("flush fixture");
        file
    }

    fn pattern(range: std::ops::Range<usize>) -> Vec<u8> {
        range.map(|i| (i % 249) as u8 | 1).collect()
    }

    /// Drive the cursor until the given notification position is latched.
    fn cross_position(engine: &mut StreamingEngine<MemoryBuffer>, position: usize) {
        let start = engine.buffer().region_start(position);
        let device = engine.buffer_mut().device_mut();
        let cap = device.capacity();
        let cursor = device.play_cursor();
        let distance = (start + cap - cursor) % cap;
        device.advance_play_cursor(if distance == 0 { cap } else { distance });
    }

    #[test]
    fn test_play_primes_buffer_and_starts() {
        let mut engine = make_engine();
        let file = pcm_file(200_000);

        engine.play(file.path());
        assert!(!engine.is_playing(), "commands take effect on a tick");

        engine.tick();
        assert!(engine.is_playing());
        assert_eq!(engine.current_path(), Some(file.path()));

        let prime = engine.buffer().region_start(1);
        let contents = engine.buffer().device().contents();
        assert_eq!(&contents[..prime], &pattern(0..prime)[..]);
        assert!(engine.buffer().device().is_playing());
        assert_eq!(engine.buffer().device().play_cursor(), 0);
    }

    #[test]
    fn test_refill_targets_opposite_region() {
        let mut engine = make_engine();
        let file = pcm_file(200_000);
        engine.play(file.path());
        engine.tick();

        // Crossing position 0 means region 0 just started playing, so the
        // engine must refill region 1 with the next file bytes.
        cross_position(&mut engine, 0);
        engine.tick();

        let start1 = engine.buffer().region_start(1);
        let capacity = engine.buffer().capacity();
        let size1 = engine.buffer().region_size(1);
        let expected = pattern(start1..start1 + size1);
        let tail_len = capacity - start1;

        let contents = engine.buffer().device().contents();
        assert_eq!(&contents[start1..], &expected[..tail_len]);
        assert_eq!(&contents[..size1 - tail_len], &expected[tail_len..]);
        assert!(engine.is_playing());
    }

    #[test]
    fn test_one_unit_of_work_per_tick() {
        let mut engine = make_engine();
        let file = pcm_file(200_000);
        engine.play(file.path());
        engine.tick();

        // A queued command wins over a pending refill; the signal stays
        // latched for the following tick.
        cross_position(&mut engine, 0);
        engine.pause();
        engine.tick();

        let start1 = engine.buffer().region_start(1);
        let stale = &engine.buffer().device().contents()[start1..start1 + 16];
        assert!(stale.iter().all(|&b| b == 0), "refill must wait a tick");

        engine.tick();
        let fresh = &engine.buffer().device().contents()[start1..start1 + 16];
        assert_eq!(fresh, &pattern(start1..start1 + 16)[..]);
    }

    #[test]
    fn test_play_supersedes_play() {
        let mut engine = make_engine();
        let first = pcm_file(200_000);
        let second = pcm_file(150_000);

        engine.play(first.path());
        engine.play(second.path());

        engine.tick();
        assert_eq!(engine.current_path(), Some(first.path()));

        engine.tick();
        assert_eq!(engine.current_path(), Some(second.path()));
        assert!(engine.is_playing());
    }

    #[test]
    fn test_short_file_pads_then_stops() {
        let mut engine = make_engine();
        // Fits entirely in the primed span, so EOF is hit while priming.
        let file = pcm_file(1_000);

        engine.play(file.path());
        engine.tick();
        assert!(engine.is_playing());

        let stops_after_start = engine.buffer().device().stop_count();

        // Position 0 signals first: not the recorded EOF position, so the
        // engine queues a region of silence and keeps playing.
        cross_position(&mut engine, 0);
        engine.tick();
        assert!(engine.is_playing());

        // Position 1 is the recorded EOF position: the padded tail has
        // been played, so the stream shuts down.
        cross_position(&mut engine, 1);
        engine.tick();
        assert!(!engine.is_playing());
        assert!(engine.current_path().is_none(), "session torn down");
        assert_eq!(
            engine.buffer().device().stop_count(),
            stops_after_start + 1,
            "device stop invoked exactly once"
        );
    }

    #[test]
    fn test_eof_mid_stream_keeps_playing_through_tail() {
        let mut engine = make_engine();
        let prime = 88_200 * 3 / 4;
        // EOF lands inside the first refill after priming.
        let file = pcm_file(prime + 1_000);

        engine.play(file.path());
        engine.tick();

        cross_position(&mut engine, 0);
        engine.tick();
        assert!(engine.is_playing(), "padding is queued, not fatal");

        // The next crossing of position 0 replays the recorded EOF
        // position and stops the stream.
        cross_position(&mut engine, 1);
        engine.tick();
        assert!(engine.is_playing());

        cross_position(&mut engine, 0);
        engine.tick();
        assert!(!engine.is_playing());
    }

    #[test]
    fn test_missing_file_leaves_engine_stopped() {
        let mut engine = make_engine();
        engine.play("/nonexistent/audio.pcm");
        engine.tick();

        assert!(!engine.is_playing());
        assert!(engine.current_path().is_none());

        // Still alive: a valid play is accepted afterwards.
        let file = pcm_file(200_000);
        engine.play(file.path());
        engine.tick();
        assert!(engine.is_playing());
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_path_leaves_engine_stopped() {
        // On Unix a directory can be opened but not read, so the failure
        // surfaces in the priming read rather than in the open.
        let dir = tempfile::tempdir().expect("create fixture dir");
        let mut engine = make_engine();

        engine.play(dir.path());
        engine.tick();

        assert!(!engine.is_playing());
        assert!(engine.current_path().is_none(), "no session survives");
        assert!(!engine.buffer().device().is_playing());

        // Still alive: a valid play is accepted afterwards.
        let file = pcm_file(200_000);
        engine.play(file.path());
        engine.tick();
        assert!(engine.is_playing());
    }

    #[test]
    fn test_read_failure_mid_stream_stops_session() {
        let mut engine = make_engine();
        let file = pcm_file(200_000);
        engine.play(file.path());
        engine.tick();
        assert!(engine.is_playing());

        let stops_after_start = engine.buffer().device().stop_count();

        // The next refill read reports a failure instead of data.
        engine.poison_reader();
        cross_position(&mut engine, 0);
        engine.tick();

        assert!(!engine.is_playing(), "read failure stops the session");
        assert!(engine.current_path().is_none());
        assert_eq!(
            engine.buffer().device().stop_count(),
            stops_after_start + 1,
            "device stop invoked exactly once"
        );

        // The engine is still usable after the failure.
        engine.play(file.path());
        engine.tick();
        assert!(engine.is_playing());
    }

    #[test]
    fn test_stop_command_closes_session() {
        let mut engine = make_engine();
        let file = pcm_file(200_000);
        engine.play(file.path());
        engine.tick();
        assert!(engine.is_playing());

        engine.stop();
        engine.tick();
        assert!(!engine.is_playing());
        assert!(engine.current_path().is_none());
    }

    #[test]
    fn test_pause_is_a_noop() {
        let mut engine = make_engine();
        let file = pcm_file(200_000);
        engine.play(file.path());
        engine.tick();

        engine.pause();
        engine.tick();
        assert!(engine.is_playing(), "pause is reserved and ignored");
    }

    /// Device wrapper that can be told to fail its next lock, to exercise
    /// the recoverable device-error path.
    struct FailingBuffer {
        inner: MemoryBuffer,
        fail_next_lock: bool,
    }

    struct FailingDevice;

    impl OutputDevice for FailingDevice {
        type Buffer = FailingBuffer;

        fn create_buffer(
            &mut self,
            format: AudioFormat,
            size_bytes: usize,
        ) -> crate::Result<FailingBuffer> {
            Ok(FailingBuffer {
                inner: MemoryDevice.create_buffer(format, size_bytes)?,
                fail_next_lock: false,
            })
        }
    }

    impl DeviceBuffer for FailingBuffer {
        fn capacity(&self) -> usize {
            self.inner.capacity()
        }

        fn register_notifications(
            &mut self,
            offsets: [usize; NUM_NOTIFY_POSITIONS],
        ) -> crate::Result<()> {
            self.inner.register_notifications(offsets)
        }

        fn poll_signaled(&mut self, index: usize) -> bool {
            self.inner.poll_signaled(index)
        }

        fn lock(
            &mut self,
            offset: usize,
            size: usize,
        ) -> crate::Result<(&mut [u8], Option<&mut [u8]>)> {
            if self.fail_next_lock {
                self.fail_next_lock = false;
                return Err(StreamError::Device("injected lock failure".into()));
            }
            self.inner.lock(offset, size)
        }

        fn unlock(&mut self) -> crate::Result<()> {
            self.inner.unlock()
        }

        fn set_position(&mut self, offset: usize) -> crate::Result<()> {
            self.inner.set_position(offset)
        }

        fn play_looping(&mut self) -> crate::Result<()> {
            self.inner.play_looping()
        }

        fn stop(&mut self) -> crate::Result<()> {
            self.inner.stop()
        }
    }

    #[test]
    fn test_device_failure_stops_session_but_engine_survives() {
        let mut device = FailingDevice;
        let mut engine = StreamingEngine::new(&mut device, &CONFIG).expect("construct engine");
        let file = pcm_file(200_000);

        engine.play(file.path());
        engine.tick();
        assert!(engine.is_playing());

        engine.buffer_mut().device_mut().fail_next_lock = true;
        let start0 = engine.buffer().region_start(0);
        let device = engine.buffer_mut().device_mut();
        let cursor = device.inner.play_cursor();
        let cap = device.inner.capacity();
        device
            .inner
            .advance_play_cursor((start0 + cap - cursor) % cap);
        engine.tick();

        assert!(!engine.is_playing(), "write failure stops the session");
        assert!(engine.current_path().is_none());

        // The engine is still usable after the failure.
        engine.play(file.path());
        engine.tick();
        assert!(engine.is_playing());
    }
}
