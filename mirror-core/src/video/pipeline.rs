//! Background decode worker.
//!
//! One dedicated OS thread per session owns the receive buffer, the
//! demuxer state and the codec instance; nothing else touches them.
//! Socket bytes reach it through a bounded single-producer/single-consumer
//! queue, in arrival order; a full queue makes [`DecodePipeline::push`]
//! wait, which in turn stops the socket from being read. Decoded frames leave through the
//! presentation channel (see [`MirrorEvent`]).
//!
//! ```text
//! video socket ─push(Bytes)─► [queue] ─► StreamDemuxer ─► FrameCodec
//!                                                            │
//!                        MirrorEvent::FrameDecoded ◄─ PixelConverter
//! ```
//!
//! Stopping is cooperative: the running flag is checked on every loop
//! iteration, and [`DecodePipeline::stop`] waits a bounded time before
//! detaching a worker that failed to notice.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc as std_mpsc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, trace, warn};

use crate::error::MirrorError;
use crate::event::MirrorEvent;
use crate::video::codec::{CodecFactory, CodecOptions, FrameCodec};
use crate::video::convert::ConverterCache;
use crate::video::demux::{DemuxEvent, DemuxLimits, StreamDemuxer};
use crate::video::types::{VideoCodec, VideoPacket};

/// Pause before retrying a push into a full queue.
const QUEUE_FULL_BACKOFF: Duration = Duration::from_millis(2);

// ── PipelineConfig ───────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub codec: VideoCodec,
    pub options: CodecOptions,
    pub limits: DemuxLimits,
    /// How often an idle worker re-checks the running flag.
    pub poll_interval: Duration,
    /// Chunks queued for the worker before `push` has to wait.
    pub queue_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            codec: VideoCodec::H264,
            options: CodecOptions::default(),
            limits: DemuxLimits::default(),
            poll_interval: Duration::from_millis(20),
            queue_capacity: 64,
        }
    }
}

// ── PipelineStats ────────────────────────────────────────────────

/// Counters collected by the worker over its lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub bytes: u64,
    pub packets: u64,
    pub frames: u64,
    pub decode_errors: u64,
    /// Frames the presentation channel had no room for.
    pub dropped_frames: u64,
}

// ── PipelineExit ─────────────────────────────────────────────────

/// Why the worker stopped. Reported exactly once.
#[derive(Debug)]
pub enum PipelineExit {
    /// The running flag was cleared.
    Stopped,
    /// The producer side went away.
    InputClosed,
    /// Decoder initialisation failed or the stream broke framing.
    Failed(MirrorError),
}

// ── DecodePipeline ───────────────────────────────────────────────

/// Handle to the decode worker. Dropping it stops the worker.
pub struct DecodePipeline {
    input: Option<std_mpsc::SyncSender<Bytes>>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<PipelineStats>>,
}

impl DecodePipeline {
    /// Start the worker thread.
    ///
    /// The codec is opened on the worker; an open failure ends the
    /// worker and is reported through the returned exit signal.
    pub fn spawn(
        config: PipelineConfig,
        factory: Arc<dyn CodecFactory>,
        events: mpsc::Sender<MirrorEvent>,
    ) -> Result<(Self, oneshot::Receiver<PipelineExit>), MirrorError> {
        let (input, queue) = std_mpsc::sync_channel(config.queue_capacity.max(1));
        let (exit_tx, exit_rx) = oneshot::channel();
        let running = Arc::new(AtomicBool::new(true));

        let worker_running = Arc::clone(&running);
        let handle = std::thread::Builder::new()
            .name("video-decode".to_owned())
            .spawn(move || run_worker(config, factory, queue, events, worker_running, exit_tx))?;

        Ok((
            Self {
                input: Some(input),
                running,
                handle: Some(handle),
            },
            exit_rx,
        ))
    }

    /// Hand a chunk of socket bytes to the worker.
    ///
    /// Never blocks the calling thread; while the queue is full the
    /// future waits for the worker to catch up.
    pub async fn push(&self, chunk: Bytes) -> Result<(), MirrorError> {
        if chunk.is_empty() {
            return Ok(());
        }
        let Some(input) = &self.input else {
            return Err(MirrorError::ChannelClosed);
        };
        let mut chunk = chunk;
        let mut waited = false;
        loop {
            if !self.is_running() {
                return Err(MirrorError::ChannelClosed);
            }
            match input.try_send(chunk) {
                Ok(()) => return Ok(()),
                Err(std_mpsc::TrySendError::Full(back)) => {
                    if !waited {
                        debug!(len = back.len(), "decode queue full; waiting for worker");
                        waited = true;
                    }
                    chunk = back;
                    tokio::time::sleep(QUEUE_FULL_BACKOFF).await;
                }
                Err(std_mpsc::TrySendError::Disconnected(_)) => {
                    return Err(MirrorError::ChannelClosed);
                }
            }
        }
    }

    /// Whether the worker is still processing input.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
            && self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Signal the worker to stop and wait up to `timeout` for it.
    ///
    /// Returns the worker's counters, or `None` if it did not stop in
    /// time and was detached.
    pub async fn stop(mut self, timeout: Duration) -> Option<PipelineStats> {
        self.running.store(false, Ordering::Release);
        self.input.take();
        let handle = self.handle.take()?;

        let deadline = Instant::now() + timeout;
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                error!(?timeout, "decode worker did not stop in time; detaching it");
                return None;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        match handle.join() {
            Ok(stats) => {
                debug!(?stats, "decode worker joined");
                Some(stats)
            }
            Err(_) => {
                error!("decode worker panicked");
                None
            }
        }
    }
}

impl Drop for DecodePipeline {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

// ── Worker ───────────────────────────────────────────────────────

fn run_worker(
    config: PipelineConfig,
    factory: Arc<dyn CodecFactory>,
    queue: std_mpsc::Receiver<Bytes>,
    events: mpsc::Sender<MirrorEvent>,
    running: Arc<AtomicBool>,
    exit_tx: oneshot::Sender<PipelineExit>,
) -> PipelineStats {
    let codec = match factory.open(config.codec, &config.options) {
        Ok(codec) => codec,
        Err(e) => {
            error!(codec = %config.codec, "decoder initialisation failed: {e}");
            let _ = exit_tx.send(PipelineExit::Failed(MirrorError::DecoderInit(e)));
            running.store(false, Ordering::Release);
            return PipelineStats::default();
        }
    };
    info!(codec = %config.codec, "decode worker started");

    let mut worker = Worker {
        demuxer: StreamDemuxer::new(config.limits),
        codec,
        converters: ConverterCache::new(),
        events,
        pending: Vec::new(),
        identified: false,
        stats: PipelineStats::default(),
    };

    let exit = loop {
        if !running.load(Ordering::Acquire) {
            break PipelineExit::Stopped;
        }
        match queue.recv_timeout(config.poll_interval) {
            Ok(chunk) => {
                if let Err(e) = worker.process(&chunk, &running) {
                    error!("video stream aborted: {e}");
                    break PipelineExit::Failed(e);
                }
            }
            Err(std_mpsc::RecvTimeoutError::Timeout) => continue,
            Err(std_mpsc::RecvTimeoutError::Disconnected) => break PipelineExit::InputClosed,
        }
    };

    info!(stats = ?worker.stats, exit = ?exit, "decode worker finished");
    let _ = exit_tx.send(exit);
    running.store(false, Ordering::Release);
    worker.stats
}

struct Worker {
    demuxer: StreamDemuxer,
    codec: Box<dyn FrameCodec>,
    converters: ConverterCache,
    events: mpsc::Sender<MirrorEvent>,
    /// Scratch list reused across chunks.
    pending: Vec<DemuxEvent>,
    identified: bool,
    stats: PipelineStats,
}

impl Worker {
    /// Demux one chunk and act on every completed record.
    ///
    /// Records completed before a framing violation are still handled;
    /// the violation is returned afterwards.
    fn process(&mut self, chunk: &[u8], running: &AtomicBool) -> Result<(), MirrorError> {
        self.stats.bytes += chunk.len() as u64;
        let fed = self.demuxer.feed(chunk, &mut self.pending);

        let mut pending = std::mem::take(&mut self.pending);
        for event in pending.drain(..) {
            if !running.load(Ordering::Acquire) {
                break;
            }
            self.handle(event);
        }
        self.pending = pending;

        fed
    }

    fn handle(&mut self, event: DemuxEvent) {
        match event {
            DemuxEvent::DeviceNameReady(name) => {
                if self.identified {
                    return;
                }
                self.identified = true;
                info!(%name, "device identified");
                if self.events.try_send(MirrorEvent::DeviceIdentified(name)).is_err() {
                    warn!("presentation channel unavailable; device name dropped");
                }
            }
            DemuxEvent::ResolutionReady { width, height } => {
                info!(width, height, "stream started");
            }
            DemuxEvent::Packet(packet) => self.decode(packet),
        }
    }

    fn decode(&mut self, packet: VideoPacket) {
        self.stats.packets += 1;
        let len = packet.len();

        let Self {
            codec,
            converters,
            events,
            stats,
            ..
        } = self;

        let mut sink = |yuv: crate::video::codec::YuvFrame<'_>| {
            let Some(frame) = converters.get(yuv.width, yuv.height).convert(&yuv) else {
                warn!(width = yuv.width, height = yuv.height, "decoder produced an unusable picture");
                return;
            };
            stats.frames += 1;
            if events.try_send(MirrorEvent::FrameDecoded(frame)).is_err() {
                stats.dropped_frames += 1;
                trace!("presentation lagging; frame dropped");
            }
        };

        match codec.decode(packet, &mut sink) {
            Ok(n) if n > 1 => trace!(frames = n, len, "packet released several frames"),
            Ok(_) => {}
            Err(e) => {
                stats.decode_errors += 1;
                warn!(len, "packet skipped: {e}");
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CodecError, FramingError};
    use crate::video::codec::YuvFrame;

    /// Emits `n` grey 2x2 pictures per packet, where `n` is the first
    /// payload byte; 0xFF is rejected as corrupt.
    struct ByteCountCodec;

    impl FrameCodec for ByteCountCodec {
        fn decode(
            &mut self,
            packet: VideoPacket,
            sink: &mut dyn FnMut(YuvFrame<'_>),
        ) -> Result<usize, CodecError> {
            let n = packet.data[0];
            if n == 0xFF {
                return Err(CodecError::Rejected("corrupt".into()));
            }
            let y = [128u8; 4];
            let uv = [128u8; 1];
            for _ in 0..n {
                sink(YuvFrame {
                    width: 2,
                    height: 2,
                    y: &y,
                    u: &uv,
                    v: &uv,
                    y_stride: 2,
                    uv_stride: 1,
                });
            }
            Ok(n as usize)
        }
    }

    struct TestFactory {
        fail: bool,
    }

    impl CodecFactory for TestFactory {
        fn open(
            &self,
            _codec: VideoCodec,
            _options: &CodecOptions,
        ) -> Result<Box<dyn FrameCodec>, CodecError> {
            if self.fail {
                Err(CodecError::Setup("no hardware".into()))
            } else {
                Ok(Box::new(ByteCountCodec))
            }
        }
    }

    fn preamble(width: u32, height: u32) -> Vec<u8> {
        let mut s = vec![0u8];
        let mut name = [0u8; 64];
        name[..4].copy_from_slice(b"test");
        s.extend_from_slice(&name);
        s.extend_from_slice(&[0, 0, 0, 0]);
        s.extend_from_slice(&width.to_be_bytes());
        s.extend_from_slice(&height.to_be_bytes());
        s
    }

    fn packet(payload: &[u8]) -> Vec<u8> {
        let mut out = 0u64.to_be_bytes().to_vec();
        out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        out.extend_from_slice(payload);
        out
    }

    fn start(fail: bool) -> (DecodePipeline, oneshot::Receiver<PipelineExit>, mpsc::Receiver<MirrorEvent>) {
        let (tx, rx) = mpsc::channel(64);
        let (pipeline, exit) = DecodePipeline::spawn(
            PipelineConfig::default(),
            Arc::new(TestFactory { fail }),
            tx,
        )
        .unwrap();
        (pipeline, exit, rx)
    }

    async fn next_event(rx: &mut mpsc::Receiver<MirrorEvent>) -> MirrorEvent {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timeout")
            .expect("channel closed")
    }

    #[tokio::test]
    async fn corrupt_packet_is_skipped() {
        let (pipeline, _exit, mut rx) = start(false);

        let mut stream = preamble(2, 2);
        stream.extend(packet(&[1]));
        stream.extend(packet(&[0xFF]));
        stream.extend(packet(&[1]));
        pipeline.push(Bytes::from(stream)).await.unwrap();

        assert!(matches!(next_event(&mut rx).await, MirrorEvent::DeviceIdentified(n) if n == "test"));
        for _ in 0..2 {
            match next_event(&mut rx).await {
                MirrorEvent::FrameDecoded(f) => {
                    assert_eq!((f.width, f.height), (2, 2));
                    assert_eq!(f.data.len(), 16);
                }
                other => panic!("unexpected {other:?}"),
            }
        }

        let stats = pipeline.stop(Duration::from_secs(2)).await.unwrap();
        assert_eq!(stats.packets, 3);
        assert_eq!(stats.frames, 2);
        assert_eq!(stats.decode_errors, 1);
    }

    #[tokio::test]
    async fn one_packet_may_yield_several_frames() {
        let (pipeline, _exit, mut rx) = start(false);
        let mut stream = preamble(2, 2);
        stream.extend(packet(&[0]));
        stream.extend(packet(&[3]));
        pipeline.push(Bytes::from(stream)).await.unwrap();

        next_event(&mut rx).await;
        for _ in 0..3 {
            assert!(matches!(next_event(&mut rx).await, MirrorEvent::FrameDecoded(_)));
        }
        let stats = pipeline.stop(Duration::from_secs(2)).await.unwrap();
        assert_eq!(stats.frames, 3);
    }

    #[tokio::test]
    async fn bytes_split_across_pushes() {
        let (pipeline, _exit, mut rx) = start(false);
        let mut stream = preamble(2, 2);
        stream.extend(packet(&[1, 9, 9, 9]));
        for piece in stream.chunks(5) {
            pipeline.push(Bytes::copy_from_slice(piece)).await.unwrap();
        }
        next_event(&mut rx).await;
        assert!(matches!(next_event(&mut rx).await, MirrorEvent::FrameDecoded(_)));
        pipeline.stop(Duration::from_secs(2)).await.unwrap();
    }

    #[tokio::test]
    async fn decoder_init_failure_is_reported_once() {
        let (pipeline, exit, _rx) = start(true);
        let exit = tokio::time::timeout(Duration::from_secs(5), exit)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(exit, PipelineExit::Failed(MirrorError::DecoderInit(_))));
        assert!(pipeline.push(Bytes::from_static(b"x")).await.is_err());
    }

    #[tokio::test]
    async fn framing_violation_stops_worker() {
        let (pipeline, exit, mut rx) = start(false);
        pipeline.push(Bytes::from(preamble(0, 100))).await.unwrap();

        let exit = tokio::time::timeout(Duration::from_secs(5), exit)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(
            exit,
            PipelineExit::Failed(MirrorError::Framing(FramingError::InvalidResolution { .. }))
        ));
        // The name preceded the bad header and was still delivered.
        assert!(matches!(next_event(&mut rx).await, MirrorEvent::DeviceIdentified(_)));
        assert!(!pipeline.is_running());
    }

    /// Emits one picture per packet once the gate opens.
    struct GatedCodec(std_mpsc::Receiver<()>);

    impl FrameCodec for GatedCodec {
        fn decode(
            &mut self,
            _packet: VideoPacket,
            sink: &mut dyn FnMut(YuvFrame<'_>),
        ) -> Result<usize, CodecError> {
            let _ = self.0.recv();
            let y = [128u8; 4];
            let uv = [128u8; 1];
            sink(YuvFrame {
                width: 2,
                height: 2,
                y: &y,
                u: &uv,
                v: &uv,
                y_stride: 2,
                uv_stride: 1,
            });
            Ok(1)
        }
    }

    struct GatedFactory(std::sync::Mutex<Option<std_mpsc::Receiver<()>>>);

    impl CodecFactory for GatedFactory {
        fn open(
            &self,
            _codec: VideoCodec,
            _options: &CodecOptions,
        ) -> Result<Box<dyn FrameCodec>, CodecError> {
            let gate = self.0.lock().unwrap().take().unwrap();
            Ok(Box::new(GatedCodec(gate)))
        }
    }

    #[tokio::test]
    async fn full_queue_makes_push_wait() {
        let (gate_tx, gate_rx) = std_mpsc::channel();
        let (tx, mut rx) = mpsc::channel(64);
        let config = PipelineConfig {
            queue_capacity: 1,
            ..PipelineConfig::default()
        };
        let (pipeline, _exit) = DecodePipeline::spawn(
            config,
            Arc::new(GatedFactory(std::sync::Mutex::new(Some(gate_rx)))),
            tx,
        )
        .unwrap();

        // The worker takes the first chunk and blocks in the codec; the
        // second fills the queue.
        let mut first = preamble(2, 2);
        first.extend(packet(&[1]));
        pipeline.push(Bytes::from(first)).await.unwrap();
        pipeline.push(Bytes::from(packet(&[1]))).await.unwrap();
        assert!(matches!(next_event(&mut rx).await, MirrorEvent::DeviceIdentified(_)));

        let third = Bytes::from(packet(&[1]));
        let waiting = tokio::time::timeout(Duration::from_millis(100), pipeline.push(third.clone())).await;
        assert!(waiting.is_err(), "push into a full queue must wait");

        drop(gate_tx);
        tokio::time::timeout(Duration::from_secs(5), pipeline.push(third))
            .await
            .unwrap()
            .unwrap();
        for _ in 0..3 {
            assert!(matches!(next_event(&mut rx).await, MirrorEvent::FrameDecoded(_)));
        }
        let stats = pipeline.stop(Duration::from_secs(2)).await.unwrap();
        assert_eq!(stats.packets, 3);
    }

    #[tokio::test]
    async fn stop_reports_stopped() {
        let (pipeline, exit, _rx) = start(false);
        assert!(pipeline.is_running());
        let stats = pipeline.stop(Duration::from_secs(2)).await.unwrap();
        assert_eq!(stats, PipelineStats::default());
        let exit = exit.await.unwrap();
        assert!(matches!(exit, PipelineExit::Stopped | PipelineExit::InputClosed));
    }
}
