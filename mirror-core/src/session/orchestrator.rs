//! Session orchestration.
//!
//! Drives one mirroring session from nothing to a running stream:
//! push the server artifact, forward the port, start the server, connect
//! the video socket (retried), connect the control socket (once), then
//! pump video bytes into the decode worker until the session ends.
//!
//! The session task exclusively owns both sockets, the decode worker and
//! the server process. Everything it has acquired is released by a
//! single idempotent teardown, whichever way the session ends.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::AsyncReadExt;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::control::sender::{ControlSender, ControlWriter, PendingControl};
use crate::error::MirrorError;
use crate::event::MirrorEvent;
use crate::remote::executor::{RemoteExecutor, RemoteProcess};
use crate::remote::options::{REMOTE_SERVER_PATH, forward_args, forward_remove_args, push_args};
use crate::session::config::SessionConfig;
use crate::session::dialer::{BoxedStream, Dialer};
use crate::session::state::SessionState;
use crate::video::codec::CodecFactory;
use crate::video::pipeline::{DecodePipeline, PipelineExit, PipelineStats};

/// Socket read granularity on the video path.
const READ_CHUNK: usize = 64 * 1024;

// ── SessionReport ────────────────────────────────────────────────

/// Summary of a session that ended without a fatal error.
#[derive(Debug, Clone, Default)]
pub struct SessionReport {
    pub video_attempts: u32,
    pub control_connected: bool,
    /// Decode counters; `None` if the worker never ran or was detached.
    pub stats: Option<PipelineStats>,
}

// ── SessionOrchestrator ──────────────────────────────────────────

pub struct SessionOrchestrator {
    config: SessionConfig,
    executor: Arc<dyn RemoteExecutor>,
    dialer: Arc<dyn Dialer>,
    codecs: Arc<dyn CodecFactory>,
}

impl SessionOrchestrator {
    pub fn new(
        config: SessionConfig,
        executor: Arc<dyn RemoteExecutor>,
        dialer: Arc<dyn Dialer>,
        codecs: Arc<dyn CodecFactory>,
    ) -> Self {
        Self {
            config,
            executor,
            dialer,
            codecs,
        }
    }

    /// Spawn the session task. Presentation events go to `events`.
    pub fn start(self, events: mpsc::Sender<MirrorEvent>) -> SessionHandle {
        let cancel = CancellationToken::new();
        let (state_tx, state_rx) = watch::channel(SessionState::Idle);
        let (control, pending) = ControlSender::channel(self.config.control_queue);

        let task = tokio::spawn(self.run(events, pending, state_tx, cancel.clone()));

        SessionHandle {
            cancel,
            state: state_rx,
            control,
            task,
        }
    }

    async fn run(
        self,
        events: mpsc::Sender<MirrorEvent>,
        pending: PendingControl,
        state_tx: watch::Sender<SessionState>,
        cancel: CancellationToken,
    ) -> Result<SessionReport, MirrorError> {
        let mut live = Live::new(state_tx);

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            res = self.establish_and_stream(&mut live, events, pending) => Some(res),
        };

        let stats = self.teardown(&mut live).await;
        let report = SessionReport {
            video_attempts: live.video_attempts,
            control_connected: live.control_connected,
            stats,
        };

        match outcome {
            None => {
                info!("session closed");
                live.publish_with(SessionState::close);
                Ok(report)
            }
            Some(Err(e)) => {
                error!("session failed: {e}");
                let reason = e.to_string();
                live.publish_with(|s| s.fail(reason));
                Err(e)
            }
            // The stream loop only returns on error.
            Some(Ok(())) => {
                live.publish_with(SessionState::close);
                Ok(report)
            }
        }
    }

    async fn establish_and_stream(
        &self,
        live: &mut Live,
        events: mpsc::Sender<MirrorEvent>,
        pending: PendingControl,
    ) -> Result<(), MirrorError> {
        let serial = self.config.serial.as_str();
        let port = self.config.local_port;

        // ── Push ─────────────────────────────────────────────────
        live.advance(SessionState::begin_push)?;
        if tokio::fs::metadata(&self.config.server_file).await.is_err() {
            return Err(MirrorError::MissingArtifact(
                self.config.server_file.display().to_string(),
            ));
        }
        self.run_step("push", &push_args(&self.config.server_file, REMOTE_SERVER_PATH))
            .await?;

        // ── Forward ──────────────────────────────────────────────
        live.advance(SessionState::begin_forward)?;
        // Recorded up front: a cancel during the command may still leave
        // the forward in place.
        live.forwarded = Some(port);
        self.run_step("forward", &forward_args(port)).await?;

        // ── Start server ─────────────────────────────────────────
        live.advance(SessionState::begin_start_remote)?;
        let process = self
            .executor
            .spawn(serial, &self.config.server.launch_args())
            .await
            .map_err(|source| MirrorError::RemoteLaunch {
                step: "start server",
                source,
            })?;
        live.server = Some(process);
        tokio::time::sleep(self.config.start_delay).await;

        // ── Video ────────────────────────────────────────────────
        let (video, first) = self.connect_video(live).await?;
        let (pipeline, exit) = DecodePipeline::spawn(
            self.config.pipeline(),
            Arc::clone(&self.codecs),
            events,
        )?;
        live.pipeline = Some(pipeline);

        // ── Control ──────────────────────────────────────────────
        live.advance(SessionState::begin_control)?;
        let control = self.connect_control(pending).await;
        live.control_connected = control.is_some();
        live.control = control;

        // ── Stream ───────────────────────────────────────────────
        let with_control = live.control_connected;
        live.advance(|s| s.begin_streaming(with_control))?;
        self.pump(live, video, first, exit).await
    }

    async fn run_step(&self, step: &'static str, args: &[String]) -> Result<(), MirrorError> {
        let out = self
            .executor
            .run(&self.config.serial, args)
            .await
            .map_err(|source| MirrorError::RemoteLaunch { step, source })?;
        if !out.success() {
            return Err(MirrorError::RemoteCommand {
                step,
                status: out.status,
                output: out.output.trim().to_owned(),
            });
        }
        debug!(step, "remote step done");
        Ok(())
    }

    /// Connect the video socket, retrying on a fixed delay.
    ///
    /// An attempt only succeeds once the server's first byte arrives: the
    /// forward accepts connections before the server is listening and
    /// closes them straight away.
    async fn connect_video(&self, live: &mut Live) -> Result<(BoxedStream, Bytes), MirrorError> {
        let max = self.config.connect_attempts.max(1);
        loop {
            let attempt = live.advance(SessionState::begin_video_attempt)?;
            live.video_attempts = attempt;

            let err = match self.dialer.connect(self.config.local_port).await {
                Ok(mut stream) => {
                    match tokio::time::timeout(self.config.first_byte_timeout, stream.read_u8()).await {
                        Ok(Ok(byte)) => {
                            info!(attempt, "video socket connected");
                            return Ok((stream, Bytes::copy_from_slice(&[byte])));
                        }
                        Ok(Err(e)) => e,
                        Err(_) => io::Error::new(
                            io::ErrorKind::TimedOut,
                            format!("no data within {:?}", self.config.first_byte_timeout),
                        ),
                    }
                }
                Err(e) => e,
            };

            if attempt >= max {
                warn!(attempt, "video connect failed: {err}; giving up");
                return Err(MirrorError::VideoConnectExhausted { attempts: attempt });
            }
            debug!(attempt, max, "video connect failed: {err}; retrying");
            tokio::time::sleep(self.config.retry_delay).await;
        }
    }

    /// Single control connect; `None` leaves the session video-only.
    async fn connect_control(&self, pending: PendingControl) -> Option<ControlWriter> {
        if !self.config.server.control {
            info!("control disabled; streaming video only");
            return None;
        }
        match self.dialer.connect(self.config.local_port).await {
            Ok(stream) => {
                let (_, write) = tokio::io::split(stream);
                info!("control socket connected");
                Some(pending.attach(write))
            }
            Err(e) => {
                warn!("control socket unavailable, continuing video only: {e}");
                None
            }
        }
    }

    /// Forward video bytes to the decode worker until something breaks.
    async fn pump(
        &self,
        live: &mut Live,
        mut video: BoxedStream,
        first: Bytes,
        mut exit: oneshot::Receiver<PipelineExit>,
    ) -> Result<(), MirrorError> {
        let Some(pipeline) = live.pipeline.as_ref() else {
            return Err(MirrorError::ChannelClosed);
        };
        handoff(pipeline, first, &mut exit).await?;

        let mut buf = BytesMut::with_capacity(READ_CHUNK);
        loop {
            buf.reserve(READ_CHUNK);
            tokio::select! {
                exit = &mut exit => return Err(exit_error(exit.ok())),
                read = video.read_buf(&mut buf) => {
                    if read? == 0 {
                        return Err(MirrorError::VideoClosed);
                    }
                    handoff(pipeline, buf.split().freeze(), &mut exit).await?;
                }
            }
        }
    }

    /// Release everything the session acquired. Safe to call repeatedly.
    async fn teardown(&self, live: &mut Live) -> Option<PipelineStats> {
        let stats = match live.pipeline.take() {
            Some(pipeline) => pipeline.stop(self.config.stop_timeout).await,
            None => None,
        };
        if let Some(control) = live.control.take() {
            control.shutdown();
        }
        if let Some(mut server) = live.server.take() {
            server.terminate(self.config.stop_timeout).await;
        }
        if let Some(port) = live.forwarded.take() {
            match self
                .executor
                .run(&self.config.serial, &forward_remove_args(port))
                .await
            {
                Ok(out) if out.success() => debug!(port, "port forward removed"),
                Ok(out) => warn!(port, status = ?out.status, "removing port forward failed: {}", out.output.trim()),
                Err(e) => warn!(port, "removing port forward failed: {e}"),
            }
        }
        stats
    }
}

/// Queue `chunk` for the worker. If the worker is gone, its own exit
/// reason wins over the generic channel error.
async fn handoff(
    pipeline: &DecodePipeline,
    chunk: Bytes,
    exit: &mut oneshot::Receiver<PipelineExit>,
) -> Result<(), MirrorError> {
    pipeline
        .push(chunk)
        .await
        .map_err(|_| exit_error(exit.try_recv().ok()))
}

fn exit_error(exit: Option<PipelineExit>) -> MirrorError {
    match exit {
        Some(PipelineExit::Failed(e)) => e,
        _ => MirrorError::ChannelClosed,
    }
}

// ── Live ─────────────────────────────────────────────────────────

/// Resources held by a running session, plus its published state.
struct Live {
    state: SessionState,
    state_tx: watch::Sender<SessionState>,
    forwarded: Option<u16>,
    server: Option<Box<dyn RemoteProcess>>,
    pipeline: Option<DecodePipeline>,
    control: Option<ControlWriter>,
    video_attempts: u32,
    control_connected: bool,
}

impl Live {
    fn new(state_tx: watch::Sender<SessionState>) -> Self {
        Self {
            state: SessionState::Idle,
            state_tx,
            forwarded: None,
            server: None,
            pipeline: None,
            control: None,
            video_attempts: 0,
            control_connected: false,
        }
    }

    fn advance<T>(
        &mut self,
        step: impl FnOnce(&mut SessionState) -> Result<T, MirrorError>,
    ) -> Result<T, MirrorError> {
        let out = step(&mut self.state)?;
        self.publish();
        Ok(out)
    }

    fn publish_with(&mut self, step: impl FnOnce(&mut SessionState)) {
        step(&mut self.state);
        self.publish();
    }

    fn publish(&self) {
        info!(state = %self.state, "session state");
        self.state_tx.send_replace(self.state.clone());
    }
}

// ── SessionHandle ────────────────────────────────────────────────

/// Caller-side handle of a running session.
pub struct SessionHandle {
    cancel: CancellationToken,
    state: watch::Receiver<SessionState>,
    control: ControlSender,
    task: JoinHandle<Result<SessionReport, MirrorError>>,
}

impl SessionHandle {
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// A receiver that observes every published state.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Sender for control messages. Reports not-sent until the control
    /// socket is up.
    pub fn control(&self) -> &ControlSender {
        &self.control
    }

    /// Request teardown. Idempotent, valid in any state.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Wait until the state satisfies `f` or the session ends.
    pub async fn wait_for(&mut self, f: impl FnMut(&SessionState) -> bool) -> SessionState {
        let waited = self.state.wait_for(f).await.map(|s| s.clone());
        waited.unwrap_or_else(|_| self.state())
    }

    /// Wait for the session task to finish.
    pub async fn join(self) -> Result<SessionReport, MirrorError> {
        self.task
            .await
            .map_err(|e| MirrorError::Other(format!("session task failed: {e}")))?
    }
}

// ── Tests ────────────────────────────────────────────────────────
