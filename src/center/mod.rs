//! Message Center: the link's run loop.
//!
//! Two tasks make up a running link:
//!
//! - the **processing task** ([`MessageCenter::run`]) owns the telemetry state,
//!   the transports and the flight record. It is the only mutator of all three.
//! - the **command drain** parses operator messages and forwards them to the
//!   processing task over a bounded channel, so a bad command never reaches
//!   the state and never stalls the radio.
//!
//! ```text
//! WaitingForStart ──start──▶ Running ──stop / radio closed──▶ Draining ──▶ Stopped
//! ```

mod drain;
pub mod message;

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant};

use futures::{Stream, StreamExt};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::clock::LinkClock;
use crate::config::{DispatchConfig, LinkConfig, RadioConfig};
use crate::framing::{AirflowRecord, SensorRecord, pack, packs, unpack};
use crate::recorder::{COMMAND_PORT, FrameRecorder};
use crate::telemetry::{CommandDeltas, Observer, TelemetrySnapshot, TelemetryState};
use crate::transport::{Datagram, MatlabBridge, MatlabRequest, Transport, UdpTransport};
use crate::{LinkError, Result};

use drain::CommandDrain;
pub use message::{GuiMessage, OperatorCommand};

/// Lifecycle of the processing task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    WaitingForStart,
    Running,
    Draining,
    Stopped,
}

/// State mutations forwarded from the command drain.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum LinkRequest {
    SendCommand { time_token: Option<u32>, deltas: CommandDeltas },
    ZeroRig,
    UpdateAirflow { velocity: f64, differential_pressure: f64 },
}

/// Pushes throttled snapshots to the operator queue and the snapshot watch.
struct OperatorObserver {
    gui: mpsc::Sender<GuiMessage>,
    snapshots: watch::Sender<Option<Arc<TelemetrySnapshot>>>,
}

impl Observer for OperatorObserver {
    fn notify(&mut self, snapshot: &TelemetrySnapshot) {
        let states = snapshot.gui_states().to_vec();
        if self.gui.try_send(GuiMessage::ExpData { states }).is_err() {
            trace!("Operator queue full, dropping state update");
        }
        self.snapshots.send_replace(Some(Arc::new(snapshot.clone())));
    }
}

enum Event {
    Radio(Result<Option<Datagram>>),
    Matlab(Result<Option<Datagram>>),
    Request(Option<LinkRequest>),
}

/// Processing half of a running link.
pub struct MessageCenter {
    radio: Box<dyn Transport>,
    matlab: Option<MatlabBridge>,
    state: TelemetryState,
    recorder: Option<FrameRecorder>,
    requests: mpsc::Receiver<LinkRequest>,
    nodes: RadioConfig,
    dispatch: DispatchConfig,
    clock: LinkClock,
    max_dt: Duration,
    phase: watch::Sender<LoopPhase>,
    ready: watch::Receiver<bool>,
    cancel: CancellationToken,
}

impl MessageCenter {
    pub async fn run(mut self) {
        self.phase.send_replace(LoopPhase::WaitingForStart);
        if self.wait_for_start().await {
            info!("Started.");
            self.phase.send_replace(LoopPhase::Running);
            self.serve().await;
        }

        self.phase.send_replace(LoopPhase::Draining);
        self.cancel.cancel();
        if let Some(recorder) = self.recorder.take()
            && let Err(e) = recorder.close()
        {
            error!("Closing flight record failed: {}", e);
        }
        info!("Work end.");
        self.phase.send_replace(LoopPhase::Stopped);
    }

    /// Returns false when the link was stopped before it started.
    async fn wait_for_start(&mut self) -> bool {
        while !*self.ready.borrow_and_update() {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return false,
                changed = self.ready.changed() => {
                    if changed.is_err() {
                        return *self.ready.borrow();
                    }
                }
                _ = tokio::time::sleep(self.dispatch.start_poll()) => {
                    info!("Waiting for start...");
                }
            }
        }
        true
    }

    async fn serve(&mut self) {
        let poll = self.dispatch.poll_timeout();
        let mut requests_open = true;
        let mut radio_errors = 0u32;
        const MAX_BACKOFF_SHIFT: u32 = 5;

        loop {
            let event = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                request = self.requests.recv(), if requests_open => Event::Request(request),
                result = self.radio.recv() => Event::Radio(result),
                result = recv_matlab(self.matlab.as_mut()) => Event::Matlab(result),
                _ = tokio::time::sleep(poll) => continue,
            };

            let started = Instant::now();
            let recv_ts = self.clock.now_us();

            match event {
                Event::Radio(Ok(Some(datagram))) => {
                    radio_errors = 0;
                    self.handle_radio(&datagram, recv_ts);
                }
                Event::Radio(Ok(None)) => {
                    info!("Radio transport closed");
                    break;
                }
                Event::Radio(Err(e)) => {
                    radio_errors += 1;
                    warn!("Radio receive failed ({}): {}", radio_errors, e);
                    let backoff = Duration::from_millis(50 * (1 << radio_errors.min(MAX_BACKOFF_SHIFT)));
                    tokio::time::sleep(backoff.min(poll)).await;
                    continue;
                }
                Event::Matlab(Ok(Some(datagram))) => self.handle_matlab(&datagram).await,
                Event::Matlab(Ok(None)) => {
                    info!("Matlab bridge closed");
                    self.matlab = None;
                }
                Event::Matlab(Err(e)) => warn!("Matlab receive failed: {}", e),
                Event::Request(Some(request)) => self.handle_request(request).await,
                Event::Request(None) => {
                    debug!("Command drain gone, no more operator requests");
                    requests_open = false;
                }
            }

            self.track_latency(started.elapsed());
        }
    }

    fn handle_radio(&mut self, datagram: &Datagram, recv_ts: u32) {
        let (gen_ts, sent_ts) = match unpack(&datagram.data) {
            Ok(Some(batch)) => {
                for frame in &batch.frames {
                    match SensorRecord::decode(&frame.payload) {
                        Ok(record) => self.state.apply_record(&record),
                        Err(e) => debug!("Dropping record from {}: {}", datagram.source, e),
                    }
                }
                let gen_ts = batch.frames.first().map_or(batch.sent_timestamp, |f| f.timestamp);
                (gen_ts, batch.sent_timestamp)
            }
            Ok(None) => {
                trace!("No records in {} bytes from {}", datagram.data.len(), datagram.source);
                (0, 0)
            }
            Err(e) => {
                debug!("Dropping radio buffer from {}: {}", datagram.source, e);
                (0, 0)
            }
        };

        self.record(&datagram.data, gen_ts, sent_ts, recv_ts, datagram.source.port());
    }

    async fn handle_matlab(&mut self, datagram: &Datagram) {
        let request = match MatlabRequest::decode(&datagram.data) {
            Ok(request) => request,
            Err(e) => {
                debug!("Dropping Matlab request: {}", e);
                return;
            }
        };

        self.send_command(Some(request.time_token), &request.deltas).await;

        let snapshot = self.state.snapshot().clone();
        if let Some(bridge) = self.matlab.as_mut()
            && let Err(e) = bridge.reply(&snapshot).await
        {
            warn!("Matlab reply failed: {}", e);
        }
    }

    async fn handle_request(&mut self, request: LinkRequest) {
        match request {
            LinkRequest::SendCommand { time_token, deltas } => {
                self.send_command(time_token, &deltas).await;
            }
            LinkRequest::ZeroRig => self.state.zero_rig(),
            LinkRequest::UpdateAirflow { velocity, differential_pressure } => {
                self.state.update_airflow(&AirflowRecord {
                    velocity: velocity as f32,
                    differential_pressure: differential_pressure as f32,
                });
            }
        }
    }

    /// Issue both actuator packets and log the command.
    ///
    /// `ts1` is taken before synthesis, `ts2` after the flight-surface send and
    /// `ts3` after the compensator send. The log record is written whether or
    /// not the sends succeeded.
    async fn send_command(&mut self, time_token: Option<u32>, deltas: &CommandDeltas) {
        let ts1 = self.clock.now_us();
        let command = self.state.command(time_token.unwrap_or(ts1), ts1, deltas);

        let acm_node = self.nodes.acm_node;
        self.send_packet(&command.flight_surface.encode(), ts1, acm_node).await;
        let ts2 = self.clock.now_us();

        let cmp_node = self.nodes.cmp_node;
        self.send_packet(&command.compensator.encode(), ts1, cmp_node).await;
        let ts3 = self.clock.now_us();

        self.record(&command.log_record.encode(), ts1, ts2, ts3, COMMAND_PORT);
    }

    async fn send_packet(&mut self, packet: &[u8], gen_ts: u32, dest: std::net::SocketAddr) {
        let wire = packs(self.clock.now_us(), &[pack(packet, gen_ts)]);
        if let Err(e) = self.radio.send_to(&wire, dest).await {
            warn!("Sending actuator packet to {} failed: {}", dest, e);
        }
    }

    fn record(&mut self, data: &[u8], gen_ts: u32, sent_ts: u32, recv_ts: u32, port: u16) {
        if let Some(recorder) = self.recorder.as_mut()
            && let Err(e) = recorder.write_record(data, gen_ts, sent_ts, recv_ts, port)
        {
            error!("Flight record write failed: {}", e);
        }
    }

    fn track_latency(&mut self, dt: Duration) {
        if dt > self.max_dt {
            self.max_dt = dt;
            info!("Main loop max dt={:.3}ms", dt.as_secs_f64() * 1e3);
        }
    }
}

async fn recv_matlab(bridge: Option<&mut MatlabBridge>) -> Result<Option<Datagram>> {
    match bridge {
        Some(bridge) => bridge.recv().await,
        None => std::future::pending().await,
    }
}

/// Entry point for starting a link.
pub struct GroundLink;

impl GroundLink {
    /// Bind the configured UDP sockets and spawn the link.
    pub async fn connect(config: LinkConfig) -> Result<LinkHandle> {
        info!("Binding radio on {}", config.radio.bind);
        let radio = UdpTransport::bind("radio", config.radio.bind).await?;
        let matlab = match &config.matlab {
            Some(matlab) => Some(MatlabBridge::bind(matlab).await?),
            None => None,
        };
        Self::spawn(config, Box::new(radio), matlab)
    }

    /// Spawn the processing task and the command drain over given transports.
    ///
    /// Fails without spawning anything if the flight record cannot be opened.
    pub fn spawn(
        config: LinkConfig,
        radio: Box<dyn Transport>,
        matlab: Option<MatlabBridge>,
    ) -> Result<LinkHandle> {
        config.validate()?;

        let recorder = config.recording.path.as_ref().map(FrameRecorder::open).transpose()?;
        let recorder_busy = recorder.as_ref().map(FrameRecorder::busy_flag);

        let (operator_tx, operator_rx) = mpsc::channel(config.dispatch.command_queue);
        let (gui_tx, gui_rx) = mpsc::channel(config.dispatch.gui_queue);
        let (request_tx, request_rx) = mpsc::channel(config.dispatch.command_queue);
        let (snapshot_tx, snapshot_rx) = watch::channel(None);
        let (phase_tx, phase_rx) = watch::channel(LoopPhase::WaitingForStart);
        let (ready_tx, ready_rx) = watch::channel(false);
        let cancel = CancellationToken::new();

        let observer = OperatorObserver { gui: gui_tx.clone(), snapshots: snapshot_tx };
        let state = TelemetryState::new(
            config.calibration.clone(),
            config.dispatch.notify_interval_us,
            Box::new(observer),
        );

        let drain = CommandDrain {
            inbound: operator_rx,
            requests: request_tx,
            ready: ready_tx,
            cancel: cancel.clone(),
            poll: config.dispatch.poll_timeout(),
        };
        let center = MessageCenter {
            radio,
            matlab,
            state,
            recorder,
            requests: request_rx,
            nodes: config.radio.clone(),
            dispatch: config.dispatch.clone(),
            clock: LinkClock::new(),
            max_dt: Duration::ZERO,
            phase: phase_tx,
            ready: ready_rx,
            cancel: cancel.clone(),
        };

        let drain_task = tokio::spawn(drain.run());
        let center_task = tokio::spawn(center.run());

        Ok(LinkHandle {
            operator: operator_tx,
            gui: gui_rx,
            gui_sink: gui_tx,
            phase: phase_rx,
            snapshots: snapshot_rx,
            recorder_busy,
            cancel,
            tasks: Some((center_task, drain_task)),
        })
    }
}

/// Operator-side handle on a running link.
///
/// Dropping the handle stops the link.
pub struct LinkHandle {
    operator: mpsc::Sender<serde_json::Value>,
    gui: mpsc::Receiver<GuiMessage>,
    gui_sink: mpsc::Sender<GuiMessage>,
    phase: watch::Receiver<LoopPhase>,
    snapshots: watch::Receiver<Option<Arc<TelemetrySnapshot>>>,
    recorder_busy: Option<Arc<AtomicBool>>,
    cancel: CancellationToken,
    tasks: Option<(JoinHandle<()>, JoinHandle<()>)>,
}

impl LinkHandle {
    /// Queue a raw operator message, waiting if the queue is full.
    ///
    /// Use [`LinkHandle::try_send_json`] from producers that must not block.
    pub async fn send_json(&self, message: serde_json::Value) -> Result<()> {
        self.operator
            .send(message)
            .await
            .map_err(|_| LinkError::ChannelClosed { channel: "operator commands" })
    }

    pub async fn send(&self, command: &OperatorCommand) -> Result<()> {
        self.send_json(command.to_value()?).await
    }

    /// Queue a raw operator message without waiting.
    ///
    /// Fails with [`LinkError::ChannelFull`] while the command drain is behind.
    pub fn try_send_json(&self, message: serde_json::Value) -> Result<()> {
        self.operator.try_send(message).map_err(|e| match e {
            TrySendError::Full(_) => LinkError::ChannelFull { channel: "operator commands" },
            TrySendError::Closed(_) => LinkError::ChannelClosed { channel: "operator commands" },
        })
    }

    pub fn try_send(&self, command: &OperatorCommand) -> Result<()> {
        self.try_send_json(command.to_value()?)
    }

    pub async fn start(&self) -> Result<()> {
        self.send(&OperatorCommand::Start).await
    }

    /// Next message for the operator interface.
    pub async fn recv_gui(&mut self) -> Option<GuiMessage> {
        self.gui.recv().await
    }

    pub fn try_recv_gui(&mut self) -> Option<GuiMessage> {
        self.gui.try_recv().ok()
    }

    /// Sender feeding the operator queue, for [`crate::logging::init`].
    pub fn operator_log_sink(&self) -> mpsc::Sender<GuiMessage> {
        self.gui_sink.clone()
    }

    pub fn phase(&self) -> LoopPhase {
        *self.phase.borrow()
    }

    pub fn phase_updates(&self) -> watch::Receiver<LoopPhase> {
        self.phase.clone()
    }

    /// Most recently notified snapshot, if any.
    pub fn current_snapshot(&self) -> Option<Arc<TelemetrySnapshot>> {
        self.snapshots.borrow().clone()
    }

    /// Notified snapshots as a stream, starting with the current one.
    pub fn snapshots(&self) -> impl Stream<Item = Arc<TelemetrySnapshot>> + 'static {
        WatchStream::new(self.snapshots.clone()).filter_map(|opt| async move { opt })
    }

    /// Busy flag of the flight record, when recording.
    pub fn recorder_busy(&self) -> Option<Arc<AtomicBool>> {
        self.recorder_busy.clone()
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Stop the link and wait until the flight record is closed.
    pub async fn join(mut self) -> Result<()> {
        self.cancel.cancel();
        if let Some((center, drain)) = self.tasks.take() {
            center.await.map_err(|_| LinkError::ChannelClosed { channel: "message center task" })?;
            drain.await.map_err(|_| LinkError::ChannelClosed { channel: "command drain task" })?;
        }
        Ok(())
    }
}

impl Drop for LinkHandle {
    fn drop(&mut self) {
        debug!("Dropping link handle");
        self.cancel.cancel();
    }
}
