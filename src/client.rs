use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::coalesce::{Category, Coalescer};
use crate::codec::{encode_command, Frame, PacketType, MAX_FRAME_LEN, MIN_FRAME_LEN};
use crate::dispatch::{classify, Inbound};
use crate::handshake::{Connection, LinkState, ACK_SEQUENCE, SYN_SEQUENCE};
use crate::logger::{FrameLogMode, FrameLogger};
use crate::reconcile::{SettingsViews, SyncOutcome};
use crate::sync::{find_frame_start, split_frames};
use crate::transport::{Clock, SystemClock, Transport};
use crate::types::*;
use crate::{Error, Result};

/// Receive window cap; bytes beyond it wait for the next window.
pub const RX_MAX_BYTES: usize = 250;

/// Feedback frames carry a running count; past this the front panel starts
/// blinking unless we poll temperatures.
const MAX_FEEDBACK_COUNT: u8 = 5;

const QUERY_GAP: Duration = Duration::from_millis(200);
const RX_IDLE_POLL: Duration = Duration::from_millis(1);

const FULL_QUERY: [u8; 10] = [128, 135, 144, 148, 163, 187, 190, 199, 222, 248];
const TEMPERATURE_QUERY: [Function; 2] = [Function::RoomTemp, Function::OutsideTemp];

type SettingsCallback = Box<dyn Fn(&Settings) + Send + Sync>;
type StatusCallback = Box<dyn Fn(&Status) + Send + Sync>;
type UpdateCallback = Box<dyn Fn() + Send + Sync>;
type FunctionCallback = Box<dyn Fn(&str) + Send + Sync>;

// -- Timing --

/// Driver timeouts. Serialized as milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    /// Outstanding transmission with no answer: restart the handshake.
    #[serde(rename = "connection_timeout_ms", with = "millis")]
    pub connection_timeout: Duration,
    /// Silence before temperatures are probed.
    #[serde(rename = "idle_timeout_ms", with = "millis")]
    pub idle_timeout: Duration,
    /// Quiet period after connecting before the full query.
    #[serde(rename = "start_delay_ms", with = "millis")]
    pub start_delay: Duration,
    #[serde(rename = "sync_interval_ms", with = "millis")]
    pub sync_interval: Duration,
    #[serde(rename = "single_event_delay_ms", with = "millis")]
    pub single_event_delay: Duration,
    #[serde(rename = "multi_event_delay_ms", with = "millis")]
    pub multi_event_delay: Duration,
    #[serde(rename = "rx_timeout_ms", with = "millis")]
    pub rx_timeout: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            connection_timeout: Duration::from_secs(120),
            idle_timeout: Duration::from_secs(60),
            start_delay: Duration::from_secs(10),
            sync_interval: Duration::from_millis(600),
            single_event_delay: Duration::from_millis(800),
            multi_event_delay: Duration::from_millis(1500),
            rx_timeout: Duration::from_millis(250),
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

// -- Builder --

#[derive(Default)]
struct Callbacks {
    settings: Option<SettingsCallback>,
    status: Option<StatusCallback>,
    update: Option<UpdateCallback>,
    function: Option<FunctionCallback>,
}

pub struct HvacBuilder<T, C = SystemClock> {
    transport: T,
    clock: C,
    timing: Timing,
    verify_checksums: bool,
    callbacks: Callbacks,
    log: Option<(FrameLogMode, PathBuf)>,
}

impl<T: Transport> HvacBuilder<T, SystemClock> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            clock: SystemClock::new(),
            timing: Timing::default(),
            verify_checksums: true,
            callbacks: Callbacks::default(),
            log: None,
        }
    }
}

impl<T: Transport, C: Clock> HvacBuilder<T, C> {
    pub fn clock<C2: Clock>(self, clock: C2) -> HvacBuilder<T, C2> {
        HvacBuilder {
            transport: self.transport,
            clock,
            timing: self.timing,
            verify_checksums: self.verify_checksums,
            callbacks: self.callbacks,
            log: self.log,
        }
    }

    pub fn timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    pub fn verify_checksums(mut self, verify: bool) -> Self {
        self.verify_checksums = verify;
        self
    }

    pub fn on_settings(mut self, f: impl Fn(&Settings) + Send + Sync + 'static) -> Self {
        self.callbacks.settings = Some(Box::new(f));
        self
    }

    pub fn on_status(mut self, f: impl Fn(&Status) + Send + Sync + 'static) -> Self {
        self.callbacks.status = Some(Box::new(f));
        self
    }

    pub fn on_update(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.callbacks.update = Some(Box::new(f));
        self
    }

    pub fn on_function(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.callbacks.function = Some(Box::new(f));
        self
    }

    pub fn frame_log(mut self, mode: FrameLogMode, path: impl Into<PathBuf>) -> Self {
        self.log = Some((mode, path.into()));
        self
    }

    pub fn build(self) -> Result<Hvac<T, C>> {
        let logger = match self.log {
            Some((mode, path)) => Some(FrameLogger::new(mode, path).map_err(Error::Log)?),
            None => None,
        };
        let now = self.clock.now();

        Ok(Hvac {
            transport: self.transport,
            clock: self.clock,
            timing: self.timing,
            verify_checksums: self.verify_checksums,
            conn: Connection::new(now),
            views: SettingsViews::default(),
            status: Status::default(),
            coalescer: Coalescer::default(),
            callbacks: self.callbacks,
            logger,
            logged_state: None,
            temperature_query_pending: false,
        })
    }
}

// -- Driver --

/// Driver for one indoor unit on a serial link.
///
/// Call [`service`](Hvac::service) from the host's main loop. Each call runs
/// the handshake, drains the receive buffer, pushes at most one pending
/// setting and fires any settled callbacks.
pub struct Hvac<T, C = SystemClock> {
    transport: T,
    clock: C,
    timing: Timing,
    verify_checksums: bool,
    conn: Connection,
    views: SettingsViews,
    status: Status,
    coalescer: Coalescer,
    callbacks: Callbacks,
    logger: Option<FrameLogger>,
    logged_state: Option<LinkState>,
    temperature_query_pending: bool,
}

impl<T: Transport> Hvac<T, SystemClock> {
    pub fn builder(transport: T) -> HvacBuilder<T, SystemClock> {
        HvacBuilder::new(transport)
    }
}

impl<T: Transport, C: Clock> Hvac<T, C> {
    /// One pass of the driver loop. Only transport I/O errors are returned;
    /// protocol anomalies are logged and dropped.
    pub fn service(&mut self) -> Result<()> {
        self.drive_handshake()?;

        if self.conn.full_query_due(self.clock.now(), self.timing.start_delay) {
            debug!("querying all functions");
            self.query_all()?;
            self.conn.mark_initialized();
        }

        self.receive()?;
        self.run_deferred_queries()?;

        let now = self.clock.now();
        if self.conn.idle_probe_due(now, self.timing.idle_timeout) {
            debug!("idle timeout, probing temperatures");
            self.query_temperature()?;
        }

        let now = self.clock.now();
        if self.conn.timed_out(now, self.timing.connection_timeout) {
            warn!(state = %self.conn.state(), "connection timeout, restarting handshake");
            self.conn.reset(now);
        }

        if self.conn.sync_due(self.clock.now(), self.timing.sync_interval) {
            self.sync_settings()?;
        }

        self.flush_notifications();
        self.note_link_state();
        Ok(())
    }

    // -- Handshake --

    fn drive_handshake(&mut self) -> Result<()> {
        match self.conn.state() {
            LinkState::Disconnected => {
                debug!("sending SYN sequence");
                self.send_sequence(&SYN_SEQUENCE)?;
                self.conn.syn_sent();
            }
            LinkState::SynAckReceived => {
                debug!("sending ACK sequence");
                self.conn.ack_started();
                self.note_link_state();
                self.send_sequence(&ACK_SEQUENCE)?;
                self.conn.ack_sent();
            }
            _ => {}
        }
        self.note_link_state();
        Ok(())
    }

    fn link_ready(&mut self) {
        if self.conn.ready() {
            debug!("connected");
            self.note_link_state();
        }
    }

    fn note_link_state(&mut self) {
        let state = self.conn.state();
        if self.logged_state == Some(state) {
            return;
        }
        self.logged_state = Some(state);
        if let Some(ref mut logger) = self.logger {
            logger.log_link(state.as_str());
        }
    }

    // -- Transmit --

    fn transmit(&mut self, bytes: &[u8]) -> Result<()> {
        trace!(len = bytes.len(), bytes = ?bytes, "tx");
        if let Some(ref mut logger) = self.logger {
            logger.log_tx(bytes);
        }
        self.transport.write_all(bytes)?;
        self.conn.transmitted(self.clock.now());
        Ok(())
    }

    fn send_sequence(&mut self, sequence: &[(&[u8], Duration)]) -> Result<()> {
        for (packet, pause) in sequence {
            self.transmit(packet)?;
            self.clock.sleep(*pause);
        }
        Ok(())
    }

    fn query(&mut self, function: u8) -> Result<()> {
        let frame = encode_command(&[function])?;
        self.transmit(&frame)
    }

    fn query_each(&mut self, functions: &[u8]) -> Result<()> {
        for &function in functions {
            self.query(function)?;
            self.clock.sleep(QUERY_GAP);
            self.receive()?;
        }
        Ok(())
    }

    fn query_all(&mut self) -> Result<()> {
        self.query_each(&FULL_QUERY)
    }

    fn query_temperature(&mut self) -> Result<()> {
        let functions = TEMPERATURE_QUERY.map(|f| f.to_byte().unwrap_or_default());
        self.query_each(&functions)
    }

    fn run_deferred_queries(&mut self) -> Result<()> {
        if std::mem::take(&mut self.temperature_query_pending) {
            debug!("feedback count exceeded, querying temperatures");
            self.query_temperature()?;
        }
        Ok(())
    }

    fn sync_settings(&mut self) -> Result<()> {
        let now = self.clock.now();
        match self.views.next_change() {
            SyncOutcome::Send { function, value } => {
                let function_byte = function.to_byte().unwrap_or_default();
                let frame = encode_command(&[function_byte, value])?;
                self.transmit(&frame)?;
                self.conn.synced(now);
            }
            SyncOutcome::Untranslatable { .. } => self.conn.synced(now),
            SyncOutcome::Clamped { .. } | SyncOutcome::Idle => {}
        }
        Ok(())
    }

    // -- Receive --

    /// Drain the port until `rx_timeout` passes or the window is full.
    fn receive(&mut self) -> Result<()> {
        if self.transport.bytes_available()? == 0 {
            return Ok(());
        }

        let mut window: heapless::Vec<u8, RX_MAX_BYTES> = heapless::Vec::new();
        let start = self.clock.now();
        while self.clock.now().saturating_sub(start) < self.timing.rx_timeout && !window.is_full() {
            match self.transport.read_byte()? {
                Some(byte) => {
                    let _ = window.push(byte);
                }
                None => self.clock.sleep(RX_IDLE_POLL),
            }
        }
        if window.is_full() {
            warn!(len = window.len(), "receive window full");
        }
        trace!(len = window.len(), bytes = ?window.as_slice(), "rx window");

        self.conn.data_received(self.clock.now());
        self.process_window(&window)
    }

    fn process_window(&mut self, window: &[u8]) -> Result<()> {
        let handshaking = self.conn.state().expects_handshake_header();
        let Some(start) = find_frame_start(window, handshaking) else {
            debug!(len = window.len(), "no frame header in receive window");
            return Ok(());
        };

        let mut outcome = Ok(());
        let split = split_frames(window, start, |raw| {
            if outcome.is_ok() {
                outcome = self.handle_frame(raw);
            }
        });
        if let Err(e) = split {
            warn!(error = %e, "dropping rest of receive window");
        }
        outcome
    }

    fn handle_frame(&mut self, raw: &[u8]) -> Result<()> {
        if let Some(ref mut logger) = self.logger {
            logger.log_rx(raw);
        }

        let frame = match Frame::parse(raw, self.verify_checksums) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, bytes = ?raw, "dropping frame");
                return Ok(());
            }
        };
        trace!(kind = %frame.packet_type, payload = ?frame.payload, "frame");

        match frame.packet_type {
            PacketType::SynAck => {
                if self.conn.syn_ack_received() {
                    self.note_link_state();
                }
            }
            PacketType::Ack => self.link_ready(),
            PacketType::Feedback => {
                if frame.counter > MAX_FEEDBACK_COUNT {
                    self.temperature_query_pending = true;
                }
                self.handle_payload(frame.payload)?;
            }
            PacketType::Reply => self.handle_payload(frame.payload)?,
            PacketType::Command | PacketType::Unknown => {
                trace!(kind = %frame.packet_type, "ignoring frame");
            }
        }
        Ok(())
    }

    fn handle_payload(&mut self, payload: &[u8]) -> Result<()> {
        match classify(payload, self.conn.is_connected()) {
            Inbound::Ready => self.link_ready(),
            Inbound::OtherStatus(status) => debug!(%status, "unit status"),
            Inbound::Setting(update) => {
                if self.views.apply_confirmed(update) {
                    let function = update.function();
                    debug!(%function, "setting changed");
                    self.notify(Category::Settings, &[function.as_str()]);
                }
            }
            Inbound::Telemetry(telemetry) => {
                let changed = telemetry.apply(&mut self.status);
                if !changed.is_empty() {
                    debug!(?telemetry, "status changed");
                    self.notify(Category::Status, &changed);
                }
            }
            Inbound::ChangeReply(function) => {
                debug!(%function, "setting changed reply, re-querying");
                if let Some(byte) = function.to_byte() {
                    self.query(byte)?;
                }
            }
            Inbound::Ignored(reason) => trace!(reason, payload = ?payload, "payload ignored"),
        }
        Ok(())
    }

    // -- Notifications --

    fn notify(&mut self, category: Category, names: &[&str]) {
        let has_category = match category {
            Category::Settings => self.callbacks.settings.is_some(),
            Category::Status => self.callbacks.status.is_some(),
            Category::Update => false,
        };
        let now = self.clock.now();

        if has_category {
            self.coalescer.record(category, now);
        } else if self.callbacks.update.is_some() {
            self.coalescer.record(Category::Update, now);
        } else if let Some(ref cb) = self.callbacks.function {
            for name in names {
                cb(*name);
            }
        }
    }

    fn flush_notifications(&mut self) {
        let due = self.coalescer.take_due(
            self.clock.now(),
            self.timing.single_event_delay,
            self.timing.multi_event_delay,
        );
        for category in due {
            match category {
                Category::Settings => {
                    if let Some(ref cb) = self.callbacks.settings {
                        cb(&self.views.current);
                    }
                }
                Category::Status => {
                    if let Some(ref cb) = self.callbacks.status {
                        cb(&self.status);
                    }
                }
                Category::Update => {
                    if let Some(ref cb) = self.callbacks.update {
                        cb();
                    }
                }
            }
        }
    }

    // -- Control --

    /// Re-request every function on the next tick.
    pub fn force_query_all(&mut self) {
        self.conn.request_full_query();
    }

    /// Send a pre-built frame as-is. Only the length is checked.
    pub fn send_raw(&mut self, frame: &[u8]) -> Result<()> {
        if !(MIN_FRAME_LEN..=MAX_FRAME_LEN).contains(&frame.len()) {
            return Err(Error::InvalidFrameLength(frame.len()));
        }
        self.transmit(frame)
    }

    // -- Accessors --

    pub fn settings(&self) -> Settings {
        self.views.current
    }

    /// What the application last asked for, possibly not yet sent.
    pub fn requested_settings(&self) -> Settings {
        self.views.user
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn power(&self) -> PowerState {
        self.views.current.power
    }

    pub fn setpoint(&self) -> u8 {
        self.views.current.setpoint
    }

    pub fn mode(&self) -> Mode {
        self.views.current.mode
    }

    pub fn swing(&self) -> Swing {
        self.views.current.swing
    }

    pub fn fan_mode(&self) -> FanMode {
        self.views.current.fan_mode
    }

    pub fn purifier(&self) -> Purifier {
        self.views.current.purifier
    }

    pub fn power_select(&self) -> PowerSelect {
        self.views.current.power_select
    }

    pub fn operation(&self) -> Operation {
        self.views.current.operation
    }

    pub fn room_temperature(&self) -> i8 {
        self.status.room_temperature
    }

    pub fn outside_temperature(&self) -> i8 {
        self.status.outside_temperature
    }

    pub fn on_timer(&self) -> Timer {
        self.status.on_timer
    }

    pub fn off_timer(&self) -> Timer {
        self.status.off_timer
    }

    pub fn is_running(&self) -> bool {
        self.status.running
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_connected()
    }

    pub fn link_state(&self) -> LinkState {
        self.conn.state()
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    // -- Setters --
    //
    // These only touch the requested view; `service` pushes one differing
    // field per sync interval.

    pub fn set_power(&mut self, power: PowerState) {
        self.views.user.power = power;
    }

    /// Values outside 17..=30 are clamped on the next sync pass.
    pub fn set_setpoint(&mut self, setpoint: u8) {
        self.views.user.setpoint = setpoint;
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.views.user.mode = mode;
    }

    pub fn set_swing(&mut self, swing: Swing) {
        self.views.user.swing = swing;
    }

    pub fn set_fan_mode(&mut self, fan_mode: FanMode) {
        self.views.user.fan_mode = fan_mode;
    }

    pub fn set_purifier(&mut self, purifier: Purifier) {
        self.views.user.purifier = purifier;
    }

    pub fn set_power_select(&mut self, power_select: PowerSelect) {
        self.views.user.power_select = power_select;
    }

    pub fn set_operation(&mut self, operation: Operation) {
        self.views.user.operation = operation;
    }

    pub fn apply_preset(&mut self, preset: Settings) {
        self.views.user = preset;
    }
}
