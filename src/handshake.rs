use std::time::Duration;

use tracing::debug;

const PACKET_GAP: Duration = Duration::from_millis(200);
const ACK_SETTLE: Duration = Duration::from_millis(100);

/// Connection opener, each packet followed by its pause.
pub const SYN_SEQUENCE: [(&[u8], Duration); 6] = [
    (&[0x02, 0xff, 0xff, 0x00, 0x00, 0x00, 0x00, 0x02], PACKET_GAP),
    (&[0x02, 0xff, 0xff, 0x01, 0x00, 0x00, 0x01, 0x02, 0xfe], PACKET_GAP),
    (&[0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x02, 0x02, 0xfa], PACKET_GAP),
    (&[0x02, 0x00, 0x01, 0x81, 0x01, 0x00, 0x02, 0x00, 0x00, 0x7b], PACKET_GAP),
    (&[0x02, 0x00, 0x01, 0x02, 0x00, 0x00, 0x02, 0x00, 0x00, 0xfe], PACKET_GAP),
    (&[0x02, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00, 0xfe], PACKET_GAP),
];

/// Sent once the unit answers the SYN sequence.
pub const ACK_SEQUENCE: [(&[u8], Duration); 2] = [
    (&[0x02, 0x00, 0x02, 0x01, 0x00, 0x00, 0x02, 0x00, 0x00, 0xfb], PACKET_GAP),
    (&[0x02, 0x00, 0x02, 0x02, 0x00, 0x00, 0x02, 0x00, 0x00, 0xfa], ACK_SETTLE),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
    #[default]
    Disconnected,
    SynSent,
    SynAckReceived,
    AckSent,
    ReadyWait,
    Connected,
}

impl LinkState {
    pub fn as_str(self) -> &'static str {
        match self {
            LinkState::Disconnected => "disconnected",
            LinkState::SynSent => "syn_sent",
            LinkState::SynAckReceived => "synack_received",
            LinkState::AckSent => "ack_sent",
            LinkState::ReadyWait => "ready_wait",
            LinkState::Connected => "connected",
        }
    }

    pub fn is_connected(self) -> bool {
        self == LinkState::Connected
    }

    /// Inbound frames use the handshake header until our ACK goes out.
    pub fn expects_handshake_header(self) -> bool {
        matches!(
            self,
            LinkState::Disconnected | LinkState::SynSent | LinkState::SynAckReceived
        )
    }
}

impl std::fmt::Display for LinkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Link phase plus the timers that drive probing, reconnects and syncing.
/// All instants are offsets on the driver's [`Clock`](crate::Clock).
#[derive(Debug, Clone)]
pub struct Connection {
    state: LinkState,
    initialized: bool,
    query_forced: bool,
    last_receive: Duration,
    last_transmit: Duration,
    awaiting_reply: bool,
    last_sync: Duration,
}

impl Connection {
    pub fn new(now: Duration) -> Self {
        Self {
            state: LinkState::Disconnected,
            initialized: false,
            query_forced: false,
            last_receive: now,
            last_transmit: now,
            awaiting_reply: false,
            last_sync: Duration::ZERO,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    #[cfg(test)]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    #[cfg(test)]
    pub fn is_awaiting_reply(&self) -> bool {
        self.awaiting_reply
    }

    #[cfg(test)]
    pub fn last_receive(&self) -> Duration {
        self.last_receive
    }

    /// Back to square one: the SYN sequence goes out on the next tick.
    pub fn reset(&mut self, now: Duration) {
        debug!(from = %self.state, "link reset");
        self.state = LinkState::Disconnected;
        self.initialized = false;
        self.query_forced = false;
        self.awaiting_reply = false;
        self.last_receive = now;
        self.last_transmit = now;
    }

    fn transition(&mut self, to: LinkState) -> bool {
        if self.state == to {
            return false;
        }
        debug!(from = %self.state, to = %to, "link state");
        self.state = to;
        true
    }

    pub fn syn_sent(&mut self) {
        self.transition(LinkState::SynSent);
    }

    pub fn syn_ack_received(&mut self) -> bool {
        if self.state.is_connected() {
            return false;
        }
        self.transition(LinkState::SynAckReceived)
    }

    pub fn needs_ack(&self) -> bool {
        self.state == LinkState::SynAckReceived
    }

    pub fn ack_started(&mut self) {
        self.transition(LinkState::AckSent);
    }

    pub fn ack_sent(&mut self) {
        self.transition(LinkState::ReadyWait);
    }

    /// Every outbound frame expects an answer within the connection timeout.
    pub fn transmitted(&mut self, now: Duration) {
        self.awaiting_reply = true;
        self.last_transmit = now;
    }

    /// ACK frame or STATUS=READY. Returns `true` if this completed the link.
    pub fn ready(&mut self) -> bool {
        self.transition(LinkState::Connected)
    }

    /// Called once per non-empty receive window, before its frames are handled.
    pub fn data_received(&mut self, now: Duration) {
        self.last_receive = now;
        self.awaiting_reply = !self.state.is_connected();
    }

    pub fn full_query_due(&self, now: Duration, start_delay: Duration) -> bool {
        self.is_connected()
            && !self.initialized
            && (self.query_forced || now.saturating_sub(self.last_receive) >= start_delay)
    }

    pub fn mark_initialized(&mut self) {
        self.initialized = true;
        self.query_forced = false;
    }

    /// Re-query everything on the next tick once connected, skipping the
    /// start delay.
    pub fn request_full_query(&mut self) {
        self.initialized = false;
        self.query_forced = true;
    }

    pub fn idle_probe_due(&self, now: Duration, idle_timeout: Duration) -> bool {
        self.initialized
            && !self.awaiting_reply
            && now.saturating_sub(self.last_receive) >= idle_timeout
    }

    pub fn timed_out(&self, now: Duration, connection_timeout: Duration) -> bool {
        self.awaiting_reply && now.saturating_sub(self.last_transmit) >= connection_timeout
    }

    pub fn sync_due(&self, now: Duration, interval: Duration) -> bool {
        self.initialized && self.is_connected() && now.saturating_sub(self.last_sync) >= interval
    }

    pub fn synced(&mut self, now: Duration) {
        self.last_sync = now;
    }
}
