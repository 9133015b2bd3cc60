//! Classification of decoded payloads and folding of telemetry into [`Status`].

use heapless::Vec;

use crate::reconcile::SettingUpdate;
use crate::types::{
    temperature_from_byte, ConnectionStatus, Function, Status, Timer, CDU_STATE,
    OUTSIDE_TEMP_NOT_RUNNING,
};

/// What a payload means to the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inbound {
    /// STATUS=READY: completes the handshake.
    Ready,
    /// STATUS with any other code.
    OtherStatus(ConnectionStatus),
    Setting(SettingUpdate),
    Telemetry(Telemetry),
    /// One-byte "setting changed" notice naming a settings function.
    ChangeReply(Function),
    Ignored(&'static str),
}

/// Classify a payload. Data payloads are only accepted once `connected`;
/// status and change replies are accepted in any phase.
pub fn classify(payload: &[u8], connected: bool) -> Inbound {
    match *payload {
        [function, value] => {
            let function = Function::from_byte(function);
            if function == Function::Status {
                return match ConnectionStatus::from_byte(value) {
                    ConnectionStatus::Ready => Inbound::Ready,
                    other => Inbound::OtherStatus(other),
                };
            }
            if !connected {
                return Inbound::Ignored("data before connected");
            }
            if function.is_telemetry() {
                return Telemetry::decode(function, value)
                    .map_or(Inbound::Ignored("unknown function"), Inbound::Telemetry);
            }
            match SettingUpdate::decode(function, value) {
                Some(update) => Inbound::Setting(update),
                None => Inbound::Ignored("unknown function"),
            }
        }
        [function] => {
            let function = Function::from_byte(function);
            if function.is_setting() {
                Inbound::ChangeReply(function)
            } else {
                Inbound::Ignored("change reply for non-setting")
            }
        }
        _ => Inbound::Ignored("unexpected payload length"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Telemetry {
    RoomTemp(i8),
    OutsideTemp(i8),
    OnTimer(Timer),
    OffTimer(Timer),
}

/// Names of the status fields a telemetry value actually changed.
pub type Changed = Vec<&'static str, 2>;

impl Telemetry {
    pub fn decode(function: Function, value: u8) -> Option<Self> {
        match function {
            Function::RoomTemp => Some(Telemetry::RoomTemp(temperature_from_byte(value))),
            Function::OutsideTemp => Some(Telemetry::OutsideTemp(temperature_from_byte(value))),
            Function::OnTimer => Some(Telemetry::OnTimer(Timer::from_byte(value))),
            Function::OffTimer => Some(Telemetry::OffTimer(Timer::from_byte(value))),
            _ => None,
        }
    }

    pub fn apply(self, status: &mut Status) -> Changed {
        let mut changed = Changed::new();
        // at most two names per value
        let mut mark = |name| {
            let _ = changed.push(name);
        };

        match self {
            Telemetry::RoomTemp(t) => {
                if status.room_temperature != t {
                    status.room_temperature = t;
                    mark(Function::RoomTemp.as_str());
                }
            }
            Telemetry::OutsideTemp(OUTSIDE_TEMP_NOT_RUNNING) => {
                if status.running {
                    status.running = false;
                    mark(CDU_STATE);
                }
            }
            Telemetry::OutsideTemp(t) => {
                if status.outside_temperature != t {
                    status.outside_temperature = t;
                    mark(Function::OutsideTemp.as_str());
                }
                if !status.running {
                    status.running = true;
                    mark(CDU_STATE);
                }
            }
            Telemetry::OnTimer(v) => {
                if status.on_timer != v {
                    status.on_timer = v;
                    mark(Function::OnTimer.as_str());
                }
            }
            Telemetry::OffTimer(v) => {
                if status.off_timer != v {
                    status.off_timer = v;
                    mark(Function::OffTimer.as_str());
                }
            }
        }

        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Mode, PowerState};

    #[test]
    fn status_ready_accepted_before_connect() {
        assert_eq!(classify(&[136, 66], false), Inbound::Ready);
        assert_eq!(
            classify(&[136, 10], false),
            Inbound::OtherStatus(ConnectionStatus::Unknown)
        );
    }

    #[test]
    fn data_dropped_until_connected() {
        assert!(matches!(classify(&[187, 22], false), Inbound::Ignored(_)));
        assert_eq!(
            classify(&[187, 22], true),
            Inbound::Telemetry(Telemetry::RoomTemp(22))
        );
        assert_eq!(
            classify(&[128, 48], true),
            Inbound::Setting(SettingUpdate::Power(PowerState::On))
        );
        assert_eq!(
            classify(&[176, 69], true),
            Inbound::Setting(SettingUpdate::Mode(Mode::FanOnly))
        );
        assert!(matches!(classify(&[222, 1], true), Inbound::Ignored(_)));
    }

    #[test]
    fn one_byte_payload_is_change_reply() {
        assert_eq!(
            classify(&[179], false),
            Inbound::ChangeReply(Function::Setpoint)
        );
        assert!(matches!(classify(&[187], true), Inbound::Ignored(_)));
        assert!(matches!(classify(&[], true), Inbound::Ignored(_)));
        assert!(matches!(classify(&[1, 2, 3], true), Inbound::Ignored(_)));
    }

    #[test]
    fn negative_temperatures_decode() {
        assert_eq!(
            classify(&[190, 0xfb], true),
            Inbound::Telemetry(Telemetry::OutsideTemp(-5))
        );
    }

    #[test]
    fn outside_sentinel_only_clears_running() {
        let mut status = Status {
            outside_temperature: 8,
            running: true,
            ..Default::default()
        };
        let changed = Telemetry::OutsideTemp(127).apply(&mut status);
        assert_eq!(changed.as_slice(), &[CDU_STATE]);
        assert_eq!(status.outside_temperature, 8);
        assert!(!status.running);

        assert!(Telemetry::OutsideTemp(127).apply(&mut status).is_empty());
    }

    #[test]
    fn outside_value_sets_running() {
        let mut status = Status::default();
        let changed = Telemetry::OutsideTemp(12).apply(&mut status);
        assert_eq!(changed.as_slice(), &["OUTSIDETEMP", CDU_STATE]);
        assert_eq!(status.outside_temperature, 12);
        assert!(status.running);

        let changed = Telemetry::OutsideTemp(13).apply(&mut status);
        assert_eq!(changed.as_slice(), &["OUTSIDETEMP"]);
    }

    #[test]
    fn unchanged_telemetry_reports_nothing() {
        let mut status = Status::default();
        assert_eq!(
            Telemetry::OffTimer(Timer::On).apply(&mut status).as_slice(),
            &["OFFTIMER"]
        );
        assert!(Telemetry::OffTimer(Timer::On).apply(&mut status).is_empty());
        assert_eq!(status.off_timer, Timer::On);
    }
}
