use serde::{Deserialize, Serialize};

/// Lowest setpoint the unit accepts, in degrees Celsius.
pub const SETPOINT_MIN: u8 = 17;
/// Highest setpoint the unit accepts, in degrees Celsius.
pub const SETPOINT_MAX: u8 = 30;

/// Outside temperature byte reported while the condenser is stopped.
pub const OUTSIDE_TEMP_NOT_RUNNING: i8 = 127;

/// Pseudo-function name reported when the condenser running flag changes.
pub const CDU_STATE: &str = "CDU_STATE";

byte_table! {
    /// Function codes: the first payload byte of every data frame.
    pub enum Function {
        State = 128 => "STATE",
        PowerSelect = 135 => "PSEL",
        Status = 136 => "STATUS",
        OnTimer = 144 => "ONTIMER",
        OffTimer = 148 => "OFFTIMER",
        FanMode = 160 => "FANMODE",
        Swing = 163 => "SWING",
        Mode = 176 => "MODE",
        Setpoint = 179 => "SETPOINT",
        RoomTemp = 187 => "ROOMTEMP",
        OutsideTemp = 190 => "OUTSIDETEMP",
        Purifier = 199 => "PURE",
        Operation = 247 => "OP",
    }
}

impl Function {
    /// Telemetry functions feed [`Status`].
    pub fn is_telemetry(self) -> bool {
        matches!(
            self,
            Function::RoomTemp | Function::OutsideTemp | Function::OnTimer | Function::OffTimer
        )
    }

    /// Settings functions feed [`Settings`] and can be changed by a command.
    pub fn is_setting(self) -> bool {
        matches!(
            self,
            Function::State
                | Function::Setpoint
                | Function::Mode
                | Function::Swing
                | Function::FanMode
                | Function::Purifier
                | Function::PowerSelect
                | Function::Operation
        )
    }
}

byte_table! {
    /// Connection status codes carried by [`Function::Status`].
    pub enum ConnectionStatus {
        Ready = 66 => "READY",
    }
}

byte_table! {
    pub enum PowerState {
        Off = 49 => "off",
        On = 48 => "on",
    }
}

byte_table! {
    pub enum Mode {
        Auto = 65 => "auto",
        Cool = 66 => "cool",
        Heat = 67 => "heat",
        Dry = 68 => "dry",
        FanOnly = 69 => "fan_only",
    }
}

byte_table! {
    pub enum FanMode {
        Quiet = 49 => "quiet",
        Level1 = 50 => "lvl_1",
        Level2 = 51 => "lvl_2",
        Level3 = 52 => "lvl_3",
        Level4 = 53 => "lvl_4",
        Level5 = 54 => "lvl_5",
        Auto = 65 => "auto",
    }
}

byte_table! {
    /// Louver swing.
    pub enum Swing {
        Off = 49 => "off",
        On = 65 => "on",
    }
}

byte_table! {
    /// Air purification (plasma ioniser).
    pub enum Purifier {
        Off = 16 => "off",
        On = 24 => "on",
    }
}

byte_table! {
    /// Compressor power limit.
    pub enum PowerSelect {
        Percent50 = 50 => "50%",
        Percent75 = 75 => "75%",
        Percent100 = 100 => "100%",
    }
}

byte_table! {
    /// Operation profile.
    pub enum Operation {
        Normal = 0 => "normal",
        HighPower = 1 => "high_power",
        Silent1 = 2 => "silent_1",
        Eco = 3 => "eco",
        Silent2 = 10 => "silent_2",
    }
}

byte_table! {
    pub enum Timer {
        Off = 66 => "off",
        On = 65 => "on",
    }
}

/// The user-controllable parameters of the unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Settings {
    pub power: PowerState,
    pub setpoint: u8,
    pub mode: Mode,
    pub swing: Swing,
    pub fan_mode: FanMode,
    pub purifier: Purifier,
    pub power_select: PowerSelect,
    pub operation: Operation,
}

/// Read-only telemetry reported by the unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Status {
    pub room_temperature: i8,
    pub outside_temperature: i8,
    pub on_timer: Timer,
    pub off_timer: Timer,
    /// Condenser (outdoor unit) running.
    pub running: bool,
}

/// Temperatures travel as two's-complement bytes.
pub fn temperature_from_byte(raw: u8) -> i8 {
    i8::from_be_bytes([raw])
}
