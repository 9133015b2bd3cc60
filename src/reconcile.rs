//! Three-view settings reconciliation.
//!
//! `current` is what the unit last confirmed, `wanted` what we last sent and
//! `user` what the application asked for. Each sync interval pushes at most
//! one differing field from `user` to the unit.

use tracing::{debug, warn};

use crate::types::{
    FanMode, Function, Mode, Operation, PowerSelect, PowerState, Purifier, Settings, Swing,
    SETPOINT_MAX, SETPOINT_MIN,
};

/// Result of one reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Nothing differs.
    Idle,
    /// Transmit `[function, value]` as a command.
    Send { function: Function, value: u8 },
    /// The requested setpoint was out of range and has been clamped in the
    /// user view; nothing is sent this cycle.
    Clamped { requested: u8, clamped: u8 },
    /// The user value has no wire byte (e.g. `Unknown`); `wanted` moved on.
    Untranslatable { function: Function },
}

/// A single settings field as confirmed by the unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingUpdate {
    Power(PowerState),
    Setpoint(u8),
    Mode(Mode),
    Swing(Swing),
    FanMode(FanMode),
    Purifier(Purifier),
    PowerSelect(PowerSelect),
    Operation(Operation),
}

impl SettingUpdate {
    pub fn decode(function: Function, value: u8) -> Option<Self> {
        let update = match function {
            Function::State => SettingUpdate::Power(PowerState::from_byte(value)),
            Function::Setpoint => SettingUpdate::Setpoint(value),
            Function::Mode => SettingUpdate::Mode(Mode::from_byte(value)),
            Function::Swing => SettingUpdate::Swing(Swing::from_byte(value)),
            Function::FanMode => SettingUpdate::FanMode(FanMode::from_byte(value)),
            Function::Purifier => SettingUpdate::Purifier(Purifier::from_byte(value)),
            Function::PowerSelect => SettingUpdate::PowerSelect(PowerSelect::from_byte(value)),
            Function::Operation => SettingUpdate::Operation(Operation::from_byte(value)),
            _ => return None,
        };
        Some(update)
    }

    pub fn function(self) -> Function {
        match self {
            SettingUpdate::Power(_) => Function::State,
            SettingUpdate::Setpoint(_) => Function::Setpoint,
            SettingUpdate::Mode(_) => Function::Mode,
            SettingUpdate::Swing(_) => Function::Swing,
            SettingUpdate::FanMode(_) => Function::FanMode,
            SettingUpdate::Purifier(_) => Function::Purifier,
            SettingUpdate::PowerSelect(_) => Function::PowerSelect,
            SettingUpdate::Operation(_) => Function::Operation,
        }
    }

    /// Store into `settings`; `false` if it already held this value.
    fn write(self, settings: &mut Settings) -> bool {
        fn set<T: PartialEq>(slot: &mut T, value: T) -> bool {
            if *slot == value {
                return false;
            }
            *slot = value;
            true
        }

        match self {
            SettingUpdate::Power(v) => set(&mut settings.power, v),
            SettingUpdate::Setpoint(v) => set(&mut settings.setpoint, v),
            SettingUpdate::Mode(v) => set(&mut settings.mode, v),
            SettingUpdate::Swing(v) => set(&mut settings.swing, v),
            SettingUpdate::FanMode(v) => set(&mut settings.fan_mode, v),
            SettingUpdate::Purifier(v) => set(&mut settings.purifier, v),
            SettingUpdate::PowerSelect(v) => set(&mut settings.power_select, v),
            SettingUpdate::Operation(v) => set(&mut settings.operation, v),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SettingsViews {
    pub current: Settings,
    pub wanted: Settings,
    pub user: Settings,
}

impl SettingsViews {
    /// Fold a confirmed value into all three views, for that field only.
    /// Returns `false` when `current` already matched.
    pub fn apply_confirmed(&mut self, update: SettingUpdate) -> bool {
        if !update.write(&mut self.current) {
            return false;
        }
        update.write(&mut self.wanted);
        update.write(&mut self.user);
        true
    }

    /// Find the first field where `user` differs from `wanted` and advance
    /// `wanted` to it.
    pub fn next_change(&mut self) -> SyncOutcome {
        let Self { wanted, user, .. } = self;

        if let Some(outcome) = table_field(
            &mut wanted.power,
            user.power,
            Function::State,
            PowerState::to_byte,
        ) {
            return outcome;
        }

        if wanted.setpoint != user.setpoint {
            let requested = user.setpoint;
            if !(SETPOINT_MIN..=SETPOINT_MAX).contains(&requested) {
                let clamped = requested.clamp(SETPOINT_MIN, SETPOINT_MAX);
                warn!(requested, clamped, "setpoint out of range, clamped");
                user.setpoint = clamped;
                return SyncOutcome::Clamped { requested, clamped };
            }
            wanted.setpoint = requested;
            debug!(setpoint = requested, "sync setpoint");
            return SyncOutcome::Send {
                function: Function::Setpoint,
                value: requested,
            };
        }

        table_field(&mut wanted.mode, user.mode, Function::Mode, Mode::to_byte)
            .or_else(|| table_field(&mut wanted.swing, user.swing, Function::Swing, Swing::to_byte))
            .or_else(|| {
                table_field(
                    &mut wanted.fan_mode,
                    user.fan_mode,
                    Function::FanMode,
                    FanMode::to_byte,
                )
            })
            .or_else(|| {
                table_field(
                    &mut wanted.purifier,
                    user.purifier,
                    Function::Purifier,
                    Purifier::to_byte,
                )
            })
            .or_else(|| {
                table_field(
                    &mut wanted.power_select,
                    user.power_select,
                    Function::PowerSelect,
                    PowerSelect::to_byte,
                )
            })
            .or_else(|| {
                table_field(
                    &mut wanted.operation,
                    user.operation,
                    Function::Operation,
                    Operation::to_byte,
                )
            })
            .unwrap_or(SyncOutcome::Idle)
    }
}

fn table_field<T>(
    wanted: &mut T,
    user: T,
    function: Function,
    to_byte: fn(T) -> Option<u8>,
) -> Option<SyncOutcome>
where
    T: Copy + PartialEq + std::fmt::Display,
{
    if *wanted == user {
        return None;
    }
    *wanted = user;
    match to_byte(user) {
        Some(value) => {
            debug!(function = %function, value = %user, "sync setting");
            Some(SyncOutcome::Send { function, value })
        }
        None => {
            warn!(function = %function, value = %user, "setting has no wire value, not sent");
            Some(SyncOutcome::Untranslatable { function })
        }
    }
}
