use toshiba_hvac::{
    FanMode, Function, Mode, Operation, PowerSelect, PowerState, Purifier, Swing, Timer, UNKNOWN,
};

#[test]
fn function_names() {
    assert_eq!(Function::from_byte(179).as_str(), "SETPOINT");
    assert_eq!(Function::from_name("setpoint"), Function::Setpoint);
    assert_eq!(Function::from_name("OUTSIDETEMP").to_byte(), Some(190));
    assert_eq!(Function::from_byte(0).as_str(), UNKNOWN);
}

#[test]
fn every_known_value_maps_both_ways() {
    fn check<T: Copy + PartialEq + std::fmt::Debug>(
        known: &[T],
        to_byte: fn(T) -> Option<u8>,
        from_byte: fn(u8) -> T,
        as_str: fn(T) -> &'static str,
        from_name: fn(&str) -> T,
    ) {
        for &v in known {
            let byte = to_byte(v).unwrap();
            assert_eq!(from_byte(byte), v);
            assert_eq!(from_name(as_str(v)), v);
            assert_ne!(as_str(v), UNKNOWN);
        }
    }

    check(Mode::KNOWN, Mode::to_byte, Mode::from_byte, Mode::as_str, Mode::from_name);
    check(FanMode::KNOWN, FanMode::to_byte, FanMode::from_byte, FanMode::as_str, FanMode::from_name);
    check(Swing::KNOWN, Swing::to_byte, Swing::from_byte, Swing::as_str, Swing::from_name);
    check(Purifier::KNOWN, Purifier::to_byte, Purifier::from_byte, Purifier::as_str, Purifier::from_name);
    check(
        PowerSelect::KNOWN,
        PowerSelect::to_byte,
        PowerSelect::from_byte,
        PowerSelect::as_str,
        PowerSelect::from_name,
    );
    check(
        Operation::KNOWN,
        Operation::to_byte,
        Operation::from_byte,
        Operation::as_str,
        Operation::from_name,
    );
    check(
        PowerState::KNOWN,
        PowerState::to_byte,
        PowerState::from_byte,
        PowerState::as_str,
        PowerState::from_name,
    );
    check(Timer::KNOWN, Timer::to_byte, Timer::from_byte, Timer::as_str, Timer::from_name);
}

#[test]
fn shared_bytes_mean_different_things_per_table() {
    assert_eq!(PowerState::from_byte(49), PowerState::Off);
    assert_eq!(FanMode::from_byte(49), FanMode::Quiet);
    assert_eq!(Swing::from_byte(49), Swing::Off);
    assert_eq!(Mode::from_byte(65), Mode::Auto);
    assert_eq!(Timer::from_byte(65), Timer::On);
}

#[test]
fn out_of_table_values() {
    assert_eq!(Mode::from_byte(70), Mode::Unknown);
    assert_eq!(Operation::from_byte(4), Operation::Unknown);
    assert_eq!(PowerSelect::from_name("90%"), PowerSelect::Unknown);
    assert_eq!(FanMode::Unknown.to_byte(), None);
    assert_eq!(Purifier::Unknown.to_string(), UNKNOWN);
}

#[test]
fn names_are_case_insensitive() {
    assert_eq!(Mode::from_name("FAN_ONLY"), Mode::FanOnly);
    assert_eq!(Operation::from_name("High_Power"), Operation::HighPower);
    assert_eq!(FanMode::from_name("LVL_3"), FanMode::Level3);
}
