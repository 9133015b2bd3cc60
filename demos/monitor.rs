use std::env;
use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use toshiba_hvac::{open_serial, FrameLogMode, Hvac, Mode, Timing};

const USAGE: &str =
    "usage: monitor <port> [--mode <name>] [--setpoint <c>] [--log <path>] [--timing <json file>]";

fn flag<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let Some(path) = args.get(1) else {
        eprintln!("{USAGE}");
        return ExitCode::FAILURE;
    };

    match run(path, &args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("monitor: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(path: &str, args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let timing = match flag(args, "--timing") {
        Some(file) => serde_json::from_str::<Timing>(&std::fs::read_to_string(file)?)?,
        None => Timing::default(),
    };

    let port = open_serial(path)?;
    let mut builder = Hvac::builder(port)
        .timing(timing)
        .on_settings(|s| {
            println!(
                "settings: {} | {}\u{00b0}C | mode: {} | fan: {} | swing: {} | op: {}",
                s.power, s.setpoint, s.mode, s.fan_mode, s.swing, s.operation
            );
        })
        .on_status(|s| {
            println!(
                "status: room {}\u{00b0}C | outside {}\u{00b0}C | cdu: {}",
                s.room_temperature,
                s.outside_temperature,
                if s.running { "running" } else { "idle" },
            );
        });
    if let Some(log) = flag(args, "--log") {
        builder = builder.frame_log(FrameLogMode::Changes, log);
    }
    let mut hvac = builder.build()?;

    if let Some(name) = flag(args, "--mode") {
        let mode = Mode::from_name(name);
        if !mode.is_known() {
            return Err(format!("unknown mode {name:?}").into());
        }
        hvac.set_mode(mode);
    }
    if let Some(value) = flag(args, "--setpoint") {
        hvac.set_setpoint(value.parse()?);
    }

    println!("Opened {path}, waiting for the unit...");
    let mut was_connected = false;
    loop {
        hvac.service()?;
        if hvac.is_connected() != was_connected {
            was_connected = hvac.is_connected();
            println!("link: {}", hvac.link_state());
        }
        thread::sleep(Duration::from_millis(20));
    }
}
