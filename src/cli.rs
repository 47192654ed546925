//! Operator console (REPL)
//!
//! Lines are parsed into [`ReplCommand`]s and sent to the main loop, which
//! owns the room. Device commands stand in for the hardware layer.

use crate::devices::{DeviceEvent, MatrixInputEvent, TelemetryReading, VideoSync};
use crate::signal::{Address, PanelId};
use anyhow::Result;
use colored::*;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tokio::sync::mpsc;

/// One parsed console line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    /// Inject an event as if the device layer reported it
    Device(DeviceEvent),
    Select(String),
    Sleep(PanelId),
    Status,
    Help,
    Quit,
}

/// Read lines until `quit` or EOF. Blocking; run it on its own thread.
pub fn run_repl(tx: mpsc::UnboundedSender<ReplCommand>) -> Result<()> {
    let mut rl = DefaultEditor::new()?;
    println!("{}", "Type 'help' for commands".dimmed());

    loop {
        match rl.readline("avroom> ") {
            Ok(line) => {
                let _ = rl.add_history_entry(line.as_str());
                match parse_command(&line) {
                    Ok(None) => {}
                    Ok(Some(cmd)) => {
                        let quit = cmd == ReplCommand::Quit;
                        if tx.send(cmd).is_err() || quit {
                            break;
                        }
                    }
                    Err(e) => println!("{} {}", "error:".red().bold(), e),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                let _ = tx.send(ReplCommand::Quit);
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}

/// Parse one console line; blank lines and `#` comments give `None`
pub fn parse_command(line: &str) -> Result<Option<ReplCommand>, String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let mut words = line.split_whitespace();
    let verb = words.next().unwrap_or_default().to_lowercase();
    let args: Vec<&str> = words.collect();

    let cmd = match (verb.as_str(), args.as_slice()) {
        ("press", [panel, join]) | ("release", [panel, join]) => {
            ReplCommand::Device(DeviceEvent::SignalChanged {
                panel: parse_panel(panel)?,
                address: Address::boolean(parse_number(join, "join")?),
                value: verb == "press",
            })
        }
        ("online", [panel]) | ("offline", [panel]) => {
            ReplCommand::Device(DeviceEvent::OnlineStatusChanged {
                panel: parse_panel(panel)?,
                online: verb == "online",
            })
        }
        ("battery", [panel, level]) => telemetry(
            panel,
            TelemetryReading::BatteryLevel(parse_percent(level)?),
        )?,
        ("rf", [panel, level]) => {
            telemetry(panel, TelemetryReading::RfSignal(parse_percent(level)?))?
        }
        ("ac", [panel, state]) => telemetry(panel, TelemetryReading::AcLine(parse_on_off(state)?))?,
        ("sync", [input, state, rest @ ..]) => {
            let sync = if parse_on_off(state)? {
                parse_format(rest.first().copied().unwrap_or("1920x1080@60"))?
            } else {
                VideoSync::NoSignal
            };
            ReplCommand::Device(DeviceEvent::MatrixInput {
                port: parse_number(input, "input")?,
                event: MatrixInputEvent::Sync(sync),
            })
        }
        ("name", [input, name @ ..]) if !name.is_empty() => {
            ReplCommand::Device(DeviceEvent::MatrixInput {
                port: parse_number(input, "input")?,
                event: MatrixInputEvent::Name(name.join(" ")),
            })
        }
        ("select", name) if !name.is_empty() => ReplCommand::Select(name.join(" ")),
        ("sleep", [panel]) => ReplCommand::Sleep(parse_panel(panel)?),
        ("status", []) => ReplCommand::Status,
        ("help", []) | ("?", []) => ReplCommand::Help,
        ("quit", []) | ("exit", []) => ReplCommand::Quit,
        _ => return Err(format!("unrecognized command '{}' (try 'help')", line)),
    };

    Ok(Some(cmd))
}

pub fn print_help() {
    println!("\n{}", "Commands:".bold());
    let rows = [
        ("press|release <panel> <join>", "boolean input from a panel"),
        ("online|offline <panel>", "panel connectivity"),
        ("battery <panel> <0-100>", "battery level"),
        ("ac <panel> on|off", "charging dock"),
        ("rf <panel> <0-100>", "RF link quality"),
        ("sync <input> on|off [WxH@fps]", "switch input sync"),
        ("name <input> <text>", "switch input name"),
        ("select <source>", "route a source"),
        ("sleep <panel>", "standby now"),
        ("status", "room status as JSON"),
        ("quit", "stop the controller"),
    ];
    for (usage, what) in rows {
        println!("  {:<32} {}", usage.cyan(), what);
    }
    println!("\n  Panels are ids like {} or {}.\n", "3".yellow(), "0x03".yellow());
}

fn telemetry(panel: &str, reading: TelemetryReading) -> Result<ReplCommand, String> {
    Ok(ReplCommand::Device(DeviceEvent::Telemetry {
        panel: parse_panel(panel)?,
        reading,
    }))
}

fn parse_panel(s: &str) -> Result<PanelId, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed
        .map(PanelId)
        .map_err(|_| format!("invalid panel id '{}'", s))
}

fn parse_number(s: &str, what: &str) -> Result<u32, String> {
    s.parse().map_err(|_| format!("invalid {} '{}'", what, s))
}

fn parse_percent(s: &str) -> Result<u16, String> {
    match s.trim_end_matches('%').parse::<u16>() {
        Ok(v) if v <= 100 => Ok(v),
        _ => Err(format!("invalid percentage '{}'", s)),
    }
}

fn parse_on_off(s: &str) -> Result<bool, String> {
    match s.to_lowercase().as_str() {
        "on" | "true" | "1" | "yes" => Ok(true),
        "off" | "false" | "0" | "no" => Ok(false),
        _ => Err(format!("expected on|off, got '{}'", s)),
    }
}

/// `1920x1080@60`
fn parse_format(s: &str) -> Result<VideoSync, String> {
    let invalid = || format!("invalid format '{}' (expected WxH@fps)", s);
    let (size, fps) = s.split_once('@').ok_or_else(invalid)?;
    let (width, height) = size.split_once('x').ok_or_else(invalid)?;

    Ok(VideoSync::Detected {
        width: width.parse().map_err(|_| invalid())?,
        height: height.parse().map_err(|_| invalid())?,
        fps: fps.parse().map_err(|_| invalid())?,
    })
}
