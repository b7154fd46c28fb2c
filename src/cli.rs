//! Command-line interface and REPL
//!
//! The console plays the hub's part: typed commands become the same calls a
//! hub would make on the volume/source surfaces and the settings form.

use anyhow::{bail, Context, Result};
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::bridge::LoopHandle;
use crate::hub::{CommandOutcome, ConsoleHub, VolumeMode};
use crate::settings::{LayoutItem, SaveStatus, SettingsService};

const HELP: &str = "\
Commands:
  vol +N | vol -N        change volume by N dB
  vol =N                 set volume to N dB (-80..0)
  mute on | mute off     mute / unmute
  on                     power on and select the configured input
  standby                toggle standby
  status                 show status line and controls
  settings               show current settings
  set <field> [value]    save a setting (device_name, input, receiver_url)
  check <field> [value]  validate a setting without saving
  rebind                 drop the receiver and discover it again
  help                   show this help
  quit                   exit";

/// One parsed console command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Volume { mode: VolumeMode, value: i32 },
    Mute(bool),
    On,
    Standby,
    Status,
    Settings,
    Set { field: String, value: String, dry_run: bool },
    Rebind,
    Help,
    Quit,
}

/// Parse a console line (`Ok(None)` for a blank line)
pub fn parse_command(line: &str) -> Result<Option<ReplCommand>> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word.to_ascii_lowercase().as_str() {
        "" => return Ok(None),
        "vol" | "volume" => parse_volume(rest)?,
        "mute" => match rest {
            "on" => ReplCommand::Mute(true),
            "off" => ReplCommand::Mute(false),
            _ => bail!("Usage: mute on | mute off"),
        },
        "on" => ReplCommand::On,
        "standby" => ReplCommand::Standby,
        "status" => ReplCommand::Status,
        "settings" => ReplCommand::Settings,
        "set" | "check" => {
            let (field, value) = match rest.split_once(char::is_whitespace) {
                Some((field, value)) => (field, value.trim()),
                None => (rest, ""),
            };
            if field.is_empty() {
                bail!("Usage: {} <field> [value]", word);
            }
            ReplCommand::Set {
                field: field.to_string(),
                value: value.to_string(),
                dry_run: word.eq_ignore_ascii_case("check"),
            }
        }
        "rebind" => ReplCommand::Rebind,
        "help" | "?" => ReplCommand::Help,
        "quit" | "exit" => ReplCommand::Quit,
        other => bail!("Unknown command '{}' (try 'help')", other),
    };

    Ok(Some(command))
}

fn parse_volume(arg: &str) -> Result<ReplCommand> {
    let (mode, number) = if let Some(number) = arg.strip_prefix('=') {
        (VolumeMode::Absolute, number.trim())
    } else if arg.starts_with('+') || arg.starts_with('-') {
        (VolumeMode::Relative, arg)
    } else {
        bail!("Usage: vol +N | vol -N | vol =N");
    };

    let value = number
        .parse::<i32>()
        .with_context(|| format!("Invalid volume '{}'", number))?;
    Ok(ReplCommand::Volume { mode, value })
}

/// Run the console until `quit`, Ctrl+C at the prompt, or end of input
pub async fn run_repl(
    handle: LoopHandle,
    settings: SettingsService,
    hub: Arc<ConsoleHub>,
) -> Result<()> {
    let (line_tx, mut line_rx) = mpsc::unbounded_channel::<String>();

    // rustyline blocks, so it gets its own thread
    std::thread::Builder::new()
        .name("repl".to_string())
        .spawn(move || read_lines(line_tx))
        .context("Failed to start console input thread")?;

    println!("{}", "Type 'help' for commands.".dimmed());

    while let Some(line) = line_rx.recv().await {
        match parse_command(&line) {
            Ok(None) => {}
            Ok(Some(ReplCommand::Quit)) => break,
            Ok(Some(command)) => execute(command, &handle, &settings, &hub).await,
            Err(e) => println!("{}", e.to_string().red()),
        }
    }

    debug!("Console closed");
    Ok(())
}

fn read_lines(line_tx: mpsc::UnboundedSender<String>) {
    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(e) => {
            warn!("Console unavailable: {}", e);
            return;
        }
    };

    loop {
        match editor.readline("yxc> ") {
            Ok(line) => {
                let _ = editor.add_history_entry(line.as_str());
                if line_tx.send(line).is_err() {
                    break;
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                let _ = line_tx.send("quit".to_string());
                break;
            }
            Err(e) => {
                warn!("Console input error: {}", e);
                break;
            }
        }
    }
}

async fn execute(
    command: ReplCommand,
    handle: &LoopHandle,
    settings: &SettingsService,
    hub: &ConsoleHub,
) {
    match command {
        ReplCommand::Volume { mode, value } => print_outcome(handle.set_volume(mode, value).await),
        ReplCommand::Mute(muted) => print_outcome(handle.set_mute(muted).await),
        ReplCommand::On => print_outcome(handle.convenience_switch().await),
        ReplCommand::Standby => print_outcome(handle.standby().await),
        ReplCommand::Status => println!("{}", hub.describe()),
        ReplCommand::Settings => match serde_yaml::to_string(&settings.get_settings().values) {
            Ok(yaml) => print!("{}", yaml),
            Err(e) => println!("{}", format!("Cannot render settings: {}", e).red()),
        },
        ReplCommand::Set {
            field,
            value,
            dry_run,
        } => {
            let mut values = settings.current();
            if let Err(e) = values.set_field(&field, &value) {
                println!("{}", e.to_string().red());
                return;
            }

            let response = settings.save_settings(values, dry_run).await;
            let errors: Vec<String> = response
                .layout
                .layout
                .iter()
                .filter_map(|item| match item {
                    LayoutItem::Text {
                        title,
                        error: Some(error),
                        ..
                    } => Some(format!("{}: {}", title, error)),
                    _ => None,
                })
                .collect();

            match response.status {
                SaveStatus::Success if dry_run => println!("{}", "Valid".green()),
                SaveStatus::Success => println!("{}", SaveStatus::Success.as_str().green()),
                SaveStatus::NotValid => {
                    println!("{}", SaveStatus::NotValid.as_str().red());
                    for error in errors {
                        println!("  {}", error.yellow());
                    }
                }
            }
        }
        ReplCommand::Rebind => {
            handle.rebind();
            println!("{}", "Rebinding…".dimmed());
        }
        ReplCommand::Help => println!("{}", HELP),
        ReplCommand::Quit => {}
    }
}

fn print_outcome(outcome: CommandOutcome) {
    match outcome {
        CommandOutcome::Success => println!("{}", "Success".green()),
        CommandOutcome::Failure(reason) => println!("{}", reason.red()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> ReplCommand {
        parse_command(line).unwrap().unwrap()
    }

    #[test]
    fn test_blank_line() {
        assert_eq!(parse_command("").unwrap(), None);
        assert_eq!(parse_command("   ").unwrap(), None);
    }

    #[test]
    fn test_volume_commands() {
        assert_eq!(
            parse("vol +5"),
            ReplCommand::Volume {
                mode: VolumeMode::Relative,
                value: 5
            }
        );
        assert_eq!(
            parse("vol -3"),
            ReplCommand::Volume {
                mode: VolumeMode::Relative,
                value: -3
            }
        );
        assert_eq!(
            parse("VOL =-40"),
            ReplCommand::Volume {
                mode: VolumeMode::Absolute,
                value: -40
            }
        );

        assert!(parse_command("vol 40").is_err());
        assert!(parse_command("vol =loud").is_err());
        assert!(parse_command("vol").is_err());
    }

    #[test]
    fn test_mute_and_power() {
        assert_eq!(parse("mute on"), ReplCommand::Mute(true));
        assert_eq!(parse("mute off"), ReplCommand::Mute(false));
        assert!(parse_command("mute").is_err());
        assert_eq!(parse("on"), ReplCommand::On);
        assert_eq!(parse("standby"), ReplCommand::Standby);
    }

    #[test]
    fn test_set_and_check() {
        assert_eq!(
            parse("set device_name Living room"),
            ReplCommand::Set {
                field: "device_name".to_string(),
                value: "Living room".to_string(),
                dry_run: false
            }
        );
        assert_eq!(
            parse("check receiver_url 999.1.1.1"),
            ReplCommand::Set {
                field: "receiver_url".to_string(),
                value: "999.1.1.1".to_string(),
                dry_run: true
            }
        );
        // No value clears the field
        assert_eq!(
            parse("set receiver_url"),
            ReplCommand::Set {
                field: "receiver_url".to_string(),
                value: String::new(),
                dry_run: false
            }
        );
        assert!(parse_command("set").is_err());
    }

    #[test]
    fn test_misc_commands() {
        assert_eq!(parse("status"), ReplCommand::Status);
        assert_eq!(parse("settings"), ReplCommand::Settings);
        assert_eq!(parse("rebind"), ReplCommand::Rebind);
        assert_eq!(parse("?"), ReplCommand::Help);
        assert_eq!(parse("exit"), ReplCommand::Quit);
        assert!(parse_command("dance").is_err());
    }
}
