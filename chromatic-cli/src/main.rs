//! # chromatic - terminal chromatic tuner
//!
//! Listens on the default input device and prints the detected note.
//!
//! ## Threads
//! - **Main thread**: owns the session, prints readings, applies commands
//! - **Input thread**: reads commands from stdin and forwards them over a channel
//! - **Analysis thread**: spawned by the session while listening
//!
//! ## Commands
//! `yin`, `mpm`, a tuning reference such as `432` or `A415`, and `q` to quit.
//! The chosen algorithm and tuning are remembered in `tuner_settings.json`.
//!
//! An optional first argument names a JSON file with session options.

mod store;

use anyhow::{Context, Result};
use chromatic_core::audio::CpalSource;
use chromatic_core::settings::Settings;
use chromatic_core::{Algorithm, AnalysisSession, Reading, SessionConfig, SessionEvent, TuningStandard};
use crossbeam_channel::{Receiver, Sender};
use std::io::BufRead;
use std::thread;
use store::{JsonFileStore, DEFAULT_SETTINGS_FILE};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Command {
    Algorithm(Algorithm),
    Tuning(TuningStandard),
    Quit,
}

fn parse_command(line: &str) -> Option<Command> {
    let line = line.trim();
    if line.eq_ignore_ascii_case("q") || line.eq_ignore_ascii_case("quit") {
        return Some(Command::Quit);
    }
    if let Ok(algorithm) = line.parse::<Algorithm>() {
        return Some(Command::Algorithm(algorithm));
    }
    line.parse::<TuningStandard>().ok().map(Command::Tuning)
}

pub fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let mut config = match std::env::args().nth(1) {
        Some(path) => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("reading session options from {path}"))?;
            SessionConfig::from_json(&json).with_context(|| format!("parsing {path}"))?
        }
        None => SessionConfig::default(),
    };

    let mut store = JsonFileStore::open(DEFAULT_SETTINGS_FILE);
    let mut settings = Settings::load(&store);
    config.algorithm = settings.algorithm;
    config.tuning = settings.tuning;

    let mut session = AnalysisSession::new(CpalSource::default(), config)?;
    let events = session.subscribe();
    session.start().context("starting audio capture")?;

    println!(
        "Listening ({}, {}). Type yin, mpm, a reference like 432, or q to quit.",
        session.algorithm(),
        session.tuning_standard()
    );

    let commands = spawn_input_thread()?;
    loop {
        crossbeam_channel::select! {
            recv(events) -> event => match event {
                Ok(SessionEvent::Reading(reading)) => print_reading(&reading),
                Ok(SessionEvent::Stopped) | Err(_) => break,
            },
            recv(commands) -> command => match command {
                Ok(Command::Algorithm(algorithm)) => {
                    session.set_algorithm(algorithm);
                    settings.algorithm = algorithm;
                    save_settings(&settings, &mut store);
                    println!("Algorithm: {algorithm}");
                }
                Ok(Command::Tuning(tuning)) => match session.set_tuning_standard(tuning) {
                    Ok(()) => {
                        settings.tuning = tuning;
                        save_settings(&settings, &mut store);
                        println!("Tuning: {tuning}");
                    }
                    Err(e) => eprintln!("{e}"),
                },
                Ok(Command::Quit) | Err(_) => break,
            },
        }
    }

    session.stop();
    Ok(())
}

fn spawn_input_thread() -> Result<Receiver<Command>> {
    let (tx, rx): (Sender<Command>, Receiver<Command>) = crossbeam_channel::unbounded();
    thread::Builder::new()
        .name("stdin".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if line.trim().is_empty() {
                    continue;
                }
                match parse_command(&line) {
                    Some(command) => {
                        if tx.send(command).is_err() || command == Command::Quit {
                            break;
                        }
                    }
                    None => eprintln!("unknown command '{}'", line.trim()),
                }
            }
        })
        .context("spawning input thread")?;
    Ok(rx)
}

fn save_settings(settings: &Settings, store: &mut JsonFileStore) {
    match settings.save(store) {
        Ok(()) => tracing::debug!("settings saved"),
        Err(e) => tracing::warn!("could not save settings: {e}"),
    }
}

fn print_reading(reading: &Reading) {
    let note = reading.note();
    match (reading.frequency(), note.label(), note.cents) {
        (Some(hz), Some(label), Some(cents)) => {
            println!("{label:<4} {cents:+4} cents  {hz:8.2} Hz");
        }
        (Some(hz), _, _) => println!("--           {hz:8.2} Hz"),
        _ => println!("--"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        assert_eq!(parse_command("q"), Some(Command::Quit));
        assert_eq!(parse_command(" mpm "), Some(Command::Algorithm(Algorithm::Mpm)));
        assert_eq!(parse_command("YIN"), Some(Command::Algorithm(Algorithm::Yin)));
        assert_eq!(parse_command("432"), Some(Command::Tuning(TuningStandard::A432)));
        assert_eq!(parse_command("A415"), Some(Command::Tuning(TuningStandard::A415)));
        assert_eq!(parse_command("banana"), None);
    }
}
