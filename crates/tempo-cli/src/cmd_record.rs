use std::io::BufRead;
use std::path::Path;
use std::sync::mpsc;

use tempo_core::{ControlMode, ModeChangeReason, SessionStatus};
use tempo_session::{Recorder, SessionSummary};

// ── Stdin Commands ──

#[derive(Debug, PartialEq, Eq)]
enum ShellCommand {
    Note(String),
    Prompt(String),
    Mode(ControlMode),
    Snapshot,
    Pause,
    Resume,
    Status,
    Stop,
    Help,
}

fn parse_command(line: &str) -> Result<Option<ShellCommand>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    let cmd = match word {
        "note" if !rest.is_empty() => ShellCommand::Note(rest.to_string()),
        "prompt" if !rest.is_empty() => ShellCommand::Prompt(rest.to_string()),
        "note" | "prompt" => return Err(format!("usage: {word} <text>")),
        "mode" => ShellCommand::Mode(rest.parse().map_err(|e| format!("{e} (use human|ai)"))?),
        "snapshot" => ShellCommand::Snapshot,
        "pause" => ShellCommand::Pause,
        "resume" => ShellCommand::Resume,
        "status" => ShellCommand::Status,
        "stop" | "quit" | "exit" => ShellCommand::Stop,
        "help" | "?" => ShellCommand::Help,
        other => return Err(format!("unknown command: {other} (try `help`)")),
    };
    Ok(Some(cmd))
}

const HELP: &str = "\
commands:
  note <text>      add a note to the timeline
  prompt <text>    record an AI-assist prompt
  mode human|ai    switch attribution
  snapshot         take a workspace snapshot now
  pause | resume   pause or continue the session
  status           show session state
  stop             end the session and exit";

// ── Entry Points ──

/// `tempo record`
pub fn record(root: &Path) -> anyhow::Result<()> {
    let _lock = crate::workspace::lock(root)?;
    let recorder = crate::workspace::recorder(root)?;
    if let Some(saved) = recorder.saved_session() {
        anyhow::bail!(
            "session {} is paused; run `tempo resume` or `tempo stop` first",
            saved.session_id
        );
    }
    let session_id = recorder.start(root)?;
    print_started("recording", &session_id, &recorder);
    run_loop(&recorder)
}

/// `tempo resume`
pub fn resume(root: &Path) -> anyhow::Result<()> {
    let _lock = crate::workspace::lock(root)?;
    let recorder = crate::workspace::recorder(root)?;
    let session_id = recorder.resume()?;
    print_started("resumed", &session_id, &recorder);
    run_loop(&recorder)
}

fn print_started(verb: &str, session_id: &str, recorder: &Recorder) {
    let log = recorder
        .log_path()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    println!("{verb} {session_id}");
    println!("  log: {log}");
    println!("type `help` for commands; EOF stops, Ctrl-C pauses");
}

// ── Loop ──

enum Input {
    Line(String),
    Eof,
    Interrupt,
}

fn run_loop(recorder: &Recorder) -> anyhow::Result<()> {
    let (tx, rx) = mpsc::channel::<Input>();

    let interrupt_tx = tx.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        let _ = interrupt_tx.send(Input::Interrupt);
    }) {
        tracing::warn!(error = %e, "cannot install Ctrl-C handler");
    }

    std::thread::Builder::new()
        .name("tempo-stdin".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(Input::Line(line)).is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "stdin read failed");
                        break;
                    }
                }
            }
            let _ = tx.send(Input::Eof);
        })?;

    for input in rx {
        match input {
            Input::Line(line) => {
                if handle_line(recorder, &line)? {
                    return Ok(());
                }
            }
            Input::Eof => {
                finish(recorder)?;
                return Ok(());
            }
            Input::Interrupt => {
                if recorder.status() == SessionStatus::Active {
                    let saved = recorder.pause()?;
                    println!(
                        "paused {} at {} ms; run `tempo resume` to continue",
                        saved.session_id,
                        saved.frozen_elapsed_ms()
                    );
                }
                return Ok(());
            }
        }
    }
    Ok(())
}

/// Returns true when the session has ended.
fn handle_line(recorder: &Recorder, line: &str) -> anyhow::Result<bool> {
    let cmd = match parse_command(line) {
        Ok(Some(cmd)) => cmd,
        Ok(None) => return Ok(false),
        Err(msg) => {
            eprintln!("{msg}");
            return Ok(false);
        }
    };

    let outcome = match cmd {
        ShellCommand::Note(text) => recorder.add_note(&text),
        ShellCommand::Prompt(text) => recorder.log_prompt("cli", None, &text),
        ShellCommand::Mode(mode) => recorder.set_control_mode(mode, ModeChangeReason::Manual),
        ShellCommand::Snapshot => recorder.take_snapshot().map(|s| {
            println!(
                "snapshot: {} files, {} loc, {} bytes ({})",
                s.files,
                s.loc,
                s.bytes,
                s.git_head.label()
            );
            if let Some(diff) = s.diff {
                println!(
                    "  +{} -{} files, +{} -{} loc",
                    diff.added_files, diff.removed_files, diff.added_loc, diff.removed_loc
                );
            }
        }),
        ShellCommand::Pause => recorder.pause().map(|_| println!("paused")),
        ShellCommand::Resume => recorder.resume().map(|_| println!("resumed")),
        ShellCommand::Status => {
            println!(
                "{} {} ({} ms, {})",
                recorder.status().as_str(),
                recorder.session_id().unwrap_or_default(),
                recorder.elapsed_ms(),
                recorder.control_mode()
            );
            Ok(())
        }
        ShellCommand::Help => {
            println!("{HELP}");
            Ok(())
        }
        ShellCommand::Stop => {
            finish(recorder)?;
            return Ok(true);
        }
    };
    if let Err(e) = outcome {
        eprintln!("{e}");
    }
    Ok(false)
}

fn finish(recorder: &Recorder) -> anyhow::Result<()> {
    match recorder.stop()? {
        Some(summary) => print_summary(&summary),
        None => println!("no session to stop"),
    }
    Ok(())
}

pub fn print_summary(summary: &SessionSummary) {
    println!("stopped {}", summary.session_id);
    println!("  active: {} ms", summary.elapsed_ms);
    println!("  paused: {} ms", summary.total_paused_ms);
    println!("  log:    {}", summary.log_path.display());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands_with_text() {
        assert_eq!(
            parse_command("note  fixed the parser "),
            Ok(Some(ShellCommand::Note("fixed the parser".into())))
        );
        assert_eq!(
            parse_command("prompt explain this"),
            Ok(Some(ShellCommand::Prompt("explain this".into())))
        );
        assert!(parse_command("note").is_err());
    }

    #[test]
    fn parses_mode() {
        assert_eq!(parse_command("mode ai"), Ok(Some(ShellCommand::Mode(ControlMode::Ai))));
        assert_eq!(
            parse_command("mode Human"),
            Ok(Some(ShellCommand::Mode(ControlMode::Human)))
        );
        assert!(parse_command("mode robot").is_err());
    }

    #[test]
    fn blank_and_unknown_lines() {
        assert_eq!(parse_command("   "), Ok(None));
        assert!(parse_command("dance").is_err());
        assert_eq!(parse_command("quit"), Ok(Some(ShellCommand::Stop)));
    }
}
