//! The `examkit take` command.
//!
//! Runs one exam attempt in the terminal. Student input is read line by line
//! from stdin; closing stdin submits the exam.

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, watch};

use examkit_core::cache::FileSnapshotStore;
use examkit_core::controller::{Phase, SessionController, SessionView};
use examkit_core::model::{ExamId, Question, StartExamRequest};
use examkit_core::submission::SubmitReason;
use examkit_runtime::detectors::InterruptDetector;
use examkit_runtime::{SessionCommand, SessionHandle, SessionRuntime};
use examkit_sources::{create_source, load_config_from, SourceConfig};

use crate::console::{self, ConsoleNotifier};

pub struct TakeArgs {
    pub exam_id: String,
    pub student: Option<String>,
    pub demo: bool,
    pub exam_dir: Option<PathBuf>,
    pub results: Option<PathBuf>,
    pub relaxed: bool,
    pub config: Option<PathBuf>,
}

pub async fn execute(args: TakeArgs) -> Result<()> {
    let mut config = load_config_from(args.config.as_deref())?;
    if let Some(dir) = args.exam_dir {
        config.source = SourceConfig::File { dir };
    }
    if args.relaxed {
        config.session.secure_mode = false;
    }
    let results_dir = args.results.unwrap_or_else(|| config.results_dir.clone());
    let student_id = args
        .student
        .or_else(|| config.student_id.clone())
        .context("no student id: pass --student or set student_id in examkit.toml")?;

    let source = create_source(&config.source)?;
    let session_config = config.session.to_session_config();
    let secure = session_config.secure_mode;
    let store = Arc::new(FileSnapshotStore::new(&config.cache_dir));
    let mut controller = SessionController::new(store, Arc::new(ConsoleNotifier), session_config);

    let request = StartExamRequest {
        student_id,
        exam_id: ExamId::new(args.exam_id),
        is_demo: args.demo,
    };
    controller.start(source.as_ref(), request).await?;

    let questions = controller.questions().to_vec();
    if let Some(session) = controller.session() {
        console::print_header(session, questions.len(), secure);
    }
    if let Some(question) = controller.current_question() {
        console::print_question(&controller.view(), question);
    }

    let runtime = SessionRuntime::new(controller).with_detector(InterruptDetector::new());
    let handle = runtime.handle();
    let render = tokio::spawn(render_loop(handle.subscribe(), questions));
    let input = tokio::spawn(input_loop(handle, spawn_stdin_reader()));

    let submission = runtime.run().await?;
    input.abort();
    render.abort();

    let path = results_dir.join(format!("submission_{}.json", submission.id));
    let saved = submission.save_json(&path);
    console::print_summary(&submission, saved.is_ok().then_some(path.as_path()));
    saved
}

/// Read stdin on a dedicated thread so a pending read never holds up exit.
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}

async fn input_loop(handle: SessionHandle, mut lines: mpsc::Receiver<String>) {
    while let Some(line) = lines.recv().await {
        match parse_input(&line) {
            Ok(HostInput::Command(command)) => {
                if handle.send(command).await.is_err() {
                    return;
                }
            }
            Ok(HostInput::Help) => console::print_help(),
            Ok(HostInput::Empty) => {}
            Err(message) => eprintln!("{message}"),
        }
    }

    tracing::info!("input closed, submitting");
    let _ = handle
        .send(SessionCommand::Submit(SubmitReason::InputClosed))
        .await;
}

/// Re-render the question whenever what is on screen changes. Countdown
/// ticks alone do not trigger a redraw.
async fn render_loop(mut views: watch::Receiver<SessionView>, questions: Vec<Question>) {
    fn on_screen(view: &SessionView) -> (usize, Option<usize>, bool, bool) {
        (
            view.current_index,
            view.current_answer,
            view.current_flagged,
            view.is_offline,
        )
    }

    let mut shown = on_screen(&views.borrow());
    while views.changed().await.is_ok() {
        let view = views.borrow_and_update().clone();
        if view.phase != Phase::Active {
            break;
        }
        let current = on_screen(&view);
        if current == shown {
            continue;
        }
        shown = current;
        if let Some(question) = questions.get(view.current_index) {
            console::print_question(&view, question);
        }
    }
}

#[derive(Debug, PartialEq)]
enum HostInput {
    Command(SessionCommand),
    Help,
    Empty,
}

/// Parse one line of student input. Numbers are 1-based.
fn parse_input(line: &str) -> Result<HostInput, String> {
    let mut parts = line.split_whitespace();
    let Some(cmd) = parts.next() else {
        return Ok(HostInput::Empty);
    };
    let arg = parts.next();
    let number = |what: &str| {
        arg.and_then(|a| a.parse::<usize>().ok())
            .filter(|n| *n >= 1)
            .map(|n| n - 1)
            .ok_or_else(|| format!("usage: {cmd} <{what}> (counting from 1)"))
    };

    let command = match cmd {
        "a" => SessionCommand::SelectCurrent(number("option")?),
        "f" => SessionCommand::ToggleCurrentFlag,
        "n" => SessionCommand::Next,
        "p" => SessionCommand::Previous,
        "g" => SessionCommand::GoTo(number("question")?),
        "s" => SessionCommand::Submit(SubmitReason::Manual),
        "?" | "h" | "help" => return Ok(HostInput::Help),
        other => return Err(format!("unknown command '{other}', type ? for help")),
    };
    Ok(HostInput::Command(command))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_answer_and_navigation() {
        assert_eq!(
            parse_input("a 2"),
            Ok(HostInput::Command(SessionCommand::SelectCurrent(1)))
        );
        assert_eq!(
            parse_input("  g 10 "),
            Ok(HostInput::Command(SessionCommand::GoTo(9)))
        );
        assert_eq!(parse_input("n"), Ok(HostInput::Command(SessionCommand::Next)));
        assert_eq!(parse_input("p"), Ok(HostInput::Command(SessionCommand::Previous)));
        assert_eq!(
            parse_input("f"),
            Ok(HostInput::Command(SessionCommand::ToggleCurrentFlag))
        );
        assert_eq!(
            parse_input("s"),
            Ok(HostInput::Command(SessionCommand::Submit(SubmitReason::Manual)))
        );
    }

    #[test]
    fn help_and_blank_lines() {
        assert_eq!(parse_input("?"), Ok(HostInput::Help));
        assert_eq!(parse_input("   "), Ok(HostInput::Empty));
    }

    #[test]
    fn rejects_bad_numbers_and_unknown_commands() {
        assert!(parse_input("a").unwrap_err().contains("usage: a <option>"));
        assert!(parse_input("a 0").is_err());
        assert!(parse_input("g x").unwrap_err().contains("question"));
        assert!(parse_input("quit").unwrap_err().contains("unknown command 'quit'"));
    }
}
