//! Terminal rendering for the `take` command.

use std::path::Path;

use comfy_table::{Cell, Table};

use examkit_core::controller::SessionView;
use examkit_core::countdown::format_remaining;
use examkit_core::model::{Question, Session};
use examkit_core::submission::ExamSubmission;
use examkit_core::traits::{Notice, NotificationSink};

/// Prints notices to stderr.
pub struct ConsoleNotifier;

impl NotificationSink for ConsoleNotifier {
    fn notify(&self, notice: Notice) {
        eprintln!("  ! {notice}");
    }
}

pub fn print_header(session: &Session, questions: usize, secure: bool) {
    println!("{} ({}, {})", session.title, session.subject_name, session.class_name);
    println!(
        "{questions} questions, {} min{}",
        session.duration_minutes,
        if secure { ", monitored" } else { "" }
    );
    println!("Type ? for help.\n");
}

pub fn print_help() {
    println!("Commands:");
    println!("  a <n>   choose option n for this question");
    println!("  f       flag or unflag this question");
    println!("  n / p   next / previous question");
    println!("  g <n>   go to question n");
    println!("  s       submit the exam");
    println!("  ?       show this help");
}

/// Render the question on screen with its options.
pub fn print_question(view: &SessionView, question: &Question) {
    println!(
        "[{}/{}] {} left | answered {} | flagged {}{}",
        view.current_index + 1,
        view.question_count,
        format_remaining(view.time_left_secs),
        view.answered,
        view.flagged,
        if view.is_offline { " | offline" } else { "" }
    );
    let flag = if view.current_flagged { " [flagged]" } else { "" };
    println!("Q{}. {}{flag}", view.current_index + 1, question.text);
    for (i, (_, text)) in question.options().enumerate() {
        let mark = if view.current_answer == Some(i) { '*' } else { ' ' };
        println!("  {mark} {}) {text}", i + 1);
    }
}

pub fn print_summary(submission: &ExamSubmission, saved_to: Option<&Path>) {
    let session = &submission.payload.session;

    let mut table = Table::new();
    table.set_header(vec!["Exam", "Student", "Result", "Answered", "Flagged", "Violations", "Time left"]);
    table.add_row(vec![
        Cell::new(&session.title),
        Cell::new(&session.student_id),
        Cell::new(submission.reason),
        Cell::new(format!("{}/{}", submission.answered(), submission.total())),
        Cell::new(submission.flagged.len()),
        Cell::new(submission.violations),
        Cell::new(format_remaining(submission.time_left_secs)),
    ]);

    println!("\nExam submitted.");
    println!("{table}");
    if let Some(path) = saved_to {
        println!("Submission saved to: {}", path.display());
    }
}
