//! The `examkit validate` command.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use examkit_core::parser::{parse_exam_file, validate_exam};

/// Exam files in a directory, sorted by name.
fn exam_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("toml") | Some("json")
            )
        })
        .collect();
    files.sort();
    Ok(files)
}

pub fn execute(exam_path: PathBuf) -> Result<()> {
    let files = if exam_path.is_dir() {
        exam_files(&exam_path)?
    } else {
        vec![exam_path]
    };

    let mut total_warnings = 0;

    for path in &files {
        let exam = parse_exam_file(path)?;
        println!(
            "Exam: {} ({} questions, {} min)",
            exam.exam_title,
            exam.question_list.len(),
            exam.exam_duration_minutes
        );

        let warnings = validate_exam(&exam);
        for w in &warnings {
            let prefix = w
                .question_id
                .map(|id| format!("  [Q{id}]"))
                .unwrap_or_else(|| "  ".to_string());
            println!("{prefix} WARNING: {}", w.message);
        }
        total_warnings += warnings.len();
    }

    if files.is_empty() {
        println!("No exam files found.");
    } else if total_warnings == 0 {
        println!("All exams valid.");
    } else {
        println!("\n{total_warnings} warning(s) found.");
    }

    Ok(())
}
