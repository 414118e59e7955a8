//! The `examkit cache` commands.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use comfy_table::{Cell, Table};

use examkit_core::cache::{CacheManager, FileSnapshotStore};
use examkit_core::countdown::format_remaining;
use examkit_core::time::Clock;
use examkit_sources::load_config_from;

fn manager(exam_id: &str, config: Option<PathBuf>) -> Result<(CacheManager, PathBuf)> {
    let config = load_config_from(config.as_deref())?;
    let store = FileSnapshotStore::new(&config.cache_dir);
    let cache = CacheManager::new(Arc::new(store.clone()), exam_id.into(), Clock::default());
    let path = store.path_for(cache.key());
    Ok((cache, path))
}

pub fn show(exam_id: String, config: Option<PathBuf>) -> Result<()> {
    let (cache, path) = manager(&exam_id, config)?;

    let Some(snapshot) = cache.load() else {
        println!("No cached progress for exam {exam_id}.");
        return Ok(());
    };

    let mut table = Table::new();
    table.set_header(vec!["Field", "Value"]);
    table.add_row(vec![Cell::new("Exam"), Cell::new(&snapshot.exam_id)]);
    table.add_row(vec![
        Cell::new("Answered"),
        Cell::new(snapshot.answers.len()),
    ]);
    table.add_row(vec![
        Cell::new("Flagged"),
        Cell::new(snapshot.flagged.len()),
    ]);
    table.add_row(vec![
        Cell::new("Current question"),
        Cell::new(snapshot.current_question_index + 1),
    ]);
    table.add_row(vec![
        Cell::new("Time left"),
        Cell::new(format_remaining(snapshot.time_left_seconds)),
    ]);
    table.add_row(vec![
        Cell::new("Saved at"),
        Cell::new(snapshot.saved_at.format("%Y-%m-%d %H:%M:%S UTC")),
    ]);
    table.add_row(vec![Cell::new("File"), Cell::new(path.display())]);

    println!("{table}");
    Ok(())
}

pub fn clear(exam_id: String, config: Option<PathBuf>) -> Result<()> {
    let (mut cache, path) = manager(&exam_id, config)?;
    if !path.exists() {
        println!("No cached progress for exam {exam_id}.");
        return Ok(());
    }
    cache
        .try_clear()
        .with_context(|| format!("failed to clear cached progress for exam {exam_id}"))?;
    println!("Cleared cached progress for exam {exam_id}.");
    Ok(())
}
