//! The `examkit init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    if std::path::Path::new("examkit.toml").exists() {
        println!("examkit.toml already exists, skipping.");
    } else {
        std::fs::write("examkit.toml", SAMPLE_CONFIG)?;
        println!("Created examkit.toml");
    }

    std::fs::create_dir_all("exams")?;
    let example_path = std::path::Path::new("exams/example.toml");
    if example_path.exists() {
        println!("exams/example.toml already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_EXAM)?;
        println!("Created exams/example.toml");
    }

    println!("\nNext steps:");
    println!("  1. Set student_id (and an http source, if you have an exam server) in examkit.toml");
    println!("  2. Run: examkit validate --exam exams/example.toml");
    println!("  3. Run: examkit take example");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# examkit configuration

# student_id = "student-001"
cache_dir = "./.examkit/cache"
results_dir = "./examkit-results"

[source]
type = "file"
dir = "./exams"

# [source]
# type = "http"
# base_url = "https://exams.example.edu/api"
# api_token = "${EXAMKIT_API_TOKEN}"

[session]
max_violations = 3
autosave_interval_secs = 5
secure_mode = true
"#;

const EXAMPLE_EXAM: &str = r#"examTitle = "Example quiz"
subjectName = "General knowledge"
className = "Demo"
examDurationMinutes = 10

[[questionList]]
questionId = 1
questionText = "Which planet is closest to the Sun?"
chapterName = "Solar system"
chapterId = 1
questionType = "single_choice"
difficulty = "easy"

[[questionList.optionList]]
optionId = 101
optionText = "Venus"

[[questionList.optionList]]
optionId = 102
optionText = "Mercury"

[[questionList.optionList]]
optionId = 103
optionText = "Mars"

[[questionList]]
questionId = 2
questionText = "What is 7 x 8?"
chapterName = "Arithmetic"
chapterId = 2
questionType = "single_choice"
difficulty = "easy"

[[questionList.optionList]]
optionId = 201
optionText = "54"

[[questionList.optionList]]
optionId = 202
optionText = "56"

[[questionList.optionList]]
optionId = 203
optionText = "64"
"#;
