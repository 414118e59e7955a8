use criterion::{black_box, criterion_group, criterion_main, Criterion};

use chrono::{TimeZone, Utc};
use examkit_core::model::{AnswerMap, OptionId, Question, QuestionId, Session};
use examkit_core::submission::assemble_submission;

fn make_questions(n: u64) -> Vec<Question> {
    (1..=n)
        .map(|id| {
            Question::new(
                QuestionId(id),
                format!("Question {id}"),
                (1..=4)
                    .map(|o| (OptionId(id * 10 + o), format!("Option {o}")))
                    .collect(),
            )
        })
        .collect()
}

fn make_session() -> Session {
    Session {
        exam_id: "bench".into(),
        student_id: "bench-student".into(),
        title: "Bench exam".into(),
        subject_name: "Math".into(),
        class_name: "9A".into(),
        duration_minutes: 60,
        started_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        is_demo: false,
    }
}

fn bench_assemble(c: &mut Criterion) {
    let mut group = c.benchmark_group("assemble_submission");
    let session = make_session();

    for n in [10u64, 100, 1000] {
        let questions = make_questions(n);
        // Every other question answered, every tenth answer out of range.
        let answers: AnswerMap = (1..=n)
            .filter(|id| id % 2 == 0)
            .map(|id| (QuestionId(id), if id % 10 == 0 { 7 } else { (id % 4) as usize }))
            .collect();

        group.bench_function(format!("questions={n}"), |b| {
            b.iter(|| assemble_submission(black_box(&questions), black_box(&answers), &session))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_assemble);
criterion_main!(benches);
