//! Session controller.
//!
//! Owns the canonical state of one exam attempt and is the only thing that
//! mutates it. Every input (student actions, countdown ticks, autosave ticks,
//! integrity violations) arrives as a named transition; `submit` is guarded
//! so that whichever trigger gets there first wins and the rest are no-ops.
//!
//! ```text
//! NotStarted -> Loading -> Error | Active -> Submitted
//! ```

use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::cache::{CacheManager, CacheSnapshot, SnapshotStore};
use crate::countdown::{Countdown, Tick};
use crate::error::SessionError;
use crate::model::{AnswerMap, ExamId, FlagSet, Question, QuestionId, Session, StartExamRequest};
use crate::security::{SecurityMonitor, Violation};
use crate::submission::{assemble_submission, ExamSubmission, SubmitReason};
use crate::time::Clock;
use crate::traits::{ExamSource, Notice, NotificationSink};

/// Configuration for an exam attempt.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Arm the integrity monitor.
    pub secure_mode: bool,
    /// Violations tolerated before the exam is force-submitted.
    pub max_violations: u32,
    /// Period between progress snapshots.
    pub autosave_interval: Duration,
    /// Period of the countdown. One second in production.
    pub tick_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secure_mode: true,
            max_violations: 3,
            autosave_interval: Duration::from_secs(5),
            tick_interval: Duration::from_secs(1),
        }
    }
}

/// Lifecycle of an attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionStatus {
    NotStarted,
    Loading,
    /// Acquisition failed. A fresh `start` is required.
    Error(String),
    Active,
    Submitted(Box<ExamSubmission>),
}

/// `SessionStatus` without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    NotStarted,
    Loading,
    Error,
    Active,
    Submitted,
}

impl SessionStatus {
    pub fn phase(&self) -> Phase {
        match self {
            SessionStatus::NotStarted => Phase::NotStarted,
            SessionStatus::Loading => Phase::Loading,
            SessionStatus::Error(_) => Phase::Error,
            SessionStatus::Active => Phase::Active,
            SessionStatus::Submitted(_) => Phase::Submitted,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, SessionStatus::Active)
    }
}

/// Everything a UI observes about the attempt, at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub phase: Phase,
    pub current_index: usize,
    pub question_count: usize,
    /// Option index chosen for the question on screen.
    pub current_answer: Option<usize>,
    pub current_flagged: bool,
    pub answered: usize,
    pub flagged: usize,
    pub time_left_secs: u32,
    pub violations: u32,
    /// `None` when the integrity monitor is not in use.
    pub remaining_chances: Option<u32>,
    pub last_saved_at: Option<DateTime<Utc>>,
    pub is_saving: bool,
    pub is_offline: bool,
}

/// Requests queued by monitor callbacks, handled by the controller itself.
#[derive(Debug)]
enum Signal {
    ForceSubmit(SubmitReason),
}

/// State machine for a single student's exam attempt.
pub struct SessionController {
    config: SessionConfig,
    store: Arc<dyn SnapshotStore>,
    notifier: Arc<dyn NotificationSink>,
    clock: Clock,
    status: SessionStatus,
    session: Option<Session>,
    questions: Vec<Question>,
    answers: AnswerMap,
    flagged: FlagSet,
    current_index: usize,
    time_left: u32,
    offline: bool,
    cache: Option<CacheManager>,
    countdown: Countdown,
    monitor: SecurityMonitor,
    signals_tx: mpsc::Sender<Signal>,
    signals_rx: mpsc::Receiver<Signal>,
    submit_fired: bool,
}

impl SessionController {
    pub fn new(
        store: Arc<dyn SnapshotStore>,
        notifier: Arc<dyn NotificationSink>,
        config: SessionConfig,
    ) -> Self {
        let (signals_tx, signals_rx) = mpsc::channel();
        Self {
            config,
            store,
            notifier,
            clock: Clock::default(),
            status: SessionStatus::NotStarted,
            session: None,
            questions: Vec::new(),
            answers: AnswerMap::new(),
            flagged: FlagSet::new(),
            current_index: 0,
            time_left: 0,
            offline: false,
            cache: None,
            countdown: Countdown::new(),
            monitor: SecurityMonitor::new(),
            signals_tx,
            signals_rx,
            submit_fired: false,
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Acquire the exam and enter `Active`.
    ///
    /// Cached progress for the same exam is restored on top of the fresh
    /// state. A cached time of zero is ignored so a stale snapshot can never
    /// start an attempt already expired.
    pub async fn start(
        &mut self,
        source: &dyn ExamSource,
        request: StartExamRequest,
    ) -> Result<(), SessionError> {
        match self.status {
            SessionStatus::NotStarted | SessionStatus::Error(_) => {}
            _ => return Err(SessionError::AlreadyStarted),
        }
        self.status = SessionStatus::Loading;

        tracing::info!(
            exam_id = %request.exam_id,
            student_id = %request.student_id,
            source = source.name(),
            "starting exam"
        );

        let raw = match source.start_exam(&request).await {
            Ok(raw) => raw,
            Err(e) => {
                let message = format!("{e:#}");
                tracing::error!(exam_id = %request.exam_id, "exam acquisition failed: {message}");
                self.status = SessionStatus::Error(message.clone());
                return Err(SessionError::Acquisition(message));
            }
        };

        let session = Session::from_raw(&request, &raw, self.clock.now());
        self.questions = raw.question_list.iter().map(Question::from_raw).collect();
        self.answers.clear();
        self.flagged.clear();
        self.current_index = 0;
        self.time_left = session.duration_secs();

        let mut cache = CacheManager::new(Arc::clone(&self.store), request.exam_id.clone(), self.clock);
        cache.set_offline(self.offline);
        if let Some(snapshot) = cache.load() {
            self.restore(snapshot, &request.exam_id);
        }
        self.cache = Some(cache);

        tracing::info!(
            exam_id = %session.exam_id,
            questions = self.questions.len(),
            time_left = self.time_left,
            secure = self.config.secure_mode,
            "exam active"
        );

        self.session = Some(session);
        self.submit_fired = false;
        self.status = SessionStatus::Active;
        self.countdown.start();
        if self.config.secure_mode {
            self.arm_monitor();
        }
        Ok(())
    }

    fn restore(&mut self, snapshot: CacheSnapshot, exam_id: &ExamId) {
        if snapshot.exam_id != *exam_id {
            tracing::info!(
                cached = %snapshot.exam_id,
                current = %exam_id,
                "discarding cached progress from another exam"
            );
            return;
        }

        self.answers = snapshot.answers;
        self.flagged = snapshot.flagged.into_iter().collect();
        if snapshot.current_question_index < self.questions.len() {
            self.current_index = snapshot.current_question_index;
        }
        if snapshot.time_left_seconds > 0 {
            self.time_left = snapshot.time_left_seconds;
        }

        tracing::info!(
            answered = self.answers.len(),
            time_left = self.time_left,
            "progress restored"
        );
        self.notifier.notify(Notice::ProgressRestored {
            answered: self.answers.len(),
        });
    }

    fn arm_monitor(&mut self) {
        let limit = self.config.max_violations.saturating_add(1);
        let warn = Arc::clone(&self.notifier);
        let escalate = Arc::clone(&self.notifier);
        let signals = self.signals_tx.clone();

        self.monitor.arm(
            self.config.max_violations,
            move |violation, count| {
                warn.notify(Notice::ViolationWarning {
                    violation: violation.clone(),
                    count,
                    limit,
                });
            },
            move || {
                escalate.notify(Notice::MaxViolationsReached);
                let _ = signals.send(Signal::ForceSubmit(SubmitReason::MaxViolations));
            },
        );
    }

    /// Finish the attempt. Runs at most once per session.
    ///
    /// The cache entry is cleared before anything else so a late autosave
    /// cannot resurrect it. Returns `None` when the call was a no-op.
    pub fn submit(&mut self, reason: SubmitReason) -> Option<&ExamSubmission> {
        if self.submit_fired || !self.status.is_active() {
            tracing::debug!(%reason, "submit ignored");
            return None;
        }
        self.submit_fired = true;

        if let Some(cache) = self.cache.as_mut() {
            cache.clear();
        }
        self.countdown.stop();
        self.monitor.disarm();

        let session = self.session.as_ref()?;
        let payload = assemble_submission(&self.questions, &self.answers, session);
        let submission = ExamSubmission {
            id: Uuid::new_v4(),
            reason,
            submitted_at: self.clock.now(),
            time_left_secs: self.time_left,
            violations: self.monitor.count(),
            flagged: self.flagged.iter().copied().collect(),
            payload,
        };

        tracing::info!(
            exam_id = %session.exam_id,
            %reason,
            answered = submission.answered(),
            total = submission.total(),
            "exam submitted"
        );

        self.status = SessionStatus::Submitted(Box::new(submission));
        self.notifier.notify(Notice::Submitted { reason });
        self.submission()
    }

    // -----------------------------------------------------------------------
    // Student actions
    // -----------------------------------------------------------------------

    /// Record the chosen option index for a question.
    ///
    /// The index is not checked against the question's options; out-of-range
    /// values are dropped when the submission is assembled.
    pub fn select_answer(&mut self, question: QuestionId, option_index: usize) -> bool {
        if !self.status.is_active() {
            return false;
        }
        self.answers.insert(question, option_index);
        true
    }

    /// Answer the question currently on screen.
    pub fn select_current(&mut self, option_index: usize) -> bool {
        match self.current_question().map(|q| q.id) {
            Some(id) => self.select_answer(id, option_index),
            None => false,
        }
    }

    /// Flip the review flag. Returns whether the question is now flagged.
    pub fn toggle_flag(&mut self, question: QuestionId) -> bool {
        if !self.status.is_active() {
            return self.flagged.contains(&question);
        }
        if self.flagged.remove(&question) {
            false
        } else {
            self.flagged.insert(question);
            true
        }
    }

    pub fn toggle_current_flag(&mut self) -> bool {
        match self.current_question().map(|q| q.id) {
            Some(id) => self.toggle_flag(id),
            None => false,
        }
    }

    /// Jump to a question. Out-of-range indices are ignored.
    pub fn go_to(&mut self, index: usize) -> bool {
        if !self.status.is_active() || index >= self.questions.len() {
            return false;
        }
        self.current_index = index;
        true
    }

    pub fn next(&mut self) -> bool {
        self.go_to(self.current_index.saturating_add(1))
    }

    pub fn previous(&mut self) -> bool {
        match self.current_index.checked_sub(1) {
            Some(index) => self.go_to(index),
            None => false,
        }
    }

    // -----------------------------------------------------------------------
    // Event sources
    // -----------------------------------------------------------------------

    /// One countdown period elapsed. Submits when time runs out.
    pub fn countdown_tick(&mut self) -> Tick {
        if !self.status.is_active() {
            return Tick::Idle;
        }
        let tick = self.countdown.tick(&mut self.time_left);
        if tick == Tick::Expired {
            tracing::info!("time is up");
            self.submit(SubmitReason::TimeUp);
        }
        tick
    }

    /// Snapshot progress to the cache. Returns whether a save happened.
    pub fn autosave_tick(&mut self) -> bool {
        if !self.status.is_active() {
            return false;
        }
        let snapshot = self.snapshot();
        match self.cache.as_mut() {
            Some(cache) => cache.save(&snapshot),
            None => false,
        }
    }

    /// Feed a violation from a detector. Returns whether it was counted.
    pub fn report_violation(&mut self, violation: Violation) -> bool {
        if !self.status.is_active() {
            return false;
        }
        let counted = self.monitor.record(&violation);
        self.drain_signals();
        counted
    }

    /// Update the connectivity flag shown to the student.
    pub fn set_offline(&mut self, offline: bool) {
        self.offline = offline;
        if let Some(cache) = self.cache.as_mut() {
            cache.set_offline(offline);
        }
    }

    fn drain_signals(&mut self) {
        while let Ok(signal) = self.signals_rx.try_recv() {
            match signal {
                Signal::ForceSubmit(reason) => {
                    self.submit(reason);
                }
            }
        }
    }

    fn snapshot(&self) -> CacheSnapshot {
        CacheSnapshot {
            exam_id: self
                .session
                .as_ref()
                .map(|s| s.exam_id.clone())
                .unwrap_or_else(|| ExamId::new("")),
            answers: self.answers.clone(),
            flagged: self.flagged.iter().copied().collect(),
            current_question_index: self.current_index,
            time_left_seconds: self.time_left,
            saved_at: self.clock.now(),
        }
    }

    // -----------------------------------------------------------------------
    // Read side
    // -----------------------------------------------------------------------

    pub fn status(&self) -> &SessionStatus {
        &self.status
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn answers(&self) -> &AnswerMap {
        &self.answers
    }

    pub fn flagged(&self) -> &FlagSet {
        &self.flagged
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current_index)
    }

    pub fn time_left_secs(&self) -> u32 {
        self.time_left
    }

    pub fn remaining_chances(&self) -> Option<u32> {
        self.config
            .secure_mode
            .then(|| self.monitor.remaining_chances())
    }

    pub fn submission(&self) -> Option<&ExamSubmission> {
        match &self.status {
            SessionStatus::Submitted(submission) => Some(submission),
            _ => None,
        }
    }

    pub fn is_submitted(&self) -> bool {
        matches!(self.status, SessionStatus::Submitted(_))
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            phase: self.status.phase(),
            current_index: self.current_index,
            question_count: self.questions.len(),
            current_answer: self
                .current_question()
                .and_then(|q| self.answers.get(&q.id).copied()),
            current_flagged: self
                .current_question()
                .is_some_and(|q| self.flagged.contains(&q.id)),
            answered: self.answers.len(),
            flagged: self.flagged.len(),
            time_left_secs: self.time_left,
            violations: self.monitor.count(),
            remaining_chances: self.remaining_chances(),
            last_saved_at: self.cache.as_ref().and_then(|c| c.last_saved_at()),
            is_saving: self.cache.as_ref().is_some_and(|c| c.is_saving()),
            is_offline: self.offline,
        }
    }
}
