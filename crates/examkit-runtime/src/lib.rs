//! examkit-runtime: Tokio driver for an exam session.
//!
//! `SessionRuntime` owns a started `SessionController` and feeds it from one
//! `select!` loop: host commands, the countdown interval, the autosave
//! interval, detector violations and connectivity changes. Every handler is a
//! plain synchronous call on the controller, so handlers never interleave.

pub mod detectors;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior};

use examkit_core::controller::{SessionController, SessionView};
use examkit_core::model::QuestionId;
use examkit_core::submission::{ExamSubmission, SubmitReason};

use crate::detectors::{Detector, DetectorSet};

const COMMAND_BUFFER: usize = 64;
const VIOLATION_BUFFER: usize = 64;

/// Something the student (or the host on their behalf) asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    SelectAnswer {
        question: QuestionId,
        option_index: usize,
    },
    /// Answer the question on screen.
    SelectCurrent(usize),
    ToggleFlag(QuestionId),
    ToggleCurrentFlag,
    GoTo(usize),
    Next,
    Previous,
    Submit(SubmitReason),
}

impl SessionCommand {
    fn apply(self, controller: &mut SessionController) {
        tracing::debug!(command = ?self, "applying command");
        match self {
            SessionCommand::SelectAnswer {
                question,
                option_index,
            } => {
                controller.select_answer(question, option_index);
            }
            SessionCommand::SelectCurrent(option_index) => {
                controller.select_current(option_index);
            }
            SessionCommand::ToggleFlag(question) => {
                controller.toggle_flag(question);
            }
            SessionCommand::ToggleCurrentFlag => {
                controller.toggle_current_flag();
            }
            SessionCommand::GoTo(index) => {
                controller.go_to(index);
            }
            SessionCommand::Next => {
                controller.next();
            }
            SessionCommand::Previous => {
                controller.previous();
            }
            SessionCommand::Submit(reason) => {
                controller.submit(reason);
            }
        }
    }
}

/// Host-side handle to a running session.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    view: watch::Receiver<SessionView>,
    connectivity: Arc<watch::Sender<bool>>,
}

impl SessionHandle {
    /// Queue a command. Fails once the session has ended.
    pub async fn send(&self, command: SessionCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| anyhow::anyhow!("session has ended"))
    }

    /// Latest published view.
    pub fn view(&self) -> SessionView {
        self.view.borrow().clone()
    }

    /// A receiver that is notified after every handled event.
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }

    /// Report a connectivity change.
    pub fn set_offline(&self, offline: bool) {
        self.connectivity.send_replace(offline);
    }
}

/// Drives a `SessionController` until it is submitted.
pub struct SessionRuntime {
    controller: SessionController,
    detectors: Vec<Box<dyn Detector>>,
    commands_tx: mpsc::Sender<SessionCommand>,
    commands_rx: mpsc::Receiver<SessionCommand>,
    view_tx: watch::Sender<SessionView>,
    view_rx: watch::Receiver<SessionView>,
    connectivity_tx: Arc<watch::Sender<bool>>,
    connectivity_rx: watch::Receiver<bool>,
}

impl SessionRuntime {
    /// Wrap a controller. The controller must already be started.
    pub fn new(controller: SessionController) -> Self {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
        let (view_tx, view_rx) = watch::channel(controller.view());
        let (connectivity_tx, connectivity_rx) = watch::channel(controller.view().is_offline);
        Self {
            controller,
            detectors: Vec::new(),
            commands_tx,
            commands_rx,
            view_tx,
            view_rx,
            connectivity_tx: Arc::new(connectivity_tx),
            connectivity_rx,
        }
    }

    /// Add a violation detector. Detectors only run when secure mode is on.
    pub fn with_detector(mut self, detector: impl Detector + 'static) -> Self {
        self.detectors.push(Box::new(detector));
        self
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            commands: self.commands_tx.clone(),
            view: self.view_rx.clone(),
            connectivity: Arc::clone(&self.connectivity_tx),
        }
    }

    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    /// Run until the session is submitted and return the submission.
    ///
    /// Detectors are disarmed and joined before this returns, so nothing
    /// reaches the controller after submission.
    pub async fn run(self) -> Result<ExamSubmission> {
        let SessionRuntime {
            mut controller,
            detectors,
            commands_tx,
            mut commands_rx,
            view_tx,
            connectivity_tx,
            mut connectivity_rx,
            ..
        } = self;

        if !controller.status().is_active() {
            bail!("session must be started before it can run");
        }

        // Only handles keep these open from here on.
        drop(commands_tx);
        drop(connectivity_tx);

        let config = controller.config().clone();
        let (violation_tx, mut violation_rx) = mpsc::channel(VIOLATION_BUFFER);
        let detectors = if config.secure_mode {
            detectors
        } else {
            Vec::new()
        };
        let detectors = DetectorSet::spawn(detectors, violation_tx);

        let mut countdown = periodic(config.tick_interval);
        let mut autosave = periodic(config.autosave_interval);
        let mut commands_open = true;
        let mut violations_open = !detectors.is_empty();
        let mut connectivity_open = true;

        tracing::info!(
            detectors = detectors.len(),
            time_left = controller.time_left_secs(),
            "session running"
        );
        view_tx.send_replace(controller.view());

        while !controller.is_submitted() {
            tokio::select! {
                command = commands_rx.recv(), if commands_open => match command {
                    Some(command) => command.apply(&mut controller),
                    None => {
                        tracing::debug!("all session handles dropped");
                        commands_open = false;
                    }
                },
                _ = countdown.tick() => {
                    controller.countdown_tick();
                }
                _ = autosave.tick() => {
                    controller.autosave_tick();
                }
                violation = violation_rx.recv(), if violations_open => match violation {
                    Some(violation) => {
                        controller.report_violation(violation);
                    }
                    None => violations_open = false,
                },
                changed = connectivity_rx.changed(), if connectivity_open => match changed {
                    Ok(()) => {
                        let offline = *connectivity_rx.borrow_and_update();
                        controller.set_offline(offline);
                    }
                    Err(_) => connectivity_open = false,
                },
            }
            view_tx.send_replace(controller.view());
        }

        detectors.disarm().await;

        controller
            .submission()
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("session ended without a submission"))
    }
}

/// Shortest period a session timer runs at. `interval_at` rejects zero.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Interval whose first tick is one period from now, skipping missed ticks.
fn periodic(period: Duration) -> Interval {
    let period = period.max(MIN_PERIOD);
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}
