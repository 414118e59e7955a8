//! Session integrity monitor.
//!
//! Detectors (focus loss, visibility change, clipboard use, ...) each produce
//! `Violation`s. The monitor does not know which detector a violation came
//! from; it only counts them and escalates once the configured number of
//! chances is used up.
//!
//! Counting is additive and monotonic: nothing is forgiven over time. The
//! cutoff is `count > max_violations`, so a student sees warnings
//! `1/(max+1)` through `max/(max+1)` and the `(max+1)`th violation ends the
//! exam.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Clipboard operation that triggered a violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClipboardAction {
    Copy,
    Cut,
    Paste,
}

/// What kind of integrity rule was broken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "action", rename_all = "snake_case")]
pub enum ViolationKind {
    FocusLost,
    VisibilityHidden,
    FullscreenExit,
    Clipboard(ClipboardAction),
    DevTools,
    ContextMenu,
    Interrupt,
}

impl ViolationKind {
    /// Message shown to the student when this violation fires.
    pub fn default_message(&self) -> &'static str {
        match self {
            ViolationKind::FocusLost => "You left the exam window.",
            ViolationKind::VisibilityHidden => "The exam was hidden from view.",
            ViolationKind::FullscreenExit => "You exited fullscreen mode.",
            ViolationKind::Clipboard(ClipboardAction::Copy) => "Copying is not allowed.",
            ViolationKind::Clipboard(ClipboardAction::Cut) => "Cutting is not allowed.",
            ViolationKind::Clipboard(ClipboardAction::Paste) => "Pasting is not allowed.",
            ViolationKind::DevTools => "Developer tools are not allowed.",
            ViolationKind::ContextMenu => "The context menu is disabled during the exam.",
            ViolationKind::Interrupt => "Interrupting the exam is not allowed.",
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationKind::FocusLost => write!(f, "focus_lost"),
            ViolationKind::VisibilityHidden => write!(f, "visibility_hidden"),
            ViolationKind::FullscreenExit => write!(f, "fullscreen_exit"),
            ViolationKind::Clipboard(ClipboardAction::Copy) => write!(f, "clipboard_copy"),
            ViolationKind::Clipboard(ClipboardAction::Cut) => write!(f, "clipboard_cut"),
            ViolationKind::Clipboard(ClipboardAction::Paste) => write!(f, "clipboard_paste"),
            ViolationKind::DevTools => write!(f, "dev_tools"),
            ViolationKind::ContextMenu => write!(f, "context_menu"),
            ViolationKind::Interrupt => write!(f, "interrupt"),
        }
    }
}

/// One detected integrity breach. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub kind: ViolationKind,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl Violation {
    /// A violation carrying the kind's default message.
    pub fn new(kind: ViolationKind, timestamp: DateTime<Utc>) -> Self {
        Self {
            kind,
            message: kind.default_message().to_string(),
            timestamp,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

type ViolationCallback = Box<dyn FnMut(&Violation, u32) + Send>;
type EscalationCallback = Box<dyn FnOnce() + Send>;

/// Counts violations and escalates once after `max_violations` is exceeded.
#[derive(Default)]
pub struct SecurityMonitor {
    armed: bool,
    max_violations: u32,
    count: u32,
    escalated: bool,
    on_violation: Option<ViolationCallback>,
    on_max_exceeded: Option<EscalationCallback>,
}

impl SecurityMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start monitoring with a fresh counter.
    ///
    /// `on_violation` receives every counted violation with the new count.
    /// `on_max_exceeded` runs at most once, on the first violation that takes
    /// the count past `max_violations`.
    pub fn arm<V, M>(&mut self, max_violations: u32, on_violation: V, on_max_exceeded: M)
    where
        V: FnMut(&Violation, u32) + Send + 'static,
        M: FnOnce() + Send + 'static,
    {
        self.armed = true;
        self.max_violations = max_violations;
        self.count = 0;
        self.escalated = false;
        self.on_violation = Some(Box::new(on_violation));
        self.on_max_exceeded = Some(Box::new(on_max_exceeded));
        tracing::debug!(max_violations, "security monitor armed");
    }

    /// Record a violation. Returns `true` if it was counted.
    ///
    /// Violations arriving while disarmed, or after escalation, are ignored.
    pub fn record(&mut self, violation: &Violation) -> bool {
        if !self.armed || self.escalated {
            tracing::debug!(kind = %violation.kind, "violation ignored");
            return false;
        }

        self.count += 1;
        tracing::warn!(
            kind = %violation.kind,
            count = self.count,
            max = self.max_violations,
            "integrity violation"
        );

        if let Some(on_violation) = self.on_violation.as_mut() {
            on_violation(violation, self.count);
        }

        if self.count > self.max_violations {
            self.escalated = true;
            if let Some(on_max_exceeded) = self.on_max_exceeded.take() {
                on_max_exceeded();
            }
        }

        true
    }

    /// Stop monitoring. Drops both callbacks, so neither can run again.
    pub fn disarm(&mut self) {
        if self.armed {
            tracing::debug!(count = self.count, "security monitor disarmed");
        }
        self.armed = false;
        self.on_violation = None;
        self.on_max_exceeded = None;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn is_escalated(&self) -> bool {
        self.escalated
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn max_violations(&self) -> u32 {
        self.max_violations
    }

    /// Denominator of the "Warning k/n" message.
    pub fn warning_limit(&self) -> u32 {
        self.max_violations.saturating_add(1)
    }

    pub fn remaining_chances(&self) -> u32 {
        self.max_violations.saturating_sub(self.count)
    }
}

impl fmt::Debug for SecurityMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityMonitor")
            .field("armed", &self.armed)
            .field("max_violations", &self.max_violations)
            .field("count", &self.count)
            .field("escalated", &self.escalated)
            .finish()
    }
}
