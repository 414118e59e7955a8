//! Integrity violation detectors.
//!
//! Each detector runs in its own task and pushes `Violation`s into a channel
//! shared with the session loop. A detector that errors or panics is logged
//! and left alone; the others keep running.

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use examkit_core::security::{Violation, ViolationKind};
use examkit_core::time::Clock;

/// Channel a detector reports into.
pub type ViolationSender = mpsc::Sender<Violation>;

/// A source of integrity violations.
#[async_trait]
pub trait Detector: Send {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Watch for violations until the receiver goes away.
    async fn run(&mut self, violations: ViolationSender) -> Result<()>;
}

/// Running detector tasks.
pub struct DetectorSet {
    tasks: Vec<(String, JoinHandle<()>)>,
}

impl DetectorSet {
    /// Spawn every detector on the current runtime.
    pub fn spawn(detectors: Vec<Box<dyn Detector>>, violations: ViolationSender) -> Self {
        let tasks = detectors
            .into_iter()
            .map(|mut detector| {
                let name = detector.name().to_string();
                let task_name = name.clone();
                let tx = violations.clone();
                let handle = tokio::spawn(async move {
                    match detector.run(tx).await {
                        Ok(()) => tracing::debug!(detector = %task_name, "detector finished"),
                        Err(e) => tracing::warn!(detector = %task_name, "detector failed: {e:#}"),
                    }
                });
                tracing::debug!(detector = %name, "detector armed");
                (name, handle)
            })
            .collect();
        Self { tasks }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Stop every detector and wait for its task to finish.
    pub async fn disarm(self) {
        for (_, handle) in &self.tasks {
            handle.abort();
        }

        let results = futures::future::join_all(
            self.tasks
                .into_iter()
                .map(|(name, handle)| async move { (name, handle.await) }),
        )
        .await;

        for (name, result) in results {
            match result {
                Err(e) if e.is_panic() => tracing::error!(detector = %name, "detector panicked"),
                _ => tracing::debug!(detector = %name, "detector disarmed"),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Built-in detectors
// ---------------------------------------------------------------------------

/// Reports Ctrl+C on the terminal as an `Interrupt` violation.
#[derive(Debug, Default)]
pub struct InterruptDetector {
    clock: Clock,
}

impl InterruptDetector {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Detector for InterruptDetector {
    fn name(&self) -> &str {
        "interrupt"
    }

    async fn run(&mut self, violations: ViolationSender) -> Result<()> {
        loop {
            tokio::signal::ctrl_c()
                .await
                .context("failed to listen for Ctrl+C")?;
            let violation = Violation::new(ViolationKind::Interrupt, self.clock.now());
            if violations.send(violation).await.is_err() {
                return Ok(());
            }
        }
    }
}

/// Forwards violations reported by the host through an
/// [`ExternalDetectorHandle`], e.g. focus or clipboard events from a UI.
pub struct ExternalDetector {
    rx: mpsc::UnboundedReceiver<Violation>,
}

/// Cloneable reporting end of an [`ExternalDetector`].
#[derive(Debug, Clone)]
pub struct ExternalDetectorHandle {
    tx: mpsc::UnboundedSender<Violation>,
    clock: Clock,
}

impl ExternalDetector {
    pub fn new() -> (Self, ExternalDetectorHandle) {
        Self::with_clock(Clock::default())
    }

    pub fn with_clock(clock: Clock) -> (Self, ExternalDetectorHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { rx }, ExternalDetectorHandle { tx, clock })
    }
}

impl ExternalDetectorHandle {
    /// Report a violation with its default message. Returns `false` once the
    /// detector has been disarmed.
    pub fn report(&self, kind: ViolationKind) -> bool {
        self.report_violation(Violation::new(kind, self.clock.now()))
    }

    pub fn report_violation(&self, violation: Violation) -> bool {
        self.tx.send(violation).is_ok()
    }
}

#[async_trait]
impl Detector for ExternalDetector {
    fn name(&self) -> &str {
        "external"
    }

    async fn run(&mut self, violations: ViolationSender) -> Result<()> {
        while let Some(violation) = self.rx.recv().await {
            if violations.send(violation).await.is_err() {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use examkit_core::security::ClipboardAction;

    struct FailingDetector;

    #[async_trait]
    impl Detector for FailingDetector {
        fn name(&self) -> &str {
            "failing"
        }

        async fn run(&mut self, _: ViolationSender) -> Result<()> {
            anyhow::bail!("no display attached")
        }
    }

    struct PanickingDetector;

    #[async_trait]
    impl Detector for PanickingDetector {
        fn name(&self) -> &str {
            "panicking"
        }

        async fn run(&mut self, _: ViolationSender) -> Result<()> {
            panic!("detector bug")
        }
    }

    #[tokio::test]
    async fn external_detector_forwards_reports() {
        let (detector, handle) = ExternalDetector::new();
        let (tx, mut rx) = mpsc::channel(8);
        let set = DetectorSet::spawn(vec![Box::new(detector)], tx);

        assert!(handle.report(ViolationKind::Clipboard(ClipboardAction::Paste)));
        let violation = rx.recv().await.unwrap();
        assert_eq!(violation.kind, ViolationKind::Clipboard(ClipboardAction::Paste));

        set.disarm().await;
    }

    #[tokio::test]
    async fn failing_detectors_are_isolated() {
        let (detector, handle) = ExternalDetector::new();
        let (tx, mut rx) = mpsc::channel(8);
        let set = DetectorSet::spawn(
            vec![
                Box::new(FailingDetector),
                Box::new(PanickingDetector),
                Box::new(detector),
            ],
            tx,
        );
        assert_eq!(set.len(), 3);

        // Give the failing tasks a chance to run first.
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(handle.report(ViolationKind::FocusLost));
        let violation = rx.recv().await.unwrap();
        assert_eq!(violation.kind, ViolationKind::FocusLost);

        set.disarm().await;
    }

    #[tokio::test]
    async fn disarm_stops_forwarding() {
        let (detector, handle) = ExternalDetector::new();
        let (tx, mut rx) = mpsc::channel(8);
        let set = DetectorSet::spawn(vec![Box::new(detector)], tx);

        set.disarm().await;

        assert!(!handle.report(ViolationKind::DevTools));
        assert!(rx.recv().await.is_none());
    }
}
