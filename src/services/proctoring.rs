//! Violation counting for proctored attempts.
//!
//! Fullscreen exits and the page becoming hidden are both violations. Each one
//! bumps the counter by one; below the threshold the candidate gets a warning,
//! at the threshold the attempt is submitted on their behalf. The counter only
//! ever goes up.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProctoringPolicy {
    pub max_violations: u32,
    /// Signals arriving this soon after the attempt starts are ignored; the
    /// switch into fullscreen itself fires change events.
    pub grace_period: Duration,
    /// Violations closer together than this count once. Zero disables it.
    pub coalesce_window: Duration,
}

impl Default for ProctoringPolicy {
    fn default() -> Self {
        Self {
            max_violations: 3,
            grace_period: Duration::milliseconds(2_000),
            coalesce_window: Duration::zero(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProctoringSignal {
    FullscreenExited,
    FullscreenEntered,
    VisibilityHidden,
    VisibilityVisible,
}

impl ProctoringSignal {
    fn describe(&self) -> &'static str {
        match self {
            ProctoringSignal::FullscreenExited => "left fullscreen",
            ProctoringSignal::VisibilityHidden => "switched away from the quiz",
            ProctoringSignal::FullscreenEntered | ProctoringSignal::VisibilityVisible => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationWarning {
    pub violation: u32,
    pub remaining: u32,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProctoringOutcome {
    Ignored,
    OverlayCleared,
    Warned(ViolationWarning),
    Terminate { violations: u32, reason: String },
}

impl ProctoringOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProctoringOutcome::Ignored => "ignored",
            ProctoringOutcome::OverlayCleared => "overlay_cleared",
            ProctoringOutcome::Warned(_) => "warned",
            ProctoringOutcome::Terminate { .. } => "terminated",
        }
    }
}

/// Per-attempt monitor state. The owning session decides whether the attempt
/// is live; the monitor only tracks counts and what the page should display.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViolationMonitor {
    armed_at: Option<DateTime<Utc>>,
    violations: u32,
    last_violation_at: Option<DateTime<Utc>>,
    overlay_visible: bool,
    warning: Option<ViolationWarning>,
}

impl ViolationMonitor {
    /// Restores a monitor with a prior count, e.g. from a checkpoint.
    pub fn with_count(violations: u32) -> Self {
        Self {
            violations,
            ..Default::default()
        }
    }

    pub fn arm(&mut self, started_at: DateTime<Utc>, policy: &ProctoringPolicy) {
        self.armed_at = Some(started_at + policy.grace_period);
        self.overlay_visible = false;
    }

    pub fn violations(&self) -> u32 {
        self.violations
    }

    pub fn overlay_visible(&self) -> bool {
        self.overlay_visible
    }

    pub fn warning(&self) -> Option<&ViolationWarning> {
        self.warning.as_ref()
    }

    pub fn dismiss_warning(&mut self) {
        self.warning = None;
    }

    pub fn observe(
        &mut self,
        signal: ProctoringSignal,
        now: DateTime<Utc>,
        policy: &ProctoringPolicy,
    ) -> ProctoringOutcome {
        let Some(armed_at) = self.armed_at else {
            return ProctoringOutcome::Ignored;
        };

        match signal {
            ProctoringSignal::FullscreenEntered => {
                if self.overlay_visible {
                    self.overlay_visible = false;
                    return ProctoringOutcome::OverlayCleared;
                }
                return ProctoringOutcome::Ignored;
            }
            ProctoringSignal::VisibilityVisible => return ProctoringOutcome::Ignored,
            ProctoringSignal::FullscreenExited | ProctoringSignal::VisibilityHidden => {}
        }

        if now < armed_at {
            return ProctoringOutcome::Ignored;
        }

        if signal == ProctoringSignal::FullscreenExited {
            self.overlay_visible = true;
        }

        if policy.coalesce_window > Duration::zero() {
            if let Some(last) = self.last_violation_at {
                if now - last < policy.coalesce_window {
                    return ProctoringOutcome::Ignored;
                }
            }
        }

        self.violations = self.violations.saturating_add(1);
        self.last_violation_at = Some(now);
        self.warning = None;

        if self.violations >= policy.max_violations {
            return ProctoringOutcome::Terminate {
                violations: self.violations,
                reason: format!(
                    "Quiz submitted automatically after {} proctoring violations (last: candidate {})",
                    self.violations,
                    signal.describe()
                ),
            };
        }

        let remaining = policy.max_violations - self.violations;
        let warning = ViolationWarning {
            violation: self.violations,
            remaining,
            message: format!(
                "Warning: you {}. {} more violation{} will submit your quiz automatically.",
                signal.describe(),
                remaining,
                if remaining == 1 { "" } else { "s" }
            ),
        };
        self.warning = Some(warning.clone());
        ProctoringOutcome::Warned(warning)
    }
}
