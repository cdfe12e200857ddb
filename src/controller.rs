use rand::Rng;

use crate::difficulty::StageLabel;
use crate::evaluate::{evaluate, Verdict};
use crate::protocol::{SkillCheckOver, StartSkillCheck};
use crate::router::InputRouter;
use crate::session::{ActiveStage, ConfigError, Session, SessionBuilder};
use crate::sweep::{angle_at, period_ms, timed_out};

/// Lifecycle of one session. The active stage lives inside `Running` and is
/// replaced wholesale on every transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    Idle,
    Running(ActiveStage),
    Complete { success: bool },
}

/// How one stage ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum StageOutcome {
    Hit,
    Miss,
    Timeout,
    Cancelled,
}

/// Record of one resolved stage, kept for analytics and the result screen.
#[derive(Debug, Clone, PartialEq)]
pub struct StageAttempt {
    pub index: usize,
    pub label: StageLabel,
    pub zone_start_deg: f64,
    pub arc_width_deg: f64,
    pub speed_multiplier: f64,
    pub assigned_key: String,
    pub outcome: StageOutcome,
    /// Indicator position when the stage resolved; None without a keypress.
    pub angle_deg: Option<f64>,
    /// Signed shortest offset from the zone center, in (-180, 180].
    pub error_deg: Option<f64>,
    /// Elapsed ms into the stage at the keypress.
    pub reaction_ms: Option<u64>,
}

/// Result of feeding a start command to a controller.
pub enum StartOutcome<R: Rng> {
    Started(Box<SessionController<R>>),
    /// The config was unusable: the session never entered Running and this
    /// is the single `false` reply the host receives, with the diagnostic.
    Rejected {
        error: ConfigError,
        reply: SkillCheckOver,
    },
}

/// The state machine orchestrating stage transitions, timeouts, cancellation,
/// and the exactly-once terminal reply.
///
/// All timestamps are caller-supplied milliseconds on one monotonic timeline,
/// which keeps every transition deterministic under test. Handlers are
/// re-entered per event and never block.
#[derive(Debug)]
pub struct SessionController<R: Rng> {
    session: Session,
    rng: R,
    phase: Phase,
    router: Option<InputRouter>,
    stage_entered_ms: u64,
    attempts: Vec<StageAttempt>,
    emitted: bool,
}

impl<R: Rng> SessionController<R> {
    pub fn new(session: Session, rng: R) -> Self {
        Self {
            session,
            rng,
            phase: Phase::Idle,
            router: None,
            stage_entered_ms: 0,
            attempts: Vec::new(),
            emitted: false,
        }
    }

    /// Build and start a session straight from a host command. A rejected
    /// config never enters Running; the caller forwards the ready-made reply.
    pub fn start_command(command: &StartSkillCheck, rng: R, now_ms: u64) -> StartOutcome<R> {
        match SessionBuilder::new(command).build() {
            Ok(session) => {
                let mut controller = SessionController::new(session, rng);
                controller.start(now_ms);
                StartOutcome::Started(Box::new(controller))
            }
            Err(error) => StartOutcome::Rejected {
                error,
                reply: SkillCheckOver { success: false },
            },
        }
    }

    /// Idle → Running: draw stage 0 and acquire the input subscription.
    /// No-op outside Idle; superseding an older session is done by dropping
    /// its controller and building a new one.
    pub fn start(&mut self, now_ms: u64) {
        if !matches!(self.phase, Phase::Idle) {
            return;
        }
        let spec = self.session.stages()[0];
        let stage = ActiveStage::draw(0, &spec, self.session.key_pool(), &mut self.rng);
        self.router = Some(InputRouter::subscribe(self.session.key_pool()));
        self.stage_entered_ms = now_ms;
        self.phase = Phase::Running(stage);
    }

    /// Animation tick: detect a completed revolution without a qualifying
    /// keypress and fail the session.
    pub fn on_tick(&mut self, now_ms: u64) -> Option<SkillCheckOver> {
        let stage = match &self.phase {
            Phase::Running(stage) => stage.clone(),
            _ => return None,
        };
        let elapsed = now_ms.saturating_sub(self.stage_entered_ms) as f64;
        if timed_out(elapsed, stage.speed_multiplier) {
            self.record(&stage, StageOutcome::Timeout, None, None);
            return self.complete(false);
        }
        None
    }

    /// Raw key-down event. Non-pool keys are dropped silently; pool keys are
    /// evaluated against the current indicator position.
    pub fn on_key(&mut self, raw_key: &str, now_ms: u64) -> Option<SkillCheckOver> {
        let stage = match &self.phase {
            Phase::Running(stage) => stage.clone(),
            _ => return None,
        };
        let key = match self.router.as_ref().and_then(|router| router.route(raw_key)) {
            Some(key) => key,
            None => return None,
        };

        let elapsed = now_ms.saturating_sub(self.stage_entered_ms);
        if timed_out(elapsed as f64, stage.speed_multiplier) {
            // The revolution completed before this press was processed.
            self.record(&stage, StageOutcome::Timeout, None, None);
            return self.complete(false);
        }

        let angle = angle_at(elapsed as f64, stage.speed_multiplier);
        let verdict = evaluate(
            angle,
            stage.zone_start_deg,
            stage.arc_width_deg,
            &key,
            &stage.assigned_key,
        );

        match verdict {
            Verdict::Hit => {
                self.record(&stage, StageOutcome::Hit, Some(angle), Some(elapsed));
                let next_index = stage.index + 1;
                match self.session.stage(next_index).copied() {
                    Some(spec) => {
                        let next = ActiveStage::draw(
                            next_index,
                            &spec,
                            self.session.key_pool(),
                            &mut self.rng,
                        );
                        self.stage_entered_ms = now_ms;
                        self.phase = Phase::Running(next);
                        None
                    }
                    None => self.complete(true),
                }
            }
            Verdict::Miss => {
                self.record(&stage, StageOutcome::Miss, Some(angle), Some(elapsed));
                self.complete(false)
            }
        }
    }

    /// Explicit cancel: abandon the current stage without evaluation.
    /// Idempotent — a cancel outside Running has no observable effect.
    pub fn cancel(&mut self) -> Option<SkillCheckOver> {
        let stage = match &self.phase {
            Phase::Running(stage) => stage.clone(),
            _ => return None,
        };
        self.record(&stage, StageOutcome::Cancelled, None, None);
        self.complete(false)
    }

    /// Terminal transition: release the input subscription and emit the
    /// reply, exactly once per session lifetime.
    fn complete(&mut self, success: bool) -> Option<SkillCheckOver> {
        self.phase = Phase::Complete { success };
        self.router = None;
        if self.emitted {
            None
        } else {
            self.emitted = true;
            Some(SkillCheckOver { success })
        }
    }

    fn record(
        &mut self,
        stage: &ActiveStage,
        outcome: StageOutcome,
        angle_deg: Option<f64>,
        reaction_ms: Option<u64>,
    ) {
        let label = self
            .session
            .stage(stage.index)
            .map(|spec| spec.label)
            .unwrap_or(StageLabel::Custom);
        self.attempts.push(StageAttempt {
            index: stage.index,
            label,
            zone_start_deg: stage.zone_start_deg,
            arc_width_deg: stage.arc_width_deg,
            speed_multiplier: stage.speed_multiplier,
            assigned_key: stage.assigned_key.clone(),
            outcome,
            angle_deg,
            error_deg: angle_deg.map(|a| signed_delta_deg(a, stage.zone_center_deg())),
            reaction_ms,
        });
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn active_stage(&self) -> Option<&ActiveStage> {
        match &self.phase {
            Phase::Running(stage) => Some(stage),
            _ => None,
        }
    }

    /// Sampled indicator position for the rendering layer.
    pub fn angle_now(&self, now_ms: u64) -> Option<f64> {
        let stage = self.active_stage()?;
        let elapsed = now_ms.saturating_sub(self.stage_entered_ms) as f64;
        Some(angle_at(elapsed, stage.speed_multiplier))
    }

    /// Fraction of the current revolution spent, in [0, 1].
    pub fn stage_progress(&self, now_ms: u64) -> Option<f64> {
        let stage = self.active_stage()?;
        let elapsed = now_ms.saturating_sub(self.stage_entered_ms) as f64;
        Some((elapsed / period_ms(stage.speed_multiplier)).min(1.0))
    }

    pub fn attempts(&self) -> &[StageAttempt] {
        &self.attempts
    }

    pub fn result(&self) -> Option<bool> {
        match self.phase {
            Phase::Complete { success } => Some(success),
            _ => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.phase, Phase::Complete { .. })
    }

    /// True while the input subscription is held (Running only).
    pub fn has_listener(&self) -> bool {
        self.router.is_some()
    }
}

/// Shortest signed angular difference `a - b`, in (-180, 180].
fn signed_delta_deg(a: f64, b: f64) -> f64 {
    let delta = (a - b).rem_euclid(360.0);
    if delta > 180.0 {
        delta - 360.0
    } else {
        delta
    }
}
