use rand::Rng;

use crate::difficulty::{resolve, ResolvedStage};
use crate::protocol::StartSkillCheck;
use crate::sweep::normalize_deg;

/// Key the session falls back to when the host supplies no input pool.
pub const DEFAULT_KEY: &str = "e";

/// Zone placement keeps this many degrees between the indicator's start
/// position (top of the ring) and the earliest possible zone start.
const MIN_ZONE_OFFSET_DEG: i64 = 120;

/// Accepted input keys, normalized to lowercase and deduplicated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPool {
    keys: Vec<String>,
}

impl KeyPool {
    /// Build a pool from host-supplied identifiers. An empty or missing list
    /// yields the single-key default pool.
    pub fn from_inputs(inputs: Option<&[String]>) -> KeyPool {
        let mut keys: Vec<String> = Vec::new();
        if let Some(inputs) = inputs {
            for raw in inputs {
                let key = raw.to_lowercase();
                if !key.is_empty() && !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        if keys.is_empty() {
            keys.push(DEFAULT_KEY.to_string());
        }
        KeyPool { keys }
    }

    /// Membership check; `key` must already be normalized.
    pub fn contains(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key)
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Uniform draw, mirroring the host contract's key assignment.
    pub fn choose<R: Rng>(&self, rng: &mut R) -> &str {
        &self.keys[rng.gen_range(0..self.keys.len())]
    }
}

impl Default for KeyPool {
    fn default() -> Self {
        KeyPool::from_inputs(None)
    }
}

/// One run of the skill-check: an immutable stage chain plus the key pool.
/// Never mutated after creation; all per-stage state lives in [`ActiveStage`].
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    stages: Vec<ResolvedStage>,
    key_pool: KeyPool,
}

impl Session {
    pub fn stages(&self) -> &[ResolvedStage] {
        &self.stages
    }

    pub fn stage(&self, index: usize) -> Option<&ResolvedStage> {
        self.stages.get(index)
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn key_pool(&self) -> &KeyPool {
        &self.key_pool
    }
}

/// The in-flight stage: geometry, speed, and key drawn once at stage entry.
/// Replaced wholesale on every transition.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveStage {
    pub index: usize,
    pub zone_start_deg: f64,
    pub arc_width_deg: f64,
    pub speed_multiplier: f64,
    pub assigned_key: String,
}

impl ActiveStage {
    /// Draw a fresh stage: zone start at `-90 + random_int(120, 360 - width)`
    /// (then normalized into [0, 360)) and one key chosen uniformly from the
    /// pool. The lower placement bound keeps the zone clear of the
    /// indicator's starting position; for very wide arcs the draw range
    /// collapses to that bound.
    pub fn draw<R: Rng>(
        index: usize,
        spec: &ResolvedStage,
        pool: &KeyPool,
        rng: &mut R,
    ) -> ActiveStage {
        let upper = ((360.0 - spec.arc_width_deg) as i64).max(MIN_ZONE_OFFSET_DEG + 1);
        let raw_start = -90 + rng.gen_range(MIN_ZONE_OFFSET_DEG..upper);

        ActiveStage {
            index,
            zone_start_deg: normalize_deg(raw_start as f64),
            arc_width_deg: spec.arc_width_deg,
            speed_multiplier: spec.speed_multiplier,
            assigned_key: pool.choose(rng).to_string(),
        }
    }

    /// Center of the target arc, normalized.
    pub fn zone_center_deg(&self) -> f64 {
        normalize_deg(self.zone_start_deg + self.arc_width_deg / 2.0)
    }
}

/// Rejection reasons for a start command.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    EmptyStages,
    MalformedStage { index: usize, reason: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::EmptyStages => write!(f, "invalid config: stage list is empty"),
            ConfigError::MalformedStage { index, reason } => {
                write!(f, "invalid config: stage {} is malformed ({})", index, reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Expands a start command into a validated [`Session`].
pub struct SessionBuilder<'a> {
    command: &'a StartSkillCheck,
}

impl<'a> SessionBuilder<'a> {
    pub fn new(command: &'a StartSkillCheck) -> Self {
        Self { command }
    }

    pub fn build(&self) -> Result<Session, ConfigError> {
        let entries = self.command.stages.as_slice();
        if entries.is_empty() {
            return Err(ConfigError::EmptyStages);
        }

        let mut stages = Vec::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            let stage = resolve(entry).map_err(|err| ConfigError::MalformedStage {
                index,
                reason: err.to_string(),
            })?;
            stages.push(stage);
        }

        Ok(Session {
            stages,
            key_pool: KeyPool::from_inputs(self.command.inputs.as_deref()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::difficulty::{Difficulty, Level, StageLabel};
    use crate::protocol::OneOrMany;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn key_pool_normalizes_and_dedupes() {
        let inputs = vec!["W".to_string(), "a".into(), "w".into(), "S".into()];
        let pool = KeyPool::from_inputs(Some(&inputs));
        assert_eq!(pool.keys(), ["w", "a", "s"]);
        assert!(pool.contains("w"));
        assert!(!pool.contains("W"));
    }

    #[test]
    fn missing_or_empty_inputs_default_to_e() {
        assert_eq!(KeyPool::from_inputs(None).keys(), [DEFAULT_KEY]);
        assert_eq!(KeyPool::from_inputs(Some(&[])).keys(), [DEFAULT_KEY]);
    }

    #[test]
    fn single_difficulty_becomes_one_stage() {
        let cmd = StartSkillCheck::single(Difficulty::named(Level::Easy));
        let session = SessionBuilder::new(&cmd).build().unwrap();
        assert_eq!(session.stage_count(), 1);
        assert_eq!(session.stages()[0].label, StageLabel::Easy);
    }

    #[test]
    fn empty_stage_list_is_rejected() {
        let cmd = StartSkillCheck {
            stages: OneOrMany::Many(vec![]),
            inputs: None,
        };
        assert_eq!(
            SessionBuilder::new(&cmd).build(),
            Err(ConfigError::EmptyStages)
        );
    }

    #[test]
    fn malformed_entry_is_rejected_with_its_index() {
        let cmd = StartSkillCheck::chain(vec![
            Difficulty::named(Level::Easy),
            Difficulty::Custom {
                area_size: 40.0,
                speed_multiplier: -1.0,
            },
        ]);
        match SessionBuilder::new(&cmd).build() {
            Err(ConfigError::MalformedStage { index, .. }) => assert_eq!(index, 1),
            other => panic!("expected malformed stage, got {:?}", other),
        }
    }

    #[test]
    fn drawn_zone_stays_inside_the_placement_band() {
        let mut rng = StdRng::seed_from_u64(7);
        let spec = ResolvedStage::from_level(Level::Easy);
        let pool = KeyPool::default();

        for _ in 0..500 {
            let stage = ActiveStage::draw(0, &spec, &pool, &mut rng);
            // Raw start is -90 + [120, 310) = [30, 220) for a 50 degree arc,
            // already inside [0, 360) after normalization.
            assert!(stage.zone_start_deg >= 30.0);
            assert!(stage.zone_start_deg < 220.0);
            assert_eq!(stage.assigned_key, DEFAULT_KEY);
        }
    }

    #[test]
    fn drawn_key_comes_from_the_pool() {
        let mut rng = StdRng::seed_from_u64(11);
        let spec = ResolvedStage::from_level(Level::Hard);
        let inputs = vec!["W".to_string(), "A".into(), "S".into(), "D".into()];
        let pool = KeyPool::from_inputs(Some(&inputs));

        for _ in 0..100 {
            let stage = ActiveStage::draw(0, &spec, &pool, &mut rng);
            assert!(pool.contains(&stage.assigned_key));
        }
    }

    #[test]
    fn very_wide_arcs_collapse_to_the_minimum_offset() {
        let mut rng = StdRng::seed_from_u64(3);
        let spec = resolve(&Difficulty::Custom {
            area_size: 300.0,
            speed_multiplier: 1.0,
        })
        .unwrap();
        let stage = ActiveStage::draw(0, &spec, &KeyPool::default(), &mut rng);
        assert_eq!(stage.zone_start_deg, 30.0);
    }

    #[test]
    fn seeded_draws_are_reproducible() {
        let spec = ResolvedStage::from_level(Level::Medium);
        let pool = KeyPool::from_inputs(Some(&["q".to_string(), "e".into()]));

        let a = ActiveStage::draw(2, &spec, &pool, &mut StdRng::seed_from_u64(42));
        let b = ActiveStage::draw(2, &spec, &pool, &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }
}
