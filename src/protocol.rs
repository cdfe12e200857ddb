use serde::{Deserialize, Serialize};

use crate::difficulty::Difficulty;

/// Field that accepts either a bare value or an array of values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(value) => vec![value],
            OneOrMany::Many(values) => values,
        }
    }

    pub fn as_slice(&self) -> &[T] {
        match self {
            OneOrMany::One(value) => std::slice::from_ref(value),
            OneOrMany::Many(values) => values,
        }
    }
}

/// Payload of the `startSkillCheck` host command. Some hosts send the stage
/// list under the key `difficulty`; both spellings are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartSkillCheck {
    #[serde(alias = "difficulty")]
    pub stages: OneOrMany<Difficulty>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<Vec<String>>,
}

impl StartSkillCheck {
    pub fn single(difficulty: Difficulty) -> StartSkillCheck {
        StartSkillCheck {
            stages: OneOrMany::One(difficulty),
            inputs: None,
        }
    }

    pub fn chain(difficulties: Vec<Difficulty>) -> StartSkillCheck {
        StartSkillCheck {
            stages: OneOrMany::Many(difficulties),
            inputs: None,
        }
    }

    pub fn with_inputs(mut self, inputs: Vec<String>) -> StartSkillCheck {
        self.inputs = Some(inputs);
        self
    }
}

/// Host → UI command, carried in the `{action, data}` envelope.
///
/// Only the skill-check commands are modeled here; the presentational
/// widgets speak the same envelope but live outside this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "data")]
pub enum HostCommand {
    #[serde(rename = "startSkillCheck")]
    StartSkillCheck(StartSkillCheck),
    #[serde(rename = "skillCheckCancel")]
    SkillCheckCancel {},
}

/// UI → host terminal reply, emitted exactly once per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillCheckOver {
    pub success: bool,
}

impl SkillCheckOver {
    pub const EVENT: &'static str = "handleSkillCheckOver";

    /// The callback envelope the host receives.
    pub fn envelope(&self) -> serde_json::Value {
        serde_json::json!({ "event": Self::EVENT, "data": self.success })
    }
}
