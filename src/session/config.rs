use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;
use std::time::Duration;

pub const ACTION_DURATION_SECS: RangeInclusive<u32> = 3..=30;
pub const REST_DURATION_SECS: RangeInclusive<u32> = 2..=30;
pub const REPEAT_TIMES: RangeInclusive<u32> = 1..=20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DominantHand {
    Left,
    Right,
}

impl DominantHand {
    pub fn as_str(self) -> &'static str {
        match self {
            DominantHand::Left => "left",
            DominantHand::Right => "right",
        }
    }
}

impl FromStr for DominantHand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "left" => Ok(DominantHand::Left),
            "right" => Ok(DominantHand::Right),
            other => Err(format!("unknown hand '{}', expected left or right", other)),
        }
    }
}

impl fmt::Display for DominantHand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recording protocol as submitted by the web layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    pub subject_id: String,
    pub dominant_hand: DominantHand,
    /// Seconds per action cue.
    pub action_duration: u32,
    pub repeat_times: u32,
    /// Seconds of rest after each action.
    pub rest_duration: u32,
    pub selected_actions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required field {0}")]
    Missing(&'static str),
    #[error("{field} = {value} is outside {min}..={max}")]
    OutOfRange {
        field: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },
    #[error("no action selected")]
    NoActionSelected,
    #[error("subject id {0:?} cannot be used as a directory name")]
    InvalidSubject(String),
}

fn check_range(field: &'static str, value: u32, range: &RangeInclusive<u32>) -> Result<(), ValidationError> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange {
            field,
            value,
            min: *range.start(),
            max: *range.end(),
        })
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let subject = self.subject_id.trim();
        if subject.is_empty() {
            return Err(ValidationError::Missing("subjectId"));
        }
        if subject == "." || subject == ".." || subject.contains(['/', '\\']) {
            return Err(ValidationError::InvalidSubject(self.subject_id.clone()));
        }
        check_range("actionDuration", self.action_duration, &ACTION_DURATION_SECS)?;
        check_range("restDuration", self.rest_duration, &REST_DURATION_SECS)?;
        check_range("repeatTimes", self.repeat_times, &REPEAT_TIMES)?;
        if self.selected_actions.is_empty() {
            return Err(ValidationError::NoActionSelected);
        }
        if self.selected_actions.iter().any(|a| a.trim().is_empty()) {
            return Err(ValidationError::Missing("selectedActions[]"));
        }
        Ok(())
    }

    pub fn plan(&self) -> TrialPlan {
        TrialPlan {
            action: Duration::from_secs(self.action_duration.into()),
            rest: Duration::from_secs(self.rest_duration.into()),
            repetitions: self.repeat_times,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum TrialPhase {
    /// `repetition` counts from 1.
    Action { repetition: u32, remaining_secs: f64 },
    Rest { repetition: u32, remaining_secs: f64 },
    Complete,
}

/// Cue schedule: `repetitions` x (action, rest). Advisory only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrialPlan {
    pub action: Duration,
    pub rest: Duration,
    pub repetitions: u32,
}

impl TrialPlan {
    pub fn total(&self) -> Duration {
        (self.action + self.rest) * self.repetitions
    }

    pub fn phase_at(&self, elapsed: Duration) -> TrialPhase {
        let cycle = self.action + self.rest;
        if cycle.is_zero() || elapsed >= self.total() {
            return TrialPhase::Complete;
        }
        let cycle_secs = cycle.as_secs_f64();
        let elapsed_secs = elapsed.as_secs_f64();
        let index = (elapsed_secs / cycle_secs).floor();
        let within = elapsed_secs - index * cycle_secs;
        let repetition = index as u32 + 1;
        let action_secs = self.action.as_secs_f64();

        if within < action_secs {
            TrialPhase::Action {
                repetition,
                remaining_secs: action_secs - within,
            }
        } else {
            TrialPhase::Rest {
                repetition,
                remaining_secs: cycle_secs - within,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fist() -> SessionConfig {
        SessionConfig {
            subject_id: "7".into(),
            dominant_hand: DominantHand::Right,
            action_duration: 7,
            repeat_times: 4,
            rest_duration: 4,
            selected_actions: vec!["fist".into()],
        }
    }

    #[test]
    fn parses_web_field_names() {
        let config: SessionConfig = serde_json::from_str(
            r#"{"subjectId":"7","dominantHand":"right","actionDuration":7,
                "repeatTimes":4,"restDuration":4,"selectedActions":["fist"]}"#,
        )
        .unwrap();
        assert_eq!(config, fist());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_and_empty() {
        let mut config = fist();
        config.action_duration = 31;
        assert_eq!(
            config.validate(),
            Err(ValidationError::OutOfRange {
                field: "actionDuration",
                value: 31,
                min: 3,
                max: 30
            })
        );

        let mut config = fist();
        config.selected_actions.clear();
        assert_eq!(config.validate(), Err(ValidationError::NoActionSelected));

        let mut config = fist();
        config.subject_id = "  ".into();
        assert_eq!(config.validate(), Err(ValidationError::Missing("subjectId")));

        let mut config = fist();
        config.subject_id = "../etc".into();
        assert!(matches!(config.validate(), Err(ValidationError::InvalidSubject(_))));
    }

    #[test]
    fn plan_walks_action_rest_cycles() {
        let plan = fist().plan();
        assert_eq!(plan.total(), Duration::from_secs(44));
        assert_eq!(
            plan.phase_at(Duration::from_secs(0)),
            TrialPhase::Action {
                repetition: 1,
                remaining_secs: 7.0
            }
        );
        assert_eq!(
            plan.phase_at(Duration::from_secs(8)),
            TrialPhase::Rest {
                repetition: 1,
                remaining_secs: 3.0
            }
        );
        assert!(matches!(
            plan.phase_at(Duration::from_secs(34)),
            TrialPhase::Action { repetition: 4, .. }
        ));
        assert_eq!(plan.phase_at(Duration::from_secs(44)), TrialPhase::Complete);
    }
}
