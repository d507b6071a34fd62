use serde::{Deserialize, Serialize};
use std::fmt;

/// Discrete movement categories produced by the classifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MovementState {
    Fallen,
    AboutToFall,
    Walking,
    Running,
    LyingStill,
    Crawling,
    RestlessLying,
    Unclassified,
}

impl MovementState {
    pub const ALL: [MovementState; 8] = [
        MovementState::Fallen,
        MovementState::AboutToFall,
        MovementState::Walking,
        MovementState::Running,
        MovementState::LyingStill,
        MovementState::Crawling,
        MovementState::RestlessLying,
        MovementState::Unclassified,
    ];

    /// Stable numeric label used as a training target
    pub fn index(&self) -> usize {
        match self {
            Self::Fallen => 0,
            Self::AboutToFall => 1,
            Self::Walking => 2,
            Self::Running => 3,
            Self::LyingStill => 4,
            Self::Crawling => 5,
            Self::RestlessLying => 6,
            Self::Unclassified => 7,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fallen => "Fallen",
            Self::AboutToFall => "AboutToFall",
            Self::Walking => "Walking",
            Self::Running => "Running",
            Self::LyingStill => "LyingStill",
            Self::Crawling => "Crawling",
            Self::RestlessLying => "RestlessLying",
            Self::Unclassified => "Unclassified",
        }
    }

    /// Operator-facing description
    pub fn description(&self) -> &'static str {
        match self {
            Self::Fallen => "Person has fallen and is not moving",
            Self::AboutToFall => "Person is leaning heavily and may be about to fall",
            Self::Walking => "Person is upright and walking",
            Self::Running => "Person is upright and moving quickly",
            Self::LyingStill => "Person is lying down with little movement",
            Self::Crawling => "Person is moving close to the ground",
            Self::RestlessLying => "Person is lying down and moving restlessly",
            Self::Unclassified => "Movement does not match any known pattern",
        }
    }
}

impl fmt::Display for MovementState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MovementState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();

        Self::ALL
            .iter()
            .copied()
            .find(|state| state.as_str().to_ascii_lowercase() == normalized)
            .ok_or_else(|| format!("Unknown movement state: {}", s))
    }
}
