use thiserror::Error;

use super::NodeId;

/// User-facing failures of the progression engine. All variants map to 4xx
/// responses except `Store`, which is a 5xx.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("skill node `{0}` not found")]
    NodeNotFound(NodeId),

    #[error("user `{0}` has no gamification profile")]
    ProfileNotFound(String),

    #[error("prerequisites not met: missing {missing:?}")]
    PrerequisitesNotMet { missing: Vec<NodeId> },

    #[error("level {required} required, current level is {current}")]
    LevelRequirementNotMet { required: u32, current: u32 },

    #[error("must view lesson first")]
    LessonNotViewed,

    #[error("daily goal not met yet")]
    GoalNotMet,

    #[error("daily goal bonus already claimed")]
    AlreadyClaimed,

    #[error("insufficient gems: need {needed}, have {available}")]
    InsufficientGems { needed: u64, available: u64 },

    #[error("prerequisite graph contains a cycle involving `{0}`")]
    CyclicPrerequisites(NodeId),

    #[error("node `{node}` references unknown prerequisite `{prerequisite}`")]
    UnknownPrerequisite { node: NodeId, prerequisite: NodeId },

    #[error("score {0} is out of range 0..=100")]
    ScoreOutOfRange(u32),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl EngineError {
    /// True for errors the caller can fix by changing the request; false
    /// for store failures worth retrying as a whole.
    pub fn is_user_error(&self) -> bool {
        !matches!(self, Self::Store(_))
    }
}
