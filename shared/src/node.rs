use serde::{Deserialize, Serialize};

use super::{NodeId, Subject};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

/// An atomic unit of the skill tree: a lesson/quiz bundle with rewards.
/// Authored by teacher tooling; read-only to the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillNode {
    pub id: NodeId,
    pub title: String,
    pub subject: Subject,
    pub difficulty: Difficulty,
    pub xp_reward: u64,
    pub gems_reward: u64,
    /// All of these must be completed before this node unlocks.
    pub prerequisites: Vec<NodeId>,
    /// Optional level gate on top of prerequisites.
    pub minimum_level: Option<u32>,
    pub lesson_content: Option<String>,
    pub requires_lesson_view: bool,
}

impl SkillNode {
    pub fn new(id: impl Into<NodeId>, title: impl Into<String>, subject: impl Into<Subject>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            subject: subject.into(),
            difficulty: Difficulty::Beginner,
            xp_reward: 20,
            gems_reward: 0,
            prerequisites: Vec::new(),
            minimum_level: None,
            lesson_content: None,
            requires_lesson_view: false,
        }
    }

    pub fn with_prerequisites(mut self, prerequisites: Vec<NodeId>) -> Self {
        self.prerequisites = prerequisites;
        self
    }

    pub fn with_xp_reward(mut self, xp_reward: u64) -> Self {
        self.xp_reward = xp_reward;
        self
    }

    pub fn with_minimum_level(mut self, level: u32) -> Self {
        self.minimum_level = Some(level);
        self
    }

    pub fn with_lesson(mut self, content: impl Into<String>, required: bool) -> Self {
        self.lesson_content = Some(content.into());
        self.requires_lesson_view = required;
        self
    }

    pub fn has_prerequisite(&self, node_id: &str) -> bool {
        self.prerequisites.iter().any(|p| p == node_id)
    }
}
