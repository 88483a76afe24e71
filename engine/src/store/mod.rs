use async_trait::async_trait;

use shared::{GamificationProfile, LeagueTier, ProgressRecord, SkillNode, UserId};

pub mod memory;

pub use memory::InMemoryStore;

/// Catalog of skill-tree nodes. Authored externally; read-only here.
#[async_trait]
pub trait NodeStore: Send + Sync {
    async fn find_node(&self, id: &str) -> anyhow::Result<Option<SkillNode>>;

    /// Every node listing `node_id` among its prerequisites. Drives the
    /// unlock cascade after a completion.
    async fn find_nodes_with_prerequisite(&self, node_id: &str)
        -> anyhow::Result<Vec<SkillNode>>;

    /// Full catalog, optionally filtered by subject.
    async fn list_nodes(&self, subject: Option<&str>) -> anyhow::Result<Vec<SkillNode>>;
}

/// Per-user completion records.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn get_progress(
        &self,
        user: &str,
        node_id: &str,
    ) -> anyhow::Result<Option<ProgressRecord>>;

    async fn upsert_progress(&self, record: ProgressRecord) -> anyhow::Result<()>;

    async fn list_completed(&self, user: &str) -> anyhow::Result<Vec<ProgressRecord>>;

    async fn list_for_user(&self, user: &str) -> anyhow::Result<Vec<ProgressRecord>>;
}

/// Gamification profiles, one per user, created lazily on first activity.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_profile(&self, user: &str) -> anyhow::Result<Option<GamificationProfile>>;

    async fn save_profile(&self, profile: GamificationProfile) -> anyhow::Result<()>;

    /// All profiles currently in `tier`, for the weekly league pass.
    async fn list_by_league(&self, tier: LeagueTier) -> anyhow::Result<Vec<GamificationProfile>>;

    async fn list_users(&self) -> anyhow::Result<Vec<UserId>>;
}
