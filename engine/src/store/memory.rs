use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use shared::{
    EngineError, GamificationProfile, LeagueTier, ProgressRecord, SkillNode, UserId,
};

use crate::graph;

use super::{NodeStore, ProfileStore, ProgressStore};

/// Single-process store backing all three store traits. The real deployment
/// talks to the document database through the same traits; tests and the
/// bundled server run on this.
#[derive(Default)]
pub struct InMemoryStore {
    nodes: RwLock<HashMap<String, SkillNode>>,
    progress: RwLock<HashMap<(UserId, String), ProgressRecord>>,
    profiles: RwLock<HashMap<UserId, GamificationProfile>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the node catalog. Rejects catalogs whose prerequisite graph
    /// is cyclic or references unknown nodes, so cascade scans cannot loop.
    pub async fn seed_nodes(&self, catalog: Vec<SkillNode>) -> Result<(), EngineError> {
        graph::validate_graph(&catalog)?;
        let mut nodes = self.nodes.write().await;
        nodes.clear();
        for node in catalog {
            nodes.insert(node.id.clone(), node);
        }
        Ok(())
    }
}

#[async_trait]
impl NodeStore for InMemoryStore {
    async fn find_node(&self, id: &str) -> anyhow::Result<Option<SkillNode>> {
        Ok(self.nodes.read().await.get(id).cloned())
    }

    async fn find_nodes_with_prerequisite(
        &self,
        node_id: &str,
    ) -> anyhow::Result<Vec<SkillNode>> {
        Ok(self
            .nodes
            .read()
            .await
            .values()
            .filter(|node| node.has_prerequisite(node_id))
            .cloned()
            .collect())
    }

    async fn list_nodes(&self, subject: Option<&str>) -> anyhow::Result<Vec<SkillNode>> {
        let nodes = self.nodes.read().await;
        let mut result: Vec<SkillNode> = nodes
            .values()
            .filter(|node| subject.map_or(true, |s| node.subject == s))
            .cloned()
            .collect();
        result.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(result)
    }
}

#[async_trait]
impl ProgressStore for InMemoryStore {
    async fn get_progress(
        &self,
        user: &str,
        node_id: &str,
    ) -> anyhow::Result<Option<ProgressRecord>> {
        Ok(self
            .progress
            .read()
            .await
            .get(&(user.to_string(), node_id.to_string()))
            .cloned())
    }

    async fn upsert_progress(&self, record: ProgressRecord) -> anyhow::Result<()> {
        self.progress
            .write()
            .await
            .insert((record.user.clone(), record.node_id.clone()), record);
        Ok(())
    }

    async fn list_completed(&self, user: &str) -> anyhow::Result<Vec<ProgressRecord>> {
        Ok(self
            .progress
            .read()
            .await
            .values()
            .filter(|record| record.user == user && record.is_completed())
            .cloned()
            .collect())
    }

    async fn list_for_user(&self, user: &str) -> anyhow::Result<Vec<ProgressRecord>> {
        Ok(self
            .progress
            .read()
            .await
            .values()
            .filter(|record| record.user == user)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ProfileStore for InMemoryStore {
    async fn get_profile(&self, user: &str) -> anyhow::Result<Option<GamificationProfile>> {
        Ok(self.profiles.read().await.get(user).cloned())
    }

    async fn save_profile(&self, profile: GamificationProfile) -> anyhow::Result<()> {
        self.profiles
            .write()
            .await
            .insert(profile.user.clone(), profile);
        Ok(())
    }

    async fn list_by_league(
        &self,
        tier: LeagueTier,
    ) -> anyhow::Result<Vec<GamificationProfile>> {
        Ok(self
            .profiles
            .read()
            .await
            .values()
            .filter(|profile| profile.league == tier)
            .cloned()
            .collect())
    }

    async fn list_users(&self) -> anyhow::Result<Vec<UserId>> {
        Ok(self.profiles.read().await.keys().cloned().collect())
    }
}
