use std::sync::Arc;

use questline_engine::store::{InMemoryStore, ProfileStore, ProgressStore};
use questline_engine::{CompletionOutcome, Engine, LogSink, StandardAchievements};
use shared::{
    EngineError, GamificationProfile, LeagueTier, NodeStatus, ProgressRecord, SkillNode,
};

struct Harness {
    store: Arc<InMemoryStore>,
    engine: Engine,
}

impl Harness {
    async fn new(catalog: Vec<SkillNode>) -> Self {
        let store = Arc::new(InMemoryStore::new());
        store.seed_nodes(catalog).await.unwrap();
        let engine = Engine::new(
            store.clone(),
            store.clone(),
            store.clone(),
            Arc::new(StandardAchievements),
            Arc::new(LogSink),
        );
        Self { store, engine }
    }

    async fn complete(&self, user: &str, node: &str, score: u32) -> CompletionOutcome {
        self.engine
            .completion
            .complete_node(user, node, score, 60)
            .await
            .unwrap()
    }

    async fn profile(&self, user: &str) -> GamificationProfile {
        self.store.get_profile(user).await.unwrap().unwrap()
    }

    async fn progress(&self, user: &str, node: &str) -> Option<ProgressRecord> {
        self.store.get_progress(user, node).await.unwrap()
    }
}

fn math_chain() -> Vec<SkillNode> {
    vec![
        SkillNode::new("counting", "Counting", "math").with_xp_reward(40),
        SkillNode::new("addition", "Addition", "math")
            .with_xp_reward(40)
            .with_prerequisites(vec!["counting".into()]),
        SkillNode::new("subtraction", "Subtraction", "math")
            .with_xp_reward(40)
            .with_prerequisites(vec!["counting".into()]),
        SkillNode::new("algebra", "Algebra", "math")
            .with_xp_reward(80)
            .with_prerequisites(vec!["addition".into(), "subtraction".into()]),
    ]
}

#[tokio::test]
async fn completion_awards_xp_and_unlocks_dependents() {
    let harness = Harness::new(math_chain()).await;

    let outcome = harness.complete("alice", "counting", 95).await;
    assert_eq!(outcome.stars.count(), 3);
    // 3 stars pay 1.25x the base reward.
    assert_eq!(outcome.xp_earned, 50);

    let mut unlocked = outcome.unlocked_nodes.clone();
    unlocked.sort();
    assert_eq!(unlocked, vec!["addition".to_string(), "subtraction".to_string()]);

    let profile = harness.profile("alice").await;
    assert_eq!(profile.xp, 50);
    assert_eq!(profile.streak, 1);
    assert!(profile.mastery_for("math") > 0.0);
}

#[tokio::test]
async fn unlock_happens_exactly_once() {
    let harness = Harness::new(math_chain()).await;

    let first = harness.complete("alice", "counting", 90).await;
    assert_eq!(first.unlocked_nodes.len(), 2);

    // Repeat completion re-runs the cascade but changes nothing.
    let second = harness.complete("alice", "counting", 70).await;
    assert!(second.unlocked_nodes.is_empty());

    let record = harness.progress("alice", "addition").await.unwrap();
    assert_eq!(record.status, NodeStatus::Available);
    assert_eq!(record.attempts, 0);
}

#[tokio::test]
async fn multi_prerequisite_node_waits_for_all() {
    let harness = Harness::new(math_chain()).await;

    harness.complete("alice", "counting", 80).await;
    let outcome = harness.complete("alice", "addition", 80).await;
    assert!(outcome.unlocked_nodes.is_empty(), "algebra still needs subtraction");

    let outcome = harness.complete("alice", "subtraction", 80).await;
    assert_eq!(outcome.unlocked_nodes, vec!["algebra".to_string()]);
}

#[tokio::test]
async fn locked_node_rejects_attempts() {
    let harness = Harness::new(math_chain()).await;

    let result = harness
        .engine
        .completion
        .complete_node("alice", "algebra", 100, 60)
        .await;
    assert!(matches!(
        result,
        Err(EngineError::PrerequisitesNotMet { .. })
    ));

    // Nothing was persisted for the rejected attempt.
    assert!(harness.progress("alice", "algebra").await.is_none());
    assert!(harness.store.get_profile("alice").await.unwrap().is_none());
}

#[tokio::test]
async fn best_score_survives_worse_repeat() {
    let harness = Harness::new(math_chain()).await;

    harness.complete("alice", "counting", 95).await;
    let outcome = harness.complete("alice", "counting", 60).await;

    // The weaker attempt still pays out by its own stars.
    assert_eq!(outcome.stars.count(), 1);
    assert_eq!(outcome.xp_earned, 30);

    let record = harness.progress("alice", "counting").await.unwrap();
    assert_eq!(record.best_score, 95);
    assert_eq!(record.stars.count(), 3);
    assert_eq!(record.attempts, 2);
}

#[tokio::test]
async fn zero_star_attempt_still_completes() {
    let harness = Harness::new(math_chain()).await;

    let outcome = harness.complete("alice", "counting", 30).await;
    assert_eq!(outcome.stars.count(), 0);
    assert_eq!(outcome.xp_earned, 20);

    let record = harness.progress("alice", "counting").await.unwrap();
    assert!(record.is_completed());

    // A zero-star completion still satisfies prerequisites downstream.
    let report = harness
        .engine
        .validator
        .check_prerequisites("alice", "addition")
        .await
        .unwrap();
    assert!(report.is_met);
}

#[tokio::test]
async fn lesson_gate_blocks_quiz_until_viewed() {
    let catalog = vec![SkillNode::new("phonics", "Phonics", "english")
        .with_lesson("Letters make sounds", true)];
    let harness = Harness::new(catalog).await;

    let result = harness
        .engine
        .completion
        .complete_node("bob", "phonics", 80, 60)
        .await;
    assert!(matches!(result, Err(EngineError::LessonNotViewed)));

    let status = harness
        .engine
        .completion
        .record_lesson_view("bob", "phonics", 120)
        .await
        .unwrap();
    assert_eq!(status, NodeStatus::InProgress);

    let outcome = harness.complete("bob", "phonics", 80).await;
    assert_eq!(outcome.stars.count(), 2);
}

#[tokio::test]
async fn daily_goal_claim_is_single_shot() {
    let harness = Harness::new(math_chain()).await;

    // Default goal is 50 XP; one strong completion meets it.
    harness.complete("alice", "counting", 95).await;
    assert!(harness.profile("alice").await.daily_goal_met);

    let claim = harness.engine.leveling.claim_daily_goal("alice").await.unwrap();
    assert_eq!(claim.bonus_xp, 55);
    assert_eq!(claim.bonus_gems, 1);

    let result = harness.engine.leveling.claim_daily_goal("alice").await;
    assert!(matches!(result, Err(EngineError::AlreadyClaimed)));

    // Next day the goal resets and the claim becomes possible again.
    harness.engine.leveling.reset_daily_goals().await.unwrap();
    let result = harness.engine.leveling.claim_daily_goal("alice").await;
    assert!(matches!(result, Err(EngineError::GoalNotMet)));
}

#[tokio::test]
async fn weekly_reset_moves_the_bands() {
    let harness = Harness::new(vec![]).await;

    for i in 0..25u64 {
        let mut profile = GamificationProfile::new(format!("silver-{i:02}"));
        profile.league = LeagueTier::Silver;
        profile.weekly_xp = 1000 - i * 10;
        harness.store.save_profile(profile).await.unwrap();
    }

    let summary = harness.engine.league.run_weekly_reset().await.unwrap();
    assert_eq!(summary.users_processed, 25);
    assert_eq!(summary.promoted, 10);
    assert_eq!(summary.demoted, 5);

    let gold = harness.store.list_by_league(LeagueTier::Gold).await.unwrap();
    let silver = harness.store.list_by_league(LeagueTier::Silver).await.unwrap();
    let bronze = harness.store.list_by_league(LeagueTier::Bronze).await.unwrap();
    assert_eq!(gold.len(), 10);
    assert_eq!(silver.len(), 10);
    assert_eq!(bronze.len(), 5);

    for profile in gold.iter().chain(silver.iter()).chain(bronze.iter()) {
        assert_eq!(profile.weekly_xp, 0);
    }
    for profile in &gold {
        assert_eq!(profile.rank, 1);
    }
}

#[tokio::test]
async fn concurrent_completions_never_lose_attempts() {
    let harness = Harness::new(math_chain()).await;
    let completion = harness.engine.completion.clone();

    let mut handles = Vec::new();
    for i in 0..8u32 {
        let completion = completion.clone();
        handles.push(tokio::spawn(async move {
            completion
                .complete_node("alice", "counting", 50 + i * 5, 30)
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let record = harness.progress("alice", "counting").await.unwrap();
    assert_eq!(record.attempts, 8);
    assert_eq!(record.best_score, 85);
}
