use rocket::fairing::AdHoc;
use rocket::serde::json::Json;
use rocket::State;

use questline_engine::{
    AccessDecision, Engine, NodePartition, PrerequisiteReport, QuizAccessDecision,
};

use super::types::{ApiResult, RequestUser};

async fn user_level(engine: &Engine, user: &str) -> Result<u32, shared::EngineError> {
    Ok(engine.leveling.profile(user).await?.level)
}

#[get("/validate/<node_id>")]
async fn validate(
    user: RequestUser,
    node_id: &str,
    engine: &State<Engine>,
) -> ApiResult<AccessDecision> {
    let level = user_level(engine, &user.0).await?;
    let decision = engine
        .validator
        .validate_node_access(&user.0, node_id, level)
        .await?;
    Ok(Json(decision))
}

#[get("/prerequisites/<node_id>")]
async fn prerequisites(
    user: RequestUser,
    node_id: &str,
    engine: &State<Engine>,
) -> ApiResult<PrerequisiteReport> {
    let report = engine.validator.check_prerequisites(&user.0, node_id).await?;
    Ok(Json(report))
}

#[get("/accessible?<subject>")]
async fn accessible(
    user: RequestUser,
    subject: Option<&str>,
    engine: &State<Engine>,
) -> ApiResult<NodePartition> {
    let level = user_level(engine, &user.0).await?;
    let partition = engine
        .validator
        .accessible_nodes(&user.0, level, subject)
        .await?;
    Ok(Json(partition))
}

#[get("/validate-quiz/<node_id>")]
async fn validate_quiz(
    user: RequestUser,
    node_id: &str,
    engine: &State<Engine>,
) -> ApiResult<QuizAccessDecision> {
    let level = user_level(engine, &user.0).await?;
    let decision = engine
        .validator
        .validate_quiz_access(&user.0, node_id, level)
        .await?;
    Ok(Json(decision))
}

pub fn stage() -> AdHoc {
    AdHoc::on_ignite("Skill tree routes", |rocket| async {
        rocket.mount(
            "/skill-tree",
            routes![validate, prerequisites, accessible, validate_quiz],
        )
    })
}
