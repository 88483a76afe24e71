use rocket::fairing::AdHoc;
use rocket::serde::json::Json;
use rocket::State;
use serde::Serialize;

use questline_engine::leveling::DailyGoalClaim;
use questline_engine::{CompletionOutcome, Engine};
use shared::NodeStatus;

use super::types::{ApiResult, CompleteRequest, LessonViewRequest, RequestUser};

#[derive(Debug, Serialize)]
struct LessonViewResponse {
    status: NodeStatus,
}

#[post("/skill-tree/complete", data = "<request>")]
async fn complete(
    user: RequestUser,
    request: Json<CompleteRequest>,
    engine: &State<Engine>,
) -> ApiResult<CompletionOutcome> {
    let outcome = engine
        .completion
        .complete_node(
            &user.0,
            &request.node_id,
            request.score,
            request.time_spent_secs,
        )
        .await?;
    Ok(Json(outcome))
}

#[post("/skill-tree/lesson-view", data = "<request>")]
async fn lesson_view(
    user: RequestUser,
    request: Json<LessonViewRequest>,
    engine: &State<Engine>,
) -> ApiResult<LessonViewResponse> {
    let status = engine
        .completion
        .record_lesson_view(&user.0, &request.node_id, request.time_spent_secs)
        .await?;
    Ok(Json(LessonViewResponse { status }))
}

#[post("/daily-goal/claim")]
async fn claim_daily_goal(user: RequestUser, engine: &State<Engine>) -> ApiResult<DailyGoalClaim> {
    let claim = engine.leveling.claim_daily_goal(&user.0).await?;
    Ok(Json(claim))
}

pub fn stage() -> AdHoc {
    AdHoc::on_ignite("Progress routes", |rocket| async {
        rocket.mount("/progress", routes![complete, lesson_view, claim_daily_goal])
    })
}
