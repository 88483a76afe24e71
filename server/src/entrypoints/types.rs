use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};
use rocket::response::{self, Responder};
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};

use shared::EngineError;

/// Caller identity, taken from the `X-User-Id` header the auth layer in
/// front of this service injects.
pub struct RequestUser(pub String);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for RequestUser {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match request.headers().get_one("x-user-id") {
            Some(id) if !id.trim().is_empty() => Outcome::Success(RequestUser(id.to_string())),
            _ => Outcome::Error((Status::Unauthorized, ())),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CompleteRequest {
    pub node_id: String,
    pub score: u32,
    #[serde(default)]
    pub time_spent_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct LessonViewRequest {
    pub node_id: String,
    #[serde(default)]
    pub time_spent_secs: u64,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Maps the engine taxonomy onto response statuses: missing entities are
/// 404, rejected requests are 400, store failures are 500 and get logged.
pub struct ApiError(pub EngineError);

impl From<EngineError> for ApiError {
    fn from(error: EngineError) -> Self {
        Self(error)
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, request: &'r Request<'_>) -> response::Result<'static> {
        let status = match &self.0 {
            EngineError::NodeNotFound(_) | EngineError::ProfileNotFound(_) => Status::NotFound,
            EngineError::Store(e) => {
                rocket::error!("store failure: {e:#?}");
                Status::InternalServerError
            }
            _ => Status::BadRequest,
        };
        let body = ErrorBody {
            error: if self.0.is_user_error() {
                self.0.to_string()
            } else {
                "internal error".to_string()
            },
        };
        let mut response = Json(body).respond_to(request)?;
        response.set_status(status);
        Ok(response)
    }
}

pub type ApiResult<T> = Result<Json<T>, ApiError>;
