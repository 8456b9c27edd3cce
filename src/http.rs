//! user-service 的 HTTP 入口
//!
//! `POST /api/v1/signups` 把邮箱交给 `SignupPublisher`，broker 确认后返回 202

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::error::{ErrorCode, Result, SignupError};
use crate::producer::SignupPublisher;

#[derive(Clone)]
pub struct AppState {
    publisher: Arc<dyn SignupPublisher>,
    service_name: Arc<str>,
}

impl AppState {
    pub fn new(publisher: Arc<dyn SignupPublisher>, service_name: impl Into<Arc<str>>) -> Self {
        Self {
            publisher,
            service_name: service_name.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignupRequest {
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignupAccepted {
    pub request_id: Uuid,
    pub email: String,
    pub topic: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthBody {
    pub status: String,
    pub service: String,
}

impl IntoResponse for SignupError {
    fn into_response(self) -> Response {
        let code = self.code().unwrap_or(ErrorCode::InternalError);
        let status = match code {
            ErrorCode::InvalidParameter => StatusCode::BAD_REQUEST,
            _ if code.is_retryable() => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = ErrorBody {
            code,
            message: self.reason(),
        };
        (status, Json(body)).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/signups", post(create_signup))
        .route("/health", get(health))
        .with_state(state)
}

async fn create_signup(
    State(state): State<AppState>,
    Json(request): Json<SignupRequest>,
) -> std::result::Result<(StatusCode, Json<SignupAccepted>), SignupError> {
    if request.email.trim().is_empty() {
        return Err(SignupError::localized(
            ErrorCode::InvalidParameter,
            "email must not be empty",
        ));
    }

    let request_id = Uuid::new_v4();
    debug!(request_id = %request_id, email = %request.email, "Publishing signup email");

    if let Err(err) = state.publisher.send_signup_email(&request.email).await {
        error!(request_id = %request_id, error = %err, "Signup publish failed");
        return Err(err);
    }

    info!(request_id = %request_id, topic = %state.publisher.topic(), "Signup event published");

    Ok((
        StatusCode::ACCEPTED,
        Json(SignupAccepted {
            request_id,
            email: request.email,
            topic: state.publisher.topic().to_string(),
        }),
    ))
}

async fn health(State(state): State<AppState>) -> Json<HealthBody> {
    Json(HealthBody {
        status: "ok".to_string(),
        service: state.service_name.to_string(),
    })
}

/// 启动 HTTP 服务，`shutdown_rx` 触发后优雅退出
pub async fn serve(address: &str, app: Router, shutdown_rx: oneshot::Receiver<()>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(address).await?;
    info!(address = %listener.local_addr()?, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
            info!("HTTP server shutting down");
        })
        .await?;

    Ok(())
}
