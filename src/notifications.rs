//! Notification read-side: listing, unread counts, and read marking. The
//! write side lives with the operations that produce notifications, inside
//! their transactions.

use crate::actor::actor_id;
use crate::db::repositories::notification_repository;
use crate::error::ServiceError;
use crate::startup::AppState;
use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use uuid::Uuid;

/// List the acting user's notifications, newest first
pub async fn list_notifications(
    Extension(app_state): Extension<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ServiceError> {
    let user_id = actor_id(&headers)?;

    let notifications = notification_repository::list_for_user(&app_state.db, user_id).await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "status": "success",
            "notifications": notifications
        })),
    ))
}

pub async fn unread_count(
    Extension(app_state): Extension<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ServiceError> {
    let user_id = actor_id(&headers)?;

    let count = notification_repository::unread_count(&app_state.db, user_id).await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "status": "success",
            "unread_count": count
        })),
    ))
}

/// Mark one notification read. Only the recipient can mark it; anyone else
/// sees not-found.
pub async fn mark_read(
    Extension(app_state): Extension<AppState>,
    headers: HeaderMap,
    Path(notification_id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let user_id = actor_id(&headers)?;

    let updated =
        notification_repository::mark_read(&app_state.db, notification_id, user_id).await?;
    if !updated {
        return Err(ServiceError::NotificationNotFound);
    }

    Ok((
        StatusCode::OK,
        Json(json!({
            "status": "success",
            "message": "Notification marked as read"
        })),
    ))
}

pub async fn mark_all_read(
    Extension(app_state): Extension<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ServiceError> {
    let user_id = actor_id(&headers)?;

    let updated = notification_repository::mark_all_read(&app_state.db, user_id).await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "status": "success",
            "updated": updated
        })),
    ))
}
