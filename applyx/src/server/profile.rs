//! Profile routes.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde_json::{json, Value};

use super::error::ApiError;
use crate::models::Profile;
use crate::profile::ProfileStore;

pub fn routes(store: ProfileStore) -> Router {
    Router::new()
        .route("/save", post(save_profile))
        .route("/get", get(get_profile))
        .route("/update", put(update_profile))
        .route("/delete", delete(delete_profile))
        .with_state(store)
}

fn envelope(message: &str, data: &Profile) -> Json<Value> {
    Json(json!({ "success": true, "message": message, "data": data }))
}

async fn save_profile(
    State(store): State<ProfileStore>,
    payload: Result<Json<Profile>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(profile) = payload?;
    let saved = store.save(profile).await.map_err(|e| ApiError::profile(&e))?;
    Ok(envelope("Profile đã được lưu thành công", &saved))
}

async fn get_profile(State(store): State<ProfileStore>) -> Result<Json<Value>, ApiError> {
    let profile = store.get().await.map_err(|e| ApiError::profile(&e))?;
    Ok(envelope("Lấy profile thành công", &profile))
}

async fn update_profile(
    State(store): State<ProfileStore>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(partial) = payload?;
    let updated = store.update(partial).await.map_err(|e| ApiError::profile(&e))?;
    Ok(envelope("Profile đã được cập nhật thành công", &updated))
}

async fn delete_profile(State(store): State<ProfileStore>) -> Result<Json<Value>, ApiError> {
    if store.delete().await.map_err(|e| ApiError::profile(&e))? {
        Ok(Json(json!({ "success": true, "message": "Profile đã được xóa thành công" })))
    } else {
        Err(ApiError::new(StatusCode::NOT_FOUND, "Profile không tồn tại"))
    }
}
