use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;

use crate::{
    domain::{models::avatar::ImageFormat, services::avatar_storage::AvatarStorage},
    presentation::error::ApiError,
};

#[derive(Deserialize)]
pub struct SignedQuery {
    pub token: String,
}

/// Serves signed avatar URLs. Mounted at the root, next to `/api`.
pub fn create_storage_router<S: AvatarStorage + 'static>(storage: S) -> Router {
    Router::new()
        .route("/storage/{*path}", get(download::<S>))
        .with_state(Arc::new(storage))
}

async fn download<S: AvatarStorage + 'static>(
    State(storage): State<Arc<S>>,
    Path(path): Path<String>,
    Query(query): Query<SignedQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let bytes = storage.open_signed(&path, &query.token).await?;
    let content_type =
        ImageFormat::detect(&bytes).map_or("application/octet-stream", |f| f.content_type());
    Ok(([(header::CONTENT_TYPE, content_type)], bytes))
}
