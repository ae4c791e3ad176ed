use axum::{http::StatusCode, response::IntoResponse};

/// Undocumented landing route; confirms the service is up without touching
/// any dependency.
pub async fn root() -> impl IntoResponse {
    (
        StatusCode::OK,
        concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION")),
    )
}
