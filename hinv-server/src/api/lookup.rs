//! Barcode lookup endpoint

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};

use crate::services::lookup::LookupResult;
use crate::AppState;

/// GET /api/lookup/:barcode
///
/// Always 200; `success: false` means no provider knew the code.
pub async fn lookup_barcode(
    State(state): State<AppState>,
    Path(barcode): Path<String>,
) -> Json<LookupResult> {
    Json(state.resolver.lookup(&barcode).await)
}

pub fn lookup_routes() -> Router<AppState> {
    Router::new().route("/api/lookup/:barcode", get(lookup_barcode))
}
