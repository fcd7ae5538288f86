//! Patient report route handlers

use crate::alerts::window_cutoff;
use crate::error::ApiResult;
use crate::state::SharedState;
use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use tracing::{debug, info};

/// GET /api/hospitalized-patients-new-test-required
///
/// Hospitalized patients with no lab result in the last 48 hours, as a JSON
/// array ordered by department. An empty array means nobody matched; every
/// failure is an error status instead.
pub async fn hospitalized_patients_new_test_required(
    State(state): State<SharedState>,
) -> ApiResult<Response> {
    let now = state.clock.now();
    let cutoff = window_cutoff(now);
    debug!(%now, %cutoff, "Fetching hospitalized patients without a recent lab result");

    let alerts = state.alerts.patients_needing_test(cutoff).await?;

    // Encoded here so a failure is reported as a serialization error
    let body = serde_json::to_vec(&alerts)?;

    info!("{} hospitalized patients need a new test", alerts.len());
    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}
