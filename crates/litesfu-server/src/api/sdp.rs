use axum::{Json, body::Bytes, extract::State, http::StatusCode};
use litesfu_protocol::{RoleRequest, SdpRequest, SdpResponse, SessionDescription};

use crate::error::{AppError, INVALID_PAYLOAD, Result};
use crate::state::AppState;

/// `POST /sdp`: negotiate a session from a browser offer.
///
/// The body is decoded by hand so clients that omit the JSON content type are
/// still served, and every decode failure maps to the same 400 body.
pub async fn receive_sdp(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<SdpResponse>)> {
    let request: SdpRequest = serde_json::from_slice(&body).map_err(|e| {
        tracing::debug!("Malformed signaling request: {}", e);
        AppError::BadRequest(INVALID_PAYLOAD.to_string())
    })?;

    let (role, label) = RoleRequest::parse(&request.name).into_role()?;
    let offer = request.sd.into_offer()?;

    let (session, answer) = state.sessions.negotiate(role, label, offer).await?;
    tracing::info!("Answered {}", session);

    Ok((
        StatusCode::ACCEPTED,
        Json(SdpResponse::accepted(SessionDescription::answer(answer.sdp))),
    ))
}
