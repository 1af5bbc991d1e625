//! Ingestion endpoints: `POST {sms_path}` and `POST {notify_path}`.
//!
//! Both accept `application/x-www-form-urlencoded` or JSON bodies, run the
//! message through the dispatcher and answer with the immediate reply text
//! (or `ok`). Deferred replies are queued for `GET /notifications`.

use std::sync::Arc;

use axum::{
    extract::{FromRequest, Request, State},
    http::header,
    Form, Json,
};
use serde::{de::DeserializeOwned, Deserialize};
use tracing::{debug, info};

use chirp_channels::{DispatchOutcome, ReplySink};
use chirp_core::types::{Message, Service};

use super::auth::{check_basic, Rejection};
use crate::app::AppState;
use crate::webhook::RequestSink;

/// SMS gateway callback (Twilio-style field names).
#[derive(Debug, Deserialize)]
pub struct SmsPayload {
    #[serde(rename = "From", alias = "from", default)]
    pub from: String,
    /// Our own number.
    #[serde(rename = "To", alias = "to", default)]
    pub to: String,
    #[serde(rename = "Body", alias = "body", default)]
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct NotifyPayload {
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub body: String,
}

/// POST {sms_path}
pub async fn sms_handler(
    State(state): State<Arc<AppState>>,
    req: Request,
) -> Result<String, Rejection> {
    check_basic(&state.config.webhooks, req.headers())?;
    let sms: SmsPayload = decode(req).await?;
    if sms.from.is_empty() || sms.body.is_empty() {
        return Err(Rejection::BadRequest("missing From or Body".to_string()));
    }

    info!(from = %sms.from, "sms received");
    let msg = Message::new(Service::Sms, &sms.from, &sms.from, sms.body);
    Ok(run(&state, &sms.to, msg).await)
}

/// POST {notify_path}
pub async fn notify_handler(
    State(state): State<Arc<AppState>>,
    req: Request,
) -> Result<String, Rejection> {
    check_basic(&state.config.webhooks, req.headers())?;
    let note: NotifyPayload = decode(req).await?;
    if note.from.is_empty() || note.body.is_empty() {
        return Err(Rejection::BadRequest("missing from or body".to_string()));
    }

    info!(from = %note.from, "notification received");
    let self_id = state.dispatcher.identity().to_string();
    let msg = Message::new(Service::Notify, &note.from, &note.from, note.body);
    Ok(run(&state, &self_id, msg).await)
}

/// Dispatch `msg` with a request-scoped sink and build the response body.
async fn run(state: &AppState, self_id: &str, msg: Message) -> String {
    let sink = Arc::new(RequestSink::new(Arc::clone(&state.notifications)));
    let outcome = state
        .dispatcher
        .dispatch(self_id, &msg, Arc::clone(&sink) as Arc<dyn ReplySink>)
        .await;
    let lines = sink.finish();
    debug!(service = %msg.service, ?outcome, "webhook dispatched");

    match outcome {
        DispatchOutcome::Replied { .. } if !lines.is_empty() => lines.join("\n"),
        _ => "ok".to_string(),
    }
}

async fn decode<T>(req: Request) -> Result<T, Rejection>
where
    T: DeserializeOwned + Send + 'static,
{
    let is_json = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));

    if is_json {
        Json::<T>::from_request(req, &())
            .await
            .map(|Json(v)| v)
            .map_err(|e| Rejection::BadRequest(e.body_text()))
    } else {
        Form::<T>::from_request(req, &())
            .await
            .map(|Form(v)| v)
            .map_err(|e| Rejection::BadRequest(e.body_text()))
    }
}
