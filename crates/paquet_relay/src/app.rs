use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use chrono::Utc;
use futures::TryStreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::io::ReaderStream;
use tracing::{error, info, warn};

use paquet_store::{list_transfer_objects, ObjectEntry, ObjectStore};
use paquet_token::{sign_claims, sign_short, Claims};
use paquet_transfer::{
    authorize_download, load_meta, namespace, normalize_transfer_id, object_key,
    sanitize_object_path, save_meta, AccessDecision, DownloadCredentials, PaymentPolicy,
    TransferMeta,
};

use crate::archive::stream_archive;

const PIN_HEADER: &str = "x-transfer-pin";
const PLAN_HEADER: &str = "x-user-plan";

/// Immutable process-lifetime configuration, loaded once at startup and
/// passed to every handler through the router state.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub payment_secret: String,
    pub paid_short_ttl: u64,
    pub bypass_plans: Vec<String>,
    pub transfer_ttl_secs: Option<u64>,
}

impl RelayConfig {
    fn policy(&self) -> PaymentPolicy {
        PaymentPolicy {
            secret: self.payment_secret.as_bytes().to_vec(),
            bypass_plans: self.bypass_plans.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ObjectStore>,
    pub config: Arc<RelayConfig>,
}

impl AppState {
    pub fn new(store: Arc<dyn ObjectStore>, config: RelayConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateTransferRequest {
    #[serde(default)]
    pin: Option<String>,
    #[serde(default)]
    require_paid: bool,
}

#[derive(Debug, Deserialize)]
struct PayRequest {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    amount: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct DownloadQuery {
    pin: Option<String>,
    /// Short payment token.
    pp: Option<String>,
    /// Claims payment token.
    paid: Option<String>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health/live", get(health_live))
        .route("/health/ready", get(health_ready))
        .route("/v1/config", get(get_config))
        .route("/v1/transfers", post(create_transfer))
        .route(
            "/v1/transfers/{id}",
            get(list_transfer).delete(delete_transfer),
        )
        .route("/v1/transfers/{id}/objects/{*path}", post(upload_object))
        .route("/v1/transfers/{id}/zip", get(download_zip))
        .route("/v1/pay/create", post(pay_create))
        .route("/v1/pay/create-short", post(pay_create_short))
        .with_state(state)
}

async fn health_live() -> impl IntoResponse {
    Json(json!({
        "status": "live",
        "timestamp": Utc::now().to_rfc3339()
    }))
}

async fn health_ready(State(state): State<AppState>) -> impl IntoResponse {
    let ready = state.store.list("transfers/", None).await.is_ok();
    let payload = Json(json!({
        "status": if ready { "ready" } else { "degraded" },
        "timestamp": Utc::now().to_rfc3339()
    }));

    if ready {
        (StatusCode::OK, payload).into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, payload).into_response()
    }
}

async fn get_config(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "hasPaymentSecret": !state.config.payment_secret.is_empty(),
        "paidShortTtl": state.config.paid_short_ttl,
        "bypassPlans": state.config.bypass_plans,
    }))
}

async fn create_transfer(
    State(state): State<AppState>,
    Json(payload): Json<CreateTransferRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<Value>)> {
    let id = paquet_transfer::generate_transfer_id();
    let meta = TransferMeta::new(
        payload.pin,
        payload.require_paid,
        state.config.transfer_ttl_secs,
    );

    save_meta(state.store.as_ref(), &id, &meta)
        .await
        .map_err(|error| storage_error("transfer_create_failed", error))?;

    info!(transfer_id = %id, require_paid = meta.require_paid, "transfer created");
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

async fn list_transfer(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, Json<Value>)> {
    let id = require_transfer_id(&id)?;
    require_not_expired(&state, &id).await?;

    let ns = namespace(&id);
    let entries: Vec<ObjectEntry> = list_transfer_objects(state.store.as_ref(), &ns)
        .try_collect()
        .await
        .map_err(|error| storage_error("transfer_list_failed", error))?;

    let items: Vec<Value> = entries
        .iter()
        .map(|entry| {
            json!({
                "key": entry.key.strip_prefix(ns.as_str()).unwrap_or(&entry.key),
                "size": entry.size,
            })
        })
        .collect();

    Ok(Json(json!({ "id": id, "items": items })))
}

async fn upload_object(
    State(state): State<AppState>,
    Path((id, path)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, (StatusCode, Json<Value>)> {
    let id = require_transfer_id(&id)?;
    let relative = sanitize_object_path(&path).map_err(|error| {
        warn!(transfer_id = %id, path = %path, error = %error, "rejected upload path");
        (StatusCode::BAD_REQUEST, Json(json!({ "error": "invalid_key" })))
    })?;

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or(mime::APPLICATION_OCTET_STREAM.as_ref());

    let size = body.len();
    state
        .store
        .put(&object_key(&id, &relative), body, content_type)
        .await
        .map_err(|error| storage_error("upload_failed", error))?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "key": relative, "size": size })),
    ))
}

async fn delete_transfer(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, Json<Value>)> {
    let id = require_transfer_id(&id)?;
    let ns = namespace(&id);

    // Raw paginated listing: the metadata object goes too.
    let mut cursor: Option<String> = None;
    loop {
        let page = state
            .store
            .list(&ns, cursor.as_deref())
            .await
            .map_err(|error| storage_error("transfer_delete_failed", error))?;
        for entry in &page.entries {
            state
                .store
                .delete(&entry.key)
                .await
                .map_err(|error| storage_error("transfer_delete_failed", error))?;
        }
        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    info!(transfer_id = %id, "transfer namespace deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn pay_create(
    State(state): State<AppState>,
    Json(payload): Json<PayRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<Value>)> {
    let id = require_pay_id(payload.id.as_deref())?;
    let exp = now_secs() + state.config.paid_short_ttl;

    let mut claims = Claims::for_transfer(id.clone());
    claims.amount = payload.amount;
    let token = sign_claims(&claims, exp, state.config.payment_secret.as_bytes());

    Ok(Json(json!({ "id": id, "token": token, "exp": exp })))
}

async fn pay_create_short(
    State(state): State<AppState>,
    Json(payload): Json<PayRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<Value>)> {
    let id = require_pay_id(payload.id.as_deref())?;
    let exp = now_secs() + state.config.paid_short_ttl;
    let pp = sign_short(&id, exp, state.config.payment_secret.as_bytes());

    Ok(Json(json!({ "id": id, "pp": pp, "exp": exp })))
}

async fn download_zip(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<DownloadQuery>,
    headers: HeaderMap,
) -> Result<Response, (StatusCode, Json<Value>)> {
    let id = require_transfer_id(&id)?;
    let meta = require_not_expired(&state, &id).await?;

    let credentials = DownloadCredentials {
        pin: query.pin.or_else(|| header_value(&headers, PIN_HEADER)),
        plan: header_value(&headers, PLAN_HEADER),
        short_token: query.pp,
        claims_token: query.paid,
    };

    match authorize_download(&id, &meta, &credentials, &state.config.policy(), now_secs()) {
        AccessDecision::Granted => {}
        AccessDecision::PinRequired => {
            return Err((
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "pin_required" })),
            ));
        }
        AccessDecision::PaymentRequired => {
            return Err((
                StatusCode::PAYMENT_REQUIRED,
                Json(json!({ "error": "payment_required" })),
            ));
        }
    }

    let ns = namespace(&id);
    let entries: Vec<ObjectEntry> = list_transfer_objects(state.store.as_ref(), &ns)
        .try_collect()
        .await
        .map_err(|error| storage_error("transfer_list_failed", error))?;

    if entries.is_empty() {
        return Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "empty_package" })),
        ));
    }

    // Bounded pipe between the ZIP encoder and the response body. If the
    // client disconnects the read half is dropped, the encoder's next write
    // fails and the fetch loop stops.
    let (reader, writer) = tokio::io::duplex(64 * 1024);
    let store = state.store.clone();
    let task_id = id.clone();
    tokio::spawn(async move {
        let ns = namespace(&task_id);
        if let Err(error) = stream_archive(store.as_ref(), &ns, &entries, writer).await {
            // Headers are long gone; all we can do is log and let the
            // truncated stream signal failure to the client.
            error!(transfer_id = %task_id, error = %error, "archive stream aborted");
        }
    });

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/zip")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{id}.zip\""),
        )
        .body(Body::from_stream(ReaderStream::new(reader)))
        .map_err(|error| storage_error("transfer_download_failed", error))?;

    Ok(response)
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
}

fn require_transfer_id(raw: &str) -> Result<String, (StatusCode, Json<Value>)> {
    normalize_transfer_id(raw).ok_or((
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "transfer_not_found" })),
    ))
}

fn require_pay_id(raw: Option<&str>) -> Result<String, (StatusCode, Json<Value>)> {
    let raw = raw
        .filter(|id| !id.trim().is_empty())
        .ok_or((StatusCode::BAD_REQUEST, Json(json!({ "error": "missing_id" }))))?;
    require_transfer_id(raw)
}

/// Load metadata (absent records behave as an open transfer) and reject
/// past-expiry transfers.
async fn require_not_expired(
    state: &AppState,
    id: &str,
) -> Result<TransferMeta, (StatusCode, Json<Value>)> {
    let meta = load_meta(state.store.as_ref(), id)
        .await
        .map_err(|error| storage_error("transfer_load_failed", error))?
        .unwrap_or_else(TransferMeta::open);

    if meta.is_expired(Utc::now()) {
        return Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "transfer_expired" })),
        ));
    }
    Ok(meta)
}

fn now_secs() -> u64 {
    Utc::now().timestamp().max(0) as u64
}

fn storage_error(
    code: &'static str,
    error: impl std::fmt::Display,
) -> (StatusCode, Json<Value>) {
    error!(error = %error, code, "storage operation failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": code })),
    )
}
