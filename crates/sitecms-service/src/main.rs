use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use clap::Parser;
use serde::{Deserialize, Serialize};
use sitecms_api::{
    CreateFormRequest, CreateModalRequest, CreatePopupRequest, MigrateResult, PreviewResult,
    RecordSubmissionRequest, SiteCmsApi, SplicePageRequest, UpsertPageRequest,
    API_CONTRACT_VERSION,
};
use sitecms_core::render::CssFramework;
use sitecms_core::splice::SpliceOp;
use sitecms_core::{
    DeviceFrame, Form, FormId, FormSubmission, Modal, ModalId, Page, Popup, PopupId,
    PublishStatus, SubmissionId, SubmissionStatus,
};
use sitecms_store_sqlite::{ModalCounter, PageSpliceReport, PopupCounter};
use time::OffsetDateTime;
use ulid::Ulid;

const SERVICE_CONTRACT_VERSION: &str = "service.v1";
const OPENAPI_YAML: &str = include_str!("../../../openapi/openapi.yaml");

#[derive(Debug, Clone)]
struct ServiceState {
    api: SiteCmsApi,
}

#[derive(Debug, Clone, Serialize)]
struct ServiceEnvelope<T>
where
    T: Serialize,
{
    service_contract_version: &'static str,
    api_contract_version: &'static str,
    data: T,
}

#[derive(Debug, Clone, Serialize)]
struct ServiceError {
    service_contract_version: &'static str,
    error: String,
}

#[derive(Debug, Clone, Deserialize)]
struct MigrateRequest {
    dry_run: bool,
}

#[derive(Debug, Clone, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Clone, Deserialize)]
struct StatusQuery {
    status: Option<PublishStatus>,
}

#[derive(Debug, Clone, Deserialize)]
struct SubmissionsQuery {
    form_id: Option<String>,
    status: Option<SubmissionStatus>,
}

#[derive(Debug, Clone, Deserialize)]
struct SetSubmissionStatusRequest {
    status: SubmissionStatus,
}

#[derive(Debug, Clone, Deserialize)]
struct TrackModalRequest {
    counter: ModalCounter,
}

#[derive(Debug, Clone, Deserialize)]
struct TrackPopupRequest {
    counter: PopupCounter,
}

#[derive(Debug, Clone, Deserialize)]
struct ActivePopupsQuery {
    #[serde(default, with = "time::serde::rfc3339::option")]
    as_of: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Deserialize)]
struct PreviewQuery {
    device: Option<DeviceFrame>,
    framework: Option<CssFramework>,
}

#[derive(Debug, Clone, Deserialize)]
struct UpsertPageBody {
    title: String,
    content: String,
    #[serde(default)]
    template: Option<String>,
}

#[derive(Debug, Parser)]
#[command(name = "sitecms-service")]
#[command(about = "Local HTTP service for SiteCMS")]
struct Args {
    #[arg(long, default_value = "./sitecms.sqlite3")]
    db: PathBuf,
    #[arg(long, default_value = "127.0.0.1:4020")]
    bind: SocketAddr,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = StatusCode::BAD_REQUEST;
        (status, Json(self)).into_response()
    }
}

impl ServiceState {
    fn error(message: impl Into<String>) -> ServiceError {
        ServiceError { service_contract_version: SERVICE_CONTRACT_VERSION, error: message.into() }
    }
}

fn envelope<T>(data: T) -> ServiceEnvelope<T>
where
    T: Serialize,
{
    ServiceEnvelope {
        service_contract_version: SERVICE_CONTRACT_VERSION,
        api_contract_version: API_CONTRACT_VERSION,
        data,
    }
}

fn parse_id(raw: &str, what: &str) -> Result<Ulid, ServiceError> {
    Ulid::from_string(raw).map_err(|_| ServiceState::error(format!("invalid {what} id: {raw}")))
}

fn app(state: ServiceState) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/openapi", get(openapi))
        .route("/v1/db/schema-version", post(db_schema_version))
        .route("/v1/db/migrate", post(db_migrate))
        .route("/v1/forms", post(form_create).get(form_list))
        .route("/v1/forms/:form_id", get(form_get).put(form_update).delete(form_delete))
        .route("/v1/forms/:form_id/preview", get(form_preview))
        .route("/v1/submissions", post(submission_record).get(submission_list))
        .route("/v1/submissions/:submission_id", get(submission_get).delete(submission_delete))
        .route("/v1/submissions/:submission_id/status", post(submission_set_status))
        .route("/v1/modals", post(modal_create).get(modal_list))
        .route("/v1/modals/:modal_id", get(modal_get).put(modal_update).delete(modal_delete))
        .route("/v1/modals/:modal_id/track", post(modal_track))
        .route("/v1/modals/:modal_id/preview", get(modal_preview))
        .route("/v1/popups", post(popup_create).get(popup_list))
        .route("/v1/popups/active", get(popup_active))
        .route("/v1/popups/:popup_id", get(popup_get).put(popup_update).delete(popup_delete))
        .route("/v1/popups/:popup_id/track", post(popup_track))
        .route("/v1/popups/:popup_id/preview", get(popup_preview))
        .route("/v1/pages", get(page_list))
        .route("/v1/pages/:slug", put(page_upsert).get(page_get).delete(page_delete))
        .route("/v1/pages/:slug/splice", post(page_splice))
        .route("/v1/pages/:slug/markers", get(page_markers))
        .route("/v1/pages/:slug/preview", get(page_preview))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let state = ServiceState { api: SiteCmsApi::new(args.db) };
    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    tracing::info!(bind = %args.bind, "sitecms service listening");
    axum::serve(listener, app(state)).await?;
    Ok(())
}

async fn health() -> Json<ServiceEnvelope<HealthResponse>> {
    Json(envelope(HealthResponse { status: "ok" }))
}

async fn openapi() -> impl IntoResponse {
    (StatusCode::OK, [("content-type", "application/yaml; charset=utf-8")], OPENAPI_YAML)
}

async fn db_schema_version(
    State(state): State<ServiceState>,
) -> Result<Json<ServiceEnvelope<sitecms_store_sqlite::SchemaStatus>>, ServiceError> {
    let status = state.api.schema_status().map_err(|err| ServiceState::error(err.to_string()))?;
    Ok(Json(envelope(status)))
}

async fn db_migrate(
    State(state): State<ServiceState>,
    Json(request): Json<MigrateRequest>,
) -> Result<Json<ServiceEnvelope<MigrateResult>>, ServiceError> {
    let result =
        state.api.migrate(request.dry_run).map_err(|err| ServiceState::error(err.to_string()))?;
    Ok(Json(envelope(result)))
}

async fn form_create(
    State(state): State<ServiceState>,
    Json(request): Json<CreateFormRequest>,
) -> Result<Json<ServiceEnvelope<Form>>, ServiceError> {
    let form =
        state.api.form_create(request).map_err(|err| ServiceState::error(err.to_string()))?;
    Ok(Json(envelope(form)))
}

async fn form_list(
    State(state): State<ServiceState>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<ServiceEnvelope<Vec<Form>>>, ServiceError> {
    let forms =
        state.api.form_list(query.status).map_err(|err| ServiceState::error(err.to_string()))?;
    Ok(Json(envelope(forms)))
}

async fn form_get(
    State(state): State<ServiceState>,
    Path(form_id): Path<String>,
) -> Result<Json<ServiceEnvelope<Form>>, ServiceError> {
    let form_id = FormId(parse_id(&form_id, "form")?);
    let form = state.api.form_get(form_id).map_err(|err| ServiceState::error(err.to_string()))?;
    Ok(Json(envelope(form)))
}

async fn form_update(
    State(state): State<ServiceState>,
    Path(form_id): Path<String>,
    Json(request): Json<CreateFormRequest>,
) -> Result<Json<ServiceEnvelope<Form>>, ServiceError> {
    let form_id = FormId(parse_id(&form_id, "form")?);
    let form = state
        .api
        .form_update(form_id, request)
        .map_err(|err| ServiceState::error(err.to_string()))?;
    Ok(Json(envelope(form)))
}

async fn form_delete(
    State(state): State<ServiceState>,
    Path(form_id): Path<String>,
) -> Result<Json<ServiceEnvelope<()>>, ServiceError> {
    let form_id = FormId(parse_id(&form_id, "form")?);
    state.api.form_delete(form_id).map_err(|err| ServiceState::error(err.to_string()))?;
    Ok(Json(envelope(())))
}

async fn form_preview(
    State(state): State<ServiceState>,
    Path(form_id): Path<String>,
    Query(query): Query<PreviewQuery>,
) -> Result<Json<ServiceEnvelope<PreviewResult>>, ServiceError> {
    let form_id = FormId(parse_id(&form_id, "form")?);
    let preview = state
        .api
        .preview_form(
            form_id,
            query.device.unwrap_or(DeviceFrame::Desktop),
            query.framework.unwrap_or(CssFramework::None),
        )
        .map_err(|err| ServiceState::error(err.to_string()))?;
    Ok(Json(envelope(preview)))
}

async fn submission_record(
    State(state): State<ServiceState>,
    Json(request): Json<RecordSubmissionRequest>,
) -> Result<Json<ServiceEnvelope<FormSubmission>>, ServiceError> {
    let submission = state
        .api
        .submission_record(request)
        .map_err(|err| ServiceState::error(err.to_string()))?;
    Ok(Json(envelope(submission)))
}

async fn submission_list(
    State(state): State<ServiceState>,
    Query(query): Query<SubmissionsQuery>,
) -> Result<Json<ServiceEnvelope<Vec<FormSubmission>>>, ServiceError> {
    let form_id = match query.form_id {
        Some(raw) => Some(FormId(parse_id(&raw, "form")?)),
        None => None,
    };
    let submissions = state
        .api
        .submission_list(form_id, query.status)
        .map_err(|err| ServiceState::error(err.to_string()))?;
    Ok(Json(envelope(submissions)))
}

async fn submission_get(
    State(state): State<ServiceState>,
    Path(submission_id): Path<String>,
) -> Result<Json<ServiceEnvelope<FormSubmission>>, ServiceError> {
    let submission_id = SubmissionId(parse_id(&submission_id, "submission")?);
    let submission = state
        .api
        .submission_get(submission_id)
        .map_err(|err| ServiceState::error(err.to_string()))?;
    Ok(Json(envelope(submission)))
}

async fn submission_set_status(
    State(state): State<ServiceState>,
    Path(submission_id): Path<String>,
    Json(request): Json<SetSubmissionStatusRequest>,
) -> Result<Json<ServiceEnvelope<FormSubmission>>, ServiceError> {
    let submission_id = SubmissionId(parse_id(&submission_id, "submission")?);
    let submission = state
        .api
        .submission_set_status(submission_id, request.status)
        .map_err(|err| ServiceState::error(err.to_string()))?;
    Ok(Json(envelope(submission)))
}

async fn submission_delete(
    State(state): State<ServiceState>,
    Path(submission_id): Path<String>,
) -> Result<Json<ServiceEnvelope<()>>, ServiceError> {
    let submission_id = SubmissionId(parse_id(&submission_id, "submission")?);
    state
        .api
        .submission_delete(submission_id)
        .map_err(|err| ServiceState::error(err.to_string()))?;
    Ok(Json(envelope(())))
}

async fn modal_create(
    State(state): State<ServiceState>,
    Json(request): Json<CreateModalRequest>,
) -> Result<Json<ServiceEnvelope<Modal>>, ServiceError> {
    let modal =
        state.api.modal_create(request).map_err(|err| ServiceState::error(err.to_string()))?;
    Ok(Json(envelope(modal)))
}

async fn modal_list(
    State(state): State<ServiceState>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<ServiceEnvelope<Vec<Modal>>>, ServiceError> {
    let modals =
        state.api.modal_list(query.status).map_err(|err| ServiceState::error(err.to_string()))?;
    Ok(Json(envelope(modals)))
}

async fn modal_get(
    State(state): State<ServiceState>,
    Path(modal_id): Path<String>,
) -> Result<Json<ServiceEnvelope<Modal>>, ServiceError> {
    let modal_id = ModalId(parse_id(&modal_id, "modal")?);
    let modal =
        state.api.modal_get(modal_id).map_err(|err| ServiceState::error(err.to_string()))?;
    Ok(Json(envelope(modal)))
}

async fn modal_update(
    State(state): State<ServiceState>,
    Path(modal_id): Path<String>,
    Json(request): Json<CreateModalRequest>,
) -> Result<Json<ServiceEnvelope<Modal>>, ServiceError> {
    let modal_id = ModalId(parse_id(&modal_id, "modal")?);
    let modal = state
        .api
        .modal_update(modal_id, request)
        .map_err(|err| ServiceState::error(err.to_string()))?;
    Ok(Json(envelope(modal)))
}

async fn modal_delete(
    State(state): State<ServiceState>,
    Path(modal_id): Path<String>,
) -> Result<Json<ServiceEnvelope<()>>, ServiceError> {
    let modal_id = ModalId(parse_id(&modal_id, "modal")?);
    state.api.modal_delete(modal_id).map_err(|err| ServiceState::error(err.to_string()))?;
    Ok(Json(envelope(())))
}

async fn modal_track(
    State(state): State<ServiceState>,
    Path(modal_id): Path<String>,
    Json(request): Json<TrackModalRequest>,
) -> Result<Json<ServiceEnvelope<Modal>>, ServiceError> {
    let modal_id = ModalId(parse_id(&modal_id, "modal")?);
    let modal = state
        .api
        .modal_track(modal_id, request.counter)
        .map_err(|err| ServiceState::error(err.to_string()))?;
    Ok(Json(envelope(modal)))
}

async fn modal_preview(
    State(state): State<ServiceState>,
    Path(modal_id): Path<String>,
    Query(query): Query<PreviewQuery>,
) -> Result<Json<ServiceEnvelope<PreviewResult>>, ServiceError> {
    let modal_id = ModalId(parse_id(&modal_id, "modal")?);
    let preview = state
        .api
        .preview_modal(
            modal_id,
            query.device.unwrap_or(DeviceFrame::Desktop),
            query.framework.unwrap_or(CssFramework::None),
        )
        .map_err(|err| ServiceState::error(err.to_string()))?;
    Ok(Json(envelope(preview)))
}

async fn popup_create(
    State(state): State<ServiceState>,
    Json(request): Json<CreatePopupRequest>,
) -> Result<Json<ServiceEnvelope<Popup>>, ServiceError> {
    let popup =
        state.api.popup_create(request).map_err(|err| ServiceState::error(err.to_string()))?;
    Ok(Json(envelope(popup)))
}

async fn popup_list(
    State(state): State<ServiceState>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<ServiceEnvelope<Vec<Popup>>>, ServiceError> {
    let popups =
        state.api.popup_list(query.status).map_err(|err| ServiceState::error(err.to_string()))?;
    Ok(Json(envelope(popups)))
}

async fn popup_active(
    State(state): State<ServiceState>,
    Query(query): Query<ActivePopupsQuery>,
) -> Result<Json<ServiceEnvelope<Vec<Popup>>>, ServiceError> {
    let popups =
        state.api.popup_active(query.as_of).map_err(|err| ServiceState::error(err.to_string()))?;
    Ok(Json(envelope(popups)))
}

async fn popup_get(
    State(state): State<ServiceState>,
    Path(popup_id): Path<String>,
) -> Result<Json<ServiceEnvelope<Popup>>, ServiceError> {
    let popup_id = PopupId(parse_id(&popup_id, "popup")?);
    let popup =
        state.api.popup_get(popup_id).map_err(|err| ServiceState::error(err.to_string()))?;
    Ok(Json(envelope(popup)))
}

async fn popup_update(
    State(state): State<ServiceState>,
    Path(popup_id): Path<String>,
    Json(request): Json<CreatePopupRequest>,
) -> Result<Json<ServiceEnvelope<Popup>>, ServiceError> {
    let popup_id = PopupId(parse_id(&popup_id, "popup")?);
    let popup = state
        .api
        .popup_update(popup_id, request)
        .map_err(|err| ServiceState::error(err.to_string()))?;
    Ok(Json(envelope(popup)))
}

async fn popup_delete(
    State(state): State<ServiceState>,
    Path(popup_id): Path<String>,
) -> Result<Json<ServiceEnvelope<()>>, ServiceError> {
    let popup_id = PopupId(parse_id(&popup_id, "popup")?);
    state.api.popup_delete(popup_id).map_err(|err| ServiceState::error(err.to_string()))?;
    Ok(Json(envelope(())))
}

async fn popup_track(
    State(state): State<ServiceState>,
    Path(popup_id): Path<String>,
    Json(request): Json<TrackPopupRequest>,
) -> Result<Json<ServiceEnvelope<Popup>>, ServiceError> {
    let popup_id = PopupId(parse_id(&popup_id, "popup")?);
    let popup = state
        .api
        .popup_track(popup_id, request.counter)
        .map_err(|err| ServiceState::error(err.to_string()))?;
    Ok(Json(envelope(popup)))
}

async fn popup_preview(
    State(state): State<ServiceState>,
    Path(popup_id): Path<String>,
    Query(query): Query<PreviewQuery>,
) -> Result<Json<ServiceEnvelope<PreviewResult>>, ServiceError> {
    let popup_id = PopupId(parse_id(&popup_id, "popup")?);
    let preview = state
        .api
        .preview_popup(
            popup_id,
            query.device.unwrap_or(DeviceFrame::Desktop),
            query.framework.unwrap_or(CssFramework::None),
        )
        .map_err(|err| ServiceState::error(err.to_string()))?;
    Ok(Json(envelope(preview)))
}

async fn page_list(
    State(state): State<ServiceState>,
) -> Result<Json<ServiceEnvelope<Vec<Page>>>, ServiceError> {
    let pages = state.api.page_list().map_err(|err| ServiceState::error(err.to_string()))?;
    Ok(Json(envelope(pages)))
}

async fn page_upsert(
    State(state): State<ServiceState>,
    Path(slug): Path<String>,
    Json(body): Json<UpsertPageBody>,
) -> Result<Json<ServiceEnvelope<Page>>, ServiceError> {
    let page = state
        .api
        .page_upsert(UpsertPageRequest {
            slug,
            title: body.title,
            content: body.content,
            template: body.template,
        })
        .map_err(|err| ServiceState::error(err.to_string()))?;
    Ok(Json(envelope(page)))
}

async fn page_get(
    State(state): State<ServiceState>,
    Path(slug): Path<String>,
) -> Result<Json<ServiceEnvelope<Page>>, ServiceError> {
    let page = state.api.page_get(&slug).map_err(|err| ServiceState::error(err.to_string()))?;
    Ok(Json(envelope(page)))
}

async fn page_delete(
    State(state): State<ServiceState>,
    Path(slug): Path<String>,
) -> Result<Json<ServiceEnvelope<()>>, ServiceError> {
    state.api.page_delete(&slug).map_err(|err| ServiceState::error(err.to_string()))?;
    Ok(Json(envelope(())))
}

async fn page_splice(
    State(state): State<ServiceState>,
    Path(slug): Path<String>,
    Json(op): Json<SpliceOp>,
) -> Result<Json<ServiceEnvelope<PageSpliceReport>>, ServiceError> {
    let report = state
        .api
        .page_splice(SplicePageRequest { slug, op })
        .map_err(|err| ServiceState::error(err.to_string()))?;
    if !report.written {
        tracing::warn!(slug = %report.slug, "splice marker not found; page left unchanged");
    }
    Ok(Json(envelope(report)))
}

async fn page_markers(
    State(state): State<ServiceState>,
    Path(slug): Path<String>,
) -> Result<Json<ServiceEnvelope<Vec<String>>>, ServiceError> {
    let markers =
        state.api.page_markers(&slug).map_err(|err| ServiceState::error(err.to_string()))?;
    Ok(Json(envelope(markers)))
}

async fn page_preview(
    State(state): State<ServiceState>,
    Path(slug): Path<String>,
    Query(query): Query<PreviewQuery>,
) -> Result<Json<ServiceEnvelope<PreviewResult>>, ServiceError> {
    let preview = state
        .api
        .preview_page(
            &slug,
            query.device.unwrap_or(DeviceFrame::Desktop),
            query.framework.unwrap_or(CssFramework::None),
        )
        .map_err(|err| ServiceState::error(err.to_string()))?;
    Ok(Json(envelope(preview)))
}
