//! HTTP surface: one GET route per statistic plus the upload endpoint.
//!
//! Routes are served both at the root and under `/api`; a trailing slash is
//! optional. Errors are returned as `{"error": "..."}` with a status derived
//! from the [`TabulaError`] variant.

use crate::config::Settings;
use crate::dataset::DatasetProvider;
use crate::error::{Result, TabulaError};
use crate::profiling::{Params, Statistic};
use actix_cors::Cors;
use actix_multipart::Multipart;
use actix_web::http::StatusCode;
use actix_web::middleware::NormalizePath;
use actix_web::{App, HttpResponse, HttpServer, ResponseError, dev::Server, get, post, web};
use futures_util::TryStreamExt as _;
use serde::Deserialize;
use serde_json::json;

/// Multipart field carrying the uploaded file.
pub const UPLOAD_FIELD: &str = "data_file";

pub struct HttpState {
    pub provider: DatasetProvider,
    pub max_upload_bytes: usize,
}

impl HttpState {
    pub fn new(provider: DatasetProvider, max_upload_bytes: usize) -> Self {
        Self {
            provider,
            max_upload_bytes,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            DatasetProvider::from_settings(settings),
            settings.max_upload_bytes,
        )
    }
}

impl ResponseError for TabulaError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::ColumnNotFound(_)
            | Self::NonNumericColumn(_)
            | Self::UnsupportedFormat(_)
            | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::MissingConfiguration => StatusCode::NOT_FOUND,
            Self::UnreadableSource(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Config(_) | Self::Io(_) | Self::DataProcessing(_) | Self::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {self}");
        } else {
            tracing::debug!("Request rejected ({status}): {self}");
        }
        HttpResponse::build(status).json(json!({ "error": self.to_string() }))
    }
}

/// Query string shared by every statistic route.
///
/// Counts are signed so that out-of-range values clamp instead of failing.
#[derive(Debug, Default, Deserialize)]
pub struct StatQuery {
    pub column: Option<String>,
    pub bins: Option<i64>,
    pub top: Option<i64>,
    pub k: Option<i64>,
}

impl From<StatQuery> for Params {
    fn from(query: StatQuery) -> Self {
        let defaults = Self::default();
        Self {
            column: query.column,
            bins: query.bins.map_or(defaults.bins, non_negative),
            top: query.top.map_or(defaults.top, non_negative),
            k: query.k.map_or(defaults.k, non_negative),
        }
    }
}

fn non_negative(n: i64) -> usize {
    usize::try_from(n.max(0)).unwrap_or(usize::MAX)
}

/// Resolves the current table and evaluates `stat` on a blocking worker.
async fn evaluate(
    state: web::Data<HttpState>,
    stat: Statistic,
    query: StatQuery,
) -> Result<HttpResponse> {
    let params = Params::from(query);
    let value = web::block(move || {
        let table = state.provider.current()?;
        stat.evaluate(&table, &params)
    })
    .await
    .map_err(|e| TabulaError::Other(format!("Worker failed: {e}")))??;
    Ok(HttpResponse::Ok().json(value))
}

#[get("/summary")]
async fn summary(state: web::Data<HttpState>) -> Result<HttpResponse> {
    evaluate(state, Statistic::Summary, StatQuery::default()).await
}

#[get("/nulls-per-column")]
async fn nulls_per_column(state: web::Data<HttpState>) -> Result<HttpResponse> {
    evaluate(state, Statistic::NullsPerColumn, StatQuery::default()).await
}

#[get("/cardinality")]
async fn cardinality(state: web::Data<HttpState>) -> Result<HttpResponse> {
    evaluate(state, Statistic::Cardinality, StatQuery::default()).await
}

#[get("/outliers")]
async fn outliers(state: web::Data<HttpState>) -> Result<HttpResponse> {
    evaluate(state, Statistic::Outliers, StatQuery::default()).await
}

#[get("/distribution")]
async fn distribution(
    state: web::Data<HttpState>,
    query: web::Query<StatQuery>,
) -> Result<HttpResponse> {
    evaluate(state, Statistic::Distribution, query.into_inner()).await
}

#[get("/types")]
async fn types(state: web::Data<HttpState>) -> Result<HttpResponse> {
    evaluate(state, Statistic::Types, StatQuery::default()).await
}

#[get("/duplicates")]
async fn duplicates(state: web::Data<HttpState>) -> Result<HttpResponse> {
    evaluate(state, Statistic::Duplicates, StatQuery::default()).await
}

#[get("/numeric-columns")]
async fn numeric_columns(state: web::Data<HttpState>) -> Result<HttpResponse> {
    evaluate(state, Statistic::NumericColumns, StatQuery::default()).await
}

#[get("/boxplot")]
async fn boxplot(
    state: web::Data<HttpState>,
    query: web::Query<StatQuery>,
) -> Result<HttpResponse> {
    evaluate(state, Statistic::Boxplot, query.into_inner()).await
}

#[get("/describe")]
async fn describe(state: web::Data<HttpState>) -> Result<HttpResponse> {
    evaluate(state, Statistic::Describe, StatQuery::default()).await
}

#[get("/histograms")]
async fn histograms(
    state: web::Data<HttpState>,
    query: web::Query<StatQuery>,
) -> Result<HttpResponse> {
    evaluate(state, Statistic::Histograms, query.into_inner()).await
}

#[get("/boxplots")]
async fn boxplots(state: web::Data<HttpState>) -> Result<HttpResponse> {
    evaluate(state, Statistic::Boxplots, StatQuery::default()).await
}

#[get("/topk")]
async fn topk(state: web::Data<HttpState>, query: web::Query<StatQuery>) -> Result<HttpResponse> {
    evaluate(state, Statistic::Topk, query.into_inner()).await
}

#[get("/dataset")]
async fn dataset_info(state: web::Data<HttpState>) -> HttpResponse {
    HttpResponse::Ok().json(state.provider.info())
}

/// Accepts a multipart form with a `data_file` field and makes it the
/// current dataset.
#[post("/upload")]
async fn upload(state: web::Data<HttpState>, mut payload: Multipart) -> Result<HttpResponse> {
    let limit = state.max_upload_bytes;
    let mut received: Option<(String, Vec<u8>)> = None;

    while let Some(mut field) = payload.try_next().await.map_err(malformed_form)? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let file_name = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .unwrap_or_default()
            .to_owned();

        let mut bytes = Vec::new();
        while let Some(chunk) = field.try_next().await.map_err(malformed_form)? {
            if bytes.len() + chunk.len() > limit {
                return Err(TabulaError::PayloadTooLarge(limit));
            }
            bytes.extend_from_slice(&chunk);
        }
        received = Some((file_name, bytes));
    }

    let (file_name, bytes) = received.ok_or_else(|| {
        TabulaError::BadRequest(format!("missing '{UPLOAD_FIELD}' file field"))
    })?;
    tracing::info!("Received upload '{file_name}' ({} bytes)", bytes.len());

    let receipt = web::block(move || state.provider.upload(&file_name, &bytes))
        .await
        .map_err(|e| TabulaError::Other(format!("Worker failed: {e}")))??;
    Ok(HttpResponse::Ok().json(receipt))
}

fn malformed_form(err: actix_multipart::MultipartError) -> TabulaError {
    TabulaError::BadRequest(format!("malformed multipart body: {err}"))
}

fn query_config() -> web::QueryConfig {
    web::QueryConfig::default()
        .error_handler(|err, _req| TabulaError::BadRequest(err.to_string()).into())
}

/// Registers every route on `cfg`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(query_config())
        .service(summary)
        .service(nulls_per_column)
        .service(cardinality)
        .service(outliers)
        .service(distribution)
        .service(types)
        .service(duplicates)
        .service(numeric_columns)
        .service(boxplot)
        .service(describe)
        .service(histograms)
        .service(boxplots)
        .service(topk)
        .service(dataset_info)
        .service(upload);
}

pub fn start_server(
    state: web::Data<HttpState>,
    address: &str,
    port: u16,
) -> std::io::Result<Server> {
    let server = HttpServer::new(move || {
        // Local dashboard tool: any origin may call it
        let cors = Cors::permissive();

        App::new()
            .wrap(NormalizePath::trim())
            .wrap(cors)
            .app_data(state.clone())
            .configure(configure)
            .service(web::scope("/api").configure(configure))
    })
    .bind((address, port))?
    .run();

    tracing::info!("Listening on http://{address}:{port}");
    Ok(server)
}

/// Runs the server until it is stopped.
pub fn serve(settings: &Settings) -> anyhow::Result<()> {
    let state = web::Data::new(HttpState::from_settings(settings));
    match state.provider.dataset_path() {
        Some(path) => tracing::info!("Default dataset: {}", path.display()),
        None => tracing::warn!("No DATASET_PATH configured; waiting for an upload"),
    }

    let address = settings.bind_address.clone();
    let port = settings.port;
    actix_web::rt::System::new().block_on(async move {
        start_server(state, &address, port)?.await
    })?;
    Ok(())
}
