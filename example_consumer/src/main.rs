//! Example consumer: upload and listing pages built on crud-kit.
//!
//! Run from repo root: `cargo run -p example-consumer`
//! Needs `config/database.json`, `config/upload.json` and the table in `schema.sql`.

use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post};
use axum::Router;
use crud_kit::helper::{format_date, truncate, DEFAULT_DATE_FORMAT};
use crud_kit::security::clean_input;
use crud_kit::{
    common_routes, escape, Alert, AppError, AppState, Messages, Model, Record, TransferError,
    UploadDescriptor,
};
use serde_json::{json, Value};
use std::path::PathBuf;
use tokio::net::TcpListener;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;

const FILES_TABLE: &str = "files";
const BODY_LIMIT: usize = 16 * 1024 * 1024;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("crud_kit=info,example_consumer=info")),
        )
        .init();

    let app = app(AppState::from_env());
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".into());
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Example consumer listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

fn app(state: AppState) -> Router {
    let mut app = Router::new()
        .route("/", get(list_files))
        .route("/upload", post(upload_file))
        .route("/files/:id/delete", post(delete_file))
        .with_state(state.clone());
    if let Some((mount, dir)) = upload_mount(&state) {
        tracing::info!(mount = %mount, dir = %dir.display(), "serving stored files");
        app = app.nest_service(&mount, ServeDir::new(dir));
    }
    app.merge(common_routes(state))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
}

/// Route prefix matching `uploaded_file_url` links: the upload directory's last segment.
fn upload_mount(state: &AppState) -> Option<(String, PathBuf)> {
    let cfg = match state.config.upload() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::warn!(error = %e, "no upload config, stored files are not served");
            return None;
        }
    };
    let prefix = state.files.uploaded_file_url("")?;
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return None;
    }
    Some((format!("/{}", prefix), cfg.directory))
}

async fn files_model(state: &AppState) -> Result<Model, AppError> {
    Model::connect(&state.database, FILES_TABLE, "id").await
}

fn text(record: &Record, field: &str) -> String {
    match record.get(field) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// GET /: every stored file, newest first.
async fn list_files(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let rows = files_model(&state).await?.all(None).await?;
    let mut body = String::from(
        "<table class=\"table\"><tr><th>Title</th><th>File</th><th>Size</th><th>Uploaded</th><th></th></tr>",
    );
    for row in &rows {
        let stored = text(row, "stored_name");
        let url = state.files.uploaded_file_url(&stored).unwrap_or_default();
        body.push_str(&format!(
            "<tr><td>{}</td><td><a href=\"/{}\">{}</a></td><td>{}</td><td>{}</td>\
             <td><form method=\"post\" action=\"/files/{}/delete\"><button>Delete</button></form></td></tr>",
            escape(&truncate(&text(row, "title"), 40, "...")),
            escape(&url),
            escape(&text(row, "original_name")),
            escape(&state.files.uploaded_file_size(&stored)),
            escape(&format_date(&text(row, "uploaded_at"), DEFAULT_DATE_FORMAT)),
            escape(&text(row, "id")),
        ));
    }
    body.push_str("</table>");
    Ok(Html(body))
}

/// POST /upload: multipart fields `file` and `title`.
async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut title = String::new();
    let mut file: Option<UploadDescriptor> = None;
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "title" => title = clean_input(&field.text().await.unwrap_or_default()),
            "file" => {
                let original = field.file_name().unwrap_or("").to_string();
                file = Some(match field.bytes().await {
                    Ok(bytes) if bytes.is_empty() => UploadDescriptor::failed(original, TransferError::NoFile),
                    Ok(bytes) => match state.files.stage(&original, &bytes) {
                        Ok(staged) => staged,
                        Err(e) => {
                            tracing::warn!(error = %e, "staging failed");
                            UploadDescriptor::failed(original, TransferError::CantWrite)
                        }
                    },
                    Err(_) => UploadDescriptor::failed(original, TransferError::Partial),
                });
            }
            _ => {}
        }
    }
    let file = file.unwrap_or_else(|| UploadDescriptor::failed("", TransferError::NoFile));

    let Some(stored) = state.files.upload_configured(&file) else {
        state.files.discard(&file);
        return Ok(Html(Alert::error(Messages::get("upload_error"))));
    };
    let mut record = Record::new();
    record.insert("stored_name".into(), json!(stored));
    record.insert("original_name".into(), json!(file.name));
    record.insert("title".into(), json!(title));
    record.insert("size".into(), json!(file.size));
    files_model(&state).await?.create(&record).await?;
    tracing::info!(stored = %stored, "file recorded");
    Ok(Html(Alert::success(Messages::get("upload_success"))))
}

/// POST /files/:id/delete: stored file first, then its row.
async fn delete_file(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let model = files_model(&state).await?;
    let record = model.find(id).await?;
    if record.is_empty() {
        return Ok(Html(Alert::warning(Messages::get("file_not_found"))));
    }
    if !state.files.delete(&record, "stored_name") {
        tracing::warn!(id, "stored file already missing");
    }
    model.delete(id).await?;
    Ok(Html(Alert::success(Messages::get("delete_success"))))
}
