use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{web, HttpResponse};
use rowsearch::{ExportRequest, RowSearchError, SearchParams};

use crate::AppState;

/// Configure all API routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            // Status
            .route("/status", web::get().to(status))
            // Tables
            .route("/tables/{table_id}/rows/search", web::post().to(search_rows))
            .route("/tables/{table_id}/schema", web::get().to(table_schema))
            // Views
            .route("/views/export", web::get().to(export_view)),
    );
}

// ── Helpers ─────────────────────────────────────────────────────────

fn err_response(e: RowSearchError) -> HttpResponse {
    match &e {
        RowSearchError::NotFound { .. } => HttpResponse::NotFound().json(serde_json::json!({
            "error": e.to_string()
        })),
        RowSearchError::Validation(_) => HttpResponse::BadRequest().json(serde_json::json!({
            "error": e.to_string()
        })),
        _ => {
            log::error!("Internal error: {e}");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }))
        }
    }
}

/// Run blocking engine work off the async executor.
async fn blocking<T, F>(work: F) -> Result<T, HttpResponse>
where
    F: FnOnce() -> rowsearch::Result<T> + Send + 'static,
    T: Send + 'static,
{
    match web::block(work).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(err_response(e)),
        Err(e) => {
            log::error!("Blocking task failed: {e}");
            Err(HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            })))
        }
    }
}

// ── Status ──────────────────────────────────────────────────────────

async fn status(state: web::Data<AppState>) -> HttpResponse {
    let tables: Vec<_> = state
        .workspace
        .catalog()
        .tables()
        .map(|t| serde_json::json!({ "id": t.id, "name": t.name, "sourceType": t.source_type }))
        .collect();
    HttpResponse::Ok().json(serde_json::json!({
        "tables": tables,
        "config": state.workspace.engine().config(),
    }))
}

// ── Tables ──────────────────────────────────────────────────────────

async fn search_rows(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<SearchParams>,
) -> HttpResponse {
    let table_id = path.into_inner();
    let params = body.into_inner();
    match blocking(move || state.workspace.engine().search(&table_id, params)).await {
        Ok(result) => HttpResponse::Ok().json(result),
        Err(response) => response,
    }
}

async fn table_schema(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let table_id = path.into_inner();
    match blocking(move || state.workspace.engine().enriched_schema(&table_id)).await {
        Ok(schema) => HttpResponse::Ok().json(schema),
        Err(response) => response,
    }
}

// ── Views ───────────────────────────────────────────────────────────

async fn export_view(
    state: web::Data<AppState>,
    query: web::Query<ExportRequest>,
) -> HttpResponse {
    let request = query.into_inner();
    match blocking(move || state.workspace.engine().export_view(&request)).await {
        Ok(file) => HttpResponse::Ok()
            .content_type(file.content_type)
            .insert_header(ContentDisposition {
                disposition: DispositionType::Attachment,
                parameters: vec![DispositionParam::Filename(file.filename)],
            })
            .body(file.body),
        Err(response) => response,
    }
}
