//! Quote (cotización) endpoints: upload, list, fetch, delete.

use axum::{
    extract::{Multipart, Path, Query, State},
    Json,
};
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::api::auth::CurrentUser;
use crate::api::error::ApiError;
use crate::db::{self, ListQuotesQuery, Quote, QuoteListResponse};
use crate::AppState;

const SLUG_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const SLUG_LEN: usize = 8;
const SLUG_ATTEMPTS: usize = 3;

/// Short random public identifier for a tracked link
pub fn generate_slug() -> String {
    let mut rng = rand::rng();
    (0..SLUG_LEN)
        .map(|_| SLUG_CHARS[rng.random_range(0..SLUG_CHARS.len())] as char)
        .collect()
}

#[derive(Debug, Serialize)]
pub struct CreateQuoteResponse {
    pub cotizacion: Quote,
    /// Shareable tracked link
    pub public_url: String,
}

/// Quote detail with its visit count and public URLs
#[derive(Debug, Serialize)]
pub struct QuoteDetailResponse {
    #[serde(flatten)]
    pub cotizacion: Quote,
    pub total_visitas: i64,
    pub public_url: String,
    pub pdf_url: String,
}

/// POST /api/cotizaciones: multipart: `codigo` text field + `pdf` file
pub async fn create_quote(
    current: CurrentUser,
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<CreateQuoteResponse>, ApiError> {
    let mut codigo: Option<String> = None;
    let mut pdf: Option<bytes::Bytes> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {e}")))?
    {
        match field.name() {
            Some("codigo") => {
                codigo = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ApiError::bad_request(format!("Invalid codigo field: {e}")))?,
                );
            }
            Some("pdf") => {
                pdf = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| ApiError::bad_request(format!("Failed to read PDF: {e}")))?,
                );
            }
            _ => {}
        }
    }

    let codigo = codigo
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::bad_request("El código es obligatorio"))?;
    let pdf = pdf
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::bad_request("PDF no recibido"))?;

    // The slug is reserved by inserting the row first; the rare collision
    // with an existing slug just gets a fresh one.
    let mut quote: Option<Quote> = None;
    for _ in 0..SLUG_ATTEMPTS {
        let slug = generate_slug();
        let pdf_path = format!("{slug}.pdf");
        match db::insert_quote(&state.db, &codigo, &slug, &pdf_path, &current.0.id).await {
            Ok(inserted) => {
                quote = Some(inserted);
                break;
            }
            Err(sqlx::Error::Database(e))
                if e.message().contains("UNIQUE constraint failed: cotizaciones.slug") =>
            {
                continue;
            }
            Err(e) => return Err(e.into()),
        }
    }
    let quote = quote.ok_or_else(|| ApiError::internal("Could not allocate a unique slug"))?;

    if let Err(e) = state.storage.save(&quote.pdf_path, &pdf).await {
        tracing::error!(error = %e, "Failed to store PDF, rolling back quote row");
        let _ = db::delete_quote(&state.db, &quote.id).await;
        return Err(ApiError::internal("Failed to store PDF"));
    }

    info!(
        quote_id = %quote.id,
        codigo = %quote.codigo,
        slug = %quote.slug,
        user_id = %current.0.id,
        "Quote created"
    );

    let public_url = state.storage.tracked_url(&quote.slug);
    Ok(Json(CreateQuoteResponse {
        cotizacion: quote,
        public_url,
    }))
}

/// GET /api/cotizaciones: paginated; employees see only their own rows
pub async fn list_quotes(
    current: CurrentUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuotesQuery>,
) -> Result<Json<QuoteListResponse>, ApiError> {
    let owner_id = if current.0.is_admin() {
        None
    } else {
        Some(current.0.id.as_str())
    };

    let listing = db::list_quotes(&state.db, owner_id, &query).await?;
    Ok(Json(listing))
}

async fn find_owned_quote(
    state: &AppState,
    current: &CurrentUser,
    id: &str,
) -> Result<Quote, ApiError> {
    let quote = db::find_quote_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Cotización no encontrada"))?;

    if !current.0.is_admin() && quote.user_id != current.0.id {
        return Err(ApiError::forbidden("No puedes acceder a esta cotización"));
    }
    Ok(quote)
}

/// GET /api/cotizaciones/:id
pub async fn get_quote(
    current: CurrentUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<QuoteDetailResponse>, ApiError> {
    let quote = find_owned_quote(&state, &current, &id).await?;
    let total_visitas = db::count_visits_for_quote(&state.db, &quote.id).await?;

    Ok(Json(QuoteDetailResponse {
        public_url: state.storage.tracked_url(&quote.slug),
        pdf_url: state.storage.file_url(&quote.pdf_path),
        total_visitas,
        cotizacion: quote,
    }))
}

/// DELETE /api/cotizaciones/:id: owner or admin; visits cascade with the row
pub async fn delete_quote(
    current: CurrentUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let quote = find_owned_quote(&state, &current, &id).await?;

    db::delete_quote(&state.db, &quote.id).await?;
    state.storage.delete(&quote.pdf_path).await;

    info!(
        quote_id = %quote.id,
        codigo = %quote.codigo,
        deleted_by = %current.0.id,
        "Quote deleted"
    );
    Ok(Json(serde_json::json!({ "ok": true })))
}
