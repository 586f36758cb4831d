//! Public tracked-link endpoint. No authentication: anyone holding the slug
//! can open the quote, and every open is recorded.

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::api::error::ApiError;
use crate::db;
use crate::notifications::VisitNotification;
use crate::AppState;

/// Metadata returned to the public viewer
#[derive(Debug, Serialize)]
pub struct TrackedQuoteResponse {
    pub codigo: String,
    pub slug: String,
    pub pdf_url: String,
    pub created_at: String,
}

/// Client IP from proxy headers; None when the server is hit directly
fn extract_client_ip(headers: &HeaderMap) -> Option<String> {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|h| h.to_str().ok()) {
        if let Some(first_ip) = forwarded.split(',').next() {
            let ip = first_ip.trim();
            if !ip.is_empty() {
                return Some(ip.to_string());
            }
        }
    }

    headers
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
}

/// GET /c/:slug: record one visit + enter event, then hand back the PDF URL.
/// Deliberately non-idempotent: a refresh is a new visit.
pub async fn open_tracked_link(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    headers: HeaderMap,
) -> Result<Json<TrackedQuoteResponse>, ApiError> {
    let quote = db::find_quote_by_slug(&state.db, &slug)
        .await?
        .ok_or_else(|| ApiError::not_found("Cotización no encontrada"))?;

    let ip = extract_client_ip(&headers);
    let user_agent = headers
        .get("user-agent")
        .and_then(|h| h.to_str().ok())
        .map(str::to_string);

    let visit = db::record_visit(
        &state.db,
        &quote.id,
        ip.as_deref(),
        user_agent.as_deref(),
    )
    .await?;

    tracing::info!(
        quote_id = %quote.id,
        codigo = %quote.codigo,
        visit_id = %visit.id,
        "Tracked link opened"
    );

    // Owner display name for the notification; the visit stands regardless
    let asesor = db::find_user_by_id(&state.db, &quote.user_id)
        .await
        .ok()
        .flatten()
        .map(|u| u.nombre)
        .unwrap_or_else(|| "desconocido".to_string());

    let notification = VisitNotification::new(quote.codigo.clone(), asesor);
    if let Err(e) = state.notify_tx.try_send(notification) {
        // Queue full or worker gone; tracking already succeeded, move on
        tracing::warn!(codigo = %quote.codigo, error = %e, "Dropped visit notification");
    }

    Ok(Json(TrackedQuoteResponse {
        pdf_url: state.storage.file_url(&quote.pdf_path),
        codigo: quote.codigo,
        slug: quote.slug,
        created_at: quote.created_at,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::error::ErrorCode;
    use crate::api::test_support::{seed_employee, seed_quote, test_state};

    #[test]
    fn client_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.9, 10.0.0.1".parse().unwrap());
        headers.insert("x-real-ip", "10.0.0.2".parse().unwrap());
        assert_eq!(extract_client_ip(&headers).as_deref(), Some("203.0.113.9"));

        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", "10.0.0.2".parse().unwrap());
        assert_eq!(extract_client_ip(&headers).as_deref(), Some("10.0.0.2"));

        assert_eq!(extract_client_ip(&HeaderMap::new()), None);
    }

    #[tokio::test]
    async fn each_open_records_one_visit() {
        let (state, _dir) = test_state().await;
        let ana = seed_employee(&state, "ana@example.com").await;
        let quote = seed_quote(&state, &ana, "COT-1").await;

        let mut headers = HeaderMap::new();
        headers.insert("user-agent", "Mozilla/5.0".parse().unwrap());
        headers.insert("x-real-ip", "203.0.113.9".parse().unwrap());

        for _ in 0..2 {
            let response = open_tracked_link(
                State(state.clone()),
                Path(quote.slug.clone()),
                headers.clone(),
            )
            .await
            .unwrap();
            assert_eq!(response.0.codigo, "COT-1");
            assert!(response.0.pdf_url.contains(&quote.pdf_path));
        }

        assert_eq!(
            db::count_visits_for_quote(&state.db, &quote.id).await.unwrap(),
            2
        );

        let visit_ip: Option<String> =
            sqlx::query_scalar("SELECT ip FROM visitas LIMIT 1")
                .fetch_one(&state.db)
                .await
                .unwrap();
        assert_eq!(visit_ip.as_deref(), Some("203.0.113.9"));
    }

    #[tokio::test]
    async fn unknown_slug_is_not_found() {
        let (state, _dir) = test_state().await;

        let err = open_tracked_link(
            State(state.clone()),
            Path("zzzzzzzz".to_string()),
            HeaderMap::new(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn visit_notification_is_enqueued() {
        let (state, mut guard) = test_state().await;
        let ana = seed_employee(&state, "ana@example.com").await;
        let quote = seed_quote(&state, &ana, "COT-1").await;

        open_tracked_link(State(state.clone()), Path(quote.slug.clone()), HeaderMap::new())
            .await
            .unwrap();

        let notification = guard.notify_rx.try_recv().unwrap();
        assert_eq!(notification.codigo, "COT-1");
        assert_eq!(notification.asesor, "ana@example.com");
    }
}
