//! Dashboard metric endpoints. Handlers fetch quote and visit projections and
//! delegate the reductions to `crate::metrics`.

use axum::{extract::State, Json};
use std::collections::HashMap;
use std::sync::Arc;

use crate::api::auth::{require_admin, CurrentUser};
use crate::api::error::ApiError;
use crate::db;
use crate::metrics::{self, AdminStats, DashboardMetrics, EmployeeStats, QuoteVisits};
use crate::AppState;

/// GET /api/metricas: employee sees their own figures, admin the global ones
pub async fn dashboard(
    current: CurrentUser,
    State(state): State<Arc<AppState>>,
) -> Result<Json<DashboardMetrics>, ApiError> {
    let quotes = if current.0.is_admin() {
        db::list_quote_refs(&state.db).await?
    } else {
        db::list_quote_refs_for_owner(&state.db, &current.0.id).await?
    };

    let visit_ids = db::list_visit_quote_ids(&state.db).await?;
    let freq = metrics::visit_frequency(&visit_ids);

    Ok(Json(metrics::dashboard(&quotes, &freq)))
}

/// GET /api/admin/estadisticas
pub async fn admin_overview(
    current: CurrentUser,
    State(state): State<Arc<AppState>>,
) -> Result<Json<AdminStats>, ApiError> {
    require_admin(&current.0)?;

    let quotes = db::list_quote_refs(&state.db).await?;
    let visit_ids = db::list_visit_quote_ids(&state.db).await?;
    let freq = metrics::visit_frequency(&visit_ids);

    Ok(Json(metrics::admin_stats(&quotes, &freq)))
}

/// GET /api/admin/estadisticas/empleados
pub async fn admin_per_employee(
    current: CurrentUser,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<EmployeeStats>>, ApiError> {
    require_admin(&current.0)?;

    let quotes = db::list_quote_refs(&state.db).await?;
    let visit_ids = db::list_visit_quote_ids(&state.db).await?;
    let freq = metrics::visit_frequency(&visit_ids);

    let names: HashMap<String, String> = db::list_users(&state.db)
        .await?
        .into_iter()
        .map(|u| (u.id, u.nombre))
        .collect();

    Ok(Json(metrics::per_employee(&quotes, &freq, &names)))
}

/// GET /api/admin/estadisticas/top-vistas
pub async fn admin_top_viewed(
    current: CurrentUser,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<QuoteVisits>>, ApiError> {
    require_admin(&current.0)?;

    let quotes = db::list_quote_refs(&state.db).await?;
    let visit_ids = db::list_visit_quote_ids(&state.db).await?;
    let freq = metrics::visit_frequency(&visit_ids);

    Ok(Json(metrics::top_viewed(&quotes, &freq)))
}
