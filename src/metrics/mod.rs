//! In-process metric reductions over fetched rows.
//!
//! The dashboard recomputes everything per request: quotes and visit rows are
//! fetched, then reduced here. No caching, no incremental counters; acceptable
//! at the scale this tool serves, and the pure functions keep a cached variant
//! easy to slot in later.

use serde::Serialize;
use std::collections::HashMap;

use crate::db::QuoteRef;

/// Visit count for one quote
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct QuoteVisits {
    pub codigo: String,
    pub visitas: i64,
}

/// Per-caller dashboard figures (global when computed over all rows)
#[derive(Debug, Serialize)]
pub struct DashboardMetrics {
    pub total_cotizaciones: i64,
    pub total_visitas: i64,
    pub visitas_por_cotizacion: Vec<QuoteVisits>,
}

/// Admin overview figures
#[derive(Debug, Serialize)]
pub struct AdminStats {
    pub total_cotizaciones: i64,
    pub total_visitas: i64,
    /// Highest per-quote visit count; 0 when no visits exist
    pub max_visitas: i64,
}

/// Per-employee grouping for the admin dashboard
#[derive(Debug, Clone, Serialize)]
pub struct EmployeeStats {
    pub user_id: String,
    pub nombre: Option<String>,
    pub total_cotizaciones: i64,
    pub total_visitas: i64,
}

/// Frequency map keyed by quote id, built from raw visit rows
pub fn visit_frequency(visit_quote_ids: &[String]) -> HashMap<String, i64> {
    let mut freq = HashMap::new();
    for id in visit_quote_ids {
        *freq.entry(id.clone()).or_insert(0) += 1;
    }
    freq
}

/// Reduce quotes + visit frequencies into dashboard figures, newest-irrelevant
/// ordering preserved from the input slice.
pub fn dashboard(quotes: &[QuoteRef], freq: &HashMap<String, i64>) -> DashboardMetrics {
    let visitas_por_cotizacion: Vec<QuoteVisits> = quotes
        .iter()
        .map(|q| QuoteVisits {
            codigo: q.codigo.clone(),
            visitas: freq.get(&q.id).copied().unwrap_or(0),
        })
        .collect();

    let total_visitas = visitas_por_cotizacion.iter().map(|q| q.visitas).sum();

    DashboardMetrics {
        total_cotizaciones: quotes.len() as i64,
        total_visitas,
        visitas_por_cotizacion,
    }
}

/// Global admin figures; the max is taken over quotes actually present so a
/// dangling frequency entry cannot inflate it.
pub fn admin_stats(quotes: &[QuoteRef], freq: &HashMap<String, i64>) -> AdminStats {
    let mut total_visitas = 0;
    let mut max_visitas = 0;
    for quote in quotes {
        let count = freq.get(&quote.id).copied().unwrap_or(0);
        total_visitas += count;
        max_visitas = max_visitas.max(count);
    }

    AdminStats {
        total_cotizaciones: quotes.len() as i64,
        total_visitas,
        max_visitas,
    }
}

/// Group quote and visit counts by owning user. Names are filled in by the
/// caller from the users table; ordering is by quote count descending.
pub fn per_employee(
    quotes: &[QuoteRef],
    freq: &HashMap<String, i64>,
    names: &HashMap<String, String>,
) -> Vec<EmployeeStats> {
    let mut by_owner: HashMap<&str, (i64, i64)> = HashMap::new();
    for quote in quotes {
        let entry = by_owner.entry(quote.user_id.as_str()).or_insert((0, 0));
        entry.0 += 1;
        entry.1 += freq.get(&quote.id).copied().unwrap_or(0);
    }

    let mut stats: Vec<EmployeeStats> = by_owner
        .into_iter()
        .map(|(user_id, (total_cotizaciones, total_visitas))| EmployeeStats {
            user_id: user_id.to_string(),
            nombre: names.get(user_id).cloned(),
            total_cotizaciones,
            total_visitas,
        })
        .collect();

    stats.sort_by(|a, b| {
        b.total_cotizaciones
            .cmp(&a.total_cotizaciones)
            .then_with(|| a.user_id.cmp(&b.user_id))
    });
    stats
}

/// Quotes ranked by visit count descending; ties broken by code for a stable
/// dashboard ordering.
pub fn top_viewed(quotes: &[QuoteRef], freq: &HashMap<String, i64>) -> Vec<QuoteVisits> {
    let mut ranked: Vec<QuoteVisits> = quotes
        .iter()
        .map(|q| QuoteVisits {
            codigo: q.codigo.clone(),
            visitas: freq.get(&q.id).copied().unwrap_or(0),
        })
        .collect();
    ranked.sort_by(|a, b| b.visitas.cmp(&a.visitas).then_with(|| a.codigo.cmp(&b.codigo)));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(id: &str, codigo: &str, user: &str) -> QuoteRef {
        QuoteRef {
            id: id.to_string(),
            codigo: codigo.to_string(),
            user_id: user.to_string(),
        }
    }

    fn visits(pairs: &[(&str, usize)]) -> Vec<String> {
        let mut out = Vec::new();
        for (id, n) in pairs {
            for _ in 0..*n {
                out.push(id.to_string());
            }
        }
        out
    }

    #[test]
    fn frequency_counts_per_quote() {
        let freq = visit_frequency(&visits(&[("q1", 3), ("q2", 1)]));
        assert_eq!(freq.get("q1"), Some(&3));
        assert_eq!(freq.get("q2"), Some(&1));
        assert_eq!(freq.get("q3"), None);
    }

    #[test]
    fn dashboard_totals() {
        let quotes = vec![quote("q1", "COT-1", "u1"), quote("q2", "COT-2", "u1")];
        let freq = visit_frequency(&visits(&[("q1", 2), ("q2", 1)]));

        let metrics = dashboard(&quotes, &freq);
        assert_eq!(metrics.total_cotizaciones, 2);
        assert_eq!(metrics.total_visitas, 3);
        assert_eq!(
            metrics.visitas_por_cotizacion[0],
            QuoteVisits {
                codigo: "COT-1".into(),
                visitas: 2
            }
        );
    }

    #[test]
    fn most_viewed_is_max_and_zero_without_visits() {
        let quotes = vec![quote("q1", "COT-1", "u1"), quote("q2", "COT-2", "u2")];

        let empty = admin_stats(&quotes, &HashMap::new());
        assert_eq!(empty.max_visitas, 0);
        assert_eq!(empty.total_visitas, 0);

        let freq = visit_frequency(&visits(&[("q1", 5), ("q2", 2)]));
        let stats = admin_stats(&quotes, &freq);
        assert_eq!(stats.max_visitas, 5);
        assert_eq!(stats.total_visitas, 7);
        assert_eq!(stats.total_cotizaciones, 2);
    }

    #[test]
    fn quotes_without_visits_count_as_zero() {
        let quotes = vec![quote("q1", "COT-1", "u1")];
        let metrics = dashboard(&quotes, &HashMap::new());
        assert_eq!(metrics.visitas_por_cotizacion[0].visitas, 0);
    }

    #[test]
    fn employees_grouped_and_ordered() {
        let quotes = vec![
            quote("q1", "COT-1", "ana"),
            quote("q2", "COT-2", "ana"),
            quote("q3", "COT-3", "luis"),
        ];
        let freq = visit_frequency(&visits(&[("q1", 1), ("q3", 4)]));
        let mut names = HashMap::new();
        names.insert("ana".to_string(), "Ana".to_string());

        let stats = per_employee(&quotes, &freq, &names);
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].user_id, "ana");
        assert_eq!(stats[0].nombre.as_deref(), Some("Ana"));
        assert_eq!(stats[0].total_cotizaciones, 2);
        assert_eq!(stats[0].total_visitas, 1);
        assert_eq!(stats[1].user_id, "luis");
        assert_eq!(stats[1].nombre, None);
        assert_eq!(stats[1].total_visitas, 4);
    }

    #[test]
    fn top_viewed_ranks_descending() {
        let quotes = vec![
            quote("q1", "COT-1", "u1"),
            quote("q2", "COT-2", "u1"),
            quote("q3", "COT-3", "u2"),
        ];
        let freq = visit_frequency(&visits(&[("q2", 3), ("q3", 1)]));

        let ranked = top_viewed(&quotes, &freq);
        assert_eq!(ranked[0].codigo, "COT-2");
        assert_eq!(ranked[1].codigo, "COT-3");
        assert_eq!(ranked[2].visitas, 0);
    }
}
