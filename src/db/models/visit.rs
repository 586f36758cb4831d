//! Visit and event models. Both tables are append-only; rows disappear only
//! through the quote cascade.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

/// Event types attached to visits
pub mod events {
    pub const ENTER: &str = "enter";
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Visit {
    pub id: String,
    pub cotizacion_id: String,
    pub visitor_id: String,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: String,
    pub visita_id: String,
    pub tipo: String,
    pub created_at: String,
}

/// Record one open of a tracked link: a visit row with a fresh visitor id
/// plus its `enter` event.
pub async fn record_visit(
    db: &SqlitePool,
    cotizacion_id: &str,
    ip: Option<&str>,
    user_agent: Option<&str>,
) -> Result<Visit, sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();
    let visitor_id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO visitas (id, cotizacion_id, visitor_id, ip, user_agent, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(cotizacion_id)
    .bind(&visitor_id)
    .bind(ip)
    .bind(user_agent)
    .bind(&now)
    .execute(db)
    .await?;

    let event_id = uuid::Uuid::new_v4().to_string();
    sqlx::query("INSERT INTO eventos (id, visita_id, tipo, created_at) VALUES (?, ?, ?, ?)")
        .bind(&event_id)
        .bind(&id)
        .bind(events::ENTER)
        .bind(&now)
        .execute(db)
        .await?;

    Ok(Visit {
        id,
        cotizacion_id: cotizacion_id.to_string(),
        visitor_id,
        ip: ip.map(str::to_string),
        user_agent: user_agent.map(str::to_string),
        created_at: now,
    })
}

/// Quote id of every visit row; input to the in-process metric reductions
pub async fn list_visit_quote_ids(db: &SqlitePool) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar("SELECT cotizacion_id FROM visitas")
        .fetch_all(db)
        .await
}

pub async fn count_visits_for_quote(db: &SqlitePool, quote_id: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM visitas WHERE cotizacion_id = ?")
        .bind(quote_id)
        .fetch_one(db)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{insert_quote, insert_user, roles};

    #[tokio::test]
    async fn each_open_adds_exactly_one_visit() {
        let db = crate::db::init_memory().await.unwrap();
        let user = insert_user(&db, "Ana", "ana@example.com", "h", roles::EMPLOYEE)
            .await
            .unwrap();
        let quote = insert_quote(&db, "COT-1", "aaaa1111", "aaaa1111.pdf", &user.id)
            .await
            .unwrap();

        // Same client twice still records two visits, no dedup
        for _ in 0..2 {
            record_visit(&db, &quote.id, Some("1.2.3.4"), Some("Mozilla/5.0"))
                .await
                .unwrap();
        }

        assert_eq!(count_visits_for_quote(&db, &quote.id).await.unwrap(), 2);

        let events: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM eventos WHERE tipo = 'enter'")
            .fetch_one(&db)
            .await
            .unwrap();
        assert_eq!(events, 2);
    }

    #[tokio::test]
    async fn visitor_ids_are_fresh_per_visit() {
        let db = crate::db::init_memory().await.unwrap();
        let user = insert_user(&db, "Ana", "ana@example.com", "h", roles::EMPLOYEE)
            .await
            .unwrap();
        let quote = insert_quote(&db, "COT-1", "aaaa1111", "aaaa1111.pdf", &user.id)
            .await
            .unwrap();

        let a = record_visit(&db, &quote.id, None, None).await.unwrap();
        let b = record_visit(&db, &quote.id, None, None).await.unwrap();
        assert_ne!(a.visitor_id, b.visitor_id);
    }

    #[tokio::test]
    async fn visit_requires_existing_quote() {
        let db = crate::db::init_memory().await.unwrap();
        assert!(record_visit(&db, "no-such-quote", None, None).await.is_err());
    }
}
