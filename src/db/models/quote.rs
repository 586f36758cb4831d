//! Quote (cotización) models and queries.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Quote {
    pub id: String,
    pub codigo: String,
    pub slug: String,
    pub pdf_path: String,
    pub user_id: String,
    pub created_at: String,
}

/// Minimal projection used by the metrics aggregator
#[derive(Debug, Clone, FromRow)]
pub struct QuoteRef {
    pub id: String,
    pub codigo: String,
    pub user_id: String,
}

/// Row shape for the paginated dashboard listing
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct QuoteListItem {
    pub id: String,
    pub codigo: String,
    pub slug: String,
    pub created_at: String,
    pub total_visitas: i64,
    /// Owner display name; populated for admin listings
    pub asesor: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct QuoteListResponse {
    pub items: Vec<QuoteListItem>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

/// Query parameters for listing quotes
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ListQuotesQuery {
    /// Page number (1-indexed, defaults to 1)
    pub page: Option<i64>,
    /// Items per page (defaults to 20, max 100)
    pub limit: Option<i64>,
}

pub async fn insert_quote(
    db: &SqlitePool,
    codigo: &str,
    slug: &str,
    pdf_path: &str,
    user_id: &str,
) -> Result<Quote, sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO cotizaciones (id, codigo, slug, pdf_path, user_id, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(codigo)
    .bind(slug)
    .bind(pdf_path)
    .bind(user_id)
    .bind(&now)
    .execute(db)
    .await?;

    Ok(Quote {
        id,
        codigo: codigo.to_string(),
        slug: slug.to_string(),
        pdf_path: pdf_path.to_string(),
        user_id: user_id.to_string(),
        created_at: now,
    })
}

pub async fn find_quote_by_id(db: &SqlitePool, id: &str) -> Result<Option<Quote>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM cotizaciones WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn find_quote_by_slug(
    db: &SqlitePool,
    slug: &str,
) -> Result<Option<Quote>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM cotizaciones WHERE slug = ?")
        .bind(slug)
        .fetch_optional(db)
        .await
}

/// List quotes with visit counts, newest first. `owner_id` scopes the listing
/// to a single user (employee view); `None` lists everything (admin view).
pub async fn list_quotes(
    db: &SqlitePool,
    owner_id: Option<&str>,
    query: &ListQuotesQuery,
) -> Result<QuoteListResponse, sqlx::Error> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(20).clamp(1, 100);
    let offset = (page - 1) * limit;

    let where_clause = match owner_id {
        Some(_) => "WHERE c.user_id = ?",
        None => "",
    };

    let sql = format!(
        "SELECT c.id, c.codigo, c.slug, c.created_at,
                (SELECT COUNT(*) FROM visitas v WHERE v.cotizacion_id = c.id) AS total_visitas,
                u.nombre AS asesor
         FROM cotizaciones c
         LEFT JOIN usuarios u ON u.id = c.user_id
         {where_clause}
         ORDER BY c.created_at DESC
         LIMIT ? OFFSET ?"
    );

    let mut items_query = sqlx::query_as::<_, QuoteListItem>(&sql);
    if let Some(owner) = owner_id {
        items_query = items_query.bind(owner);
    }
    let items = items_query.bind(limit).bind(offset).fetch_all(db).await?;

    let count_sql = format!("SELECT COUNT(*) FROM cotizaciones c {where_clause}");
    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    if let Some(owner) = owner_id {
        count_query = count_query.bind(owner);
    }
    let total = count_query.fetch_one(db).await?;

    let total_pages = if total == 0 { 0 } else { (total + limit - 1) / limit };

    Ok(QuoteListResponse {
        items,
        total,
        page,
        limit,
        total_pages,
    })
}

/// All quotes as metric projections, no pagination
pub async fn list_quote_refs(db: &SqlitePool) -> Result<Vec<QuoteRef>, sqlx::Error> {
    sqlx::query_as("SELECT id, codigo, user_id FROM cotizaciones")
        .fetch_all(db)
        .await
}

/// Quote projections for one owner
pub async fn list_quote_refs_for_owner(
    db: &SqlitePool,
    owner_id: &str,
) -> Result<Vec<QuoteRef>, sqlx::Error> {
    sqlx::query_as("SELECT id, codigo, user_id FROM cotizaciones WHERE user_id = ?")
        .bind(owner_id)
        .fetch_all(db)
        .await
}

/// Stored blob names for one owner, fetched before the owning row goes away
pub async fn list_pdf_paths_for_owner(
    db: &SqlitePool,
    owner_id: &str,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar("SELECT pdf_path FROM cotizaciones WHERE user_id = ?")
        .bind(owner_id)
        .fetch_all(db)
        .await
}

/// Deletes the quote row; dependent visits and events go with it via
/// ON DELETE CASCADE. Returns false if no row matched.
pub async fn delete_quote(db: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM cotizaciones WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{insert_user, record_visit, roles};

    async fn seed(db: &SqlitePool) -> (String, String) {
        let ana = insert_user(db, "Ana", "ana@example.com", "h", roles::EMPLOYEE)
            .await
            .unwrap();
        let luis = insert_user(db, "Luis", "luis@example.com", "h", roles::EMPLOYEE)
            .await
            .unwrap();
        (ana.id, luis.id)
    }

    #[tokio::test]
    async fn listing_is_scoped_to_owner() {
        let db = crate::db::init_memory().await.unwrap();
        let (ana, luis) = seed(&db).await;

        insert_quote(&db, "COT-1", "aaaa1111", "aaaa1111.pdf", &ana)
            .await
            .unwrap();
        insert_quote(&db, "COT-2", "bbbb2222", "bbbb2222.pdf", &luis)
            .await
            .unwrap();

        let scoped = list_quotes(&db, Some(&ana), &ListQuotesQuery::default())
            .await
            .unwrap();
        assert_eq!(scoped.total, 1);
        assert_eq!(scoped.items[0].codigo, "COT-1");

        let all = list_quotes(&db, None, &ListQuotesQuery::default())
            .await
            .unwrap();
        assert_eq!(all.total, 2);
        // Admin listing is enriched with the owner display name
        assert!(all.items.iter().any(|i| i.asesor.as_deref() == Some("Luis")));
    }

    #[tokio::test]
    async fn listing_counts_visits() {
        let db = crate::db::init_memory().await.unwrap();
        let (ana, _) = seed(&db).await;
        let quote = insert_quote(&db, "COT-1", "aaaa1111", "aaaa1111.pdf", &ana)
            .await
            .unwrap();

        record_visit(&db, &quote.id, Some("1.2.3.4"), Some("curl"))
            .await
            .unwrap();
        record_visit(&db, &quote.id, Some("1.2.3.4"), Some("curl"))
            .await
            .unwrap();

        let listing = list_quotes(&db, Some(&ana), &ListQuotesQuery::default())
            .await
            .unwrap();
        assert_eq!(listing.items[0].total_visitas, 2);
    }

    #[tokio::test]
    async fn pagination_clamps_and_pages() {
        let db = crate::db::init_memory().await.unwrap();
        let (ana, _) = seed(&db).await;
        for i in 0..5 {
            insert_quote(
                &db,
                &format!("COT-{i}"),
                &format!("slug{i:04}"),
                &format!("slug{i:04}.pdf"),
                &ana,
            )
            .await
            .unwrap();
        }

        let page = list_quotes(
            &db,
            None,
            &ListQuotesQuery {
                page: Some(2),
                limit: Some(2),
            },
        )
        .await
        .unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total, 5);
        assert_eq!(page.total_pages, 3);

        // Out-of-range page values are normalized
        let clamped = list_quotes(
            &db,
            None,
            &ListQuotesQuery {
                page: Some(0),
                limit: Some(500),
            },
        )
        .await
        .unwrap();
        assert_eq!(clamped.page, 1);
        assert_eq!(clamped.limit, 100);
    }

    #[tokio::test]
    async fn slug_is_unique() {
        let db = crate::db::init_memory().await.unwrap();
        let (ana, _) = seed(&db).await;
        insert_quote(&db, "COT-1", "dupslug1", "dupslug1.pdf", &ana)
            .await
            .unwrap();
        assert!(insert_quote(&db, "COT-2", "dupslug1", "other.pdf", &ana)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn delete_cascades_to_visits_and_events() {
        let db = crate::db::init_memory().await.unwrap();
        let (ana, _) = seed(&db).await;
        let quote = insert_quote(&db, "COT-1", "aaaa1111", "aaaa1111.pdf", &ana)
            .await
            .unwrap();
        record_visit(&db, &quote.id, None, None).await.unwrap();

        assert!(delete_quote(&db, &quote.id).await.unwrap());

        let visits: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM visitas")
            .fetch_one(&db)
            .await
            .unwrap();
        let events: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM eventos")
            .fetch_one(&db)
            .await
            .unwrap();
        assert_eq!(visits, 0);
        assert_eq!(events, 0);

        assert!(!delete_quote(&db, &quote.id).await.unwrap());
    }
}
