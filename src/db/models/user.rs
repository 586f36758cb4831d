//! User models and queries.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

/// Valid account roles
pub mod roles {
    pub const ADMIN: &str = "admin";
    pub const EMPLOYEE: &str = "employee";

    pub fn is_valid(role: &str) -> bool {
        role == ADMIN || role == EMPLOYEE
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub nombre: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub avatar_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == roles::ADMIN
    }
}

/// User as exposed over the API (no password hash)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: String,
    pub nombre: String,
    pub email: String,
    pub role: String,
    pub avatar_url: Option<String>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            nombre: user.nombre,
            email: user.email,
            role: user.role,
            avatar_url: user.avatar_url,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub user: UserResponse,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub nombre: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub nombre: String,
    pub email: String,
    pub password: String,
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub email: String,
    #[serde(rename = "newPassword")]
    pub new_password: String,
}

pub async fn find_user_by_email(
    db: &SqlitePool,
    email: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM usuarios WHERE email = ?")
        .bind(email)
        .fetch_optional(db)
        .await
}

pub async fn find_user_by_id(db: &SqlitePool, id: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM usuarios WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn insert_user(
    db: &SqlitePool,
    nombre: &str,
    email: &str,
    password_hash: &str,
    role: &str,
) -> Result<User, sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO usuarios (id, nombre, email, password_hash, role, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(nombre)
    .bind(email)
    .bind(password_hash)
    .bind(role)
    .bind(&now)
    .bind(&now)
    .execute(db)
    .await?;

    Ok(User {
        id,
        nombre: nombre.to_string(),
        email: email.to_string(),
        password_hash: password_hash.to_string(),
        role: role.to_string(),
        avatar_url: None,
        created_at: now.clone(),
        updated_at: now,
    })
}

pub async fn list_users(db: &SqlitePool) -> Result<Vec<User>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM usuarios ORDER BY created_at ASC")
        .fetch_all(db)
        .await
}

/// Returns false if no row matched
pub async fn delete_user(db: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM usuarios WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn update_password_by_email(
    db: &SqlitePool,
    email: &str,
    password_hash: &str,
) -> Result<bool, sqlx::Error> {
    let now = chrono::Utc::now().to_rfc3339();
    let result =
        sqlx::query("UPDATE usuarios SET password_hash = ?, updated_at = ? WHERE email = ?")
            .bind(password_hash)
            .bind(&now)
            .bind(email)
            .execute(db)
            .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn update_avatar(
    db: &SqlitePool,
    user_id: &str,
    avatar_url: &str,
) -> Result<(), sqlx::Error> {
    let now = chrono::Utc::now().to_rfc3339();
    sqlx::query("UPDATE usuarios SET avatar_url = ?, updated_at = ? WHERE id = ?")
        .bind(avatar_url)
        .bind(&now)
        .bind(user_id)
        .execute(db)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_validation() {
        assert!(roles::is_valid("admin"));
        assert!(roles::is_valid("employee"));
        assert!(!roles::is_valid("superuser"));
        assert!(!roles::is_valid(""));
    }

    #[test]
    fn user_response_strips_hash() {
        let user = User {
            id: "u1".into(),
            nombre: "Ana".into(),
            email: "ana@example.com".into(),
            password_hash: "secret-hash".into(),
            role: "employee".into(),
            avatar_url: None,
            created_at: String::new(),
            updated_at: String::new(),
        };
        let json = serde_json::to_value(UserResponse::from(user)).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["email"], "ana@example.com");
    }

    #[tokio::test]
    async fn insert_and_lookup_roundtrip() {
        let db = crate::db::init_memory().await.unwrap();
        let user = insert_user(&db, "Ana", "ana@example.com", "h", roles::EMPLOYEE)
            .await
            .unwrap();

        let found = find_user_by_email(&db, "ana@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, user.id);
        assert!(!found.is_admin());

        assert!(find_user_by_email(&db, "nadie@example.com")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn duplicate_email_rejected() {
        let db = crate::db::init_memory().await.unwrap();
        insert_user(&db, "Ana", "ana@example.com", "h", roles::EMPLOYEE)
            .await
            .unwrap();
        let err = insert_user(&db, "Otra", "ana@example.com", "h", roles::EMPLOYEE)
            .await
            .unwrap_err();
        assert!(matches!(err, sqlx::Error::Database(_)));
    }

    #[tokio::test]
    async fn password_change_by_email() {
        let db = crate::db::init_memory().await.unwrap();
        insert_user(&db, "Ana", "ana@example.com", "old", roles::EMPLOYEE)
            .await
            .unwrap();

        assert!(update_password_by_email(&db, "ana@example.com", "new")
            .await
            .unwrap());
        assert!(!update_password_by_email(&db, "nadie@example.com", "new")
            .await
            .unwrap());

        let user = find_user_by_email(&db, "ana@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.password_hash, "new");
    }
}
