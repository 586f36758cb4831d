//! Authentication and user management endpoints.
//!
//! Access tokens are HS256 JWTs embedding id/email/name/role. The bearer
//! extractor decodes the token and re-fetches the user row, so role changes
//! and deletions take effect immediately. Login failures feed the per-email
//! lockout tracker before credentials are ever compared.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    async_trait,
    extract::{FromRequestParts, Multipart, Path, State},
    http::request::Parts,
    Json,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::error::ApiError;
use crate::api::lockout::FailureOutcome;
use crate::config::AuthConfig;
use crate::db::{
    self, roles, ChangePasswordRequest, CreateUserRequest, LoginRequest, LoginResponse,
    RegisterRequest, User, UserResponse,
};
use crate::{AppState, DbPool};

/// JWT claims carried in access tokens
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub email: String,
    pub nombre: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Issue a signed access token for a user
pub fn issue_token(user: &User, config: &AuthConfig) -> Result<String, ApiError> {
    let now = chrono::Utc::now();
    let claims = Claims {
        sub: user.id.clone(),
        email: user.email.clone(),
        nombre: user.nombre.clone(),
        role: user.role.clone(),
        iat: now.timestamp(),
        exp: (now + chrono::Duration::days(config.token_ttl_days)).timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| {
        tracing::error!(error = %e, "Failed to sign access token");
        ApiError::internal("Failed to issue token")
    })
}

/// Decode and validate an access token (signature + expiry)
pub fn decode_token(token: &str, secret: &str) -> Result<Claims, ApiError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| ApiError::unauthorized("Token inválido"))
}

fn login_response(user: User, config: &AuthConfig) -> Result<Json<LoginResponse>, ApiError> {
    let access_token = issue_token(&user, config)?;
    Ok(Json(LoginResponse {
        access_token,
        user: UserResponse::from(user),
    }))
}

/// Authenticated caller, extracted from the bearer token
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .ok_or_else(|| ApiError::unauthorized("Token requerido"))?;

        let claims = decode_token(token, &state.config.auth.jwt_secret)?;

        // Fresh fetch so revoked users and role changes bite immediately
        let user = db::find_user_by_id(&state.db, &claims.sub)
            .await?
            .ok_or_else(|| ApiError::unauthorized("Usuario no encontrado"))?;

        Ok(CurrentUser(user))
    }
}

/// Role gate for admin-only endpoints
pub fn require_admin(user: &User) -> Result<(), ApiError> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(ApiError::forbidden("Requiere rol de administrador"))
    }
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    // Lockout applies even to correct credentials
    if let Err(remaining_secs) = state.lockout.check(&request.email) {
        let minutes = remaining_secs.div_ceil(60);
        return Err(ApiError::unauthorized(format!(
            "Cuenta bloqueada. Intenta de nuevo en {minutes} minutos"
        )));
    }

    let user = match db::find_user_by_email(&state.db, &request.email).await? {
        Some(user) if verify_password(&request.password, &user.password_hash) => user,
        _ => {
            return Err(match state.lockout.record_failure(&request.email) {
                FailureOutcome::Remaining(n) => ApiError::unauthorized(format!(
                    "Credenciales inválidas. Te quedan {n} intentos"
                )),
                FailureOutcome::Blocked(secs) => {
                    let minutes = secs.div_ceil(60);
                    tracing::warn!(email = %request.email, "Login lockout triggered");
                    ApiError::unauthorized(format!(
                        "Cuenta bloqueada. Intenta de nuevo en {minutes} minutos"
                    ))
                }
            });
        }
    };

    state.lockout.record_success(&request.email);
    tracing::info!(user_id = %user.id, "User logged in");

    login_response(user, &state.config.auth)
}

async fn create_user(
    db: &DbPool,
    nombre: &str,
    email: &str,
    password: &str,
    role: &str,
) -> Result<User, ApiError> {
    if nombre.trim().is_empty() {
        return Err(ApiError::bad_request("El nombre es obligatorio"));
    }
    if email.is_empty() || !email.contains('@') {
        return Err(ApiError::bad_request("Email inválido"));
    }
    if password.len() < 8 {
        return Err(ApiError::bad_request(
            "La contraseña debe tener al menos 8 caracteres",
        ));
    }

    if db::find_user_by_email(db, email).await?.is_some() {
        return Err(ApiError::conflict("El email ya está registrado"));
    }

    let password_hash = hash_password(password).map_err(|e| {
        tracing::error!(error = %e, "Failed to hash password");
        ApiError::internal("Failed to hash password")
    })?;

    let user = db::insert_user(db, nombre.trim(), email, &password_hash, role).await?;
    tracing::info!(user_id = %user.id, role = role, "User created");
    Ok(user)
}

/// POST /api/auth/register: public self-registration, always an employee
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let user = create_user(
        &state.db,
        &request.nombre,
        &request.email,
        &request.password,
        roles::EMPLOYEE,
    )
    .await?;

    // Auto-login
    login_response(user, &state.config.auth)
}

/// POST /api/auth/admin/create-user
pub async fn admin_create_user(
    current: CurrentUser,
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateUserRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    require_admin(&current.0)?;

    if !roles::is_valid(&request.role) {
        return Err(ApiError::bad_request("Rol inválido"));
    }

    let user = create_user(
        &state.db,
        &request.nombre,
        &request.email,
        &request.password,
        &request.role,
    )
    .await?;

    login_response(user, &state.config.auth)
}

/// GET /api/auth/admin/users
pub async fn admin_list_users(
    current: CurrentUser,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    require_admin(&current.0)?;
    let users = db::list_users(&state.db).await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// DELETE /api/auth/admin/users/:id
pub async fn admin_delete_user(
    current: CurrentUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_admin(&current.0)?;

    if id == current.0.id {
        return Err(ApiError::bad_request(
            "No puedes eliminar tu propia cuenta",
        ));
    }

    // The user's quotes cascade with the row; grab blob names first.
    let pdf_paths = db::list_pdf_paths_for_owner(&state.db, &id).await?;

    if !db::delete_user(&state.db, &id).await? {
        return Err(ApiError::not_found("Usuario no encontrado"));
    }

    for pdf_path in &pdf_paths {
        state.storage.delete(pdf_path).await;
    }

    tracing::info!(user_id = %id, deleted_by = %current.0.id, "User deleted");
    Ok(Json(serde_json::json!({ "ok": true })))
}

/// POST /api/auth/admin/change-password
pub async fn admin_change_password(
    current: CurrentUser,
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_admin(&current.0)?;

    if request.new_password.len() < 8 {
        return Err(ApiError::bad_request(
            "La contraseña debe tener al menos 8 caracteres",
        ));
    }

    let password_hash = hash_password(&request.new_password)
        .map_err(|_| ApiError::internal("Failed to hash password"))?;

    if !db::update_password_by_email(&state.db, &request.email, &password_hash).await? {
        return Err(ApiError::not_found("Usuario no encontrado"));
    }

    tracing::info!(email = %request.email, changed_by = %current.0.id, "Password changed");
    Ok(Json(serde_json::json!({ "ok": true })))
}

/// GET /api/auth/profile
pub async fn profile(current: CurrentUser) -> Json<UserResponse> {
    Json(UserResponse::from(current.0))
}

/// GET /api/auth/verify
pub async fn verify(current: CurrentUser) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "ok": true,
        "user": UserResponse::from(current.0),
    }))
}

/// POST /api/auth/avatar: multipart image upload, stored next to the PDFs
pub async fn upload_avatar(
    current: CurrentUser,
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UserResponse>, ApiError> {
    let mut avatar: Option<bytes::Bytes> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {e}")))?
    {
        if field.name() == Some("avatar") {
            avatar = Some(
                field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read avatar: {e}")))?,
            );
        }
    }

    let avatar = avatar.ok_or_else(|| ApiError::bad_request("Avatar no recibido"))?;
    if avatar.is_empty() {
        return Err(ApiError::bad_request("Avatar vacío"));
    }

    let file_name = format!("avatar-{}.png", current.0.id);
    state
        .storage
        .save(&file_name, &avatar)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to store avatar");
            ApiError::internal("Failed to store avatar")
        })?;

    let avatar_url = state.storage.file_url(&file_name);
    db::update_avatar(&state.db, &current.0.id, &avatar_url).await?;

    let mut user = current.0;
    user.avatar_url = Some(avatar_url);
    Ok(Json(UserResponse::from(user)))
}

/// Create the bootstrap admin account if it does not exist yet
pub async fn ensure_admin_user(db: &DbPool, config: &AuthConfig) -> anyhow::Result<()> {
    if db::find_user_by_email(db, &config.admin_email).await?.is_some() {
        return Ok(());
    }

    let password_hash = hash_password(&config.admin_password)
        .map_err(|e| anyhow::anyhow!("Failed to hash admin password: {e}"))?;
    db::insert_user(
        db,
        &config.admin_name,
        &config.admin_email,
        &password_hash,
        roles::ADMIN,
    )
    .await?;

    tracing::info!(email = %config.admin_email, "Created bootstrap admin user");
    Ok(())
}
