use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, MessageResponse},
        password::{hash_password, verify_password},
        sessions::{CurrentSession, Session},
    },
    error::ApiError,
    forms::FormData,
    mailer,
    photos::{
        names::{NamePolicy, PhotoNames},
        service as photo_service, upload,
    },
    state::AppState,
    users::{dto::PublicUser, repo::is_unique_violation, repo_types::User},
};

const REGISTER_BODY_LIMIT: usize = 4 * 1024 * 1024; // form fields + one photo

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/auth/register",
            post(register).layer(DefaultBodyLimit::max(REGISTER_BODY_LIMIT)),
        )
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route("/dashboard", get(dashboard))
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// POST /auth/register (multipart: name, email, password,
/// password_confirmation, optional photo)
#[instrument(skip(state, mp))]
pub async fn register(
    State(state): State<AppState>,
    mp: Multipart,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let form = FormData::collect(mp, "photo").await?;

    let name = form.require("name")?.trim().to_string();
    let email = form.require("email")?.trim().to_lowercase();
    let password = form.require("password")?;
    let confirmation = form.require("password_confirmation")?;

    if !is_valid_email(&email) {
        return Err(ApiError::validation("email", "email is not valid"));
    }
    if password.len() < 4 {
        return Err(ApiError::validation(
            "password",
            "password must be at least 4 characters",
        ));
    }
    if password != confirmation {
        return Err(ApiError::validation(
            "password",
            "password confirmation does not match",
        ));
    }
    if User::find_by_email(&state.db, &email).await?.is_some() {
        warn!(%email, "registration with taken email");
        return Err(ApiError::DuplicateEmail);
    }

    // Stage the optional photo before touching the directory, so a storage
    // failure aborts with nothing created.
    let mut photos: Option<PhotoNames> = None;
    if let Some(file) = &form.file {
        let upload = upload::accept(
            &file.bytes,
            &file.filename,
            state.config.photos.max_upload_kb,
        )?;
        let policy = NamePolicy::Create {
            basename: upload.basename.clone(),
        };
        let names = PhotoNames::derive(&policy, OffsetDateTime::now_utc(), &upload.ext);
        photo_service::stage(
            state.storage.as_ref(),
            &state.config.photos.prefix,
            &upload,
            &names,
        )
        .await?;
        photos = Some(names);
    }

    let hash = hash_password(password)?;
    let user = User::create(&state.db, &name, &email, &hash, photos.as_ref())
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ApiError::DuplicateEmail
            } else {
                e.into()
            }
        })?;

    // Welcome mail never blocks or fails registration.
    mailer::send_welcome_detached(state.mailer.clone(), user.email.clone(), user.name.clone());

    let session = Session::establish(&state.db, user.id, state.config.session_ttl_minutes).await?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token: session.token,
            user: PublicUser::from(user),
        }),
    ))
}

/// POST /auth/login
#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        return Err(ApiError::validation("email", "email is not valid"));
    }
    if payload.password.is_empty() {
        return Err(ApiError::validation("password", "password is required"));
    }

    // Unknown email and wrong password are indistinguishable to the caller.
    let Some(user) = User::find_by_email(&state.db, &payload.email).await? else {
        warn!(email = %payload.email, "login unknown email");
        return Err(ApiError::CredentialMismatch);
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(ApiError::CredentialMismatch);
    }

    let session = Session::establish(&state.db, user.id, state.config.session_ttl_minutes).await?;

    info!(user_id = %user.id, "user logged in");
    Ok(Json(AuthResponse {
        token: session.token,
        user: PublicUser::from(user),
    }))
}

/// POST /auth/refresh — regenerate the session identifier. The old token
/// stops working as soon as the new one exists.
#[instrument(skip(state, session))]
pub async fn refresh(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> Result<Json<AuthResponse>, ApiError> {
    let user = User::find_by_id(&state.db, session.user_id)
        .await?
        .ok_or(ApiError::Unauthorized)?;
    let session = session
        .rotate(&state.db, state.config.session_ttl_minutes)
        .await?;
    Ok(Json(AuthResponse {
        token: session.token,
        user: PublicUser::from(user),
    }))
}

/// POST /auth/logout
#[instrument(skip(state, session))]
pub async fn logout(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> Result<Json<MessageResponse>, ApiError> {
    let user_id = session.user_id;
    session.destroy(&state.db).await?;
    info!(%user_id, "user logged out");
    Ok(Json(MessageResponse {
        message: "you have logged out",
    }))
}

/// GET /dashboard — requires an active session.
#[instrument(skip(state, session))]
pub async fn dashboard(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> Result<Json<PublicUser>, ApiError> {
    let user = User::find_by_id(&state.db, session.user_id)
        .await?
        .ok_or(ApiError::Unauthorized)?;
    Ok(Json(PublicUser::from(user)))
}
