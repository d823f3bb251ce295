use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    routing::{delete, get, put},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::MessageResponse,
        handlers::is_valid_email,
        password::hash_password,
        sessions::CurrentSession,
    },
    error::ApiError,
    forms::FormData,
    photos::{
        names::{NamePolicy, PhotoNames},
        service as photo_service, upload,
    },
    state::AppState,
    users::{dto::PublicUser, repo::is_unique_violation, repo_types::User},
};

const UPDATE_BODY_LIMIT: usize = 4 * 1024 * 1024;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/:id", get(get_user))
        .route(
            "/users/:id",
            put(update_profile).layer(DefaultBodyLimit::max(UPDATE_BODY_LIMIT)),
        )
        .route("/users/:id/photos", delete(delete_photos))
}

/// GET /users
#[instrument(skip(state, _session))]
pub async fn list_users(
    State(state): State<AppState>,
    _session: CurrentSession,
) -> Result<Json<Vec<PublicUser>>, ApiError> {
    let users = User::list(&state.db).await?;
    Ok(Json(users.into_iter().map(PublicUser::from).collect()))
}

/// GET /users/:id — backs the edit-profile form.
#[instrument(skip(state, _session))]
pub async fn get_user(
    State(state): State<AppState>,
    _session: CurrentSession,
    Path(id): Path<Uuid>,
) -> Result<Json<PublicUser>, ApiError> {
    let user = User::find_by_id(&state.db, id)
        .await?
        .ok_or(ApiError::UserNotFound)?;
    Ok(Json(PublicUser::from(user)))
}

/// PUT /users/:id (multipart: name, email, optional password, optional photo)
///
/// Photo handling is stage-then-commit: all three variants are written to
/// storage before the record is touched, and the record is persisted with a
/// single UPDATE. Old files are intentionally not removed on replacement.
#[instrument(skip(state, _session, mp))]
pub async fn update_profile(
    State(state): State<AppState>,
    _session: CurrentSession,
    Path(id): Path<Uuid>,
    mp: Multipart,
) -> Result<Json<PublicUser>, ApiError> {
    let mut user = User::find_by_id(&state.db, id)
        .await?
        .ok_or(ApiError::UserNotFound)?;

    let form = FormData::collect(mp, "photo").await?;

    let name = form.require("name")?.trim().to_string();
    let email = form.require("email")?.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(ApiError::validation("email", "email is not valid"));
    }
    if User::email_taken_by_other(&state.db, &email, id).await? {
        warn!(%email, "profile update with taken email");
        return Err(ApiError::DuplicateEmail);
    }

    user.name = name;
    user.email = email;

    if let Some(password) = form.get("password") {
        if password.len() < 6 {
            return Err(ApiError::validation(
                "password",
                "password must be at least 6 characters",
            ));
        }
        user.password_hash = hash_password(password)?;
    }

    if let Some(file) = &form.file {
        let upload = upload::accept(
            &file.bytes,
            &file.filename,
            state.config.photos.max_upload_kb,
        )?;
        // One timestamp for the whole set; every derived name reuses it.
        let names = PhotoNames::derive(&NamePolicy::Update, OffsetDateTime::now_utc(), &upload.ext);
        photo_service::stage(
            state.storage.as_ref(),
            &state.config.photos.prefix,
            &upload,
            &names,
        )
        .await?;
        photo_service::apply(&mut user, &names);
    }

    user.save(&state.db).await.map_err(|e| {
        if is_unique_violation(&e) {
            ApiError::DuplicateEmail
        } else {
            e.into()
        }
    })?;

    info!(user_id = %user.id, "profile updated");
    Ok(Json(PublicUser::from(user)))
}

/// DELETE /users/:id/photos — idempotent.
#[instrument(skip(state, _session))]
pub async fn delete_photos(
    State(state): State<AppState>,
    _session: CurrentSession,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    let mut user = User::find_by_id(&state.db, id)
        .await?
        .ok_or(ApiError::UserNotFound)?;

    photo_service::remove(
        state.storage.as_ref(),
        &state.config.photos.prefix,
        &mut user,
    )
    .await;
    user.save(&state.db).await?;

    info!(user_id = %user.id, "photos deleted");
    Ok(Json(MessageResponse {
        message: "photos deleted",
    }))
}
