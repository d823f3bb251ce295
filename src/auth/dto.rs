use serde::{Deserialize, Serialize};

use crate::users::dto::PublicUser;

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Response returned after login or registration: the session token plus the
/// public user. The submitted password is never echoed back.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: PublicUser,
}

/// Plain acknowledgement for logout and photo deletion.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}
