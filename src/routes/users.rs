/// Routes for the authenticated user
///
/// Stand-in for the resource handlers: they only consume the subject the
/// JWT middleware attached to the request.

use actix_web::{web, HttpResponse};

use crate::auth::AuthenticatedSubject;
use crate::error::{AppError, DatabaseError};
use crate::store::UserStore;

/// GET /api/users/me
///
/// **Requires** `Authorization: Bearer <access_token>`.
///
/// # Errors
/// - 401: Missing or invalid token (handled by middleware)
/// - 404: Account was removed after the token was issued
pub async fn get_current_user(
    subject: web::ReqData<AuthenticatedSubject>,
    users: web::Data<dyn UserStore>,
) -> Result<HttpResponse, AppError> {
    let user = users
        .find_by_id(subject.id())
        .await?
        .ok_or_else(|| DatabaseError::NotFound("User not found".to_string()))?;

    Ok(HttpResponse::Ok().json(user))
}
