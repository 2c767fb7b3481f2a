use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::error::AppError;
use crate::model::role::Role;
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, web::Data};
use futures::future::{Ready, ready};

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub username: String,
    pub role: Role,

    /// Present only if this user is linked to an employee record
    pub employee_id: Option<u64>,
}

/// Reads and verifies the bearer token of a request.
pub fn authenticate(req: &HttpRequest) -> Result<AuthUser, AppError> {
    let token = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthorized("Missing token".to_string()))?;

    let config = req
        .app_data::<Data<Config>>()
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Config missing from app data")))?;

    let claims = verify_token(token, &config.jwt_secret)
        .map_err(|_| AppError::Unauthorized("Invalid or expired token".to_string()))?;

    let role = Role::from_id(claims.role)
        .ok_or_else(|| AppError::Unauthorized("Invalid role".to_string()))?;

    Ok(AuthUser {
        user_id: claims.user_id,
        username: claims.sub,
        role,
        employee_id: claims.employee_id,
    })
}

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // the middleware already verified the token for scoped routes
        if let Some(user) = req.extensions().get::<AuthUser>() {
            return ready(Ok(user.clone()));
        }
        ready(authenticate(req))
    }
}

impl AuthUser {
    pub fn require_hr_or_admin(&self) -> Result<(), AppError> {
        if self.is_staff() {
            Ok(())
        } else {
            Err(AppError::Forbidden("HR/Admin only".to_string()))
        }
    }

    pub fn is_staff(&self) -> bool {
        matches!(self.role, Role::Admin | Role::Hr)
    }

    /// The employee record behind this login, required for self-service routes.
    pub fn own_employee_id(&self) -> Result<u64, AppError> {
        self.employee_id
            .ok_or_else(|| AppError::Forbidden("No employee profile".to_string()))
    }

    /// Staff may look at anyone (or everyone); employees only at themselves.
    pub fn scope_employee(&self, requested: Option<u64>) -> Result<Option<u64>, AppError> {
        if self.is_staff() {
            return Ok(requested);
        }
        let own = self.own_employee_id()?;
        match requested {
            Some(id) if id != own => Err(AppError::Forbidden(
                "Employees can only access their own records".to_string(),
            )),
            _ => Ok(Some(own)),
        }
    }

    pub fn ensure_can_access(&self, employee_id: u64) -> Result<(), AppError> {
        self.scope_employee(Some(employee_id)).map(|_| ())
    }

    /// Target employee for a write: staff must name one, employees default to themselves.
    pub fn target_employee(&self, requested: Option<u64>) -> Result<u64, AppError> {
        match self.scope_employee(requested)? {
            Some(id) => Ok(id),
            None => Err(AppError::field("employee_id", "is required")),
        }
    }
}
