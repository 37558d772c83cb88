//! Actix middleware shared by the catalog services.

pub mod correlation_id;
pub mod jwt_auth;

pub use correlation_id::{get_correlation_id, CorrelationId, CorrelationIdMiddleware};
pub use jwt_auth::{AuthenticatedUser, JwtAuth, RoleGuard};
