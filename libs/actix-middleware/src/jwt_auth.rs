//! JWT authentication and role guarding
//!
//! `JwtAuth` verifies the bearer token against the service's configured
//! public key and stores the claims in request extensions. `RoleGuard`
//! matches the role claim against a per-scope allowed set, so routes declare
//! their required roles where they are registered.
//!
//! Zero-Trust: every service verifies tokens locally; nothing calls the
//! identity service per request.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage,
};
use auth_core::{Claims, Role, TokenVerifier};
use error_types::AppError;
use futures::future::LocalBoxFuture;
use std::future::{ready, Ready};
use std::sync::Arc;

/// Verified claims of the calling user, extractable in handlers.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub Claims);

impl actix_web::FromRequest for AuthenticatedUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(
        req: &actix_web::HttpRequest,
        _payload: &mut actix_web::dev::Payload,
    ) -> Self::Future {
        match req.extensions().get::<AuthenticatedUser>() {
            Some(user) => ready(Ok(user.clone())),
            None => ready(Err(
                AppError::Unauthorized("user not authenticated".to_string()).into()
            )),
        }
    }
}

/// Token verification middleware.
#[derive(Clone)]
pub struct JwtAuth {
    verifier: Arc<TokenVerifier>,
}

impl JwtAuth {
    pub fn new(verifier: Arc<TokenVerifier>) -> Self {
        Self { verifier }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = JwtAuthService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtAuthService {
            service,
            verifier: self.verifier.clone(),
        }))
    }
}

pub struct JwtAuthService<S> {
    service: S,
    verifier: Arc<TokenVerifier>,
}

impl<S, B> Service<ServiceRequest> for JwtAuthService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let verified = req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .ok_or_else(|| AppError::Unauthorized("missing bearer token".to_string()))
            .and_then(|token| {
                self.verifier.verify(token).map_err(|e| {
                    tracing::warn!(error = %e, "token verification failed");
                    AppError::Unauthorized("could not validate credentials".to_string())
                })
            });

        match verified {
            Ok(claims) => {
                req.extensions_mut().insert(AuthenticatedUser(claims));
                let fut = self.service.call(req);
                Box::pin(async move { fut.await })
            }
            Err(err) => Box::pin(async move { Err(err.into()) }),
        }
    }
}

/// Role guard middleware; must be registered inside a `JwtAuth` scope.
#[derive(Clone)]
pub struct RoleGuard {
    allowed: &'static [Role],
}

impl RoleGuard {
    pub fn new(allowed: &'static [Role]) -> Self {
        Self { allowed }
    }

    /// Mutating routes: administrators only.
    pub fn admin() -> Self {
        Self::new(&[Role::Admin])
    }

    /// Read routes: any authenticated user.
    pub fn any_user() -> Self {
        Self::new(&[Role::Admin, Role::User])
    }
}

impl<S, B> Transform<S, ServiceRequest> for RoleGuard
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RoleGuardService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RoleGuardService {
            service,
            allowed: self.allowed,
        }))
    }
}

pub struct RoleGuardService<S> {
    service: S,
    allowed: &'static [Role],
}

impl<S, B> Service<ServiceRequest> for RoleGuardService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let role = req
            .extensions()
            .get::<AuthenticatedUser>()
            .map(|user| user.0.role);

        match role {
            Some(role) if self.allowed.contains(&role) => {
                let fut = self.service.call(req);
                Box::pin(async move { fut.await })
            }
            Some(role) => {
                tracing::warn!(role = role.as_str(), "role not allowed for route");
                Box::pin(async move {
                    Err(AppError::Forbidden("not enough permissions".to_string()).into())
                })
            }
            None => Box::pin(async move {
                Err(AppError::Unauthorized("user not authenticated".to_string()).into())
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, web, App, HttpResponse};
    use auth_core::TokenIssuer;
    use uuid::Uuid;

    const TEST_PRIVATE_KEY: &str = include_str!("../../auth-core/test_keys/private.pem");
    const TEST_PUBLIC_KEY: &str = include_str!("../../auth-core/test_keys/public.pem");

    async fn whoami(user: AuthenticatedUser) -> HttpResponse {
        HttpResponse::Ok().body(user.0.username)
    }

    fn issue(role: Role) -> String {
        let issuer = TokenIssuer::from_rsa_pem(TEST_PRIVATE_KEY).unwrap();
        issuer.issue(Uuid::new_v4(), "alice", role).unwrap()
    }

    fn verifier() -> Arc<TokenVerifier> {
        Arc::new(TokenVerifier::from_rsa_pem(TEST_PUBLIC_KEY).unwrap())
    }

    #[actix_web::test]
    async fn valid_token_passes() {
        let app = test::init_service(
            App::new().service(
                web::scope("")
                    .wrap(RoleGuard::any_user())
                    .wrap(JwtAuth::new(verifier()))
                    .route("/me", web::get().to(whoami)),
            ),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/me")
            .insert_header(("Authorization", format!("Bearer {}", issue(Role::User))))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert!(res.status().is_success());
    }

    #[actix_web::test]
    async fn missing_token_is_401() {
        let app = test::init_service(
            App::new().service(
                web::scope("")
                    .wrap(JwtAuth::new(verifier()))
                    .route("/me", web::get().to(whoami)),
            ),
        )
        .await;

        let req = test::TestRequest::get().uri("/me").to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status().as_u16(), 401);
    }

    #[actix_web::test]
    async fn wrong_role_is_403() {
        let app = test::init_service(
            App::new().service(
                web::scope("")
                    .wrap(RoleGuard::admin())
                    .wrap(JwtAuth::new(verifier()))
                    .route("/me", web::get().to(whoami)),
            ),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/me")
            .insert_header(("Authorization", format!("Bearer {}", issue(Role::User))))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status().as_u16(), 403);
    }
}
