//! Protected route middleware for role-based access control.
//!
//! Resolves the caller of a request (system token or session identity),
//! enforces the minimum role and makes the [`Caller`] available to handlers.

use std::future::{Future, Ready};
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use actix_identity::IdentityExt;
use actix_web::dev::{Service, Transform};
use actix_web::HttpMessage;
use actix_web::{dev::ServiceRequest, dev::ServiceResponse};

use crate::auth::Caller;
use crate::db::user::Role;
use crate::error::Error;

/// Configuration for protected route access.
#[derive(Clone)]
pub struct Protected {
    min_role: Role,
    allow_system: bool,
}

impl Protected {
    /// Shorthand to create admin-only route protection.
    pub fn admin_only() -> Self {
        Self {
            min_role: Role::Admin,
            allow_system: false,
        }
    }

    /// Shorthand to create protection requiring only a logged-in user.
    pub fn authenticated() -> Self {
        Self {
            min_role: Role::User,
            allow_system: false,
        }
    }

    /// Also admit callers holding the static system token.
    pub fn allow_system(mut self) -> Self {
        self.allow_system = true;
        self
    }
}

impl Default for Protected {
    fn default() -> Self {
        Self::authenticated()
    }
}

impl<S: 'static, B> Transform<S, ServiceRequest> for Protected
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = actix_web::Error;
    type InitError = ();
    type Transform = ProtectedRouteMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> <Self as Transform<S, ServiceRequest>>::Future {
        std::future::ready(Ok(ProtectedRouteMiddleware {
            service: Rc::new(service),
            config: self.clone(),
        }))
    }
}

/// Middleware that enforces route protection rules.
pub struct ProtectedRouteMiddleware<S> {
    service: Rc<S>,
    config: Protected,
}

impl<S, B> Service<ServiceRequest> for ProtectedRouteMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = actix_web::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(
        &self,
        cx: &mut Context,
    ) -> Poll<Result<(), <Self as Service<ServiceRequest>>::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> <Self as Service<ServiceRequest>>::Future {
        let svc = Rc::clone(&self.service);
        let config = self.config.clone();

        Box::pin(async move {
            if req.extensions().get::<Caller>() == Some(&Caller::System) {
                if !config.allow_system {
                    return Err(Error::Forbidden.into());
                }
                return svc.call(req).await;
            }

            let api = req
                .app_data::<actix_web::web::Data<crate::service::Service>>()
                .ok_or_else(Error::opaque)?
                .clone();

            let email = req
                .get_identity()
                .map_err(|_| Error::Unauthorized)?
                .id()
                .map_err(|_| Error::Unauthorized)?;

            let role = api.check_user_role(&email, config.min_role).await?;

            req.extensions_mut().insert(Caller::User { email, role });

            svc.call(req).await
        })
    }
}
