//! Static bearer token authentication for system callers.
//!
//! Requests carrying `Authorization: Bearer <secret>` are checked against
//! the configured cron secret and tagged as [`Caller::System`]. Requests
//! without the header pass through untouched so that session cookies can be
//! checked further in.

use std::future::{Future, Ready};
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use actix_web::dev::{Service, Transform};
use actix_web::http::header;
use actix_web::web::Data;
use actix_web::HttpMessage;
use actix_web::{dev::ServiceRequest, dev::ServiceResponse};

use crate::auth::crypto::secrets_match;
use crate::auth::header::{auth_header, AuthHeader};
use crate::auth::Caller;
use crate::error::Error;

pub struct BearerAuth;

impl<S: 'static, B> Transform<S, ServiceRequest> for BearerAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = actix_web::Error;
    type InitError = ();
    type Transform = BearerAuthMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> <Self as Transform<S, ServiceRequest>>::Future {
        std::future::ready(Ok(BearerAuthMiddleware {
            service: Rc::new(service),
        }))
    }
}

pub struct BearerAuthMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for BearerAuthMiddleware<S>
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

        Box::pin(async move {
            let Some(value) = req.headers().get(header::AUTHORIZATION) else {
                return svc.call(req).await;
            };

            let value = value.to_str().map_err(|_| Error::InvalidHeader {
                header: header::AUTHORIZATION.to_string(),
            })?;

            let AuthHeader::Bearer { token } = auth_header()
                .parse_str(value)
                .map_err(|_| Error::Unauthorized)?;

            let service = req
                .app_data::<Data<crate::service::Service>>()
                .ok_or_else(Error::opaque)?;

            let Some(expected) = service.config().cron_secret.as_ref() else {
                tracing::warn!("bearer token presented but OUTREACH_CRON_SECRET is not set");
                return Err(Error::Unauthorized.into());
            };

            if !secrets_match(token, expected) {
                tracing::warn!("rejected request with invalid bearer token");
                return Err(Error::Unauthorized.into());
            }

            tracing::debug!("authenticated system caller");
            req.extensions_mut().insert(Caller::System);

            svc.call(req).await
        })
    }
}
