use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::LOCATION,
    web, Error, HttpResponse,
};
use actix_session::SessionExt;
use futures_util::future::{ok, LocalBoxFuture, Ready};
use crate::config::Config;
use crate::session_gate::SessionGate;

/// Re-checks the admin flag on every request to the wrapped scope and sends
/// anyone without it to the login entry point.
pub struct AdminSessionGate;

impl<S, B> Transform<S, ServiceRequest> for AdminSessionGate
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = AdminSessionGateMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AdminSessionGateMiddleware { service })
    }
}

pub struct AdminSessionGateMiddleware<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for AdminSessionGateMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if req.get_session().is_authenticated() {
            let fut = self.service.call(req);
            return Box::pin(async move {
                let res = fut.await?;
                Ok(res.map_into_left_body())
            });
        }

        let login_path = req
            .app_data::<web::Data<Config>>()
            .map(|config| config.login_path())
            .unwrap_or_else(|| "/".to_string());
        log::warn!("Redirecting unauthenticated request for {} to {}", req.path(), login_path);

        Box::pin(async move {
            let (http_req, _payload) = req.into_parts();
            let res = HttpResponse::Found()
                .append_header((LOCATION, login_path))
                .finish()
                .map_into_right_body();
            Ok(ServiceResponse::new(http_req, res))
        })
    }
}
