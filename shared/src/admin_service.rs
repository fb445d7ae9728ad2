use crate::http::make_boxed_error_response;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Bytes, Incoming};
use hyper::service::Service;
use hyper::{Request, Response, StatusCode};
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;

/// Serves `/health` and `/ready` on the admin listener.
pub struct AdminService<F, E> {
    is_ready: F,
    _error: PhantomData<fn() -> E>,
}

impl<F, E> AdminService<F, E>
where
    F: Fn() -> bool,
    E: 'static,
{
    pub fn new(is_ready: F) -> Self {
        Self {
            is_ready,
            _error: PhantomData,
        }
    }

    pub fn respond<B: Body>(&self, req: &Request<B>) -> Response<BoxBody<Bytes, E>> {
        let ok_body = || Full::new(Bytes::from("ok\n")).map_err(|never| match never {}).boxed();

        match req.uri().path() {
            "/health" => Response::new(ok_body()),
            "/ready" => match (self.is_ready)() {
                true => Response::new(ok_body()),
                false => make_boxed_error_response(StatusCode::SERVICE_UNAVAILABLE),
            },
            _ => make_boxed_error_response(StatusCode::NOT_FOUND),
        }
    }
}

impl<F, E> Service<Request<Incoming>> for AdminService<F, E>
where
    F: Fn() -> bool + Send + Sync + 'static,
    E: Send + 'static,
{
    type Response = Response<BoxBody<Bytes, E>>;
    type Error = E;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let res = self.respond(&req);
        Box::pin(async move { Ok(res) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::Empty;
    use std::convert::Infallible;

    fn get(path: &str) -> Request<Empty<Bytes>> {
        Request::builder().uri(path).body(Empty::new()).unwrap()
    }

    #[test]
    fn test_admin_routes() {
        let ready = AdminService::<_, Infallible>::new(|| true);
        assert_eq!(ready.respond(&get("/health")).status(), StatusCode::OK);
        assert_eq!(ready.respond(&get("/ready")).status(), StatusCode::OK);
        assert_eq!(ready.respond(&get("/other")).status(), StatusCode::NOT_FOUND);

        let not_ready = AdminService::<_, Infallible>::new(|| false);
        assert_eq!(
            not_ready.respond(&get("/ready")).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
