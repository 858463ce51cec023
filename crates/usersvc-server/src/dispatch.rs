//! Request dispatch seam between the lifecycle and application code.
//!
//! The lifecycle collects each request body and hands the request to a
//! [`Dispatcher`]. Any `Fn(Request<Bytes>) -> impl Future<Output = HttpResponse>`
//! is a dispatcher, and so is [`Router`](crate::Router).

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use http::Request;
use usersvc_core::HttpResponse;

/// Boxed future produced by a dispatcher.
pub type DispatchFuture = Pin<Box<dyn Future<Output = HttpResponse> + Send>>;

/// Turns a fully-read request into a response.
pub trait Dispatcher: Send + Sync + 'static {
    /// Handles one request.
    fn dispatch(&self, request: Request<Bytes>) -> DispatchFuture;
}

impl<F, Fut> Dispatcher for F
where
    F: Fn(Request<Bytes>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HttpResponse> + Send + 'static,
{
    fn dispatch(&self, request: Request<Bytes>) -> DispatchFuture {
        Box::pin(self(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;
    use usersvc_core::respond;

    #[tokio::test]
    async fn test_closure_dispatcher() {
        let dispatcher = |req: Request<Bytes>| async move {
            respond(&req.uri().path().to_string(), StatusCode::OK)
        };

        let request = Request::get("/ping").body(Bytes::new()).unwrap();
        let response = dispatcher.dispatch(request).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
