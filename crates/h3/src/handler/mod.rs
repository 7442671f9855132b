use std::error::Error;

use async_trait::async_trait;

use http::Request;

use crate::body::ReqBody;
use crate::stream::ResponseStream;

/// Application code run once per request stream.
///
/// The response is written through the [`ResponseStream`]. Returning `Err`
/// (or panicking) after headers went out resets the stream with
/// `H3_INTERNAL_ERROR`; before that, the client gets a `500` instead. The
/// error itself is only logged, never sent to the peer.
#[async_trait]
pub trait Handler: Send + Sync {
    type Error: Into<Box<dyn Error + Send + Sync>> + Send;

    async fn call(&self, req: Request<ReqBody>, stream: ResponseStream) -> Result<(), Self::Error>;
}

#[derive(Debug)]
pub struct HandlerFn<F> {
    f: F,
}

#[async_trait]
impl<Err, F, Fut> Handler for HandlerFn<F>
where
    F: Fn(Request<ReqBody>, ResponseStream) -> Fut + Send + Sync,
    Err: Into<Box<dyn Error + Send + Sync>> + Send,
    Fut: Future<Output = Result<(), Err>> + Send,
{
    type Error = Err;

    async fn call(&self, req: Request<ReqBody>, stream: ResponseStream) -> Result<(), Self::Error> {
        (self.f)(req, stream).await
    }
}

pub fn make_handler<F, Err, Ret>(f: F) -> HandlerFn<F>
where
    Err: Into<Box<dyn Error + Send + Sync>> + Send,
    Ret: Future<Output = Result<(), Err>>,
    F: Fn(Request<ReqBody>, ResponseStream) -> Ret,
{
    HandlerFn { f }
}
