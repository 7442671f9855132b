//! Serves a few request streams over the in-memory transport and prints what
//! the client observes: a normal response with a trailer, an explicit reset
//! and a handler that gives up after headers went out.

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use http::{HeaderName, HeaderValue, Request, StatusCode};
use http_body_util::BodyExt;
use micro_h3::body::ReqBody;
use micro_h3::config::ServerConfig;
use micro_h3::connection::H3Connection;
use micro_h3::handler::make_handler;
use micro_h3::protocol::ErrorCode;
use micro_h3::stream::ResponseStream;
use micro_h3::transport::memory;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

async fn route(request: Request<ReqBody>, mut stream: ResponseStream) -> Result<(), Box<dyn Error + Send + Sync>> {
    let path = request.uri().path().to_string();
    info!("request path {}", path);

    match path.as_str() {
        "/hello" => {
            let body = request.into_body().collect().await?.to_bytes();
            info!(body = %String::from_utf8_lossy(&body), "receiving request body");

            stream.set_status(StatusCode::OK)?;
            stream.send_data("Hello World!\r\n").await?;
            stream.append_trailer(HeaderName::from_static("custom"), HeaderValue::from_static("value"));
            Ok(())
        }
        "/reject" => {
            stream.reset(ErrorCode::H3_REQUEST_REJECTED).await;
            Ok(())
        }
        "/slow" => {
            stream.send_headers().await?;
            let token = stream.cancellation_token();
            tokio::select! {
                () = token.cancelled() => Ok(()),
                () = tokio::time::sleep(Duration::from_millis(50)) => Err("upstream timed out".into()),
            }
        }
        _ => {
            stream.set_status(StatusCode::NOT_FOUND)?;
            stream.send_data("404 not found").await?;
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let config = ServerConfig::builder().max_concurrent_streams(8).build().expect("valid server config");
    let (server, mut client) = memory::connection();

    let handler = Arc::new(make_handler(route));
    let server = tokio::spawn(async move {
        match H3Connection::with_config(server, config).process(handler).await {
            Ok(()) => info!("finished process, connection shutdown"),
            Err(e) => error!("service has error, cause {}, connection shutdown", e),
        }
    });

    for path in ["/hello", "/reject", "/slow", "/missing"] {
        let request = Request::builder().uri(format!("https://localhost{path}")).body(()).expect("valid request");
        let mut stream = match client.open_stream(request).await {
            Ok(stream) => stream,
            Err(e) => {
                error!(cause = %e, "failed to open stream");
                continue;
            }
        };
        if let Err(e) = stream.send_data("ping").await.and(stream.finish().await) {
            // the server may stop reading before the body is complete
            info!(path, cause = %e, "request body not fully delivered");
        }

        let head = match stream.response().await {
            Ok(head) => head,
            Err(e) => {
                info!(path, cause = %e, "stream aborted before headers");
                continue;
            }
        };
        match stream.body().await {
            Ok(body) => info!(
                path,
                status = %head.status(),
                body = %String::from_utf8_lossy(&body),
                trailers = ?stream.trailers(),
                "response complete"
            ),
            Err(e) => info!(path, status = %head.status(), cause = %e, "stream aborted during body"),
        }
    }

    drop(client);
    let _ = server.await;
}
