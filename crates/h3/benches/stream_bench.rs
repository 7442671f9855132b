use std::error::Error;
use std::hint::black_box;
use std::sync::Arc;

use bytes::Bytes;
use criterion::{Criterion, criterion_group, criterion_main};
use http::{HeaderName, HeaderValue, Request};
use micro_h3::alt_svc::{AltSvc, AltSvcAdvertiser};
use micro_h3::body::ReqBody;
use micro_h3::connection::H3Connection;
use micro_h3::handler::make_handler;
use micro_h3::protocol::ErrorCode;
use micro_h3::stream::ResponseStream;
use micro_h3::transport::memory;
use tokio::runtime::Runtime;

static BODY: &[u8] = b"Hello World!";

async fn hello(_req: Request<ReqBody>, mut stream: ResponseStream) -> Result<(), Box<dyn Error + Send + Sync>> {
    stream.send_data(Bytes::from_static(BODY)).await?;
    stream.append_trailer(HeaderName::from_static("custom"), HeaderValue::from_static("value"));
    Ok(())
}

async fn reset(_req: Request<ReqBody>, stream: ResponseStream) -> Result<(), Box<dyn Error + Send + Sync>> {
    stream.reset(ErrorCode::H3_REQUEST_CANCELLED).await;
    Ok(())
}

fn bench_round_trip(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();
    let handler = Arc::new(make_handler(hello));

    c.bench_function("stream_round_trip", |b| {
        b.to_async(&runtime).iter(|| {
            let handler = Arc::clone(&handler);
            async move {
                let (server, mut client) = memory::connection();
                let server = tokio::spawn(H3Connection::new(server).process(handler));

                let mut stream = client.send_request(Request::new(())).await.unwrap();
                stream.response().await.unwrap();
                black_box(stream.body().await.unwrap());

                drop(client);
                server.await.unwrap().unwrap();
            }
        });
    });
}

fn bench_many_streams(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();
    let handler = Arc::new(make_handler(hello));

    c.bench_function("stream_round_trip_x64", |b| {
        b.to_async(&runtime).iter(|| {
            let handler = Arc::clone(&handler);
            async move {
                let (server, mut client) = memory::connection_with_capacity(128);
                let server = tokio::spawn(H3Connection::new(server).process(handler));

                let mut streams = Vec::with_capacity(64);
                for _ in 0..64 {
                    streams.push(client.send_request(Request::new(())).await.unwrap());
                }
                for stream in &mut streams {
                    stream.response().await.unwrap();
                    black_box(stream.body().await.unwrap());
                }

                drop(client);
                server.await.unwrap().unwrap();
            }
        });
    });
}

fn bench_reset(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();
    let handler = Arc::new(make_handler(reset));

    c.bench_function("stream_reset", |b| {
        b.to_async(&runtime).iter(|| {
            let handler = Arc::clone(&handler);
            async move {
                let (server, mut client) = memory::connection();
                let server = tokio::spawn(H3Connection::new(server).process(handler));

                let mut stream = client.send_request(Request::new(())).await.unwrap();
                black_box(stream.response().await.unwrap_err());

                drop(client);
                server.await.unwrap().unwrap();
            }
        });
    });
}

fn bench_alt_svc(c: &mut Criterion) {
    let advertiser = AltSvcAdvertiser::new(&AltSvc::h3(443).with_max_age(86400)).unwrap();

    c.bench_function("alt_svc_advertise", |b| {
        b.iter(|| {
            let mut response = http::Response::new(());
            black_box(advertiser.advertise(http::Version::HTTP_11, &mut response));
            response
        });
    });

    c.bench_function("alt_svc_parse", |b| {
        b.iter(|| black_box("h3=\":443\"; ma=86400").parse::<AltSvc>().unwrap());
    });
}

criterion_group!(benches, bench_round_trip, bench_many_streams, bench_reset, bench_alt_svc);
criterion_main!(benches);
