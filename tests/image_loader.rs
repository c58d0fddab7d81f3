//! Background image loading and cancellation.
#![cfg(all(feature = "network", feature = "imaging"))]

use std::io::Cursor;
use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use axum::http::{StatusCode, header::CONTENT_TYPE};
use axum::response::IntoResponse;
use axum::routing::get;
use eatpic_client::Error;
use eatpic_client::imaging::ImageLoader;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use tokio::net::TcpListener;

fn png_bytes() -> Vec<u8> {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(12, 8, Rgb([250, 200, 10])));
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

async fn thumbnail() -> impl IntoResponse {
    ([(CONTENT_TYPE, "image/png")], png_bytes())
}

async fn slow_thumbnail() -> impl IntoResponse {
    tokio::time::sleep(Duration::from_secs(30)).await;
    ([(CONTENT_TYPE, "image/png")], png_bytes())
}

async fn spawn_cdn() -> SocketAddr {
    let app = Router::new()
        .route("/thumb.png", get(thumbnail))
        .route("/slow.png", get(slow_thumbnail))
        .route("/missing.png", get(|| async { StatusCode::NOT_FOUND }))
        .route("/garbage.png", get(|| async { "not an image" }));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn url(addr: SocketAddr, path: &str) -> url::Url {
    format!("http://{addr}{path}").parse().unwrap()
}

#[tokio::test]
async fn loads_and_decodes_image() {
    let addr = spawn_cdn().await;
    let image = ImageLoader::default()
        .load(url(addr, "/thumb.png"))
        .await
        .unwrap();
    assert_eq!((image.width(), image.height()), (12, 8));
}

#[tokio::test]
async fn cancelled_load_reports_cancelled() {
    let addr = spawn_cdn().await;
    let load = ImageLoader::default().load(url(addr, "/slow.png"));
    tokio::time::sleep(Duration::from_millis(50)).await;

    load.cancel();
    let result = tokio::time::timeout(Duration::from_secs(5), load).await.unwrap();

    assert!(matches!(result, Err(Error::Cancelled)));
}

#[tokio::test]
async fn cancelling_one_load_leaves_others_running() {
    let addr = spawn_cdn().await;
    let loader = ImageLoader::default();
    let slow = loader.load(url(addr, "/slow.png"));
    let fast = loader.load(url(addr, "/thumb.png"));

    slow.cancel();
    drop(slow);

    let image = fast.await.unwrap();
    assert_eq!(image.width(), 12);
}

#[tokio::test]
async fn http_error_is_reported() {
    let addr = spawn_cdn().await;
    let result = ImageLoader::default().load(url(addr, "/missing.png")).await;
    match result {
        Err(Error::Http(e)) => assert_eq!(e.status().map(|s| s.as_u16()), Some(404)),
        other => panic!("expected http error, got {other:?}"),
    }
}

#[tokio::test]
async fn undecodable_body_is_an_image_error() {
    let addr = spawn_cdn().await;
    let result = ImageLoader::default().load(url(addr, "/garbage.png")).await;
    assert!(matches!(result, Err(Error::Image(_))));
}
