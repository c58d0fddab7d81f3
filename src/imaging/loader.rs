use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use image::DynamicImage;
use tokio::task::JoinHandle;
use url::Url;

use crate::error::Error;

/// Downloads and decodes remote images in the background.
#[derive(Debug, Clone, Default)]
pub struct ImageLoader {
    http: reqwest::Client,
}

impl ImageLoader {
    #[must_use]
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Starts loading `url` on a background task.
    ///
    /// Must be called from within a Tokio runtime. Decoding runs on the
    /// blocking pool.
    #[must_use]
    pub fn load(&self, url: Url) -> ImageLoad {
        let http = self.http.clone();
        let handle = tokio::spawn(async move {
            let bytes = http.get(url.clone()).send().await?.error_for_status()?.bytes().await?;
            tracing::debug!(url = %url, size = bytes.len(), "Image downloaded");
            tokio::task::spawn_blocking(move || image::load_from_memory(&bytes))
                .await
                .map_err(|_| Error::Cancelled)?
                .map_err(Error::from)
        });
        ImageLoad { handle }
    }
}

/// Handle to an in-progress image load.
///
/// Await it for the decoded bitmap. [`cancel`](Self::cancel) or dropping
/// the handle stops the load without affecting other loads.
#[derive(Debug)]
pub struct ImageLoad {
    handle: JoinHandle<Result<DynamicImage, Error>>,
}

impl ImageLoad {
    pub fn cancel(&self) {
        self.handle.abort();
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Future for ImageLoad {
    type Output = Result<DynamicImage, Error>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.handle).poll(cx).map(|joined| match joined {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(Error::Cancelled),
            Err(e) => {
                tracing::error!(error = %e, "Image load task panicked");
                Err(Error::Cancelled)
            }
        })
    }
}

impl Drop for ImageLoad {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
