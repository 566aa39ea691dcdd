use std::sync::Arc;
use std::thread;

use tokio::sync::oneshot;

use crate::{CardDocument, Error, RenderEngine, RenderTarget, RenderedImage, Result};

/// An async facade over a blocking [`RenderEngine`].
///
/// Every render runs on its own worker thread, which owns the job until the
/// engine returns and then reports back over a oneshot channel. If the caller
/// goes away the worker still runs to completion (so the browser is still torn
/// down) and its result is dropped.
pub struct AsyncRenderer<E: RenderEngine> {
    engine: Arc<E>,
}

impl<E: RenderEngine> Clone for AsyncRenderer<E> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
        }
    }
}

impl<E: RenderEngine> AsyncRenderer<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }

    /// Borrow the wrapped engine
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Render `document` on a dedicated worker thread.
    pub async fn render(&self, document: CardDocument, target: RenderTarget) -> Result<RenderedImage> {
        let (tx, rx) = oneshot::channel();
        let engine = self.engine.clone();

        thread::Builder::new()
            .name("quotecard-render".into())
            .spawn(move || {
                let res = engine.render(&document, &target);
                // No-op when the receiver was dropped
                let _ = tx.send(res);
            })
            .map_err(|e| Error::Worker(format!("Failed to spawn render worker: {}", e)))?;

        rx.await
            .map_err(|e| Error::Worker(format!("Render canceled: {}", e)))?
    }
}
