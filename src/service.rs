//! Request validation and pipeline orchestration.

use std::time::Instant;

use log::info;
use serde::Deserialize;

use crate::async_api::AsyncRenderer;
use crate::error::{ServiceError, ValidationError};
use crate::sanitize::{bare_handle, CardFields, CardInput, ImageRef};
use crate::{CardDocument, RenderEngine, RenderTarget, RenderedImage};

/// Wire names of the fields every request must carry.
pub const REQUIRED_FIELDS: [&str; 3] = ["name", "handle", "tweet"];

/// A card render request as it arrives over the wire
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderRequest {
    pub name: Option<String>,
    pub handle: Option<String>,
    #[serde(rename = "tweet")]
    pub tweet_text: Option<String>,
    pub profile_image: Option<String>,
    pub background: Option<String>,
}

impl RenderRequest {
    pub fn new(name: impl Into<String>, handle: impl Into<String>, tweet: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            handle: Some(handle.into()),
            tweet_text: Some(tweet.into()),
            ..Default::default()
        }
    }

    pub fn with_profile_image(mut self, uri: impl Into<String>) -> Self {
        self.profile_image = Some(uri.into());
        self
    }

    pub fn with_background(mut self, uri: impl Into<String>) -> Self {
        self.background = Some(uri.into());
        self
    }

    /// Check required fields and image references.
    pub fn validate(&self) -> Result<CardInput, ValidationError> {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        // A handle of only `@` is empty once the `@` is stripped
        let handle = self.handle.as_deref().map(bare_handle).map(str::to_string);

        let missing: Vec<&'static str> = REQUIRED_FIELDS
            .into_iter()
            .zip([&self.name, &handle, &self.tweet_text])
            .filter(|&(_, value)| !present(value))
            .map(|(field, _)| field)
            .collect();
        if !missing.is_empty() {
            return Err(ValidationError::MissingFields { missing });
        }

        Ok(CardInput {
            name: self.name.clone().unwrap_or_default(),
            handle: self.handle.clone().unwrap_or_default(),
            tweet: self.tweet_text.clone().unwrap_or_default(),
            profile_image: ImageRef::parse_optional("profileImage", self.profile_image.as_deref())?,
            background: ImageRef::parse_optional("background", self.background.as_deref())?,
        })
    }
}

/// Validates requests and drives them through sanitize, build and render.
///
/// The service holds no per-request state; each call gets its own browser
/// from the engine.
pub struct RenderService<E: RenderEngine> {
    renderer: AsyncRenderer<E>,
    target: RenderTarget,
}

impl<E: RenderEngine> RenderService<E> {
    pub fn new(engine: E, target: RenderTarget) -> Self {
        Self {
            renderer: AsyncRenderer::new(engine),
            target,
        }
    }

    pub fn engine(&self) -> &E {
        self.renderer.engine()
    }

    /// Validate, sanitize and compose, without touching a browser.
    pub fn prepare(&self, request: &RenderRequest) -> Result<CardDocument, ValidationError> {
        let input = request.validate()?;
        let fields = CardFields::sanitize(&input);
        Ok(CardDocument::build(&fields, &self.target))
    }

    /// Render one card.
    pub async fn handle(&self, request: RenderRequest) -> Result<RenderedImage, ServiceError> {
        let document = self.prepare(&request)?;

        let handle = bare_handle(request.handle.as_deref().unwrap_or_default());
        info!("Generating quote for @{}", handle);
        let started = Instant::now();

        let image = self.renderer.render(document, self.target).await?;

        info!(
            "Quote generated successfully ({} bytes in {:?})",
            image.len(),
            started.elapsed()
        );
        Ok(image)
    }
}
