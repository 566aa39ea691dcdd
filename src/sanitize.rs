//! Escaping and validation of untrusted card input.
//!
//! Everything the document builder embeds passes through here first. Text
//! fields are HTML-escaped; image references are checked against an allow
//! list of schemes and later embedded as CSS strings inside attributes.

use url::Url;

use crate::error::ValidationError;

/// Escape text for a text node or a double-quoted attribute value.
///
/// `&` goes first so the entities produced by the later steps are never
/// escaped a second time.
pub fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Escape multi-line text, turning each line break into a `<br>` element.
///
/// `\r\n`, a lone `\r` and `\n` each count as one break.
pub fn escape_multiline(raw: &str) -> String {
    escape_html(raw)
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\n', "<br>")
}

/// Quote a value as a CSS string literal.
///
/// The result still has to be attribute-escaped before it lands in markup.
pub fn css_string(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 2);
    out.push('"');
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\a "),
            '\r' => out.push_str("\\d "),
            '\u{c}' => out.push_str("\\c "),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// A validated image source: an http(s) URL or a `data:image/*` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef(String);

impl ImageRef {
    /// Validate `raw` as the image source for `field`.
    pub fn parse(field: &'static str, raw: &str) -> Result<Self, ValidationError> {
        let invalid = |reason: String| ValidationError::InvalidImageRef { field, reason };
        let raw = raw.trim();

        // Data URIs are checked on the raw text; `Url` would accept any media type.
        if raw.get(..5).is_some_and(|scheme| scheme.eq_ignore_ascii_case("data:")) {
            let media_type = raw[5..]
                .split([';', ','])
                .next()
                .unwrap_or_default()
                .to_ascii_lowercase();
            let subtype = media_type.strip_prefix("image/").unwrap_or_default();
            if subtype.is_empty() || !raw.contains(',') {
                return Err(invalid(format!(
                    "data URI must carry an image media type, got {:?}",
                    media_type
                )));
            }
            return Ok(Self(raw.to_string()));
        }

        let url = Url::parse(raw).map_err(|e| invalid(format!("not a valid URL ({})", e)))?;
        match url.scheme() {
            "http" | "https" if url.host_str().is_some_and(|h| !h.is_empty()) => {
                Ok(Self(url.into()))
            }
            "http" | "https" => Err(invalid("URL has no host".into())),
            other => Err(invalid(format!("unsupported scheme {:?}", other))),
        }
    }

    /// Parse an optional field, treating blank values as absent.
    pub fn parse_optional(
        field: &'static str,
        raw: Option<&str>,
    ) -> Result<Option<Self>, ValidationError> {
        match raw.map(str::trim).filter(|s| !s.is_empty()) {
            Some(s) => Self::parse(field, s).map(Some),
            None => Ok(None),
        }
    }

    /// Markup-safe value for an `src` attribute.
    pub fn to_attr(&self) -> String {
        escape_html(&self.0)
    }

    /// Markup-safe `url(...)` for an inline `style` attribute.
    pub fn to_css_url_attr(&self) -> String {
        escape_html(&format!("url({})", css_string(&self.0)))
    }
}

/// A handle without surrounding whitespace or its leading `@`.
pub fn bare_handle(raw: &str) -> &str {
    let handle = raw.trim();
    handle.strip_prefix('@').unwrap_or(handle).trim_start()
}

/// Validated, unescaped card input.
#[derive(Debug, Clone, PartialEq)]
pub struct CardInput {
    pub name: String,
    pub handle: String,
    pub tweet: String,
    pub profile_image: Option<ImageRef>,
    pub background: Option<ImageRef>,
}

/// The escaped field set the document builder consumes.
///
/// Only [`CardFields::sanitize`] constructs one, so the builder never sees raw
/// user text.
#[derive(Debug, Clone, PartialEq)]
pub struct CardFields {
    name: String,
    handle: String,
    body: String,
    profile_image: Option<ImageRef>,
    background: Option<ImageRef>,
}

impl CardFields {
    pub fn sanitize(input: &CardInput) -> Self {
        Self {
            name: escape_html(input.name.trim()),
            handle: escape_html(bare_handle(&input.handle)),
            body: escape_multiline(&input.tweet),
            profile_image: input.profile_image.clone(),
            background: input.background.clone(),
        }
    }

    /// Escaped display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Escaped handle, without a leading `@`
    pub fn handle(&self) -> &str {
        &self.handle
    }

    /// Escaped message body with `<br>` line breaks
    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn profile_image(&self) -> Option<&ImageRef> {
        self.profile_image.as_ref()
    }

    pub fn background(&self) -> Option<&ImageRef> {
        self.background.as_ref()
    }
}
