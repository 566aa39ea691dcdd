//! Card document composition.
//!
//! [`CardDocument::build`] is a pure function of the sanitized fields and the
//! render target. The output is a single self-contained HTML page: inline
//! styles, no scripts, and no fetches other than the caller's image refs.

use std::fmt::Write as _;

use base64::Engine as _;

use crate::sanitize::CardFields;
use crate::RenderTarget;

/// Maximum width of the card body in CSS pixels.
pub const CONTENT_MAX_WIDTH: u32 = 512;
/// Padding around the card body in CSS pixels.
pub const CONTENT_PADDING: u32 = 48;
/// Avatar edge length in CSS pixels.
pub const AVATAR_SIZE: u32 = 48;

const CARD_COLOR: &str = "#151f2b";
const AVATAR_COLOR: &str = "#1f2937";
const MUTED_TEXT_COLOR: &str = "#6b7280";

const PLACEHOLDER_SVG: &str = "<svg xmlns='http://www.w3.org/2000/svg' width='48' height='48'>\
<rect width='48' height='48' fill='#1f2937'/></svg>";

/// Inline avatar used when the request carries no profile image.
pub fn placeholder_avatar() -> String {
    format!(
        "data:image/svg+xml;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(PLACEHOLDER_SVG)
    )
}

/// A fully resolved card page, ready to hand to the render engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardDocument {
    html: String,
}

impl CardDocument {
    /// Compose the card page for `fields` on the `target` canvas.
    pub fn build(fields: &CardFields, target: &RenderTarget) -> Self {
        let avatar_src = match fields.profile_image() {
            Some(img) => img.to_attr(),
            None => placeholder_avatar(),
        };
        let container_style = match fields.background() {
            Some(img) => format!(" style=\"background-image: {};\"", img.to_css_url_attr()),
            None => String::new(),
        };

        let mut html = String::with_capacity(4096 + fields.body().len() + avatar_src.len());
        html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"UTF-8\" />\n<style>\n");
        html.push_str(&stylesheet(target));
        html.push_str("</style>\n</head>\n<body>\n");

        // write! into a String cannot fail
        let _ = write!(
            html,
            "<div class=\"tweet-container\"{container_style}>\n\
<div class=\"tweet-content-wrapper\">\n\
<div class=\"profile-section\">\n\
<div class=\"profile-img-wrapper\"><img src=\"{avatar_src}\" class=\"profile-img\" alt=\"Profile\" /></div>\n\
<div class=\"profile-info\">\n\
<div class=\"name\">{name}</div>\n\
<div class=\"handle\">@{handle}</div>\n\
</div>\n\
<div class=\"menu-dots\">&bull;&bull;&bull;</div>\n\
</div>\n\
<div class=\"tweet-text\">{body}</div>\n\
</div>\n\
</div>\n",
            name = fields.name(),
            handle = fields.handle(),
            body = fields.body(),
        );
        html.push_str("</body>\n</html>\n");

        Self { html }
    }

    pub fn as_str(&self) -> &str {
        &self.html
    }
}

fn stylesheet(target: &RenderTarget) -> String {
    format!(
        "* {{ margin: 0; padding: 0; box-sizing: border-box; }}
html, body {{ width: {w}px; height: {h}px; background-color: {bg}; overflow: hidden; }}
body {{ font-family: -apple-system, BlinkMacSystemFont, \"Segoe UI\", Roboto, Helvetica, Arial, sans-serif; }}
.tweet-container {{
  width: {w}px; height: {h}px;
  background-color: {bg};
  background-size: cover; background-position: center; background-repeat: no-repeat;
  display: flex; align-items: center; justify-content: center;
  position: relative; overflow: hidden;
}}
.tweet-content-wrapper {{
  width: 100%; max-width: {max_w}px;
  background: {card}; padding: {pad}px; border-radius: 8px;
}}
.profile-section {{ display: flex; align-items: flex-start; margin-bottom: 16px; }}
.profile-img-wrapper {{
  width: {avatar}px; height: {avatar}px; border-radius: 50%; overflow: hidden;
  margin-right: 12px; background: {avatar_bg}; border: 1px solid #374151; flex-shrink: 0;
}}
.profile-img {{ width: 100%; height: 100%; object-fit: cover; display: block; }}
.profile-info {{ flex-grow: 1; min-width: 0; }}
.name {{
  color: white; font-weight: bold; font-size: 20px; line-height: 1.2;
  overflow: hidden; text-overflow: ellipsis; white-space: nowrap;
}}
.handle {{
  color: {muted}; font-size: 20px; line-height: 1;
  overflow: hidden; text-overflow: ellipsis; white-space: nowrap;
}}
.menu-dots {{ color: {muted}; font-size: 14px; line-height: 1; flex-shrink: 0; margin-left: 8px; }}
.tweet-text {{
  color: white; font-size: 24px; line-height: 1.5;
  white-space: normal; overflow-wrap: break-word; word-wrap: break-word;
}}
",
        w = target.width,
        h = target.height,
        bg = target.background,
        max_w = CONTENT_MAX_WIDTH,
        pad = CONTENT_PADDING,
        card = CARD_COLOR,
        avatar = AVATAR_SIZE,
        avatar_bg = AVATAR_COLOR,
        muted = MUTED_TEXT_COLOR,
    )
}
