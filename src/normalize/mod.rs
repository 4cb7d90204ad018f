//! Image normalization.
//!
//! Every image-bearing family runs the same routine after a record write:
//!
//! ```text
//! upload ──▶ decode ──▶ fit 720×1080 ──▶ WebP q90 ──▶ put new_ref ──▶ delete orphans
//! ```
//!
//! - [`policy`]: family sentinels, reference derivation, settings
//! - [`codec`]: decode/resize/encode with `image` and `webp`
//! - [`pipeline`]: guards, side effects, and the [`NormalizeOutcome`] result

pub mod codec;
pub mod pipeline;
pub mod policy;

pub use codec::{fit_within, is_webp, EncodedImage, WebpTranscoder, DEFAULT_WEBP_QUALITY};
pub use pipeline::{ImageNormalizer, NormalizeOutcome, NormalizedImage, SkipReason};
pub use policy::{
    is_webp_ref, replace_extension_with_webp, ImageFamily, NormalizePolicy,
    NormalizeSettings, DEFAULT_MAX_HEIGHT, DEFAULT_MAX_WIDTH,
};
