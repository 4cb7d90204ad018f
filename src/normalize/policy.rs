//! Normalization policy: per-family sentinels plus the bounding box and
//! quality shared by every family.

use super::codec::{is_valid_quality, DEFAULT_WEBP_QUALITY};

/// Extension of every normalized derivative.
pub const WEBP_EXTENSION: &str = "webp";

/// Default bounding-box width in pixels.
pub const DEFAULT_MAX_WIDTH: u32 = 720;

/// Default bounding-box height in pixels.
pub const DEFAULT_MAX_HEIGHT: u32 = 1080;

// =============================================================================
// Image Family
// =============================================================================

/// Static description of an image-bearing entity family.
///
/// Each family stores uploads under its own directory and has a placeholder
/// image ("sentinel") that records point at until a real image is uploaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageFamily {
    /// Short family name used in logs (e.g. `alumni`)
    pub name: &'static str,

    /// Directory (relative key prefix) for raw uploads
    pub upload_dir: &'static str,

    /// Placeholder image key, e.g. `default.webp` or `default.jpg`
    pub default_sentinel: &'static str,
}

impl ImageFamily {
    /// Create a family description.
    pub const fn new(
        name: &'static str,
        upload_dir: &'static str,
        default_sentinel: &'static str,
    ) -> Self {
        Self {
            name,
            upload_dir,
            default_sentinel,
        }
    }
}

// =============================================================================
// Settings
// =============================================================================

/// Bounding box and encoder quality applied to every family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeSettings {
    /// Maximum output width in pixels
    pub max_width: u32,

    /// Maximum output height in pixels
    pub max_height: u32,

    /// WebP quality (1-100)
    pub quality: u8,
}

impl Default for NormalizeSettings {
    fn default() -> Self {
        Self {
            max_width: DEFAULT_MAX_WIDTH,
            max_height: DEFAULT_MAX_HEIGHT,
            quality: DEFAULT_WEBP_QUALITY,
        }
    }
}

impl NormalizeSettings {
    /// Create settings, validating the bounding box and quality.
    pub fn new(max_width: u32, max_height: u32, quality: u8) -> Result<Self, String> {
        if max_width == 0 || max_height == 0 {
            return Err("bounding box dimensions must be greater than 0".to_string());
        }
        if !is_valid_quality(quality) {
            return Err("webp quality must be between 1 and 100".to_string());
        }
        Ok(Self {
            max_width,
            max_height,
            quality,
        })
    }
}

// =============================================================================
// Policy
// =============================================================================

/// Everything the pipeline needs to know about one family's write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizePolicy {
    default_sentinel: String,
    webp_sentinel: String,
    settings: NormalizeSettings,
}

impl NormalizePolicy {
    /// Build a policy from a raw sentinel key.
    pub fn new(default_sentinel: impl Into<String>, settings: NormalizeSettings) -> Self {
        let default_sentinel = default_sentinel.into();
        let webp_sentinel = replace_extension_with_webp(&default_sentinel);
        Self {
            default_sentinel,
            webp_sentinel,
            settings,
        }
    }

    /// Build the policy for an entity family.
    pub fn for_family(family: &ImageFamily, settings: NormalizeSettings) -> Self {
        Self::new(family.default_sentinel, settings)
    }

    /// The family's placeholder key as configured (`default.jpg` / `default.webp`).
    pub fn default_sentinel(&self) -> &str {
        &self.default_sentinel
    }

    /// The canonical WebP placeholder key the sentinel normalizes to.
    pub fn webp_sentinel(&self) -> &str {
        &self.webp_sentinel
    }

    /// Bounding box and quality.
    pub fn settings(&self) -> NormalizeSettings {
        self.settings
    }

    /// Returns true if `key` is one of this family's placeholder images.
    ///
    /// Protected keys are never garbage-collected, even when a record
    /// stops referencing them.
    pub fn is_protected(&self, key: &str) -> bool {
        key == self.default_sentinel || key == self.webp_sentinel
    }

    /// Derive the key of the normalized derivative for `current`.
    ///
    /// The non-WebP sentinel maps to the WebP sentinel; every other key keeps
    /// its directory and stem and gets a `.webp` extension.
    pub fn derive_webp_ref(&self, current: &str) -> String {
        if current == self.default_sentinel && current != self.webp_sentinel {
            return self.webp_sentinel.clone();
        }
        replace_extension_with_webp(current)
    }
}

/// Returns true if `key` already names a WebP file.
pub fn is_webp_ref(key: &str) -> bool {
    key.ends_with(".webp")
}

/// Replace the extension of the last path component with `.webp`.
///
/// Keys without an extension get one appended. A leading dot in the file
/// name is not treated as an extension separator.
pub fn replace_extension_with_webp(key: &str) -> String {
    let (dir, file) = match key.rfind('/') {
        Some(idx) => (&key[..=idx], &key[idx + 1..]),
        None => ("", key),
    };

    let stem = match file.rfind('.') {
        Some(idx) if idx > 0 => &file[..idx],
        _ => file,
    };

    format!("{}{}.{}", dir, stem, WEBP_EXTENSION)
}
