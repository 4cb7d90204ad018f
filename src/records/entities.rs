//! Entity definitions for the club site.
//!
//! Stored field names match the public JSON representation. Image-bearing
//! entities keep a relative blob key in `image`; the API renders it as an
//! absolute URL.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::normalize::ImageFamily;

// =============================================================================
// Image Families
// =============================================================================

/// Alumni portraits.
pub const ALUMNI: ImageFamily = ImageFamily::new("alumni", "images/Alumni", "default.webp");

/// Core team portraits.
pub const CORE_TEAM: ImageFamily = ImageFamily::new("core_team", "images/CoreTeam", "default.webp");

/// Astrax event posters.
pub const ASTRAX: ImageFamily = ImageFamily::new("astrax", "images/Astrax", "default.jpg");

/// Pleiades event posters.
pub const PLEIADES: ImageFamily = ImageFamily::new("pleiades", "images/Pleiades", "default.jpg");

/// Zenith event posters.
pub const ZENITH: ImageFamily = ImageFamily::new("zenith", "images/Zenith", "default.jpg");

/// Utkarsh event posters.
pub const UTKARSH: ImageFamily = ImageFamily::new("utkarsh", "images/Utkarsh", "default.jpg");

/// Photo gallery.
pub const PHOTO_GALLERY: ImageFamily =
    ImageFamily::new("photo_gallery", "images/photogallery", "default.jpg");

/// Homepage project cards.
pub const PROJECTS: ImageFamily =
    ImageFamily::new("projects", "images/HomePage/projects", "default.jpg");

/// Homepage club activity cards.
pub const CLUB_ACTIVITY: ImageFamily =
    ImageFamily::new("club_activity", "images/HomePage/clubactivity", "default.jpg");

/// Homepage fest cards.
pub const FESTS: ImageFamily = ImageFamily::new("fests", "images/HomePage/fests", "default.jpg");

/// Every image family, for configuration lookups.
pub const ALL_FAMILIES: [&ImageFamily; 10] = [
    &ALUMNI,
    &CORE_TEAM,
    &ASTRAX,
    &PLEIADES,
    &ZENITH,
    &UTKARSH,
    &PHOTO_GALLERY,
    &PROJECTS,
    &CLUB_ACTIVITY,
    &FESTS,
];

/// Look up a family by name.
pub fn family_by_name(name: &str) -> Option<&'static ImageFamily> {
    ALL_FAMILIES.into_iter().find(|family| family.name == name)
}

// =============================================================================
// Record Traits
// =============================================================================

/// A row that can live in a [`Table`](super::Table).
pub trait Record: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// Name of the unique field, used in duplicate errors.
    const UNIQUE_FIELD: &'static str = "name";

    /// Value that must be unique within the table, if any.
    fn unique_name(&self) -> Option<&str> {
        None
    }
}

/// A record with a normalized image reference.
pub trait ImageRecord: Record {
    /// JSON key of the rendered image URL in API output.
    const IMAGE_FIELD: &'static str = "image";

    /// The family whose sentinel and upload directory apply to this record.
    fn family(&self) -> &'static ImageFamily;

    /// Current image reference (relative blob key).
    fn image_ref(&self) -> &str;

    /// Point the record at a different blob.
    fn set_image_ref(&mut self, image_ref: String);
}

fn default_webp() -> String {
    "default.webp".to_string()
}

fn default_jpg() -> String {
    "default.jpg".to_string()
}

// =============================================================================
// Alumni & Core Team
// =============================================================================

/// A former member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alumni {
    pub name: String,
    pub email: String,
    pub message: String,
    pub linkedin_url: String,
    pub instagram_url: String,
    #[serde(default = "default_webp")]
    pub image: String,
}

impl Record for Alumni {}

impl ImageRecord for Alumni {
    fn family(&self) -> &'static ImageFamily {
        &ALUMNI
    }

    fn image_ref(&self) -> &str {
        &self.image
    }

    fn set_image_ref(&mut self, image_ref: String) {
        self.image = image_ref;
    }
}

/// Role of a core team member.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Position {
    #[serde(rename = "A")]
    Coordinator,
    #[serde(rename = "B")]
    CoCoordinator,
    #[default]
    #[serde(rename = "C")]
    CoreTeam,
    #[serde(rename = "D")]
    Mentor,
}

impl Position {
    /// Human-readable label.
    pub fn display(&self) -> &'static str {
        match self {
            Position::Coordinator => "Coordinator",
            Position::CoCoordinator => "Co-coordinator",
            Position::CoreTeam => "Core Team",
            Position::Mentor => "Mentor",
        }
    }
}

/// A current core team member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub name: String,
    pub email: String,
    pub message: String,
    #[serde(default)]
    pub position: Position,
    pub linkedin_url: String,
    pub instagram_url: String,
    #[serde(default = "default_webp")]
    pub image: String,
}

impl Record for Member {}

impl ImageRecord for Member {
    fn family(&self) -> &'static ImageFamily {
        &CORE_TEAM
    }

    fn image_ref(&self) -> &str {
        &self.image
    }

    fn set_image_ref(&mut self, image_ref: String) {
        self.image = image_ref;
    }
}

// =============================================================================
// Events
// =============================================================================

/// The club's four event series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Astrax,
    Pleiades,
    Zenith,
    Utkarsh,
}

impl EventKind {
    /// All event kinds, in display order.
    pub const ALL: [EventKind; 4] = [
        EventKind::Astrax,
        EventKind::Pleiades,
        EventKind::Zenith,
        EventKind::Utkarsh,
    ];

    /// Parse a lowercase path segment.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "astrax" => Some(EventKind::Astrax),
            "pleiades" => Some(EventKind::Pleiades),
            "zenith" => Some(EventKind::Zenith),
            "utkarsh" => Some(EventKind::Utkarsh),
            _ => None,
        }
    }

    /// Lowercase name, also the table name.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Astrax => "astrax",
            EventKind::Pleiades => "pleiades",
            EventKind::Zenith => "zenith",
            EventKind::Utkarsh => "utkarsh",
        }
    }

    /// Image family for this series.
    pub fn family(&self) -> &'static ImageFamily {
        match self {
            EventKind::Astrax => &ASTRAX,
            EventKind::Pleiades => &PLEIADES,
            EventKind::Zenith => &ZENITH,
            EventKind::Utkarsh => &UTKARSH,
        }
    }

    /// Astrax events have no problem statement.
    pub fn has_problem_statement(&self) -> bool {
        !matches!(self, EventKind::Astrax)
    }
}

/// An event in one of the series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub name: String,
    #[serde(default = "default_jpg")]
    pub image: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub problem_statement: String,
}

impl Record for Event {
    fn unique_name(&self) -> Option<&str> {
        Some(&self.name)
    }
}

impl ImageRecord for Event {
    fn family(&self) -> &'static ImageFamily {
        self.kind.family()
    }

    fn image_ref(&self) -> &str {
        &self.image
    }

    fn set_image_ref(&mut self, image_ref: String) {
        self.image = image_ref;
    }
}

// =============================================================================
// Gallery
// =============================================================================

/// A photo gallery entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Photo {
    pub name: String,
    #[serde(default = "default_jpg")]
    pub image: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl Record for Photo {
    fn unique_name(&self) -> Option<&str> {
        Some(&self.name)
    }
}

impl ImageRecord for Photo {
    fn family(&self) -> &'static ImageFamily {
        &PHOTO_GALLERY
    }

    fn image_ref(&self) -> &str {
        &self.image
    }

    fn set_image_ref(&mut self, image_ref: String) {
        self.image = image_ref;
    }
}

fn default_video_link() -> String {
    "#/".to_string()
}

/// A video gallery entry (external link, no image).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Video {
    pub videoname: String,
    #[serde(default = "default_video_link")]
    pub link: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl Record for Video {
    const UNIQUE_FIELD: &'static str = "videoname";

    fn unique_name(&self) -> Option<&str> {
        Some(&self.videoname)
    }
}

// =============================================================================
// Homepage
// =============================================================================

/// A project card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub topic: String,
    pub description: String,
    #[serde(default = "default_jpg")]
    pub image: String,
}

impl Record for Project {}

impl ImageRecord for Project {
    const IMAGE_FIELD: &'static str = "image_url";

    fn family(&self) -> &'static ImageFamily {
        &PROJECTS
    }

    fn image_ref(&self) -> &str {
        &self.image
    }

    fn set_image_ref(&mut self, image_ref: String) {
        self.image = image_ref;
    }
}

/// A club activity card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClubActivity {
    pub activity: String,
    pub content: String,
    #[serde(default = "default_jpg")]
    pub image: String,
}

impl Record for ClubActivity {}

impl ImageRecord for ClubActivity {
    const IMAGE_FIELD: &'static str = "image_url";

    fn family(&self) -> &'static ImageFamily {
        &CLUB_ACTIVITY
    }

    fn image_ref(&self) -> &str {
        &self.image
    }

    fn set_image_ref(&mut self, image_ref: String) {
        self.image = image_ref;
    }
}

/// An achievement line on the homepage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Achievement {
    pub achievement: String,
    #[serde(default)]
    pub link: String,
}

impl Record for Achievement {}

/// A fest card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fest {
    pub festname: String,
    pub description: String,
    #[serde(default)]
    pub link: String,
    #[serde(default = "default_jpg")]
    pub image: String,
}

impl Record for Fest {}

impl ImageRecord for Fest {
    const IMAGE_FIELD: &'static str = "image_url";

    fn family(&self) -> &'static ImageFamily {
        &FESTS
    }

    fn image_ref(&self) -> &str {
        &self.image
    }

    fn set_image_ref(&mut self, image_ref: String) {
        self.image = image_ref;
    }
}

// =============================================================================
// Notifications
// =============================================================================

fn default_active() -> bool {
    true
}

/// A site notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    /// Creation time
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    /// Create an active notification stamped with the current time.
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            link: None,
            is_active: true,
            timestamp: Utc::now(),
        }
    }
}

impl Record for Notification {}
