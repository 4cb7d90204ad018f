//! Record store.
//!
//! In-memory tables for every entity of the site, the write path that runs
//! image normalization after each write, and JSON snapshot persistence.

mod catalog;
pub mod entities;
mod table;
mod writer;

pub use catalog::{Catalog, CatalogSnapshot};
pub use entities::{
    family_by_name, Achievement, Alumni, ClubActivity, Event, EventKind, Fest, ImageRecord,
    Member, Notification, Photo, Position, Project, Record, Video, ALL_FAMILIES, ALUMNI, ASTRAX,
    CLUB_ACTIVITY, CORE_TEAM, FESTS, PHOTO_GALLERY, PLEIADES, PROJECTS, UTKARSH, ZENITH,
};
pub use table::{KeyedGuard, KeyedLocks, Stored, Table, TableSnapshot};
pub use writer::{RecordWriter, SaveReport, Upload};
