//! The full set of site tables, with JSON snapshot persistence.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::entities::{
    Achievement, Alumni, ClubActivity, Event, EventKind, Fest, Member, Notification, Photo,
    Project, Video,
};
use super::table::{Stored, Table, TableSnapshot};
use crate::error::RecordError;

/// Every table of the site.
pub struct Catalog {
    pub alumni: Table<Alumni>,
    pub core_team: Table<Member>,
    pub astrax: Table<Event>,
    pub pleiades: Table<Event>,
    pub zenith: Table<Event>,
    pub utkarsh: Table<Event>,
    pub photos: Table<Photo>,
    pub videos: Table<Video>,
    pub projects: Table<Project>,
    pub club_activities: Table<ClubActivity>,
    pub achievements: Table<Achievement>,
    pub fests: Table<Fest>,
    pub notifications: Table<Notification>,
}

/// On-disk form of a [`Catalog`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSnapshot {
    pub alumni: TableSnapshot<Alumni>,
    pub core_team: TableSnapshot<Member>,
    pub astrax: TableSnapshot<Event>,
    pub pleiades: TableSnapshot<Event>,
    pub zenith: TableSnapshot<Event>,
    pub utkarsh: TableSnapshot<Event>,
    pub photos: TableSnapshot<Photo>,
    pub videos: TableSnapshot<Video>,
    pub projects: TableSnapshot<Project>,
    pub club_activities: TableSnapshot<ClubActivity>,
    pub achievements: TableSnapshot<Achievement>,
    pub fests: TableSnapshot<Fest>,
    pub notifications: TableSnapshot<Notification>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::from_snapshot(CatalogSnapshot::default())
    }
}

impl Catalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a catalog from a snapshot.
    pub fn from_snapshot(snapshot: CatalogSnapshot) -> Self {
        Self {
            alumni: Table::from_snapshot("alumni", snapshot.alumni),
            core_team: Table::from_snapshot("core_team", snapshot.core_team),
            astrax: Table::from_snapshot("astrax", snapshot.astrax),
            pleiades: Table::from_snapshot("pleiades", snapshot.pleiades),
            zenith: Table::from_snapshot("zenith", snapshot.zenith),
            utkarsh: Table::from_snapshot("utkarsh", snapshot.utkarsh),
            photos: Table::from_snapshot("photos", snapshot.photos),
            videos: Table::from_snapshot("videos", snapshot.videos),
            projects: Table::from_snapshot("projects", snapshot.projects),
            club_activities: Table::from_snapshot("club_activities", snapshot.club_activities),
            achievements: Table::from_snapshot("achievements", snapshot.achievements),
            fests: Table::from_snapshot("fests", snapshot.fests),
            notifications: Table::from_snapshot("notifications", snapshot.notifications),
        }
    }

    /// Copy every table for persistence.
    pub async fn snapshot(&self) -> CatalogSnapshot {
        CatalogSnapshot {
            alumni: self.alumni.snapshot().await,
            core_team: self.core_team.snapshot().await,
            astrax: self.astrax.snapshot().await,
            pleiades: self.pleiades.snapshot().await,
            zenith: self.zenith.snapshot().await,
            utkarsh: self.utkarsh.snapshot().await,
            photos: self.photos.snapshot().await,
            videos: self.videos.snapshot().await,
            projects: self.projects.snapshot().await,
            club_activities: self.club_activities.snapshot().await,
            achievements: self.achievements.snapshot().await,
            fests: self.fests.snapshot().await,
            notifications: self.notifications.snapshot().await,
        }
    }

    /// The table of one event series.
    pub fn events(&self, kind: EventKind) -> &Table<Event> {
        match kind {
            EventKind::Astrax => &self.astrax,
            EventKind::Pleiades => &self.pleiades,
            EventKind::Zenith => &self.zenith,
            EventKind::Utkarsh => &self.utkarsh,
        }
    }

    /// Notifications, newest first.
    pub async fn notifications_newest_first(&self, active_only: bool) -> Vec<Stored<Notification>> {
        let mut rows: Vec<_> = self
            .notifications
            .list()
            .await
            .into_iter()
            .filter(|row| !active_only || row.record.is_active)
            .collect();
        rows.sort_by(|a, b| {
            b.record
                .timestamp
                .cmp(&a.record.timestamp)
                .then(b.id.cmp(&a.id))
        });
        rows
    }

    /// Load a catalog from a snapshot file. A missing file yields an empty catalog.
    pub async fn load(path: &Path) -> Result<Self, RecordError> {
        let data = match tokio::fs::read(path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No catalog snapshot, starting empty");
                return Ok(Self::new());
            }
            Err(e) => {
                return Err(RecordError::Snapshot(format!(
                    "{}: {}",
                    path.display(),
                    e
                )))
            }
        };

        let snapshot: CatalogSnapshot = serde_json::from_slice(&data)
            .map_err(|e| RecordError::Snapshot(format!("{}: {}", path.display(), e)))?;

        debug!(path = %path.display(), "Loaded catalog snapshot");
        Ok(Self::from_snapshot(snapshot))
    }

    /// Write the catalog to `path`, replacing the previous snapshot.
    ///
    /// The JSON is written to a sibling temp file first and renamed over the
    /// target, so readers never see a half-written snapshot.
    pub async fn persist(&self, path: &Path) -> Result<(), RecordError> {
        let snapshot = self.snapshot().await;
        let json = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| RecordError::Snapshot(e.to_string()))?;

        let snapshot_error = |e: std::io::Error| {
            RecordError::Snapshot(format!("{}: {}", path.display(), e))
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(snapshot_error)?;
        }

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        tokio::fs::write(&tmp, json).await.map_err(snapshot_error)?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(snapshot_error)?;

        debug!(path = %path.display(), "Persisted catalog snapshot");
        Ok(())
    }
}
