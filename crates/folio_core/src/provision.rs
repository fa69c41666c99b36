//! Startup provisioning of the collections and indexes the CMS relies on.
//!
//! # Responsibility
//! - Create-if-absent every required collection in a fixed order.
//! - Declare each collection's indexes before publishing its handle.
//!
//! # Invariants
//! - Order is pages -> versions -> files -> videos -> redirects; a collection
//!   is not touched until the previous one is fully indexed.
//! - The first failure aborts provisioning and is returned unchanged.
//! - Re-running provisioning against an already provisioned database is a no-op.
//! - `COLLECTION_SPECS` is the authoritative persisted schema.

use crate::collection::{Collection, IndexField, IndexSpec};
use crate::config::StoreConfig;
use crate::db::{DbError, DbResult};
use log::{error, info};
use rusqlite::Connection;
use std::time::Instant;

/// A required collection and the indexes it must carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionSpec {
    /// Logical name; the physical name adds the configured prefix.
    pub logical: &'static str,
    pub indexes: &'static [IndexSpec],
}

pub const PAGES: CollectionSpec = CollectionSpec {
    logical: "pages",
    indexes: &[
        IndexSpec {
            fields: &[IndexField::asc("slug")],
            unique: true,
            multikey: false,
        },
        // Keyed per element, so a page is found by any one of its tags.
        IndexSpec {
            fields: &[IndexField::asc("tags")],
            unique: false,
            multikey: true,
        },
    ],
};

/// Versions are read newest-first per page, so the key ends in `createdAt -1`.
pub const VERSIONS: CollectionSpec = CollectionSpec {
    logical: "versions",
    indexes: &[IndexSpec {
        fields: &[IndexField::asc("pageId"), IndexField::desc("createdAt")],
        unique: false,
        multikey: false,
    }],
};

pub const FILES: CollectionSpec = CollectionSpec {
    logical: "files",
    indexes: &[],
};

pub const VIDEOS: CollectionSpec = CollectionSpec {
    logical: "videos",
    indexes: &[
        IndexSpec {
            fields: &[IndexField::asc("searchText")],
            unique: false,
            multikey: false,
        },
        // Lets the importer find an already fetched source URL.
        IndexSpec {
            fields: &[IndexField::asc("video")],
            unique: false,
            multikey: false,
        },
    ],
};

pub const REDIRECTS: CollectionSpec = CollectionSpec {
    logical: "redirects",
    indexes: &[IndexSpec {
        fields: &[IndexField::asc("from")],
        unique: true,
        multikey: false,
    }],
};

/// Every required collection, in provisioning order.
pub const COLLECTION_SPECS: &[CollectionSpec] = &[PAGES, VERSIONS, FILES, VIDEOS, REDIRECTS];

/// Handles produced by a successful `init_collections`.
///
/// Pass this by reference to whatever needs database access; it is the only
/// way to reach the provisioned collections.
#[derive(Debug, Clone)]
pub struct Collections<'conn> {
    pub pages: Collection<'conn>,
    pub versions: Collection<'conn>,
    pub files: Collection<'conn>,
    pub videos: Collection<'conn>,
    pub redirects: Collection<'conn>,
}

impl<'conn> Collections<'conn> {
    /// Returns `(logical name, handle)` pairs in provisioning order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Collection<'conn>)> {
        [
            (PAGES.logical, &self.pages),
            (VERSIONS.logical, &self.versions),
            (FILES.logical, &self.files),
            (VIDEOS.logical, &self.videos),
            (REDIRECTS.logical, &self.redirects),
        ]
        .into_iter()
    }

    pub fn get(&self, logical: &str) -> Option<&Collection<'conn>> {
        self.iter()
            .find(|(name, _)| *name == logical)
            .map(|(_, collection)| collection)
    }
}

/// Ensures all required collections and indexes exist and returns their handles.
///
/// Must complete before anything else touches the database. Any error is fatal
/// to startup.
///
/// # Side effects
/// - Emits one `collection_provision` event per collection.
pub fn init_collections<'conn>(
    conn: &'conn Connection,
    config: &StoreConfig,
) -> DbResult<Collections<'conn>> {
    config
        .validate()
        .map_err(|err| DbError::InvalidName(err.to_string()))?;

    let started_at = Instant::now();
    let collections = Collections {
        pages: provision_collection(conn, config, &PAGES)?,
        versions: provision_collection(conn, config, &VERSIONS)?,
        files: provision_collection(conn, config, &FILES)?,
        videos: provision_collection(conn, config, &VIDEOS)?,
        redirects: provision_collection(conn, config, &REDIRECTS)?,
    };
    info!(
        "event=init_collections module=provision status=ok collections={} duration_ms={}",
        COLLECTION_SPECS.len(),
        started_at.elapsed().as_millis()
    );
    Ok(collections)
}

fn provision_collection<'conn>(
    conn: &'conn Connection,
    config: &StoreConfig,
    spec: &CollectionSpec,
) -> DbResult<Collection<'conn>> {
    let started_at = Instant::now();
    let name = config.physical_name(spec.logical);

    let result = Collection::open(conn, name.as_str()).and_then(|collection| {
        for index in spec.indexes {
            collection.ensure_index(index)?;
        }
        Ok(collection)
    });

    match result {
        Ok(collection) => {
            info!(
                "event=collection_provision module=provision status=ok collection={} indexes={} duration_ms={}",
                name,
                spec.indexes.len(),
                started_at.elapsed().as_millis()
            );
            Ok(collection)
        }
        Err(err) => {
            error!(
                "event=collection_provision module=provision status=error collection={} duration_ms={} error_code={} error={}",
                name,
                started_at.elapsed().as_millis(),
                err.code().map_or_else(|| "none".to_string(), |code| code.to_string()),
                err
            );
            Err(err)
        }
    }
}
