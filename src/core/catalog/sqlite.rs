//! SQLite catalog backend.

use super::{
    Asset, AssetStatus, CatalogStore, RenditionSlot, UpsertReport, Volume, VolumeStatus,
    VolumeType,
};
use crate::core::fingerprint::{Fingerprint, FingerprintKind};
use crate::core::metadata::MediaMetadata;
use crate::core::scanner::MediaType;
use crate::error::CatalogError;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS volumes (
        uuid TEXT PRIMARY KEY,
        label TEXT NOT NULL,
        mount_point TEXT,
        volume_type TEXT NOT NULL,
        status TEXT NOT NULL,
        hidden INTEGER NOT NULL DEFAULT 0,
        last_mounted_at INTEGER
    );

    CREATE TABLE IF NOT EXISTS assets (
        id TEXT PRIMARY KEY,
        volume_id TEXT NOT NULL,
        relative_path TEXT NOT NULL,
        file_name TEXT NOT NULL,
        media_type TEXT NOT NULL,
        partial_hash TEXT NOT NULL,
        file_size INTEGER NOT NULL,
        hash_kind TEXT NOT NULL,
        width INTEGER,
        height INTEGER,
        codec TEXT,
        frame_rate REAL,
        duration REAL,
        camera_make TEXT,
        camera_model TEXT,
        lens_model TEXT,
        iso INTEGER,
        f_number REAL,
        exposure_time REAL,
        focal_length REAL,
        gps_latitude REAL,
        gps_longitude REAL,
        orientation INTEGER,
        date_taken INTEGER,
        thumbnail_paths TEXT NOT NULL DEFAULT '[]',
        preview_path TEXT,
        waveform_path TEXT,
        proxy_path TEXT,
        status TEXT NOT NULL,
        indexed_at INTEGER NOT NULL,
        UNIQUE (volume_id, relative_path)
    );

    CREATE INDEX IF NOT EXISTS idx_assets_volume ON assets(volume_id, status);
    CREATE INDEX IF NOT EXISTS idx_assets_fingerprint ON assets(file_size, partial_hash);
";

const ASSET_COLUMNS: &str = "id, volume_id, relative_path, file_name, media_type,
    partial_hash, file_size, hash_kind, width, height, codec, frame_rate, duration,
    camera_make, camera_model, lens_model, iso, f_number, exposure_time, focal_length,
    gps_latitude, gps_longitude, orientation, date_taken, thumbnail_paths, preview_path,
    waveform_path, proxy_path, status, indexed_at";

const VOLUME_COLUMNS: &str =
    "uuid, label, mount_point, volume_type, status, hidden, last_mounted_at";

// Rendition pointers only survive when the fingerprint is unchanged.
const UPSERT_ASSET: &str = "
    INSERT INTO assets (
        id, volume_id, relative_path, file_name, media_type,
        partial_hash, file_size, hash_kind, width, height, codec, frame_rate, duration,
        camera_make, camera_model, lens_model, iso, f_number, exposure_time, focal_length,
        gps_latitude, gps_longitude, orientation, date_taken, thumbnail_paths, preview_path,
        waveform_path, proxy_path, status, indexed_at
    ) VALUES (
        ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
        ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28, ?29, ?30
    )
    ON CONFLICT(id) DO UPDATE SET
        file_name = excluded.file_name,
        media_type = excluded.media_type,
        width = excluded.width,
        height = excluded.height,
        codec = excluded.codec,
        frame_rate = excluded.frame_rate,
        duration = excluded.duration,
        camera_make = excluded.camera_make,
        camera_model = excluded.camera_model,
        lens_model = excluded.lens_model,
        iso = excluded.iso,
        f_number = excluded.f_number,
        exposure_time = excluded.exposure_time,
        focal_length = excluded.focal_length,
        gps_latitude = excluded.gps_latitude,
        gps_longitude = excluded.gps_longitude,
        orientation = excluded.orientation,
        date_taken = excluded.date_taken,
        thumbnail_paths = CASE WHEN assets.partial_hash = excluded.partial_hash
            AND assets.file_size = excluded.file_size
            THEN assets.thumbnail_paths ELSE excluded.thumbnail_paths END,
        preview_path = CASE WHEN assets.partial_hash = excluded.partial_hash
            AND assets.file_size = excluded.file_size
            THEN assets.preview_path ELSE excluded.preview_path END,
        waveform_path = CASE WHEN assets.partial_hash = excluded.partial_hash
            AND assets.file_size = excluded.file_size
            THEN assets.waveform_path ELSE excluded.waveform_path END,
        proxy_path = CASE WHEN assets.partial_hash = excluded.partial_hash
            AND assets.file_size = excluded.file_size
            THEN assets.proxy_path ELSE excluded.proxy_path END,
        partial_hash = excluded.partial_hash,
        file_size = excluded.file_size,
        hash_kind = excluded.hash_kind,
        status = excluded.status,
        indexed_at = excluded.indexed_at
";

/// SQLite-backed catalog
///
/// A single connection behind a mutex. WAL mode lets external readers
/// proceed while a batch is being written.
pub struct SqliteCatalog {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl SqliteCatalog {
    /// Open or create a catalog database at the given path
    pub fn open(path: &Path) -> Result<Self, CatalogError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CatalogError::OpenFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        }

        let conn = Connection::open(path).map_err(|e| CatalogError::OpenFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::with_connection(conn, path.to_path_buf())
    }

    /// Catalog that lives only as long as this value
    pub fn open_in_memory() -> Result<Self, CatalogError> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn, PathBuf::from(":memory:"))
    }

    fn with_connection(conn: Connection, db_path: PathBuf) -> Result<Self, CatalogError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, CatalogError> {
        self.conn.lock().map_err(|_| CatalogError::Poisoned {
            path: self.db_path.clone(),
        })
    }

    fn query_assets(
        conn: &Connection,
        where_clause: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<Asset>, CatalogError> {
        let sql = format!(
            "SELECT {} FROM assets {} ORDER BY relative_path",
            ASSET_COLUMNS, where_clause
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params, row_to_asset)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn write_volume(conn: &Connection, volume: &Volume) -> Result<(), CatalogError> {
        conn.execute(
            "INSERT INTO volumes (uuid, label, mount_point, volume_type, status, hidden, last_mounted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(uuid) DO UPDATE SET
                label = excluded.label,
                mount_point = excluded.mount_point,
                volume_type = excluded.volume_type,
                status = excluded.status,
                hidden = excluded.hidden,
                last_mounted_at = excluded.last_mounted_at",
            params![
                volume.uuid,
                volume.label,
                volume.mount_point.as_deref().map(path_to_text),
                volume.volume_type.as_str(),
                volume.status.as_str(),
                volume.hidden,
                volume.last_mounted_at.map(|t| t.timestamp_millis()),
            ],
        )?;
        Ok(())
    }
}

fn path_to_text(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn from_millis(value: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(value).unwrap_or_default()
}

/// Read an enum column, rejecting text this version does not know
fn parse_column<T>(
    row: &Row<'_>,
    index: usize,
    column: &'static str,
    parse: fn(&str) -> Option<T>,
) -> rusqlite::Result<T> {
    let raw: String = row.get(index)?;
    parse(&raw).ok_or_else(|| {
        let error = CatalogError::InvalidValue { column, value: raw };
        rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(error))
    })
}

fn row_to_asset(row: &Row<'_>) -> rusqlite::Result<Asset> {
    let thumbnails: String = row.get(24)?;
    let thumbnail_paths: Vec<PathBuf> = serde_json::from_str(&thumbnails).unwrap_or_default();

    Ok(Asset {
        id: row.get(0)?,
        volume_id: row.get(1)?,
        relative_path: row.get(2)?,
        file_name: row.get(3)?,
        media_type: parse_column(row, 4, "media_type", MediaType::parse)?,
        fingerprint: Fingerprint {
            partial_hash: row.get(5)?,
            size: row.get::<_, i64>(6)? as u64,
            kind: parse_column(row, 7, "hash_kind", FingerprintKind::parse)?,
        },
        metadata: MediaMetadata {
            width: row.get(8)?,
            height: row.get(9)?,
            codec: row.get(10)?,
            frame_rate: row.get(11)?,
            duration: row.get(12)?,
            camera_make: row.get(13)?,
            camera_model: row.get(14)?,
            lens_model: row.get(15)?,
            iso: row.get(16)?,
            f_number: row.get(17)?,
            exposure_time: row.get(18)?,
            focal_length: row.get(19)?,
            gps_latitude: row.get(20)?,
            gps_longitude: row.get(21)?,
            orientation: row.get(22)?,
            date_taken: row.get::<_, Option<i64>>(23)?.map(from_millis),
        },
        thumbnail_paths,
        preview_path: row.get::<_, Option<String>>(25)?.map(PathBuf::from),
        waveform_path: row.get::<_, Option<String>>(26)?.map(PathBuf::from),
        proxy_path: row.get::<_, Option<String>>(27)?.map(PathBuf::from),
        status: parse_column(row, 28, "status", AssetStatus::parse)?,
        indexed_at: from_millis(row.get(29)?),
    })
}

fn row_to_volume(row: &Row<'_>) -> rusqlite::Result<Volume> {
    Ok(Volume {
        uuid: row.get(0)?,
        label: row.get(1)?,
        mount_point: row.get::<_, Option<String>>(2)?.map(PathBuf::from),
        volume_type: parse_column(row, 3, "volume_type", VolumeType::parse)?,
        status: parse_column(row, 4, "status", VolumeStatus::parse)?,
        hidden: row.get(5)?,
        last_mounted_at: row.get::<_, Option<i64>>(6)?.map(from_millis),
    })
}

impl CatalogStore for SqliteCatalog {
    fn upsert_assets(&self, assets: &[Asset]) -> Result<UpsertReport, CatalogError> {
        let mut report = UpsertReport::default();
        if assets.is_empty() {
            return Ok(report);
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut previous = tx.prepare_cached(
                "SELECT partial_hash, file_size FROM assets WHERE id = ?1",
            )?;
            let mut stmt = tx.prepare_cached(UPSERT_ASSET)?;
            for asset in assets {
                let before: Option<(String, i64)> = previous
                    .query_row([&asset.id], |row| Ok((row.get(0)?, row.get(1)?)))
                    .optional()?;
                if let Some((hash, size)) = before {
                    if hash != asset.fingerprint.partial_hash
                        || size as u64 != asset.fingerprint.size
                    {
                        report.content_changed.push(asset.id.clone());
                    }
                }

                let thumbnails = serde_json::to_string(&asset.thumbnail_paths)
                    .map_err(|e| CatalogError::QueryFailed(e.to_string()))?;
                let m = &asset.metadata;
                stmt.execute(params![
                    asset.id,
                    asset.volume_id,
                    asset.relative_path,
                    asset.file_name,
                    asset.media_type.as_str(),
                    asset.fingerprint.partial_hash,
                    asset.fingerprint.size as i64,
                    asset.fingerprint.kind.as_str(),
                    m.width,
                    m.height,
                    m.codec,
                    m.frame_rate,
                    m.duration,
                    m.camera_make,
                    m.camera_model,
                    m.lens_model,
                    m.iso,
                    m.f_number,
                    m.exposure_time,
                    m.focal_length,
                    m.gps_latitude,
                    m.gps_longitude,
                    m.orientation,
                    m.date_taken.map(|t| t.timestamp_millis()),
                    thumbnails,
                    asset.preview_path.as_deref().map(path_to_text),
                    asset.waveform_path.as_deref().map(path_to_text),
                    asset.proxy_path.as_deref().map(path_to_text),
                    asset.status.as_str(),
                    asset.indexed_at.timestamp_millis(),
                ])?;
            }
        }
        tx.commit()?;

        report.written = assets.len();
        Ok(report)
    }

    fn get_asset(&self, id: &str) -> Result<Option<Asset>, CatalogError> {
        let conn = self.lock()?;
        let sql = format!("SELECT {} FROM assets WHERE id = ?1", ASSET_COLUMNS);
        Ok(conn.query_row(&sql, [id], row_to_asset).optional()?)
    }

    fn assets_under(&self, volume_id: &str, prefix: &str) -> Result<Vec<Asset>, CatalogError> {
        let conn = self.lock()?;
        if prefix.is_empty() {
            return Self::query_assets(&conn, "WHERE volume_id = ?1", [volume_id]);
        }

        let dir = format!("{}/", prefix.trim_end_matches('/'));
        Self::query_assets(
            &conn,
            "WHERE volume_id = ?1 AND substr(relative_path, 1, length(?2)) = ?2",
            params![volume_id, dir],
        )
    }

    fn asset_ids(&self) -> Result<Vec<String>, CatalogError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT id FROM assets")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }

    fn count_assets(&self) -> Result<usize, CatalogError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM assets", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn set_asset_status(
        &self,
        ids: &[String],
        status: AssetStatus,
    ) -> Result<usize, CatalogError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut changed = 0;
        {
            let mut stmt =
                tx.prepare_cached("UPDATE assets SET status = ?1 WHERE id = ?2 AND status != ?1")?;
            for id in ids {
                changed += stmt.execute(params![status.as_str(), id])?;
            }
        }
        tx.commit()?;
        Ok(changed)
    }

    fn set_rendition(
        &self,
        id: &str,
        slot: RenditionSlot,
        path: Option<&Path>,
    ) -> Result<(), CatalogError> {
        let conn = self.lock()?;
        match slot {
            RenditionSlot::Thumbnail => {
                let paths: Vec<&Path> = path.into_iter().collect();
                let json = serde_json::to_string(&paths)
                    .map_err(|e| CatalogError::QueryFailed(e.to_string()))?;
                conn.execute(
                    "UPDATE assets SET thumbnail_paths = ?1 WHERE id = ?2",
                    params![json, id],
                )?;
            }
            RenditionSlot::Preview | RenditionSlot::Waveform | RenditionSlot::Proxy => {
                let column = match slot {
                    RenditionSlot::Preview => "preview_path",
                    RenditionSlot::Waveform => "waveform_path",
                    _ => "proxy_path",
                };
                let sql = format!("UPDATE assets SET {} = ?1 WHERE id = ?2", column);
                conn.execute(&sql, params![path.map(path_to_text), id])?;
            }
        }
        Ok(())
    }

    fn duplicate_candidates(&self) -> Result<Vec<Vec<Asset>>, CatalogError> {
        let conn = self.lock()?;
        let keys: Vec<(i64, String)> = {
            let mut stmt = conn.prepare(
                "SELECT file_size, partial_hash FROM assets
                 WHERE hash_kind = 'content' AND status != 'missing'
                 GROUP BY file_size, partial_hash
                 HAVING COUNT(*) > 1
                 ORDER BY file_size DESC",
            )?;
            let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        let mut groups = Vec::with_capacity(keys.len());
        for (size, hash) in keys {
            groups.push(Self::query_assets(
                &conn,
                "WHERE hash_kind = 'content' AND status != 'missing'
                 AND file_size = ?1 AND partial_hash = ?2",
                params![size, hash],
            )?);
        }
        Ok(groups)
    }

    fn get_volume(&self, uuid: &str) -> Result<Option<Volume>, CatalogError> {
        let conn = self.lock()?;
        let sql = format!("SELECT {} FROM volumes WHERE uuid = ?1", VOLUME_COLUMNS);
        Ok(conn.query_row(&sql, [uuid], row_to_volume).optional()?)
    }

    fn list_volumes(&self) -> Result<Vec<Volume>, CatalogError> {
        let conn = self.lock()?;
        let sql = format!("SELECT {} FROM volumes ORDER BY label, uuid", VOLUME_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let volumes = stmt
            .query_map([], row_to_volume)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(volumes)
    }

    fn save_volume(&self, volume: &Volume) -> Result<(), CatalogError> {
        let conn = self.lock()?;
        Self::write_volume(&conn, volume)
    }

    fn connect_volume(&self, volume: &Volume) -> Result<usize, CatalogError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        Self::write_volume(&tx, volume)?;
        let flipped = tx.execute(
            "UPDATE assets SET status = 'online' WHERE volume_id = ?1 AND status = 'offline'",
            [&volume.uuid],
        )?;
        tx.commit()?;
        Ok(flipped)
    }

    fn disconnect_volume(&self, uuid: &str) -> Result<usize, CatalogError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "UPDATE volumes SET mount_point = NULL, status = 'disconnected' WHERE uuid = ?1",
            [uuid],
        )?;
        let flipped = tx.execute(
            "UPDATE assets SET status = 'offline' WHERE volume_id = ?1 AND status = 'online'",
            [uuid],
        )?;
        tx.commit()?;
        Ok(flipped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::asset_id;
    use tempfile::TempDir;

    fn asset(volume: &str, relative: &str, hash: &str) -> Asset {
        Asset {
            id: asset_id(volume, relative),
            volume_id: volume.to_string(),
            relative_path: relative.to_string(),
            file_name: relative.rsplit('/').next().unwrap().to_string(),
            media_type: MediaType::Photo,
            fingerprint: Fingerprint {
                partial_hash: hash.to_string(),
                size: 1000,
                kind: FingerprintKind::Content,
            },
            metadata: MediaMetadata {
                width: Some(4000),
                height: Some(3000),
                ..Default::default()
            },
            thumbnail_paths: Vec::new(),
            preview_path: None,
            waveform_path: None,
            proxy_path: None,
            status: AssetStatus::Online,
            indexed_at: Utc::now(),
        }
    }

    fn volume(uuid: &str) -> Volume {
        Volume {
            uuid: uuid.to_string(),
            label: "CARD".to_string(),
            mount_point: Some(PathBuf::from("/Volumes/CARD")),
            volume_type: VolumeType::External,
            status: VolumeStatus::Connected,
            hidden: false,
            last_mounted_at: Some(Utc::now()),
        }
    }

    #[test]
    fn sqlite_catalog_creates_database() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("nested").join("catalog.db");

        let catalog = SqliteCatalog::open(&db_path).unwrap();

        assert!(db_path.exists());
        assert_eq!(catalog.count_assets().unwrap(), 0);
    }

    #[test]
    fn repeated_upsert_keeps_one_row() {
        let catalog = SqliteCatalog::open_in_memory().unwrap();
        let first = asset("V", "x/y.jpg", "aa");

        catalog.upsert_assets(&[first.clone()]).unwrap();
        catalog.upsert_assets(&[first.clone()]).unwrap();

        assert_eq!(catalog.count_assets().unwrap(), 1);
        let stored = catalog.get_asset(&asset_id("V", "x/y.jpg")).unwrap().unwrap();
        assert_eq!(stored.relative_path, "x/y.jpg");
        assert_eq!(stored.metadata.width, Some(4000));
    }

    #[test]
    fn upsert_keeps_thumbnail_when_fingerprint_unchanged() {
        let catalog = SqliteCatalog::open_in_memory().unwrap();
        let original = asset("V", "a.jpg", "aa");
        catalog.upsert_assets(&[original.clone()]).unwrap();
        catalog
            .set_rendition(&original.id, RenditionSlot::Thumbnail, Some(Path::new("/c/a_thumb_v2.jpg")))
            .unwrap();

        let unchanged = catalog.upsert_assets(&[original.clone()]).unwrap();
        assert!(unchanged.content_changed.is_empty());
        let kept = catalog.get_asset(&original.id).unwrap().unwrap();
        assert_eq!(kept.thumbnail_paths, vec![PathBuf::from("/c/a_thumb_v2.jpg")]);

        let report = catalog
            .upsert_assets(&[asset("V", "a.jpg", "bb"), asset("V", "new.jpg", "cc")])
            .unwrap();
        assert_eq!(report.written, 2);
        assert_eq!(report.content_changed, vec![original.id.clone()]);
        let changed = catalog.get_asset(&original.id).unwrap().unwrap();
        assert!(changed.thumbnail_paths.is_empty());
    }

    #[test]
    fn unknown_enum_text_is_reported_by_column() {
        let catalog = SqliteCatalog::open_in_memory().unwrap();
        let stored = asset("V", "a.jpg", "aa");
        catalog.upsert_assets(&[stored.clone()]).unwrap();
        catalog
            .lock()
            .unwrap()
            .execute("UPDATE assets SET status = 'vanished' WHERE id = ?1", [&stored.id])
            .unwrap();

        match catalog.get_asset(&stored.id) {
            Err(CatalogError::InvalidValue { column, value }) => {
                assert_eq!(column, "status");
                assert_eq!(value, "vanished");
            }
            other => panic!("expected InvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn assets_under_matches_directory_prefix_only() {
        let catalog = SqliteCatalog::open_in_memory().unwrap();
        catalog
            .upsert_assets(&[
                asset("V", "trip/a.jpg", "1"),
                asset("V", "trip/day2/b.jpg", "2"),
                asset("V", "tripod/c.jpg", "3"),
                asset("W", "trip/d.jpg", "4"),
            ])
            .unwrap();

        let under: Vec<String> = catalog
            .assets_under("V", "trip")
            .unwrap()
            .into_iter()
            .map(|a| a.relative_path)
            .collect();
        assert_eq!(under, vec!["trip/a.jpg", "trip/day2/b.jpg"]);
        assert_eq!(catalog.assets_under("V", "").unwrap().len(), 3);
    }

    #[test]
    fn duplicate_candidates_skip_fallback_fingerprints() {
        let catalog = SqliteCatalog::open_in_memory().unwrap();
        let mut fallback_a = asset("V", "f1.jpg", "ff");
        fallback_a.fingerprint.kind = FingerprintKind::Fallback;
        let mut fallback_b = asset("V", "f2.jpg", "ff");
        fallback_b.fingerprint.kind = FingerprintKind::Fallback;

        catalog
            .upsert_assets(&[
                asset("V", "a.jpg", "same"),
                asset("W", "copy/a.jpg", "same"),
                asset("V", "b.jpg", "other"),
                fallback_a,
                fallback_b,
            ])
            .unwrap();

        let groups = catalog.duplicate_candidates().unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 2);
    }

    #[test]
    fn connect_and_disconnect_flip_asset_status() {
        let catalog = SqliteCatalog::open_in_memory().unwrap();
        catalog.save_volume(&volume("V")).unwrap();
        let gone = asset("V", "gone.jpg", "3");
        catalog
            .upsert_assets(&[asset("V", "a.jpg", "1"), asset("V", "b.jpg", "2"), gone.clone()])
            .unwrap();
        catalog
            .set_asset_status(&[gone.id.clone()], AssetStatus::Missing)
            .unwrap();

        assert_eq!(catalog.disconnect_volume("V").unwrap(), 2);
        let stored = catalog.get_volume("V").unwrap().unwrap();
        assert_eq!(stored.status, VolumeStatus::Disconnected);
        assert!(stored.mount_point.is_none());
        let missing = catalog.get_asset(&gone.id).unwrap().unwrap();
        assert_eq!(missing.status, AssetStatus::Missing);

        assert_eq!(catalog.connect_volume(&volume("V")).unwrap(), 2);
        let statuses: Vec<AssetStatus> = catalog
            .assets_under("V", "")
            .unwrap()
            .into_iter()
            .map(|a| a.status)
            .collect();
        assert_eq!(
            statuses,
            vec![AssetStatus::Online, AssetStatus::Online, AssetStatus::Missing]
        );
    }

    #[test]
    fn volume_round_trips() {
        let catalog = SqliteCatalog::open_in_memory().unwrap();
        let mut original = volume("V");
        original.hidden = true;
        catalog.save_volume(&original).unwrap();

        let stored = catalog.get_volume("V").unwrap().unwrap();
        assert_eq!(stored.label, "CARD");
        assert!(stored.hidden);
        assert_eq!(stored.volume_type, VolumeType::External);
        assert!(catalog.get_volume("nope").unwrap().is_none());
    }
}
