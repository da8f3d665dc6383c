//! Asset repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Register and read asset rows.
//! - Provide the compare-and-set status write used by lifecycle transitions.
//!
//! # Invariants
//! - `create_asset` only accepts `InStock` assets without a holder; every
//!   other state is reached through the lifecycle service.
//! - Status writes are conditional on the status read inside the same
//!   transaction.

use crate::db::ensure_schema_ready;
use crate::model::asset::{Asset, AssetId, AssetStatus};
use crate::model::employee::EmployeeId;
use crate::repo::{parse_uuid, RepoError, RepoResult};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

const ASSET_SELECT_SQL: &str = "SELECT
    id,
    asset_tag,
    asset_name,
    serial_number,
    status,
    current_employee_id,
    notes,
    created_at,
    last_updated_at
FROM assets";

const ASSETS_DEFAULT_LIMIT: u32 = 100;

/// Query options for listing assets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetListQuery {
    /// Optional exact status filter.
    pub status: Option<AssetStatus>,
    /// Maximum rows to return. Defaults to 100.
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Repository interface for asset rows.
pub trait AssetRepository {
    /// Persists a newly registered asset and returns its id.
    fn create_asset(&self, asset: &Asset) -> RepoResult<AssetId>;
    fn get_asset(&self, id: AssetId) -> RepoResult<Option<Asset>>;
    fn get_asset_by_tag(&self, asset_tag: &str) -> RepoResult<Option<Asset>>;
    /// Lists assets ordered by `asset_tag ASC`.
    fn list_assets(&self, query: &AssetListQuery) -> RepoResult<Vec<Asset>>;
}

/// SQLite-backed asset repository.
pub struct SqliteAssetRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAssetRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self { conn })
    }
}

impl AssetRepository for SqliteAssetRepository<'_> {
    fn create_asset(&self, asset: &Asset) -> RepoResult<AssetId> {
        asset.validate()?;
        if asset.status != AssetStatus::InStock {
            return Err(RepoError::InvalidData(format!(
                "new assets must start in_stock, got {}",
                asset.status
            )));
        }

        let tag_taken: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM assets WHERE asset_tag = ?1);",
            [asset.asset_tag.as_str()],
            |row| row.get(0),
        )?;
        if tag_taken {
            return Err(RepoError::DuplicateAssetTag(asset.asset_tag.clone()));
        }

        self.conn.execute(
            "INSERT INTO assets (
                id,
                asset_tag,
                asset_name,
                serial_number,
                status,
                current_employee_id,
                notes,
                created_at,
                last_updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, NULL, ?6, ?7, ?8);",
            params![
                asset.id.to_string(),
                asset.asset_tag.as_str(),
                asset.asset_name.as_str(),
                asset.serial_number.as_deref(),
                asset.status.as_str(),
                asset.notes.as_deref(),
                asset.created_at,
                asset.last_updated_at,
            ],
        )?;

        Ok(asset.id)
    }

    fn get_asset(&self, id: AssetId) -> RepoResult<Option<Asset>> {
        load_asset(self.conn, id)
    }

    fn get_asset_by_tag(&self, asset_tag: &str) -> RepoResult<Option<Asset>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ASSET_SELECT_SQL} WHERE asset_tag = ?1;"))?;
        let mut rows = stmt.query([asset_tag])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_asset_row(row)?));
        }
        Ok(None)
    }

    fn list_assets(&self, query: &AssetListQuery) -> RepoResult<Vec<Asset>> {
        let mut sql = format!("{ASSET_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(status) = query.status {
            sql.push_str(" AND status = ?");
            bind_values.push(Value::Text(status.as_str().to_string()));
        }

        sql.push_str(" ORDER BY asset_tag ASC LIMIT ? OFFSET ?");
        bind_values.push(Value::Integer(i64::from(
            query.limit.unwrap_or(ASSETS_DEFAULT_LIMIT),
        )));
        bind_values.push(Value::Integer(i64::from(query.offset)));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut assets = Vec::new();
        while let Some(row) = rows.next()? {
            assets.push(parse_asset_row(row)?);
        }
        Ok(assets)
    }
}

/// Loads one asset row through any connection or transaction.
pub(crate) fn load_asset(conn: &Connection, id: AssetId) -> RepoResult<Option<Asset>> {
    let mut stmt = conn.prepare(&format!("{ASSET_SELECT_SQL} WHERE id = ?1;"))?;
    let mut rows = stmt.query([id.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_asset_row(row)?));
    }
    Ok(None)
}

/// Writes lifecycle fields if the row still has `expected_status`.
///
/// Returns `false` when no row matched, i.e. the asset vanished or its
/// status changed since it was read.
pub(crate) fn write_lifecycle_state(
    conn: &Connection,
    id: AssetId,
    expected_status: AssetStatus,
    next_status: AssetStatus,
    holder: Option<EmployeeId>,
    updated_at: i64,
) -> RepoResult<bool> {
    let changed = conn.execute(
        "UPDATE assets
         SET status = ?3,
             current_employee_id = ?4,
             last_updated_at = MAX(last_updated_at, ?5)
         WHERE id = ?1
           AND status = ?2;",
        params![
            id.to_string(),
            expected_status.as_str(),
            next_status.as_str(),
            holder.map(|value| value.to_string()),
            updated_at,
        ],
    )?;
    Ok(changed == 1)
}

/// Returns whether an asset row exists, without decoding it.
pub(crate) fn asset_exists(conn: &Connection, id: AssetId) -> RepoResult<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM assets WHERE id = ?1;",
            [id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn parse_asset_row(row: &Row<'_>) -> RepoResult<Asset> {
    let id_text: String = row.get("id")?;
    let status_text: String = row.get("status")?;
    let status = AssetStatus::parse(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid asset status `{status_text}` in assets.status"))
    })?;
    let current_employee_id = row
        .get::<_, Option<String>>("current_employee_id")?
        .map(|value| parse_uuid(&value, "assets.current_employee_id"))
        .transpose()?;

    Ok(Asset {
        id: parse_uuid(&id_text, "assets.id")?,
        asset_tag: row.get("asset_tag")?,
        asset_name: row.get("asset_name")?,
        serial_number: row.get("serial_number")?,
        status,
        current_employee_id,
        notes: row.get("notes")?,
        created_at: row.get("created_at")?,
        last_updated_at: row.get("last_updated_at")?,
    })
}
