use std::fmt;
use std::path::Path;
use std::sync::Arc;

use geostore_cell::{decode_cell, encode_cell, Cell, CellError, DecodePolicy, SharedDecoder};
use geostore_geo::{GeoMatch, GeoMatcher, S2Tessellation, Tessellation};
use geostore_kv::{KvStore, LogKv, WriteBatch};
use geostore_types::{validate_key, CellId, Item, ItemId, ItemRef};
use tracing::{debug, info, warn};

use crate::config::{RadiusMode, StoreConfig};
use crate::error::{StoreError, StoreResult};
use crate::keys::{item_record_key, item_scan_prefix, parse_item_record_key};
use crate::locks::CellLocks;

enum State {
    Closed,
    Open { decoder: SharedDecoder },
}

/// Geospatial store over a key-value engine and a tessellation.
///
/// A store starts `Closed`. [`open`](Self::open) binds the item decoder;
/// every query and mutation fails with [`StoreError::NotOpen`] before
/// touching the engine until then.
pub struct Store {
    kv: Arc<dyn KvStore>,
    matcher: GeoMatcher,
    config: StoreConfig,
    locks: CellLocks,
    state: State,
}

impl Store {
    /// A closed store over `kv` using the S2 tessellation.
    pub fn new(kv: Arc<dyn KvStore>, config: StoreConfig) -> StoreResult<Self> {
        let tessellation = S2Tessellation::new().with_max_cells(config.max_cells);
        Self::with_tessellation(kv, Arc::new(tessellation), config)
    }

    /// A closed store over `kv` using a caller-supplied tessellation.
    pub fn with_tessellation(
        kv: Arc<dyn KvStore>,
        tessellation: Arc<dyn Tessellation>,
        config: StoreConfig,
    ) -> StoreResult<Self> {
        config.validate()?;
        let matcher = GeoMatcher::new(tessellation, config.level)?
            .with_polyline_strategy(config.polyline_strategy);
        Ok(Self {
            kv,
            matcher,
            config,
            locks: CellLocks::new(),
            state: State::Closed,
        })
    }

    /// Open a log-backed store at `path`, creating the file if needed.
    pub fn open_path(path: &Path, config: StoreConfig, decoder: SharedDecoder) -> StoreResult<Self> {
        let kv = LogKv::open(path, config.kv.clone())?;
        let mut store = Self::new(Arc::new(kv), config)?;
        store.open(decoder)?;
        Ok(store)
    }

    /// Bind `decoder` and move to `Open`.
    pub fn open(&mut self, decoder: SharedDecoder) -> StoreResult<()> {
        if self.is_open() {
            return Err(StoreError::AlreadyOpen);
        }
        self.state = State::Open { decoder };
        info!(level = self.level(), "store opened");
        Ok(())
    }

    /// Flush the engine and move to `Closed`. Closing a closed store is a no-op.
    pub fn close(&mut self) -> StoreResult<()> {
        if !self.is_open() {
            return Ok(());
        }
        self.kv.flush()?;
        self.state = State::Closed;
        info!("store closed");
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, State::Open { .. })
    }

    /// Tessellation level every item is bucketed at.
    pub fn level(&self) -> u8 {
        self.matcher.level()
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn matcher(&self) -> &GeoMatcher {
        &self.matcher
    }

    // ---- Mutations ----

    /// Insert `item` into every cell covering its geometry.
    ///
    /// All covering cells and their item entries are written in one batch.
    /// The returned id names the home cell, the first cell of the covering;
    /// use [`covering_cells`](Self::covering_cells) to enumerate the rest.
    pub fn insert(&self, item: ItemRef) -> StoreResult<ItemId> {
        let decoder = self.decoder()?;
        validate_key(item.key())?;
        let geo = self.matcher.match_item(item.as_ref())?;
        let home = geo
            .home_cell()
            .ok_or_else(|| StoreError::InvalidGeometry("geometry covers no cell".into()))?;

        let _guard = self.locks.lock(geo.cell_ids.iter().copied())?;
        let encoded = item.encode()?;
        let mut batch = WriteBatch::new();
        for &cell_id in &geo.cell_ids {
            let mut cell = self
                .load_cell(decoder, cell_id)?
                .unwrap_or_else(|| Cell::new(cell_id));
            cell.add_item(Arc::clone(&item))?;
            batch.set(cell_id.storage_key(), encode_cell(&cell)?);
            batch.set(item_record_key(cell_id, item.key()), encoded.clone());
        }
        self.commit(batch, "insert", geo.len())?;
        Ok(ItemId::new(home, item.key()))
    }

    /// Replace the item addressed by `id` with `transform(item)` in every
    /// covering cell.
    ///
    /// The covering is recomputed from the stored geometry. A transformed
    /// item must keep a valid geometry with the same covering: a changed
    /// position is rematched and any difference fails with
    /// [`StoreError::CoveringChanged`] before anything is written. If the
    /// transform changes the key, the returned id carries the new key.
    pub fn update<F>(&self, id: &ItemId, transform: F) -> StoreResult<ItemId>
    where
        F: Fn(&ItemRef) -> ItemRef,
    {
        let decoder = self.decoder()?;
        let current = self.get_in(decoder, id)?;
        let geo = self.covering_of(current.as_ref())?;

        let _guard = self.locks.lock(geo.cell_ids.iter().copied())?;
        let key = id.key();
        let mut new_key = key.to_string();
        let mut batch = WriteBatch::new();
        for &cell_id in &geo.cell_ids {
            let mut cell = self.require_cell(decoder, cell_id)?;
            let old = cell.get(key).cloned().ok_or_else(|| missing_item(cell_id, key))?;
            let next = transform(&old);
            validate_key(next.key())?;
            if next.position() != old.position() {
                let moved = self.matcher.match_item(next.as_ref())?;
                if moved.cell_ids != geo.cell_ids {
                    return Err(StoreError::CoveringChanged {
                        key: key.to_string(),
                    });
                }
            }
            if next.key() != key && cell.contains_key(next.key()) {
                return Err(StoreError::DuplicateKey {
                    cell: cell_id,
                    key: next.key().to_string(),
                });
            }
            let encoded = next.encode()?;
            let replacement = Arc::clone(&next);
            let bytes = cell.process(move |items| {
                if let Some(slot) = items.iter_mut().find(|item| item.key() == key) {
                    *slot = replacement;
                }
                Ok(())
            })?;

            batch.set(cell_id.storage_key(), bytes);
            if next.key() != key {
                batch.delete(item_record_key(cell_id, key));
            }
            batch.set(item_record_key(cell_id, next.key()), encoded);
            new_key = next.key().to_string();
        }
        self.commit(batch, "update", geo.len())?;
        Ok(ItemId::new(id.cell(), new_key))
    }

    /// Remove the item addressed by `id` from every covering cell.
    ///
    /// Cells left empty keep their record.
    pub fn delete(&self, id: &ItemId) -> StoreResult<()> {
        let decoder = self.decoder()?;
        let current = self.get_in(decoder, id)?;
        let geo = self.covering_of(current.as_ref())?;

        let _guard = self.locks.lock(geo.cell_ids.iter().copied())?;
        let key = id.key();
        let mut batch = WriteBatch::new();
        for &cell_id in &geo.cell_ids {
            let mut cell = self.require_cell(decoder, cell_id)?;
            let bytes = cell.process(|items| {
                let index = items
                    .iter()
                    .position(|item| item.key() == key)
                    .ok_or_else(|| CellError::KeyNotFound {
                        cell: cell_id,
                        key: key.to_string(),
                    })?;
                items.remove(index);
                Ok(())
            })?;
            batch.set(cell_id.storage_key(), bytes);
            batch.delete(item_record_key(cell_id, key));
        }
        self.commit(batch, "delete", geo.len())
    }

    // ---- Queries ----

    /// The item addressed by `id`.
    pub fn get(&self, id: &ItemId) -> StoreResult<ItemRef> {
        let decoder = self.decoder()?;
        self.get_in(decoder, id)
    }

    /// Parse a textual `<cellId>:<itemKey>` id and look it up.
    pub fn get_str(&self, id: &str) -> StoreResult<ItemRef> {
        let decoder = self.decoder()?;
        let id = ItemId::parse(id)?;
        self.get_in(decoder, &id)
    }

    /// Items whose entry key `<hex cell id>:<item key>` starts with `prefix`,
    /// in ascending key order.
    ///
    /// An item covering several cells appears once per matching cell. Under
    /// [`DecodePolicy::Reject`] the first undecodable entry fails the call;
    /// otherwise it is logged and skipped.
    pub fn get_by_prefix(&self, prefix: &str) -> StoreResult<Vec<ItemRef>> {
        let entries = self.entries_by_prefix(prefix)?;
        Ok(entries.into_iter().map(|(_, item)| item).collect())
    }

    /// Like [`get_by_prefix`](Self::get_by_prefix), pairing each item with
    /// the id of the cell entry it was read from.
    pub fn entries_by_prefix(&self, prefix: &str) -> StoreResult<Vec<(ItemId, ItemRef)>> {
        let decoder = self.decoder()?;
        let entries = self.kv.scan_prefix(&item_scan_prefix(prefix))?;
        let mut items = Vec::with_capacity(entries.len());
        for (raw_key, value) in entries {
            let decoded = match parse_item_record_key(&raw_key) {
                Some((cell, key)) => decoder
                    .decode(&value)
                    .map(|item| (ItemId::new(cell, key), item))
                    .map_err(|e| e.to_string()),
                None => Err("malformed item entry key".to_string()),
            };
            match decoded {
                Ok(entry) => items.push(entry),
                Err(reason) if self.config.decode_policy == DecodePolicy::Reject => {
                    return Err(StoreError::Decode(format!(
                        "{}: {reason}",
                        String::from_utf8_lossy(&raw_key)
                    )));
                }
                Err(reason) => {
                    warn!(key = %String::from_utf8_lossy(&raw_key), error = %reason, "skipping undecodable item entry");
                }
            }
        }
        Ok(items)
    }

    /// The cell record for `cell_id`.
    pub fn get_cell(&self, cell_id: CellId) -> StoreResult<Cell> {
        let decoder = self.decoder()?;
        self.require_cell(decoder, cell_id)
    }

    /// The cell containing a coordinate at the store's level.
    pub fn get_cell_by_lat_lng(&self, lat: f64, lng: f64) -> StoreResult<Cell> {
        let decoder = self.decoder()?;
        self.require_cell(decoder, self.matcher.cell_at(lat, lng))
    }

    /// Cells covering a disc of `radius` meters around a coordinate.
    ///
    /// Cells without a record are skipped under [`RadiusMode::SkipMissing`];
    /// under [`RadiusMode::Strict`] the first one fails the whole query.
    pub fn within_radius(&self, lat: f64, lng: f64, radius: f64) -> StoreResult<Vec<Cell>> {
        let decoder = self.decoder()?;
        if !(lat.is_finite() && lng.is_finite()) {
            return Err(StoreError::InvalidGeometry(format!(
                "non-finite center ({lat}, {lng})"
            )));
        }
        if !radius.is_finite() || radius < 0.0 {
            return Err(StoreError::InvalidGeometry(format!("invalid radius {radius}")));
        }

        let covering = self.matcher.radius_cells(lat, lng, radius);
        let mut cells = Vec::with_capacity(covering.len());
        for cell_id in covering {
            match (self.load_cell(decoder, cell_id)?, self.config.radius_mode) {
                (Some(cell), _) => cells.push(cell),
                (None, RadiusMode::SkipMissing) => {}
                (None, RadiusMode::Strict) => return Err(missing_cell(cell_id)),
            }
        }
        debug!(lat, lng, radius, cells = cells.len(), "radius query");
        Ok(cells)
    }

    /// Every cell the item addressed by `id` is stored in, home cell first.
    pub fn covering_cells(&self, id: &ItemId) -> StoreResult<Vec<CellId>> {
        let decoder = self.decoder()?;
        let item = self.get_in(decoder, id)?;
        Ok(self.covering_of(item.as_ref())?.cell_ids)
    }

    /// `true` if the stored hash of `cell_id` matches its decoded key list.
    pub fn verify_cell(&self, cell_id: CellId) -> StoreResult<bool> {
        let decoder = self.decoder()?;
        Ok(self.require_cell(decoder, cell_id)?.verify_hash())
    }

    // ---- Internals ----

    fn decoder(&self) -> StoreResult<&SharedDecoder> {
        match &self.state {
            State::Open { decoder } => Ok(decoder),
            State::Closed => Err(StoreError::NotOpen),
        }
    }

    fn get_in(&self, decoder: &SharedDecoder, id: &ItemId) -> StoreResult<ItemRef> {
        let cell = self.require_cell(decoder, id.cell())?;
        cell.get(id.key())
            .cloned()
            .ok_or_else(|| missing_item(id.cell(), id.key()))
    }

    fn covering_of(&self, item: &dyn Item) -> StoreResult<GeoMatch> {
        let geo = self.matcher.match_item(item)?;
        if geo.is_empty() {
            return Err(StoreError::NotFound(format!(
                "no covering cells for item {:?}",
                item.key()
            )));
        }
        Ok(geo)
    }

    fn load_cell(&self, decoder: &SharedDecoder, cell_id: CellId) -> StoreResult<Option<Cell>> {
        match self.kv.get(&cell_id.storage_key())? {
            Some(bytes) => Ok(Some(decode_cell(
                &bytes,
                decoder.as_ref(),
                self.config.decode_policy,
            )?)),
            None => Ok(None),
        }
    }

    fn require_cell(&self, decoder: &SharedDecoder, cell_id: CellId) -> StoreResult<Cell> {
        self.load_cell(decoder, cell_id)?
            .ok_or_else(|| missing_cell(cell_id))
    }

    fn commit(&self, batch: WriteBatch, op: &'static str, cells: usize) -> StoreResult<()> {
        let ops = batch.len();
        self.kv.write_batch(batch)?;
        debug!(op, cells, ops, "batch committed");
        Ok(())
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("level", &self.level())
            .field("open", &self.is_open())
            .field("config", &self.config)
            .finish()
    }
}

fn missing_cell(cell_id: CellId) -> StoreError {
    StoreError::NotFound(format!("cell {cell_id}"))
}

fn missing_item(cell_id: CellId, key: &str) -> StoreError {
    StoreError::NotFound(format!("item {key:?} in cell {cell_id}"))
}
