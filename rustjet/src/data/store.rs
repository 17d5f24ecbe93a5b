use std::collections::BTreeMap;
use std::error::Error;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use byteorder::{ByteOrder, LittleEndian};
use rusqlite::Connection;

use jetcore::data::event::Event;

/// Decompresses a ZSTD compressed byte array
pub fn zstd_decompress(compressed_data: &[u8]) -> io::Result<Vec<u8>> {
    let mut decoder = zstd::Decoder::new(compressed_data)?;
    let mut decompressed_data = Vec::new();
    decoder.read_to_end(&mut decompressed_data)?;
    Ok(decompressed_data)
}

/// Compresses a byte array using ZSTD
pub fn zstd_compress(decompressed_data: &[u8], compression_level: i32) -> io::Result<Vec<u8>> {
    let mut encoder = zstd::Encoder::new(Vec::new(), compression_level)?;
    encoder.write_all(decompressed_data)?;
    let compressed_data = encoder.finish()?;
    Ok(compressed_data)
}

fn encode_f32_column(values: &[f32]) -> Vec<u8> {
    let mut buffer = vec![0u8; values.len() * 4];
    LittleEndian::write_f32_into(values, &mut buffer);
    buffer
}

fn decode_f32_column(bytes: &[u8]) -> Result<Vec<f32>, Box<dyn Error>> {
    if bytes.len() % 4 != 0 {
        return Err(format!("track blob length {} is not a multiple of 4", bytes.len()).into());
    }
    let mut values = vec![0f32; bytes.len() / 4];
    LittleEndian::read_f32_into(bytes, &mut values);
    Ok(values)
}

/// Which named branches to read, and how many events.
#[derive(Clone, Debug)]
pub struct ColumnRequest {
    /// Per-track feature branches, variable length per event.
    pub features: Vec<String>,
    /// Jet-level scalar branches used for the selection window.
    pub spectators: Vec<String>,
    /// Raw label indicator branches.
    pub labels: Vec<String>,
    /// Number of events to read, -1 for all.
    pub n_events: i64,
}

impl ColumnRequest {
    pub fn cap(&self) -> Option<usize> {
        if self.n_events < 0 {
            None
        } else {
            Some(self.n_events as usize)
        }
    }
}

/// Aligned columns for a range of events, as returned by a [`ColumnStore`].
#[derive(Clone, Debug, Default)]
pub struct ColumnBundle {
    pub features: BTreeMap<String, Vec<Vec<f32>>>,
    pub spectators: BTreeMap<String, Vec<f32>>,
    pub labels: BTreeMap<String, Vec<f32>>,
}

impl ColumnBundle {
    /// Event count of the first column, 0 for an empty bundle.
    pub fn n_events(&self) -> usize {
        if let Some(column) = self.features.values().next() {
            return column.len();
        }
        if let Some(column) = self.spectators.values().next() {
            return column.len();
        }
        self.labels.values().next().map_or(0, |column| column.len())
    }

    /// Check the bundle against a request: every requested branch present,
    /// all columns with the same event count, and within each event all
    /// feature columns of equal length. Any violation is fatal and reported
    /// before event processing starts. Returns the event count.
    pub fn validate(&self, request: &ColumnRequest) -> Result<usize, Box<dyn Error>> {
        let mut counts: Vec<(String, usize)> = Vec::new();

        for name in &request.features {
            match self.features.get(name) {
                Some(column) => counts.push((name.clone(), column.len())),
                None => return Err(format!("missing feature column '{}'", name).into()),
            }
        }
        for name in &request.spectators {
            match self.spectators.get(name) {
                Some(column) => counts.push((name.clone(), column.len())),
                None => return Err(format!("missing spectator column '{}'", name).into()),
            }
        }
        for name in &request.labels {
            match self.labels.get(name) {
                Some(column) => counts.push((name.clone(), column.len())),
                None => return Err(format!("missing label column '{}'", name).into()),
            }
        }

        let n_events = counts.first().map_or(0, |(_, count)| *count);
        for (name, count) in &counts {
            if *count != n_events {
                return Err(format!(
                    "column '{}' has {} events, expected {}",
                    name, count, n_events
                )
                .into());
            }
        }

        // within one event, all feature columns must agree on track count
        for index in 0..n_events {
            let mut track_count: Option<usize> = None;
            for name in &request.features {
                let length = self.features[name][index].len();
                match track_count {
                    None => track_count = Some(length),
                    Some(expected) if expected != length => {
                        return Err(format!(
                            "mismatched column lengths in event {}: feature '{}' has {} tracks, expected {}",
                            index, name, length, expected
                        )
                        .into());
                    }
                    Some(_) => {}
                }
            }
        }

        Ok(n_events)
    }

    /// Materialize one event from the aligned columns.
    pub fn event(&self, index: usize) -> Event {
        let features: BTreeMap<String, Vec<f32>> = self
            .features
            .iter()
            .map(|(name, column)| (name.clone(), column[index].clone()))
            .collect();
        let spectators: BTreeMap<String, f32> = self
            .spectators
            .iter()
            .map(|(name, column)| (name.clone(), column[index]))
            .collect();
        let raw_labels: BTreeMap<String, f32> = self
            .labels
            .iter()
            .map(|(name, column)| (name.clone(), column[index]))
            .collect();
        Event::new(features, spectators, raw_labels)
    }

    /// Build a bundle from a slice of events (fixture/adapter path).
    pub fn from_events(
        events: &[Event],
        feature_names: &[String],
        spectator_names: &[String],
        label_names: &[String],
    ) -> ColumnBundle {
        let mut bundle = ColumnBundle::default();
        for name in feature_names {
            let column: Vec<Vec<f32>> = events
                .iter()
                .map(|event| event.feature(name).unwrap_or(&[]).to_vec())
                .collect();
            bundle.features.insert(name.clone(), column);
        }
        for name in spectator_names {
            let column: Vec<f32> =
                events.iter().map(|event| event.spectator(name).unwrap_or(0.0)).collect();
            bundle.spectators.insert(name.clone(), column);
        }
        for name in label_names {
            let column: Vec<f32> = events.iter().map(|event| event.raw_label(name)).collect();
            bundle.labels.insert(name.clone(), column);
        }
        bundle
    }

    fn truncated(mut self, cap: Option<usize>) -> ColumnBundle {
        if let Some(cap) = cap {
            for column in self.features.values_mut() {
                column.truncate(cap);
            }
            for column in self.spectators.values_mut() {
                column.truncate(cap);
            }
            for column in self.labels.values_mut() {
                column.truncate(cap);
            }
        }
        self
    }
}

/// External boundary to the raw columnar event store.
pub trait ColumnStore {
    fn read_columns(&self, request: &ColumnRequest) -> Result<ColumnBundle, Box<dyn Error>>;
}

/// Columns held directly in memory, for tests and adapters.
pub struct InMemoryColumnStore {
    pub bundle: ColumnBundle,
}

impl InMemoryColumnStore {
    pub fn new(bundle: ColumnBundle) -> Self {
        InMemoryColumnStore { bundle }
    }
}

impl ColumnStore for InMemoryColumnStore {
    fn read_columns(&self, request: &ColumnRequest) -> Result<ColumnBundle, Box<dyn Error>> {
        let mut bundle = ColumnBundle::default();
        for name in &request.features {
            if let Some(column) = self.bundle.features.get(name) {
                bundle.features.insert(name.clone(), column.clone());
            }
        }
        for name in &request.spectators {
            if let Some(column) = self.bundle.spectators.get(name) {
                bundle.spectators.insert(name.clone(), column.clone());
            }
        }
        for name in &request.labels {
            if let Some(column) = self.bundle.labels.get(name) {
                bundle.labels.insert(name.clone(), column.clone());
            }
        }
        Ok(bundle.truncated(request.cap()))
    }
}

/// SQLite-backed jet ntuple store.
///
/// Scalar branches live in `jet_scalars (jet_id, name, value)`; per-track
/// branches are little-endian f32 blobs in `jet_tracks (jet_id, name,
/// compressed, data)`, one row per jet and branch, optionally
/// zstd-compressed. Jet ids are dense and ascending, so ordering by
/// `jet_id` reproduces file order.
pub struct SqliteColumnStore {
    pub data_path: PathBuf,
}

impl SqliteColumnStore {
    pub fn new<P: AsRef<Path>>(data_path: P) -> Self {
        SqliteColumnStore { data_path: data_path.as_ref().to_path_buf() }
    }

    fn read_scalar_column(
        connection: &Connection,
        name: &str,
        cap: Option<usize>,
    ) -> Result<Vec<f32>, Box<dyn Error>> {
        let mut statement =
            connection.prepare("SELECT value FROM jet_scalars WHERE name = ?1 ORDER BY jet_id")?;
        let rows = statement.query_map([name], |row| row.get::<_, f64>(0))?;

        let mut column = Vec::new();
        for value in rows {
            if cap.is_some_and(|cap| column.len() >= cap) {
                break;
            }
            column.push(value? as f32);
        }
        Ok(column)
    }

    fn read_track_column(
        connection: &Connection,
        name: &str,
        cap: Option<usize>,
    ) -> Result<Vec<Vec<f32>>, Box<dyn Error>> {
        let mut statement = connection
            .prepare("SELECT compressed, data FROM jet_tracks WHERE name = ?1 ORDER BY jet_id")?;
        let rows = statement.query_map([name], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, Vec<u8>>(1)?))
        })?;

        let mut column = Vec::new();
        for row in rows {
            if cap.is_some_and(|cap| column.len() >= cap) {
                break;
            }
            let (compressed, blob) = row?;
            let bytes = if compressed != 0 { zstd_decompress(&blob)? } else { blob };
            column.push(decode_f32_column(&bytes)?);
        }
        Ok(column)
    }
}

impl ColumnStore for SqliteColumnStore {
    fn read_columns(&self, request: &ColumnRequest) -> Result<ColumnBundle, Box<dyn Error>> {
        let connection = Connection::open(&self.data_path)?;
        let cap = request.cap();

        let mut bundle = ColumnBundle::default();
        for name in &request.features {
            if bundle.features.contains_key(name) {
                continue;
            }
            let column = Self::read_track_column(&connection, name, cap)?;
            if !column.is_empty() {
                bundle.features.insert(name.clone(), column);
            }
        }
        for name in &request.spectators {
            let column = Self::read_scalar_column(&connection, name, cap)?;
            if !column.is_empty() {
                bundle.spectators.insert(name.clone(), column);
            }
        }
        for name in &request.labels {
            let column = Self::read_scalar_column(&connection, name, cap)?;
            if !column.is_empty() {
                bundle.labels.insert(name.clone(), column);
            }
        }
        Ok(bundle)
    }
}

/// Write a bundle as a SQLite jet ntuple store, creating the schema.
pub fn write_sqlite_store<P: AsRef<Path>>(
    path: P,
    bundle: &ColumnBundle,
    compress: bool,
) -> Result<(), Box<dyn Error>> {
    let mut connection = Connection::open(path.as_ref())?;
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS jets (id INTEGER PRIMARY KEY);
         CREATE TABLE IF NOT EXISTS jet_scalars (
             jet_id INTEGER NOT NULL,
             name TEXT NOT NULL,
             value REAL NOT NULL
         );
         CREATE TABLE IF NOT EXISTS jet_tracks (
             jet_id INTEGER NOT NULL,
             name TEXT NOT NULL,
             compressed INTEGER NOT NULL,
             data BLOB NOT NULL
         );
         CREATE INDEX IF NOT EXISTS idx_jet_scalars ON jet_scalars (name, jet_id);
         CREATE INDEX IF NOT EXISTS idx_jet_tracks ON jet_tracks (name, jet_id);",
    )?;

    let transaction = connection.transaction()?;
    for jet_id in 0..bundle.n_events() {
        transaction.execute("INSERT INTO jets (id) VALUES (?1)", [jet_id as i64])?;
    }
    for (name, column) in bundle.spectators.iter().chain(bundle.labels.iter()) {
        for (jet_id, value) in column.iter().enumerate() {
            transaction.execute(
                "INSERT INTO jet_scalars (jet_id, name, value) VALUES (?1, ?2, ?3)",
                rusqlite::params![jet_id as i64, name, *value as f64],
            )?;
        }
    }
    for (name, column) in &bundle.features {
        for (jet_id, values) in column.iter().enumerate() {
            let encoded = encode_f32_column(values);
            let blob = if compress { zstd_compress(&encoded, 3)? } else { encoded };
            transaction.execute(
                "INSERT INTO jet_tracks (jet_id, name, compressed, data) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![jet_id as i64, name, compress as i64, blob],
            )?;
        }
    }
    transaction.commit()?;
    Ok(())
}
