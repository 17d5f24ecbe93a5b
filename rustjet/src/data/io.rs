use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use jetcore::data::graph::JetGraph;

/// Versioned on-disk wrapper for one persisted graph batch.
#[derive(Serialize, Deserialize)]
pub struct GraphBatchFile {
    pub version: u32,
    pub graphs: Vec<JetGraph>,
}

impl GraphBatchFile {
    pub fn new(graphs: Vec<JetGraph>) -> Self {
        Self { version: 1, graphs }
    }
}

/// Batch file name, keyed by the index of the last event in the batch.
pub fn batch_file_name(batch_id: usize) -> String {
    format!("graph_data_{}.bin", batch_id)
}

// --- Bincode + optional zstd compression ---
pub fn save_graph_batch(path: &Path, graphs: &[JetGraph], compress: bool) -> io::Result<()> {
    let f = File::create(path)?;
    if compress {
        let mut zw = zstd::Encoder::new(f, 3)?;
        bincode::serialize_into(&mut zw, &GraphBatchFile::new(graphs.to_vec()))
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        zw.finish()?;
        Ok(())
    } else {
        let mut bw = BufWriter::new(f);
        bincode::serialize_into(&mut bw, &GraphBatchFile::new(graphs.to_vec()))
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }
}

pub fn load_graph_batch(path: &Path) -> io::Result<Vec<JetGraph>> {
    let f = File::open(path)?;
    // Try zstd first, then plain bincode
    if let Ok(mut zr) = zstd::Decoder::new(&f) {
        if let Ok(batch) = bincode::deserialize_from::<_, GraphBatchFile>(&mut zr) {
            return Ok(batch.graphs);
        }
    }
    let f = BufReader::new(File::open(path)?);
    let batch: GraphBatchFile = bincode::deserialize_from(f)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    Ok(batch.graphs)
}

/// Companion enumeration of all persisted batch identifiers, in ascending
/// order. Concatenating the batches in this order reproduces the full kept
/// record sequence.
#[derive(Serialize, Deserialize)]
pub struct BatchManifest {
    pub version: u32,
    pub batch_ids: Vec<usize>,
}

pub fn manifest_path(processed_dir: &Path) -> PathBuf {
    processed_dir.join("manifest.json")
}

pub fn write_manifest(processed_dir: &Path, batch_ids: &[usize]) -> io::Result<()> {
    let f = BufWriter::new(File::create(manifest_path(processed_dir))?);
    let manifest = BatchManifest { version: 1, batch_ids: batch_ids.to_vec() };
    serde_json::to_writer_pretty(f, &manifest)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
}

pub fn read_manifest(processed_dir: &Path) -> io::Result<Vec<usize>> {
    let f = BufReader::new(File::open(manifest_path(processed_dir))?);
    let manifest: BatchManifest =
        serde_json::from_reader(f).map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    Ok(manifest.batch_ids)
}

/// Load and concatenate all persisted batches in ascending identifier
/// order, reconstructing the full kept-graph sequence.
pub fn load_all_graphs(processed_dir: &Path) -> io::Result<Vec<JetGraph>> {
    let mut batch_ids = read_manifest(processed_dir)?;
    batch_ids.sort_unstable();

    let mut graphs = Vec::new();
    for batch_id in batch_ids {
        graphs.extend(load_graph_batch(&processed_dir.join(batch_file_name(batch_id)))?);
    }
    Ok(graphs)
}

/// Accumulates graphs into fixed-size batches and persists each one once it
/// fills up. `finish` flushes the final partial batch and writes the
/// manifest; ending a run without it loses the tail of the input.
pub struct GraphBatchWriter {
    processed_dir: PathBuf,
    merge_threshold: usize,
    compress: bool,
    buffer: Vec<JetGraph>,
    flushed: Vec<usize>,
}

impl GraphBatchWriter {
    pub fn new(processed_dir: &Path, merge_threshold: usize, compress: bool) -> io::Result<Self> {
        if merge_threshold == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "merge threshold must be at least 1",
            ));
        }
        std::fs::create_dir_all(processed_dir)?;
        Ok(GraphBatchWriter {
            processed_dir: processed_dir.to_path_buf(),
            merge_threshold,
            compress,
            buffer: Vec::with_capacity(merge_threshold),
            flushed: Vec::new(),
        })
    }

    pub fn append(&mut self, graph: JetGraph) -> io::Result<()> {
        self.buffer.push(graph);
        if self.is_full() {
            self.flush()?;
        }
        Ok(())
    }

    pub fn is_full(&self) -> bool {
        self.buffer.len() >= self.merge_threshold
    }

    /// Persist the buffered graphs, keyed by the last buffered source event
    /// index, and start a fresh buffer. A no-op on an empty buffer.
    pub fn flush(&mut self) -> io::Result<()> {
        let batch_id = match self.buffer.last() {
            Some(graph) => graph.event_index,
            None => return Ok(()),
        };
        let path = self.processed_dir.join(batch_file_name(batch_id));
        save_graph_batch(&path, &self.buffer, self.compress)?;
        self.flushed.push(batch_id);
        self.buffer.clear();
        Ok(())
    }

    /// Flush the final partial batch and write the manifest; returns the
    /// persisted batch identifiers in flush order.
    pub fn finish(mut self) -> io::Result<Vec<usize>> {
        self.flush()?;
        write_manifest(&self.processed_dir, &self.flushed)?;
        Ok(self.flushed)
    }
}
