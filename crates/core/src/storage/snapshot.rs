//! Canonical binary snapshot codec (format version 1).
//!
//! Layout, little-endian throughout:
//!
//! ```text
//! magic        4 bytes  "NAVG"
//! version      u8
//! entry_point  i32      -1 when empty
//! max_layer    i32
//! items        u32 count, then per item: u32 length + bincode payload
//! layers       i32 count, then per layer:
//!                u32 record count, then per record:
//!                  u32 node, u32 neighbour count, u32 neighbour ids
//! checksum     u32      CRC32 of every preceding byte
//! ```
//!
//! Decoding validates every id and reports the section where it failed.
//! Nothing partially decoded is ever handed back.

use crate::config;
use crate::error::{GraphError, Result, SnapshotSection};
use crate::hnsw::layer::Adjacency;
use crate::hnsw::store::{NodeId, VectorStore};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{self, Read, Write};

/// Adjacency records of one level: `(node, neighbour ids)` ascending by node.
pub(crate) type LayerRecords = Vec<(NodeId, Vec<NodeId>)>;

/// Decoded, validated snapshot contents.
#[derive(Debug)]
pub(crate) struct SnapshotParts<T> {
    pub entry_point: Option<NodeId>,
    pub max_layer: usize,
    pub items: Vec<T>,
    pub layers: Vec<LayerRecords>,
}

/// Totals reported after a successful write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotSummary {
    pub bytes: u64,
    pub crc: u32,
}

/// Writer adapter hashing everything that passes through.
struct ChecksumWriter<W> {
    inner: W,
    hasher: crc32fast::Hasher,
    written: u64,
}

impl<W: Write> Write for ChecksumWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Reader adapter hashing everything that passes through.
struct ChecksumReader<R> {
    inner: R,
    hasher: crc32fast::Hasher,
}

impl<R: Read> Read for ChecksumReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }
}

/// Map an IO failure while decoding `section` to a snapshot error.
fn in_section<T>(section: SnapshotSection, res: io::Result<T>) -> Result<T> {
    res.map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => GraphError::snapshot(section, "unexpected end of data"),
        _ => GraphError::snapshot(section, e.to_string()),
    })
}

/// Narrow `value` to a fixed-width field of the format.
fn field<N: TryFrom<usize>>(value: usize, section: SnapshotSection, what: &str) -> Result<N> {
    N::try_from(value)
        .map_err(|_| GraphError::snapshot(section, format!("{what} {value} does not fit the format")))
}

/// Encode a graph into `writer`.
pub(crate) fn write_snapshot<W, T, A>(
    writer: W,
    entry_point: Option<NodeId>,
    max_layer: usize,
    store: &VectorStore<T>,
    layers: &[A],
) -> Result<SnapshotSummary>
where
    W: Write,
    T: Serialize,
    A: Adjacency,
{
    let mut out = ChecksumWriter {
        inner: writer,
        hasher: crc32fast::Hasher::new(),
        written: 0,
    };

    out.write_all(config::SNAPSHOT_MAGIC)?;
    out.write_u8(config::SNAPSHOT_VERSION)?;
    let entry = match entry_point {
        Some(ep) => field::<i32>(ep as usize, SnapshotSection::EntryPoint, "entry point")?,
        None => -1,
    };
    out.write_i32::<LittleEndian>(entry)?;
    out.write_i32::<LittleEndian>(field(max_layer, SnapshotSection::EntryPoint, "max layer")?)?;

    out.write_u32::<LittleEndian>(field(store.len(), SnapshotSection::VectorStore, "item count")?)?;
    for (id, item) in store.iter() {
        let payload = bincode::serialize(item)?;
        if payload.len() > config::MAX_SNAPSHOT_ITEM_BYTES {
            return Err(GraphError::snapshot(
                SnapshotSection::VectorStore,
                format!("item {id} encodes to {} bytes", payload.len()),
            ));
        }
        out.write_u32::<LittleEndian>(payload.len() as u32)?;
        out.write_all(&payload)?;
    }

    out.write_i32::<LittleEndian>(field(layers.len(), SnapshotSection::Layers, "layer count")?)?;
    for links in layers {
        let nodes = links.node_ids();
        out.write_u32::<LittleEndian>(field(nodes.len(), SnapshotSection::Layers, "record count")?)?;
        for node in nodes {
            let neighbours = links.neighbour_ids(node);
            out.write_u32::<LittleEndian>(node)?;
            out.write_u32::<LittleEndian>(field(neighbours.len(), SnapshotSection::Layers, "degree")?)?;
            for id in neighbours {
                out.write_u32::<LittleEndian>(id)?;
            }
        }
    }

    let ChecksumWriter {
        mut inner,
        hasher,
        written,
    } = out;
    let crc = hasher.finalize();
    inner.write_u32::<LittleEndian>(crc)?;
    inner.flush()?;

    Ok(SnapshotSummary {
        bytes: written + 4,
        crc,
    })
}

/// Decode and validate a snapshot from `reader`.
pub(crate) fn read_snapshot<R, T>(reader: R) -> Result<SnapshotParts<T>>
where
    R: Read,
    T: DeserializeOwned,
{
    let mut input = ChecksumReader {
        inner: reader,
        hasher: crc32fast::Hasher::new(),
    };

    // ── Header ──
    let mut magic = [0u8; 4];
    in_section(SnapshotSection::Header, input.read_exact(&mut magic))?;
    if &magic != config::SNAPSHOT_MAGIC {
        return Err(GraphError::snapshot(
            SnapshotSection::Header,
            format!("bad magic {magic:?}"),
        ));
    }
    let version = in_section(SnapshotSection::Header, input.read_u8())?;
    if version != config::SNAPSHOT_VERSION {
        return Err(GraphError::snapshot(
            SnapshotSection::Header,
            format!("unsupported version {version}"),
        ));
    }

    // ── Entry point ──
    let raw_entry = in_section(SnapshotSection::EntryPoint, input.read_i32::<LittleEndian>())?;
    let raw_max_layer = in_section(SnapshotSection::EntryPoint, input.read_i32::<LittleEndian>())?;
    if raw_entry < -1 {
        return Err(GraphError::snapshot(
            SnapshotSection::EntryPoint,
            format!("invalid entry point {raw_entry}"),
        ));
    }
    if raw_max_layer < 0 {
        return Err(GraphError::snapshot(
            SnapshotSection::EntryPoint,
            format!("negative max layer {raw_max_layer}"),
        ));
    }
    let entry_point = (raw_entry >= 0).then_some(raw_entry as NodeId);
    let max_layer = raw_max_layer as usize;

    // ── Items ──
    let count = in_section(SnapshotSection::VectorStore, input.read_u32::<LittleEndian>())? as usize;
    let mut items = Vec::with_capacity(count.min(1 << 16));
    let mut buf = Vec::new();
    for i in 0..count {
        let len = in_section(SnapshotSection::VectorStore, input.read_u32::<LittleEndian>())? as usize;
        if len > config::MAX_SNAPSHOT_ITEM_BYTES {
            return Err(GraphError::snapshot(
                SnapshotSection::VectorStore,
                format!("item {i} claims {len} bytes"),
            ));
        }
        buf.resize(len, 0);
        in_section(SnapshotSection::VectorStore, input.read_exact(&mut buf))?;
        let item: T = bincode::deserialize(&buf).map_err(|e| {
            GraphError::snapshot(SnapshotSection::VectorStore, format!("item {i}: {e}"))
        })?;
        items.push(item);
    }

    match entry_point {
        None if count > 0 => {
            return Err(GraphError::snapshot(
                SnapshotSection::EntryPoint,
                format!("no entry point for {count} items"),
            ))
        }
        Some(ep) if ep as usize >= count => {
            return Err(GraphError::snapshot(
                SnapshotSection::EntryPoint,
                format!("entry point {ep} out of range (count={count})"),
            ))
        }
        _ => {}
    }

    // ── Layers ──
    let layer_count = in_section(SnapshotSection::Layers, input.read_i32::<LittleEndian>())?;
    if layer_count < 1 || layer_count as usize > config::MAX_LAYERS_COUNT {
        return Err(GraphError::snapshot(
            SnapshotSection::Layers,
            format!("layer count {layer_count} outside 1..={}", config::MAX_LAYERS_COUNT),
        ));
    }
    let layer_count = layer_count as usize;
    if max_layer >= layer_count {
        return Err(GraphError::snapshot(
            SnapshotSection::Layers,
            format!("max layer {max_layer} but only {layer_count} layers"),
        ));
    }

    let mut layers = Vec::with_capacity(layer_count);
    for level in 0..layer_count {
        let records = in_section(SnapshotSection::Layers, input.read_u32::<LittleEndian>())? as usize;
        if records > count {
            return Err(GraphError::snapshot(
                SnapshotSection::Layers,
                format!("level {level} has {records} records for {count} items"),
            ));
        }
        let mut layer: LayerRecords = Vec::with_capacity(records);
        for _ in 0..records {
            let node = in_section(SnapshotSection::Layers, input.read_u32::<LittleEndian>())?;
            let degree = in_section(SnapshotSection::Layers, input.read_u32::<LittleEndian>())? as usize;
            if node as usize >= count || degree > count {
                return Err(GraphError::snapshot(
                    SnapshotSection::Layers,
                    format!("level {level}: bad record for node {node} (degree {degree})"),
                ));
            }
            let mut neighbours = Vec::with_capacity(degree);
            for _ in 0..degree {
                let id = in_section(SnapshotSection::Layers, input.read_u32::<LittleEndian>())?;
                if id as usize >= count {
                    return Err(GraphError::snapshot(
                        SnapshotSection::Layers,
                        format!("level {level}: neighbour {id} of node {node} out of range"),
                    ));
                }
                neighbours.push(id);
            }
            layer.push((node, neighbours));
        }
        layers.push(layer);
    }

    if let Some(ep) = entry_point {
        if !layers[max_layer].iter().any(|(node, _)| *node == ep) {
            return Err(GraphError::snapshot(
                SnapshotSection::Layers,
                format!("entry point {ep} missing from level {max_layer}"),
            ));
        }
    }

    // ── Checksum ──
    let ChecksumReader { mut inner, hasher } = input;
    let computed = hasher.finalize();
    let stored = in_section(SnapshotSection::Checksum, inner.read_u32::<LittleEndian>())?;
    if stored != computed {
        return Err(GraphError::snapshot(
            SnapshotSection::Checksum,
            format!("CRC32 mismatch: stored {stored:#010x}, computed {computed:#010x}"),
        ));
    }

    check_structure(count, max_layer, &layers)?;

    Ok(SnapshotParts {
        entry_point,
        max_layer,
        items,
        layers,
    })
}

/// Rules every decoded graph must follow: each node listed once per level,
/// every item on level 0, every node on level `l > 0` also on `l - 1`, no
/// nodes above `max_layer`, and links only to distinct other nodes of the
/// same level.
fn check_structure(count: usize, max_layer: usize, layers: &[LayerRecords]) -> Result<()> {
    let invalid = |reason: String| Err(GraphError::snapshot(SnapshotSection::Layers, reason));
    let mut below: Option<Vec<bool>> = None;

    for (level, records) in layers.iter().enumerate() {
        if level > max_layer && !records.is_empty() {
            return invalid(format!(
                "level {level} is above max layer {max_layer} but has {} nodes",
                records.len()
            ));
        }

        let mut present = vec![false; count];
        for (node, _) in records {
            let slot = &mut present[*node as usize];
            if *slot {
                return invalid(format!("level {level}: node {node} listed twice"));
            }
            *slot = true;
        }

        for (node, neighbours) in records {
            if let Some(lower) = &below {
                if !lower[*node as usize] {
                    return invalid(format!(
                        "node {node} is on level {level} but not on level {}",
                        level - 1
                    ));
                }
            }
            if let Some(id) = neighbours.iter().find(|&&id| id == *node || !present[id as usize]) {
                return invalid(format!(
                    "level {level}: node {node} links to {id}, which is not another node of the level"
                ));
            }
            let mut sorted = neighbours.clone();
            sorted.sort_unstable();
            if sorted.windows(2).any(|w| w[0] == w[1]) {
                return invalid(format!("level {level}: node {node} repeats a neighbour"));
            }
        }

        if level == 0 {
            if let Some(missing) = present.iter().position(|&p| !p) {
                return invalid(format!("item {missing} is on no level"));
            }
        }
        below = Some(present);
    }
    Ok(())
}
