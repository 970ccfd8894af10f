//! Disk persistence for graphs.
//!
//! Snapshots are written to `<path>.tmp` and renamed into place, so a crash
//! mid-write never leaves a truncated file under the final name. Integrity is
//! covered by the CRC32 trailer of the snapshot format itself.

use crate::error::Result;
use crate::hnsw::distance::Distance;
use crate::hnsw::graph::Graph;
use crate::hnsw::options::GraphOptions;
use crate::hnsw::readonly::ReadOnlyGraph;
use crate::storage::snapshot::SnapshotSummary;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Save a graph snapshot to `path` with an atomic write.
pub fn save_snapshot<T, D>(graph: &Graph<T, D>, path: &Path) -> Result<SnapshotSummary>
where
    T: Serialize,
    D: Distance<T>,
{
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let tmp = tmp_path(path);

    let summary = {
        let file = File::create(&tmp)?;
        let mut writer = BufWriter::new(file);
        let summary = graph.serialize(&mut writer)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        summary
    };
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600))?;
    }
    fs::rename(&tmp, path)?;

    tracing::info!(
        "Saved graph to {:?} ({} nodes, {} bytes, CRC32={:#010x})",
        path,
        graph.len(),
        summary.bytes,
        summary.crc
    );
    Ok(summary)
}

/// Load a mutable graph from a snapshot file.
pub fn load_graph<T, D>(path: &Path, options: GraphOptions, distance: D) -> Result<Graph<T, D>>
where
    T: DeserializeOwned,
    D: Distance<T>,
{
    let reader = BufReader::new(File::open(path)?);
    let graph = Graph::deserialize(reader, options, distance)?;
    tracing::info!("Loaded graph from {:?} ({} nodes)", path, graph.len());
    Ok(graph)
}

/// Open a snapshot file as a read-only graph.
pub fn open_read_only_file<T, D>(
    path: &Path,
    options: GraphOptions,
    distance: D,
) -> Result<ReadOnlyGraph<T, D>>
where
    T: DeserializeOwned,
    D: Distance<T>,
{
    let reader = BufReader::new(File::open(path)?);
    let graph = ReadOnlyGraph::open(reader, options, distance)?;
    tracing::info!(
        "Opened read-only graph from {:?} ({} nodes)",
        path,
        graph.len()
    );
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GraphError;
    use crate::hnsw::distance::Metric;

    fn options() -> GraphOptions {
        GraphOptions::default()
            .with_m(4)
            .with_layers_count(4)
            .with_seed(11)
    }

    fn sample_graph() -> Graph<Vec<f32>, Metric> {
        let graph = Graph::new(options(), Metric::Euclidean).unwrap();
        graph.append((0..40).map(|i| vec![i as f32, (i * 7 % 13) as f32]));
        graph
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("graph.nav");
        let graph = sample_graph();

        let summary = save_snapshot(&graph, &path).unwrap();
        assert!(path.exists());
        assert!(!tmp_path(&path).exists());
        assert_eq!(fs::metadata(&path).unwrap().len(), summary.bytes);

        let loaded: Graph<Vec<f32>, Metric> = load_graph(&path, options(), Metric::Euclidean).unwrap();
        let query = vec![3.5, 2.0];
        assert_eq!(graph.search(&query, 5), loaded.search(&query, 5));

        let frozen: ReadOnlyGraph<Vec<f32>, Metric> =
            open_read_only_file(&path, options(), Metric::Euclidean).unwrap();
        assert_eq!(graph.search(&query, 5), frozen.search(&query, 5));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result: Result<Graph<Vec<f32>, Metric>> =
            load_graph(&dir.path().join("absent.nav"), options(), Metric::Euclidean);
        assert!(matches!(result, Err(GraphError::Io(_))));
    }

    #[test]
    fn test_overwrite_existing_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.nav");
        fs::write(&path, b"stale").unwrap();
        save_snapshot(&sample_graph(), &path).unwrap();
        let loaded: Graph<Vec<f32>, Metric> = load_graph(&path, options(), Metric::Euclidean).unwrap();
        assert_eq!(loaded.len(), 40);
    }
}
