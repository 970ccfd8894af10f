//! Dense vector files: `u32 count, u32 dim`, then `count * dim` f32 values,
//! all little-endian.

use byteorder::{LittleEndian, ReadBytesExt};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

/// Read every vector from `path`.
pub fn read_vectors(path: &Path) -> io::Result<Vec<Vec<f32>>> {
    let mut reader = BufReader::new(File::open(path)?);
    read_from(&mut reader)
}

fn read_from<R: Read>(reader: &mut R) -> io::Result<Vec<Vec<f32>>> {
    let count = reader.read_u32::<LittleEndian>()? as usize;
    let dim = reader.read_u32::<LittleEndian>()? as usize;
    if dim == 0 && count > 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "zero-dimensional vectors",
        ));
    }

    let mut vectors = Vec::with_capacity(count.min(1 << 20));
    for _ in 0..count {
        let mut v = vec![0f32; dim];
        reader.read_f32_into::<LittleEndian>(&mut v)?;
        vectors.push(v);
    }
    Ok(vectors)
}

#[cfg(test)]
pub(crate) fn write_vectors(path: &Path, vectors: &[Vec<f32>]) -> io::Result<()> {
    use byteorder::WriteBytesExt;
    use std::io::{BufWriter, Write};

    let mut w = BufWriter::new(File::create(path)?);
    let dim = vectors.first().map_or(0, |v| v.len());
    w.write_u32::<LittleEndian>(vectors.len() as u32)?;
    w.write_u32::<LittleEndian>(dim as u32)?;
    for v in vectors {
        for &x in v {
            w.write_f32::<LittleEndian>(x)?;
        }
    }
    w.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("v.bin");
        let data = vec![vec![1.0, 2.0, 3.0], vec![-1.0, 0.5, 0.25]];
        write_vectors(&path, &data).unwrap();
        assert_eq!(read_vectors(&path).unwrap(), data);
    }

    #[test]
    fn test_truncated_file() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&2u32.to_le_bytes());
        bytes.extend_from_slice(&2u32.to_le_bytes());
        bytes.extend_from_slice(&1f32.to_le_bytes());
        let err = read_from(&mut bytes.as_slice()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_zero_dim_rejected() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&3u32.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        assert!(read_from(&mut bytes.as_slice()).is_err());
    }
}
