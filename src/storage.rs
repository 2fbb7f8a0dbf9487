//! Graph file format.
//!
//! Layout: magic (4 bytes) | version (u32 LE) | payload length (u64 LE) |
//! CRC-64 of payload (u64 LE) | bincode payload.

use crc::{Crc, CRC_64_GO_ISO};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::error::GraphError;
use crate::graph::RouteGraph;

const MAGIC: &[u8; 4] = b"ORSG";
const VERSION: u32 = 3;
const HEADER_LEN: usize = 4 + 4 + 8 + 8;

const CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_GO_ISO);

pub fn checksum(data: &[u8]) -> u64 {
    CRC64.checksum(data)
}

pub fn encode(graph: &RouteGraph) -> Result<Vec<u8>, GraphError> {
    let payload = bincode::serialize(graph)?;
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    out.extend_from_slice(&checksum(&payload).to_le_bytes());
    out.extend_from_slice(&payload);
    Ok(out)
}

pub fn decode(bytes: &[u8]) -> Result<RouteGraph, GraphError> {
    if bytes.len() < HEADER_LEN {
        return Err(GraphError::Corrupt("file shorter than header".into()));
    }
    if &bytes[0..4] != MAGIC {
        return Err(GraphError::Corrupt("bad magic".into()));
    }
    let version = u32::from_le_bytes(read_array(&bytes[4..8]));
    if version != VERSION {
        return Err(GraphError::Corrupt(format!(
            "unsupported version {version}, expected {VERSION}"
        )));
    }
    let len = u64::from_le_bytes(read_array(&bytes[8..16])) as usize;
    let expected = u64::from_le_bytes(read_array(&bytes[16..24]));
    let payload = &bytes[HEADER_LEN..];
    if payload.len() != len {
        return Err(GraphError::Corrupt(format!(
            "payload length {} does not match header {len}",
            payload.len()
        )));
    }
    let actual = checksum(payload);
    if actual != expected {
        return Err(GraphError::Corrupt(format!(
            "checksum mismatch: expected {expected:016x}, got {actual:016x}"
        )));
    }

    let mut graph: RouteGraph = bincode::deserialize(payload)?;
    graph.rebuild_adjacency();
    Ok(graph)
}

fn read_array<const N: usize>(slice: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(slice);
    out
}

pub fn save<P: AsRef<Path>>(graph: &RouteGraph, path: P) -> Result<(), GraphError> {
    let bytes = encode(graph)?;
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    writer.write_all(&bytes)?;
    writer.flush()?;
    tracing::info!(path = %path.as_ref().display(), bytes = bytes.len(), "saved graph");
    Ok(())
}

pub fn load<P: AsRef<Path>>(path: P) -> Result<RouteGraph, GraphError> {
    let mut reader = BufReader::new(File::open(path.as_ref())?);
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    let graph = decode(&bytes)?;
    tracing::info!(
        path = %path.as_ref().display(),
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        "loaded graph"
    );
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::OsmData;
    use crate::profiles::Profile;

    fn graph() -> RouteGraph {
        let mut data = OsmData::default();
        data.add_node(1, 8.0, 49.0);
        data.add_node_with_ele(2, 8.001, 49.0, 120.0);
        data.add_node(3, 8.002, 49.001);
        data.add_way(1, &[1, 2, 3], &[("highway", "residential")]);
        RouteGraph::from_osm(&data, &[Profile::DrivingCar]).unwrap()
    }

    #[test]
    fn test_save_load_preserves_graph() {
        let g = graph();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.bin");
        save(&g, &path).unwrap();
        let loaded = load(&path).unwrap();
        assert_eq!(loaded.nodes, g.nodes);
        assert_eq!(loaded.edges, g.edges);
        assert_eq!(loaded.timestamp, g.timestamp);
        assert_eq!(loaded.incident(1).len(), 2);
    }

    #[test]
    fn test_flipped_byte_fails_checksum() {
        let mut bytes = encode(&graph()).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        let err = decode(&bytes).unwrap_err();
        assert!(matches!(err, GraphError::Corrupt(ref m) if m.contains("checksum")));
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = encode(&graph()).unwrap();
        bytes[0] = b'X';
        assert!(matches!(decode(&bytes), Err(GraphError::Corrupt(_))));
        assert!(matches!(decode(b"ORS"), Err(GraphError::Corrupt(_))));
    }
}
