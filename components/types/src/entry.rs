use serde::{Deserialize, Serialize};

use crate::chunk::Chunk;

/// The subset of entry attributes this layer reads and maintains. The filer
/// stores more; unknown fields survive on its side untouched.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileAttributes {
    pub crtime: i64,
    pub mtime: i64,
    pub file_mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub file_size: u64,
}

/// A file entry as persisted by the filer: its name, attributes, and the
/// full append-only chunk log.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub name: String,
    pub attributes: FileAttributes,
    pub chunks: Vec<Chunk>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attributes_round_trip() {
        let entry = Entry {
            name: "a.txt".to_string(),
            attributes: FileAttributes {
                crtime: 1,
                mtime: 2,
                file_mode: 0o644,
                uid: 1000,
                gid: 1000,
                file_size: 300,
            },
            chunks: vec![Chunk::new("3,01637037d6", 0, 300, 2)],
        };
        let encoded = serde_json::to_string(&entry).unwrap();
        let decoded: Entry = serde_json::from_str(&encoded).unwrap();
        assert_eq!(entry, decoded);
    }
}
