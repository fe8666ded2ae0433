pub const REEF: &str = "reeffs";

/// Default endpoints used by the debug/test configuration.
pub const REEF_DEBUG_FILER_ENDPOINT: &str = "http://localhost:8888";
pub const REEF_DEBUG_ASSIGN_ENDPOINT: &str = "http://localhost:9333/dir/assign";

/// A blob file id looks like "3,01637037d6": the part before the last
/// separator is the volume id, the rest names the needle inside it.
pub const FILE_ID_SEPARATOR: char = ',';

/// File handle number handed out to the FUSE bridge.
pub type FH = u64;

/// Logical offset inside a file.
pub type FileOffset = i64;
