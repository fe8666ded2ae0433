use reef_common::{REEF_DEBUG_ASSIGN_ENDPOINT, REEF_DEBUG_FILER_ENDPOINT};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where `lookup_volume` and `update_entry` are served.
    pub filer_endpoint: String,
    /// Where new blob file ids are assigned ahead of an upload.
    pub assign_endpoint: String,

    /// Upper bound on concurrent sub-reads per scattered read.
    pub read_parallelism: usize,

    /// Zero-fill holes in sparse files instead of truncating the read at
    /// the first gap. Off by default: the truncating behavior is what the
    /// rest of the system expects.
    pub zero_fill_read_holes: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            filer_endpoint: REEF_DEBUG_FILER_ENDPOINT.to_string(),
            assign_endpoint: REEF_DEBUG_ASSIGN_ENDPOINT.to_string(),
            read_parallelism: reef_utils::num_cpus(),
            zero_fill_read_holes: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip() {
        let config = Config::default();
        let encoded = serde_json::to_string(&config).unwrap();
        let decoded: Config = serde_json::from_str(&encoded).unwrap();
        assert_eq!(config.filer_endpoint, decoded.filer_endpoint);
        assert_eq!(config.read_parallelism, decoded.read_parallelism);
        assert!(!decoded.zero_fill_read_holes);
    }
}
