//! Shared constants for Shortpath components.

/// Default HTTP listen address
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";

/// Default Redis connection URL
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

/// Hostname the service is reachable under; links pointing back at it are refused
pub const DEFAULT_PUBLIC_HOST: &str = "localhost";

/// Maximum number of segments in a path (root = depth 0)
pub const MAX_PATH_DEPTH: usize = 5;

/// Maximum length of a single path segment
pub const MAX_SEGMENT_LENGTH: usize = 20;

/// Top-level segments owned by the service's own routes
pub const RESERVED_PREFIXES: &[&str] = &["static", "api"];

/// Liveness check timeout for submitted redirect targets (milliseconds)
pub const DEFAULT_URL_CHECK_TIMEOUT_MS: u64 = 5_000;

/// Challenge lifetime in seconds (10 minutes)
pub const CHALLENGE_TTL_SECS: u64 = 600;

/// Upper bound on challenges held in memory at once
pub const MAX_SAVED_ANSWERS: usize = 1000;

/// Length of generated challenge ids
pub const CHALLENGE_ID_LENGTH: usize = 10;

/// Alphabet challenge ids are drawn from
pub const CHALLENGE_ID_ALPHABET: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Longest raw path string worth splitting: every segment at full length plus its slash.
pub const fn max_path_length(max_depth: usize, max_segment_length: usize) -> usize {
    max_depth * (max_segment_length + 1)
}

/// Redis key prefixes
pub mod redis_keys {
    /// Node record hash: shortpath:node:{node_id}
    pub const NODE_PREFIX: &str = "shortpath:node:";

    /// Sibling index hash (segment -> node id): shortpath:children:{parent_id|root}
    pub const CHILDREN_PREFIX: &str = "shortpath:children:";

    /// Sibling index of top-level nodes
    pub const ROOT_CHILDREN: &str = "shortpath:children:root";

    /// Node id counter
    pub const NEXT_NODE_ID: &str = "shortpath:next_node_id";
}
