/// Lore system version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum candidates taken from the vector path before fusion.
pub const DEFAULT_VECTOR_TOP_K: usize = 20;

/// Maximum candidates taken from the lexical path before fusion.
pub const DEFAULT_LEXICAL_TOP_K: usize = 20;

/// RRF smoothing constant.
pub const DEFAULT_RRF_K: u32 = 60;

/// Weight of the vector path in fusion.
pub const DEFAULT_VECTOR_WEIGHT: f64 = 0.5;

/// Weight of the lexical path in fusion.
pub const DEFAULT_LEXICAL_WEIGHT: f64 = 0.5;

/// Number of passages returned to the caller.
pub const DEFAULT_FINAL_TOP_K: usize = 5;

/// BM25 term-saturation constant.
pub const DEFAULT_BM25_K1: f64 = 1.5;

/// BM25 length-normalization constant.
pub const DEFAULT_BM25_B: f64 = 0.75;

/// Maximum initialization attempts per resource kind.
pub const DEFAULT_MAX_INIT_ATTEMPTS: u32 = 3;

/// Base (seconds) for exponential backoff between init attempts.
pub const DEFAULT_RETRY_DELAY_BASE_SECS: u64 = 2;

/// The knowledge base that always exists and cannot be deleted.
pub const DEFAULT_KB_NAME: &str = "source_documents";

/// Magic bytes at the head of every persisted lexical index file.
pub const LEXICAL_CACHE_MAGIC: [u8; 4] = *b"LORE";

/// Format version of the persisted lexical index file.
pub const LEXICAL_CACHE_VERSION: u32 = 1;
