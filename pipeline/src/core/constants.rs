// =============================================================================
// Application Identity
// =============================================================================

/// Application name in title case (for display and platform directories)
pub const APP_NAME: &str = "Macrofeed";

/// Application name in lowercase (for paths and identifiers)
pub const APP_NAME_LOWER: &str = "macrofeed";

/// Unix-style dotfile folder name
pub const APP_DOT_FOLDER: &str = ".macrofeed";

// =============================================================================
// Configuration Files
// =============================================================================

/// Config file name
pub const CONFIG_FILE_NAME: &str = "macrofeed.json";

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "MACROFEED_CONFIG";

// =============================================================================
// Environment Variables
// =============================================================================

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "MACROFEED_LOG";

/// Environment variable to override the data directory
pub const ENV_DATA_DIR: &str = "MACROFEED_DATA_DIR";

/// Environment variable for the statistics API endpoint
pub const ENV_API_ENDPOINT: &str = "MACROFEED_API_ENDPOINT";

/// Environment variable for the statistics API registration key
pub const ENV_API_KEY: &str = "MACROFEED_API_KEY";

/// Environment variable for the ingestion start year
pub const ENV_START_YEAR: &str = "MACROFEED_START_YEAR";

/// Environment variable for the ingestion end year
pub const ENV_END_YEAR: &str = "MACROFEED_END_YEAR";

/// Environment variable for the fetch batch size
pub const ENV_BATCH_SIZE: &str = "MACROFEED_BATCH_SIZE";

/// Environment variable for the inter-batch rate limit (seconds)
pub const ENV_RATE_LIMIT_SECS: &str = "MACROFEED_RATE_LIMIT_SECS";

// =============================================================================
// Ingestion Defaults
// =============================================================================

/// Default first year of the requested range
pub const DEFAULT_START_YEAR: i32 = 2000;

/// Default number of series identifiers requested per API call
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Default delay between successive API calls, in seconds
pub const DEFAULT_RATE_LIMIT_SECS: u64 = 1;

/// Default title recorded on an ingestion run
pub const DEFAULT_INGEST_TITLE: &str = "Macrofeed ingestion";

/// Hard cap on identifiers per API call, imposed by the statistics API
pub const API_BATCH_LIMIT: usize = 25;

/// Default statistics API endpoint (BLS public timeseries API v2)
pub const DEFAULT_API_ENDPOINT: &str = "https://api.bls.gov/publicAPI/v2/timeseries/data/";

/// HTTP timeout for a single API call, in seconds
pub const API_TIMEOUT_SECS: u64 = 60;

/// Page size used when reading the identifier universe from the store
pub const SERIES_PAGE_SIZE: u32 = 500;

/// Prefix of the dated staging directory created per ingestion day
pub const STAGING_DIR_PREFIX: &str = "ingest";

// =============================================================================
// Delta Series Naming
// =============================================================================

/// Suffix appended to a source identifier to form its delta identifier
pub const DELTA_ID_SUFFIX: &str = "-DELTA";

/// Suffix appended to a source title to form its delta title
pub const DELTA_TITLE_SUFFIX: &str = " [percent change]";

/// Suffix appended to a source tag to form its delta source tag
pub const DELTA_SOURCE_SUFFIX: &str = "-ANALYSIS";

// =============================================================================
// SQLite
// =============================================================================

/// Database file name inside the sqlite data subdirectory
pub const SQLITE_DB_FILENAME: &str = "macrofeed.db";

/// Maximum pooled connections (single-writer batch tool)
pub const SQLITE_MAX_CONNECTIONS: u32 = 4;

/// Busy timeout before a locked database call fails
pub const SQLITE_BUSY_TIMEOUT_SECS: u64 = 5;

/// SQLite page-cache size pragma value
pub const SQLITE_CACHE_SIZE: &str = "-64000";
