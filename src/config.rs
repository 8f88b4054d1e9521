use std::path::PathBuf;
use std::time::Duration;

pub const API_BASE: &str = "https://api.tcgdex.net/v2";
pub const DEFAULT_LANGUAGE: &str = "en";
pub const USER_AGENT: &str = "pkmn-collection/0.1 (+https://github.com/pkmn-collection)";

/// Contractual ceiling for any single catalog request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Placeholder set fields used when the catalog omits set information.
pub const UNKNOWN_SET_ID: &str = "unknown";
pub const UNKNOWN_SET_NAME: &str = "Unknown Set";

/// Delimiter for list-valued columns (dex ids, elemental types).
pub const LIST_DELIMITER: char = ',';

pub const ENV_DB_PATH: &str = "PKMN_COLLECTION_DB";
pub const ENV_API_BASE: &str = "PKMN_COLLECTION_API_BASE";
pub const ENV_LANGUAGE: &str = "PKMN_COLLECTION_LANG";
pub const ENV_TIMEOUT_SECS: &str = "PKMN_COLLECTION_TIMEOUT_SECS";

pub fn default_db_path() -> PathBuf {
    if let Some(data) = dirs::data_dir() {
        data.join("pkmn-collection").join("collection.duckdb")
    } else {
        PathBuf::from(".pkmn-collection").join("collection.duckdb")
    }
}

/// Parse a whole number of seconds from the environment. Zero and anything
/// unparsable are `None`.
pub fn parse_timeout_secs(raw: &str) -> Option<Duration> {
    raw.trim()
        .parse::<u64>()
        .ok()
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
}
