/// Name of the environment variable containing the path to the ZED configuration file.
/// If not set, defaults to
///  (1) `$XDG_CONFIG_HOME/zed/config.toml`
///  (2) `$HOME/.config/zed/config.toml`
pub const ENV_ZED_CONFIG_PATH: &str = "ZED_CONFIG_PATH";

/// Default size, in bytes, after which a microindex frame is closed.
pub const DEFAULT_FRAME_THRESH: usize = 32 * 1024;

/// Largest frame threshold a microindex accepts.
pub const MAX_FRAME_THRESH: usize = 20 * 1024 * 1024;

/// Maximum height of the microindex B-tree (base section included).
pub const MAX_LEVELS: usize = 20;

/// Number of bytes scanned from the end of a microindex to locate its trailer.
pub const TRAILER_MAX_SIZE: usize = 4096;

/// Version number written into (and required from) microindex trailers.
pub const INDEX_VERSION: i64 = 4;

/// Value of the `type` field of a microindex trailer.
pub const INDEX_TYPE: &str = "index";

/// Field name holding child offsets in microindex parent sections.
pub const DEFAULT_CHILD_FIELD: &str = "_child";

/// Default key field of a microindex when none is configured.
pub const DEFAULT_KEY_FIELD: &str = "key";

/// Maximum nesting of user-defined function calls.
pub const MAX_CALL_DEPTH: usize = 10_000;

/// First ID handed out to structural types; everything below is primitive.
pub const FIRST_STRUCTURAL_ID: u32 = 32;
