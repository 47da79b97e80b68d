//! Shared constants.

pub const APP_NAME: &str = "unitforge";

/// Default file name of the artifact ledger.
pub const LEDGER_FILENAME: &str = "registry.json";

/// Environment variable selecting the run mode (`preview` or `run-through`).
pub const ENV_MODE: &str = "UNITFORGE_MODE";

/// Environment variable bounding the number of concurrent artifact workers.
pub const ENV_PARALLELISM: &str = "UNITFORGE_PARALLELISM";

/// Environment variable pointing at the ledger file.
pub const ENV_REGISTRY: &str = "UNITFORGE_REGISTRY";

/// Metadata key holding the absolute target path of a tracked artifact.
pub const META_PATH: &str = "path";

/// Metadata key holding the write policy of a tracked artifact.
pub const META_WRITE_POLICY: &str = "writePolicy";
