//! Server configuration constants.
//!
//! Centralizes hardcoded values for easier configuration and documentation.

/// Default HTTP port for the tansu server.
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Default bind address (all interfaces; clients are remote).
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";

/// Default SQLite database path, relative to the working directory.
pub const DEFAULT_DB_PATH: &str = "tansu.db";

/// Bytes returned by `read` when the request omits `size`.
pub const DEFAULT_READ_SIZE: u32 = 4096;
