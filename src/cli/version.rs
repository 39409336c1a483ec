//! Version string for the ragbridge binary.

/// The current version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn version_string() -> String {
    format!("ragbridge {}", VERSION)
}
