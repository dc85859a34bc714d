//! Build metadata and the control protocol version.
//! This includes the generated version.rs from the build script, providing a
//! single source of truth for what the control surface reports to the host.

include!(concat!(env!("OUT_DIR"), "/version.rs"));

/// Protocol version reported on every metadata read, independent of the
/// version a scanner reports for itself.
pub fn api_version() -> &'static str {
    PLUGIN_API_VERSION
}

/// Build time string from the build script (UTC)
pub fn build_time() -> &'static str {
    BUILD_TIME
}

/// Short git hash captured by the build script
pub fn git_hash() -> &'static str {
    GIT_HASH
}

/// One-line version banner used by `--version` and the startup log
pub fn version_banner() -> String {
    format!(
        "{} {} (protocol {}, built {}, git {})",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        api_version(),
        build_time(),
        git_hash()
    )
}
