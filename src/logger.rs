// Logging setup for the binary. Library code only uses the `log` macros;
// this wires them to stderr through env_logger.

use log::LevelFilter;

// --debug raises the default level; RUST_LOG still wins when set.
pub fn init(debug: bool) {
    let level = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    // A second init (e.g. from tests) is harmless.
    let _ = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_target(false)
        .try_init();
}

pub fn is_debug() -> bool {
    log::log_enabled!(log::Level::Debug)
}
