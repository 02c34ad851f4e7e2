use tracing_subscriber::{EnvFilter, filter::LevelFilter, fmt};

pub struct LoggerUtils {}

impl LoggerUtils {
    /// `verbosity` is the number of `-v` flags: 0 = info, 1 = debug, 2+ = trace.
    pub fn init(verbosity: u8) {
        let default_level = match verbosity {
            0 => LevelFilter::INFO,
            1 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        };

        fmt()
            .with_env_filter(
                EnvFilter::builder()
                    .with_default_directive(default_level.into())
                    .from_env_lossy(), // RUST_LOG still wins when set
            )
            .with_target(false)
            .with_level(true)
            .compact()
            .init();
    }
}
