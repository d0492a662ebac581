//! `tracing_subscriber` init helper for binaries. Library code never
//! installs a subscriber itself — it only emits `tracing` events and
//! `#[instrument]`s its entry points.

use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

#[derive(Debug, Clone, Default, clap::Args)]
pub struct Options {
    /// Verbosity bumps (`-v`, `-vv`, ...) layered on top of the env filter.
    #[clap(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
    /// An `EnvFilter`-compatible filter string. Empty means "use verbosity
    /// only".
    #[clap(long, env = "LIVETREE_LOG", default_value = "")]
    pub log_filter: String,
}

impl Options {
    pub fn init(&self) {
        let default_level = match self.verbose {
            0 => LevelFilter::INFO,
            1 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        };

        let filter = if self.log_filter.is_empty() {
            EnvFilter::builder().with_default_directive(default_level.into()).from_env_lossy()
        } else {
            EnvFilter::builder()
                .with_default_directive(default_level.into())
                .parse_lossy(&self.log_filter)
        };

        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_maps_to_level() {
        let opts = Options {
            verbose: 2,
            log_filter: String::new(),
        };
        assert_eq!(opts.verbose, 2);
    }
}
