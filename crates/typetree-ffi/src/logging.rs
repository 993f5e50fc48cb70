//! Opt-in diagnostic logging
//!
//! The library never installs a subscriber on its own; setting
//! `TYPETREE_LOG` (an `EnvFilter` directive such as `typetree_engine=debug`)
//! installs a stderr formatter the first time a generator is created.

use std::sync::OnceLock;
use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "TYPETREE_LOG";

/// Install the subscriber once, if `TYPETREE_LOG` is set
pub fn init() {
    static INITIALISED: OnceLock<()> = OnceLock::new();

    INITIALISED.get_or_init(|| {
        let Ok(filter) = EnvFilter::try_from_env(LOG_ENV) else {
            return;
        };
        let subscriber = fmt::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_ansi(false)
            .compact()
            .finish();
        // The host may already have a global subscriber
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}
