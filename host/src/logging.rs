//! logger setup
//!
//! `RUST_LOG` wins when set, otherwise the level from hub.toml applies.

use env_logger::{Builder, Env};

pub fn init(level: &str) {
    let env = Env::default().default_filter_or(level);
    Builder::from_env(env)
        .format_timestamp_secs()
        .format_target(false)
        .init();
}
