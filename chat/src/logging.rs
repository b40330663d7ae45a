use env_logger::Env;
use log::SetLoggerError;

/// Install the global logger.
///
/// Defaults to `info`; `RUST_LOG` overrides it. Logs go to stderr so they do
/// not mix with console chat output on stdout.
pub fn try_init() -> Result<(), SetLoggerError> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).try_init()
}

/// Like [`try_init`], ignoring an already installed logger.
pub fn init() {
    let _ = try_init();
}

#[cfg(test)]
mod tests {
    #[test]
    fn init_is_idempotent() {
        super::init();
        super::init();
        assert!(super::try_init().is_err());
        log::info!("logger ready");
    }
}
