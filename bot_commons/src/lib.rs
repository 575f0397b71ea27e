//! Boot boilerplate shared by the bots in this workspace, so every
//! binary starts, logs and finds its key the same way.

pub mod useful_methods;

use std::{fs, future::Future, io};

/// Initialize logging and run `closure` to completion on a multithreaded
/// runtime.
///
/// The log filter is taken from `RUST_LOG` and falls back to `info`.
/// Logging goes through [pretty_env_logger][]; timestamps are left out
/// when running as a systemd service, since journald adds its own.
///
/// # Panics
///
/// Panics if the async runtime cannot be built.
///
/// [pretty_env_logger]: https://docs.rs/pretty_env_logger
pub fn start_everything(closure: impl Future<Output = ()>) {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| String::from("info"));

    let running_as_systemd_service = std::env::var_os("JOURNAL_STREAM").is_some();

    let mut builder = match running_as_systemd_service {
        true => pretty_env_logger::formatted_builder(),
        false => pretty_env_logger::formatted_timed_builder(),
    };

    builder.parse_filters(&log_level);

    if builder.try_init().is_err() {
        log::error!("Tried to init logger twice!");
    }

    log::info!("Logger is up, starting the runtime.");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to build the tokio runtime!")
        .block_on(closure);
}

/// Get the bot token.
///
/// The environment variable `env_var` wins if it is set and non-empty.
/// Otherwise the token is read from the `key` file in the working
/// directory, or `key_debug` in debug builds.
pub fn read_bot_key(env_var: &str) -> io::Result<String> {
    if let Ok(key) = std::env::var(env_var) {
        let key = key.trim();
        if !key.is_empty() {
            return Ok(key.to_string());
        }
    }

    let path = match cfg!(debug_assertions) {
        true => "key_debug",
        false => "key",
    };

    log::debug!("{} is not set, reading the key from \"{}\"", env_var, path);

    let key = fs::read_to_string(path)?;
    let key = key.trim();
    if key.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("key file \"{}\" is empty", path),
        ));
    }
    Ok(key.to_string())
}
