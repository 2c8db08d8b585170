use backtrace::Backtrace;
use simplelog::{ColorChoice, ConfigBuilder, LevelFilter, TermLogger, TerminalMode, WriteLogger};
use std::fs::OpenOptions;

use crate::util::permit_alloc;

/// The environment variable that controls where the log output ends up.
pub const LOG_ENV_VAR: &str = "CLAP_AS_VST3_LOG";

#[cfg(all(
    debug_assertions,
    feature = "assert_process_allocs",
    all(windows, target_env = "gnu")
))]
compile_error!("The 'assert_process_allocs' feature does not work correctly in combination with the 'x86_64-pc-windows-gnu' target, see https://github.com/Windfisch/rust-assert-no-alloc/issues/7");

#[cfg(all(debug_assertions, feature = "assert_process_allocs"))]
#[global_allocator]
static A: assert_no_alloc::AllocDisabler = assert_no_alloc::AllocDisabler;

/// Where the log output should go, parsed from [`LOG_ENV_VAR`].
#[derive(Debug, Clone, PartialEq, Eq)]
enum LogTarget {
    Stderr,
    File(String),
}

impl LogTarget {
    fn from_env_value(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None | Some("") => LogTarget::Stderr,
            Some(value) if value.eq_ignore_ascii_case("stderr") => LogTarget::Stderr,
            Some(path) => LogTarget::File(path.to_owned()),
        }
    }
}

/// Set up the logger so that the `bridge_*!()` logging and assertion macros log output to a
/// centralized location and panics also get written there. By default this logs to STDERR. The
/// `CLAP_AS_VST3_LOG` environment variable can be set to:
///
/// - `stderr`, in which case the log output always gets written to STDERR.
/// - A file path, in which case the output gets appended to the end of that file which will be
///   created if necessary. If the file cannot be opened we fall back to STDERR.
///
/// Calling this more than once is harmless, only the first call installs a logger.
pub fn setup_logger() {
    let log_level = if cfg!(debug_assertions) {
        LevelFilter::Trace
    } else {
        LevelFilter::Info
    };

    // Always show the module and thread in debug builds, the wrapped plugin gets called from a
    // bunch of different threads
    let mut config_builder = ConfigBuilder::new();
    config_builder
        .set_thread_level(LevelFilter::Debug)
        .set_target_level(LevelFilter::Error);
    #[cfg(debug_assertions)]
    config_builder.set_location_level(LevelFilter::Debug);
    let config = config_builder.build();

    let target = LogTarget::from_env_value(std::env::var(LOG_ENV_VAR).ok().as_deref());
    let logger_set = match target {
        LogTarget::Stderr => {
            TermLogger::init(log_level, config, TerminalMode::Stderr, ColorChoice::Never).is_ok()
        }
        LogTarget::File(path) => {
            match OpenOptions::new().create(true).append(true).open(&path) {
                Ok(file) => WriteLogger::init(log_level, config, file).is_ok(),
                Err(err) => {
                    let logger_set = TermLogger::init(
                        log_level,
                        config,
                        TerminalMode::Stderr,
                        ColorChoice::Never,
                    )
                    .is_ok();
                    bridge_warn!("Could not open '{}' for logging, using STDERR: {}", path, err);

                    logger_set
                }
            }
        }
    };

    if logger_set {
        log_panics();
    }
}

/// The same as the `log_panics` crate, but wrapped in `permit_alloc()`. Logging a panic allocates,
/// and a panic on the audio thread would otherwise trip `assert_no_alloc`.
fn log_panics() {
    std::panic::set_hook(Box::new(|info| {
        permit_alloc(|| {
            let backtrace = Backtrace::new();

            let thread = std::thread::current();
            let thread = thread.name().unwrap_or("unnamed");

            let msg = match info.payload().downcast_ref::<&'static str>() {
                Some(s) => *s,
                None => match info.payload().downcast_ref::<String>() {
                    Some(s) => &**s,
                    None => "Box<Any>",
                },
            };

            match info.location() {
                Some(location) => {
                    bridge_error!(
                        target: "panic", "thread '{}' panicked at '{}': {}:{}\n{:?}",
                        thread,
                        msg,
                        location.file(),
                        location.line(),
                        backtrace
                    );
                }
                None => {
                    bridge_error!(
                        target: "panic",
                        "thread '{}' panicked at '{}'\n{:?}",
                        thread,
                        msg,
                        backtrace
                    )
                }
            }
        })
    }));
}

/// A wrapper around the wrapped plugin's process call. This sets up `assert_no_alloc` if needed.
/// Flushing denormals is left to the wrapped plugin.
pub fn process_wrapper<T, F: FnOnce() -> T>(f: F) -> T {
    cfg_if::cfg_if! {
        if #[cfg(all(debug_assertions, feature = "assert_process_allocs"))] {
            assert_no_alloc::assert_no_alloc(f)
        } else {
            f()
        }
    }
}
