//! Logging macros.

/// Log a pool event with `key=value` metadata through the `log` facade.
///
/// # Examples
///
/// ```
/// use respool_core::log_event;
/// use respool_core::utils::LogLevel;
///
/// log_event!(LogLevel::Info, "pool registered");
/// log_event!(LogLevel::Debug, "handle released",
///     pool => "primary",
///     idle => 3,
/// );
/// ```
#[macro_export]
macro_rules! log_event {
    (@emit $level:expr, $($arg:tt)+) => {
        match $level {
            $crate::utils::LogLevel::Error => $crate::__log::error!($($arg)+),
            $crate::utils::LogLevel::Warning => $crate::__log::warn!($($arg)+),
            $crate::utils::LogLevel::Info => $crate::__log::info!($($arg)+),
            $crate::utils::LogLevel::Debug => $crate::__log::debug!($($arg)+),
            $crate::utils::LogLevel::Trace => $crate::__log::trace!($($arg)+),
        }
    };

    ($level:expr, $message:expr) => {
        $crate::log_event!(@emit $level, "{}", $message)
    };

    ($level:expr, $message:expr, $($key:ident => $value:expr),+ $(,)?) => {
        {
            let metadata = [$(format!("{}={}", stringify!($key), $value)),+].join(" ");
            $crate::log_event!(@emit $level, "{}: {}", $message, metadata)
        }
    };
}
