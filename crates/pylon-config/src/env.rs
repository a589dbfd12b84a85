//! Environment variable lookup with `PYLON_`/`CORE_` prefix precedence.
//!
//! Grounded on the original host's `pylon.core.tools.env::get_var`: every
//! environment-derived setting is looked up twice, once under a `PYLON_`
//! prefix and once under the older `CORE_` prefix it superseded, with
//! `PYLON_` winning when both are set.

/// Reads an environment variable under the `PYLON_`/`CORE_` prefix
/// convention, preferring `PYLON_{name}` over `CORE_{name}`.
pub fn get_var(name: &str) -> Option<String> {
    std::env::var(format!("PYLON_{name}"))
        .ok()
        .or_else(|| std::env::var(format!("CORE_{name}")).ok())
}

/// Like [`get_var`], but returns `default` when neither prefix is set.
pub fn get_var_or(name: &str, default: &str) -> String {
    get_var(name).unwrap_or_else(|| default.to_string())
}

/// Reads a boolean-flavored environment variable (`"1"`, `"true"`, `"yes"`
/// case-insensitively all count as set).
pub fn get_flag(name: &str) -> bool {
    match get_var(name) {
        Some(value) => matches!(value.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variable tests can't run concurrently with each other in
    // the same process without stepping on one another's state.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn pylon_prefix_wins_over_core_prefix() {
        let _guard = ENV_LOCK.lock().unwrap();
        // SAFETY: serialized by ENV_LOCK.
        unsafe {
            std::env::set_var("CORE_DEBUG_LOGGING", "core-value");
            std::env::set_var("PYLON_DEBUG_LOGGING", "pylon-value");
        }
        assert_eq!(get_var("DEBUG_LOGGING").as_deref(), Some("pylon-value"));
        unsafe {
            std::env::remove_var("PYLON_DEBUG_LOGGING");
            std::env::remove_var("CORE_DEBUG_LOGGING");
        }
    }

    #[test]
    fn falls_back_to_core_prefix() {
        let _guard = ENV_LOCK.lock().unwrap();
        // SAFETY: serialized by ENV_LOCK.
        unsafe {
            std::env::set_var("CORE_WEB_RUNTIME", "uvicorn");
        }
        assert_eq!(get_var("WEB_RUNTIME").as_deref(), Some("uvicorn"));
        unsafe {
            std::env::remove_var("CORE_WEB_RUNTIME");
        }
    }

    #[test]
    fn missing_variable_yields_none() {
        let _guard = ENV_LOCK.lock().unwrap();
        assert_eq!(get_var("SOME_VARIABLE_THAT_IS_NEVER_SET"), None);
    }

    #[test]
    fn flag_recognizes_truthy_values() {
        let _guard = ENV_LOCK.lock().unwrap();
        // SAFETY: serialized by ENV_LOCK.
        unsafe {
            std::env::set_var("PYLON_USE_RELOADER", "true");
        }
        assert!(get_flag("USE_RELOADER"));
        unsafe {
            std::env::remove_var("PYLON_USE_RELOADER");
        }
        assert!(!get_flag("USE_RELOADER"));
    }
}
