/// Integration tests for configuration loading.
///
/// File layering and `config set` are covered by the unit tests in
/// `src/config/mod.rs`. These tests exercise the environment layer through the
/// public `config::load()` entry point.
///
/// # Safety
///
/// `std::env::set_var` / `remove_var` are `unsafe` in Rust 2024 edition. All
/// env mutations live in one `#[test]` so no other test in this binary reads
/// these variables concurrently.
use ccdash::config;

/// Helper: set an env var (wraps the `unsafe` call).
///
/// # Safety
/// Must only be called from single-threaded test contexts.
unsafe fn set_env(key: &str, val: &str) {
    unsafe { std::env::set_var(key, val) }
}

/// Helper: remove an env var (wraps the `unsafe` call).
///
/// # Safety
/// Must only be called from single-threaded test contexts.
unsafe fn remove_env(key: &str) {
    unsafe { std::env::remove_var(key) }
}

// ---------------------------------------------------------------------------
// Environment overrides
//
// These tests mutate process-wide environment variables, so they are combined
// into a single #[test] to avoid racing with each other when Cargo runs tests
// in parallel.
// ---------------------------------------------------------------------------

#[test]
fn env_vars_override_every_file_layer() {
    // --- base url ---
    unsafe { set_env("CCDASH_API_URL", " http://analytics.internal:8080 ") };
    let cfg = config::load();
    assert_eq!(cfg.api.base_url, "http://analytics.internal:8080");
    unsafe { remove_env("CCDASH_API_URL") };

    // --- blank base url is ignored ---
    unsafe { set_env("CCDASH_API_URL", "   ") };
    let cfg = config::load();
    assert!(!cfg.api.base_url.trim().is_empty());
    unsafe { remove_env("CCDASH_API_URL") };

    // --- timeout ---
    unsafe { set_env("CCDASH_TIMEOUT_MS", "1500") };
    let cfg = config::load();
    assert_eq!(cfg.api.timeout_ms, 1500);
    unsafe { remove_env("CCDASH_TIMEOUT_MS") };

    // --- page size, clamped to the backend's range ---
    unsafe { set_env("CCDASH_PAGE_SIZE", "25") };
    let cfg = config::load();
    assert_eq!(cfg.table.page_size, 25);

    unsafe { set_env("CCDASH_PAGE_SIZE", "500") };
    let cfg = config::load();
    assert_eq!(cfg.table.page_size, 200);

    unsafe { set_env("CCDASH_PAGE_SIZE", "0") };
    let cfg = config::load();
    assert_eq!(cfg.table.page_size, 1);
    unsafe { remove_env("CCDASH_PAGE_SIZE") };

    // --- logging toggle ---
    unsafe { set_env("CCDASH_LOGGING", "0") };
    let cfg = config::load();
    assert!(!cfg.logging.enabled, "CCDASH_LOGGING=0 should disable");

    unsafe { set_env("CCDASH_LOGGING", "yes") };
    let cfg = config::load();
    assert!(cfg.logging.enabled, "CCDASH_LOGGING=yes should enable");
    unsafe { remove_env("CCDASH_LOGGING") };

    // --- effective config renders every section ---
    let rendered = config::show_effective_config().unwrap();
    for section in ["[api]", "[table]", "[dashboard]", "[logging]"] {
        assert!(rendered.contains(section), "missing {section}");
    }
}
