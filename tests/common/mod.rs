//! Common test utilities for E2E tests

use std::sync::Once;

use tempfile::TempDir;
use threadline::{MessagingCore, config};

static TRACING: Once = Once::new();

/// Install a test-writer subscriber once per test binary.
///
/// Honors `RUST_LOG`; defaults to warn so failing tests surface the
/// library's recovery and mirror logs.
fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Test core instance backed by a throwaway database
pub struct TestCore {
    pub core: MessagingCore,
    pub _temp_dir: TempDir,
}

impl TestCore {
    /// Create a new test core instance
    pub async fn new() -> Self {
        init_tracing();

        // Create temporary directory for test database
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        // Create test configuration: purely local, mirror disabled
        let config = config::AppConfig {
            database: config::DatabaseConfig {
                path: db_path,
                reopen_backoff_ms: 10,
            },
            mirror: config::MirrorConfig {
                enabled: false,
                base_url: String::new(),
                account_id: String::new(),
                sync_key: None,
                device_id: 0,
                timeout_seconds: 5,
            },
        };

        let core = MessagingCore::new(config).await.unwrap();

        Self {
            core,
            _temp_dir: temp_dir,
        }
    }
}
