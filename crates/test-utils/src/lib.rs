//! Shared helpers for `dicy` tests: temporary projects, a scripted executor
//! that simulates the typesetting tools, and a configurable step type.

pub mod builders;
pub mod fake_executor;
pub mod test_step;

pub use builders::{Project, ProjectBuilder};
pub use fake_executor::{CallLog, ScriptedCall, ScriptedExecutor, latex_tools};
pub use test_step::TestStep;

use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::{EnvFilter, fmt};

static TRACING: Once = Once::new();

const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Install a subscriber whose output the test harness captures.
///
/// Only failing tests show their logs. `RUST_LOG=dicy=debug` raises the level.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Await `f`, failing the test if it takes longer than ten seconds.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(TEST_TIMEOUT, f)
        .await
        .expect("test timed out after 10 seconds")
}
