//! Process-wide embedded PostgreSQL cluster for integration tests.
//!
//! The library keeps the shared cluster alive for the lifetime of the test
//! binary. Bootstrap downloads can fail transiently when suites start in
//! parallel, so acquisition is retried with a backoff.

use std::time::Duration;

use pg_embedded_setup_unpriv::ClusterHandle;

const MAX_ATTEMPTS: u32 = 4;
const RETRY_DELAY_MS: u64 = 500;
const STABLE_PASSWORD: &str = "registrar_embedded_test";

/// Pin the superuser password so clusters reusing a data directory accept
/// connections from later test processes.
fn ensure_stable_password() {
    if std::env::var_os("PG_PASSWORD").is_none() {
        // SAFETY: called before the library spawns threads; the shared
        // cluster singleton serialises bootstrap.
        unsafe {
            std::env::set_var("PG_PASSWORD", STABLE_PASSWORD);
        }
    }
}

/// Return the shared cluster, starting it on first use.
pub fn shared_cluster() -> Result<&'static ClusterHandle, String> {
    ensure_stable_password();
    let mut last_error = String::new();
    for attempt in 0..MAX_ATTEMPTS {
        match pg_embedded_setup_unpriv::test_support::shared_cluster_handle() {
            Ok(handle) => return Ok(handle),
            Err(err) => {
                last_error = format!("{err:?}");
                if attempt + 1 < MAX_ATTEMPTS {
                    let delay = Duration::from_millis(RETRY_DELAY_MS * (1 << attempt));
                    eprintln!(
                        "pg-embed: attempt {}/{MAX_ATTEMPTS} failed, retrying in {delay:?}: {last_error}",
                        attempt + 1
                    );
                    std::thread::sleep(delay);
                }
            }
        }
    }
    Err(last_error)
}
