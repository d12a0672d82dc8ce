//! Probe HTTP client: one reqwest client shared by every concurrent probe of a ranking round.

use std::time::Duration;

use reqwest::Client;

use crate::error_handling::utils::network_error;
use crate::error_handling::Result;

/// Redirect hops followed before a probe gives up.
pub const MAX_REDIRECTS: usize = 20;
const USER_AGENT: &str = concat!("nodelinks/", env!("CARGO_PKG_VERSION"), " (mirror latency probe)");

/// Client for latency probes. Mirrors may present self-signed or mismatched certificates,
/// so certificate validation is relaxed; nothing but response headers is ever read.
pub fn build_probe_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .connect_timeout(timeout)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .danger_accept_invalid_certs(true)
        .pool_max_idle_per_host(0)
        .build()
        .map_err(|e| network_error("build probe client", None, e))
}
