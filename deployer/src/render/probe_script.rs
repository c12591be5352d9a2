//! Health-check wrapper script generation

use crate::health::probe::{critical_message, ok_message, PROBE_TIMEOUT_SECS};
use crate::storage::settings::Settings;

/// Redirects followed before giving up, matching reqwest's default policy
pub const MAX_REDIRECTS: u32 = 10;

/// Generate the probe script installed next to the app.
///
/// Prints the same `OK`/`CRITICAL` lines as `apmdeploy probe` and reaches the
/// same verdict: redirects are followed and only a final 2xx is healthy.
pub fn render_script(settings: &Settings) -> String {
    format!(
        r#"#!/bin/sh
# Health check for {name}. Exit 0 when healthy, 1 otherwise.
code=$(curl -sL --max-redirs {redirects} --max-time {timeout} -o /dev/null -w '%{{http_code}}' {url} 2>/dev/null)
case "$code" in
    2??)
        echo "{ok}"
        exit 0
        ;;
    ""|000)
        echo "{unreachable}"
        exit 1
        ;;
    *)
        echo "{bad_status}"
        exit 1
        ;;
esac
"#,
        name = settings.app_name,
        redirects = MAX_REDIRECTS,
        timeout = PROBE_TIMEOUT_SECS,
        url = settings.local_health_url(),
        ok = ok_message(&settings.app_name),
        unreachable = critical_message(&settings.app_name, "health endpoint did not answer"),
        bad_status = critical_message(&settings.app_name, "HTTP $code"),
    )
}
