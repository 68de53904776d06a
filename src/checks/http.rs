//! Http check: healthy iff GET returns the expected status code.
//!
//! The shared client carries the probe timeout, so a hanging endpoint folds
//! into an unhealthy verdict like any other failure. Redirects are followed
//! by reqwest's default policy; the *final* status is compared.

use super::CheckOutcome;

pub async fn probe(client: &reqwest::Client, url: &str, expect_status: u16) -> CheckOutcome {
    match client.get(url).send().await {
        Ok(resp) => {
            let status = resp.status().as_u16();
            if status == expect_status {
                CheckOutcome::healthy(format!("GET {url} returned {status}"))
            } else {
                CheckOutcome::unhealthy(format!(
                    "GET {url} returned {status}, expected {expect_status}"
                ))
            }
        }
        Err(e) => CheckOutcome::unhealthy(format!("GET {url} failed: {e}")),
    }
}
