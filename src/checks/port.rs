//! Port check: healthy iff a TCP connection to host:port succeeds in time.

use std::time::Duration;

use super::CheckOutcome;

pub async fn probe(host: &str, port: u16, timeout: Duration) -> CheckOutcome {
    let addr = format!("{host}:{port}");
    match tokio::time::timeout(timeout, tokio::net::TcpStream::connect(&addr)).await {
        Ok(Ok(_stream)) => CheckOutcome::healthy(format!("tcp connect to {addr} succeeded")),
        Ok(Err(e)) => CheckOutcome::unhealthy(format!("tcp connect to {addr} failed: {e}")),
        Err(_) => CheckOutcome::unhealthy(format!(
            "tcp connect to {addr} timed out after {}s",
            timeout.as_secs()
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_port_is_healthy() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let outcome = probe("127.0.0.1", port, Duration::from_secs(2)).await;
        assert!(outcome.healthy, "detail: {}", outcome.detail);
    }

    #[tokio::test]
    async fn closed_port_is_unhealthy() {
        // Bind then drop to get a port that is very likely closed.
        let port = {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let outcome = probe("127.0.0.1", port, Duration::from_secs(2)).await;
        assert!(!outcome.healthy);
    }
}
