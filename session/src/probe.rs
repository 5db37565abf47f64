//! TCP port probing.
//!
//! Detects that an endpoint is accepting connections by opening a bare
//! connection and immediately closing it, with retry-until-deadline
//! semantics. The target listener must tolerate connections that send no
//! bytes; that is part of the harness contract, not enforced here.

use std::{net::TcpListener, time::Duration};

use tokio::{net::TcpStream, time::Instant};

use crate::SessionError;

/// Backoff between probe connection attempts.
pub const PROBE_INTERVAL: Duration = Duration::from_millis(200);

/// Wait until `host:port` accepts TCP connections.
///
/// Connection failures are retried every [`PROBE_INTERVAL`]; once `timeout`
/// has elapsed from the start of the call the probe gives up with
/// [`SessionError::ProbeTimeout`].
pub async fn wait_for_port(host: &str, port: u16, timeout: Duration) -> Result<(), SessionError> {
    let deadline = Instant::now() + timeout;
    while Instant::now() <= deadline {
        match TcpStream::connect((host, port)).await {
            Ok(stream) => {
                // probe only, no data exchanged
                drop(stream);
                tracing::debug!(%host, port, "port accepting connections");
                return Ok(());
            }
            Err(e) => {
                tracing::trace!(%host, port, error = %e, "probe connection failed");
            }
        }
        tokio::time::sleep(PROBE_INTERVAL).await;
    }

    Err(SessionError::ProbeTimeout {
        host: host.to_string(),
        port,
        timeout,
    })
}

/// Find a TCP port that is currently free on the loopback interface.
pub fn get_random_tcp_port() -> std::io::Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let port = listener.local_addr()?.port();
    Ok(port)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_when_port_is_open() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        wait_for_port("127.0.0.1", port, Duration::from_secs(1))
            .await
            .expect("probing open port");
    }

    #[tokio::test]
    async fn times_out_when_nothing_listens() {
        let port = get_random_tcp_port().unwrap();

        let err = wait_for_port("127.0.0.1", port, Duration::from_millis(300))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::ProbeTimeout { .. }));
    }

    #[tokio::test]
    async fn resolves_once_listener_comes_up() {
        let port = get_random_tcp_port().unwrap();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
                .await
                .unwrap();
            // hold the port open for the probe
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(listener);
        });

        let started = Instant::now();
        wait_for_port("127.0.0.1", port, Duration::from_secs(30))
            .await
            .expect("probing delayed listener");
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
