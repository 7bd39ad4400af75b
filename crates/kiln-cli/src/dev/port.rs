//! Port acquisition for the development server.
//!
//! The listener that wins the scan is the one that serves; the port is never
//! released and re-bound, so another process cannot take it in between.

use std::io::ErrorKind;

use serde::Serialize;
use tokio::net::TcpListener;

use crate::error::{CliError, Result};

/// The preferred port and the one actually bound. Fixed once resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PortAllocation {
    pub preferred: u16,
    pub resolved: u16,
}

impl PortAllocation {
    pub fn fell_back(&self) -> bool {
        self.preferred != self.resolved
    }
}

/// Bind `host:preferred`, moving up one port at a time while the address is
/// in use, for at most `scan_limit` further ports.
///
/// # Errors
///
/// `PortExhaustion` when every candidate is taken; `Bind` for any other bind
/// failure, which ends the scan immediately.
pub async fn acquire_port(
    host: &str,
    preferred: u16,
    scan_limit: u16,
) -> Result<(TcpListener, PortAllocation)> {
    let last = preferred.saturating_add(scan_limit);
    for port in preferred..=last {
        let addr = format!("{host}:{port}");
        match TcpListener::bind(&addr).await {
            Ok(listener) => {
                // Port 0 asks the OS for any free port.
                let resolved = listener.local_addr().map(|a| a.port()).unwrap_or(port);
                if port != preferred {
                    tracing::info!(preferred, resolved, "preferred port in use, using the next free one");
                }
                return Ok((listener, PortAllocation { preferred, resolved }));
            }
            Err(err) if err.kind() == ErrorKind::AddrInUse => {
                tracing::debug!(port, "port in use");
            }
            Err(source) => return Err(CliError::Bind { addr, source }),
        }
    }
    Err(CliError::PortExhaustion {
        host: host.to_string(),
        first: preferred,
        last,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn occupied() -> (TcpListener, u16) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, port)
    }

    #[tokio::test]
    async fn free_preferred_port_is_used() {
        let (probe, port) = occupied().await;
        drop(probe);
        let (_listener, allocation) = acquire_port("127.0.0.1", port, 10).await.unwrap();
        assert_eq!(allocation.resolved, port);
        assert!(!allocation.fell_back());
    }

    #[tokio::test]
    async fn taken_port_falls_back_upward() {
        let (_held, port) = occupied().await;
        let (_listener, allocation) = acquire_port("127.0.0.1", port, 20).await.unwrap();
        assert_eq!(allocation.preferred, port);
        assert!(allocation.resolved > port);
        assert!(allocation.fell_back());
    }

    #[tokio::test]
    async fn zero_scan_limit_exhausts_on_a_taken_port() {
        let (_held, port) = occupied().await;
        let err = acquire_port("127.0.0.1", port, 0).await.unwrap_err();
        match err {
            CliError::PortExhaustion { first, last, .. } => {
                assert_eq!(first, port);
                assert_eq!(last, port);
            }
            other => panic!("expected PortExhaustion, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unresolvable_host_is_a_bind_error() {
        let err = acquire_port("host.invalid", 8080, 3).await.unwrap_err();
        assert!(matches!(err, CliError::Bind { .. }), "{err:?}");
    }
}
