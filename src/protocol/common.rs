//! Shared scaffolding for the three- and four-party sub-protocols: port/endpoint setup, the
//! "receive exactly k or fail" helper, and telemetry collection.

use std::time::Duration;

use crate::error::{Error, ProtocolIncomplete};
use crate::field::{FieldElement, FieldParams};
use crate::net::peer::{CloseOptions, EndpointStats, PeerEndpoint};
use crate::net::port_pool::{PortGuard, PortPool};
use crate::protocol::RunTelemetry;

/// A started endpoint plus the port guard that releases it back to the pool on drop.
pub struct Node {
    pub endpoint: PeerEndpoint,
    pub port: u16,
    _guard: PortGuard,
}

/// Acquires a port, starts a peer endpoint on it, and returns both tied together via RAII.
pub async fn spawn_node(pool: &PortPool, close_opts: CloseOptions) -> Result<Node, Error> {
    let guard = pool.acquire()?;
    let endpoint = PeerEndpoint::new(close_opts);
    let port = endpoint.start(guard.port()).await.map_err(|e| crate::error::TransportError::Io(e.to_string()))?;
    Ok(Node { endpoint, port, _guard: guard })
}

/// The loopback address a [`Node`] listens on.
pub fn addr(node: &Node) -> (String, u16) {
    ("127.0.0.1".to_string(), node.port)
}

/// Receives exactly `k` values before `deadline` or fails with [`ProtocolIncomplete`].
pub async fn recv_exact(
    endpoint: &PeerEndpoint,
    k: usize,
    deadline: Duration,
    params: &FieldParams,
) -> Result<Vec<FieldElement>, ProtocolIncomplete> {
    let raw = endpoint.recv(k, deadline).await;
    if raw.len() < k {
        return Err(ProtocolIncomplete { expected: k, got: raw.len() });
    }
    Ok(raw.into_iter().map(|v| FieldElement::new(v, &params.p)).collect())
}

pub async fn send_value(endpoint: &PeerEndpoint, host: &str, port: u16, value: &FieldElement) {
    let _ = endpoint.send(host, port, value.value()).await;
}

/// Folds one endpoint's byte/round counters into a [`RunTelemetry`] accumulator.
pub fn fold_stats(telemetry: &mut RunTelemetry, stats: &EndpointStats) {
    let (sent, received, send_rounds, recv_rounds) = stats.snapshot();
    telemetry.bytes_sent += sent;
    telemetry.bytes_received += received;
    telemetry.rounds += send_rounds + recv_rounds;
}

/// Closes every node in `nodes` concurrently.
pub async fn close_all(nodes: &[&Node]) {
    futures::future::join_all(nodes.iter().map(|n| n.endpoint.close())).await;
}
