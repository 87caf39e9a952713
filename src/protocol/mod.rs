//! Masked-multiplication sub-protocols that compute one owner's contribution to a Lagrange
//! basis, jointly with the other members of its committee, without revealing private `x`
//! values to each other.

pub mod common;
pub mod four_party;
pub mod three_party;

/// Telemetry folded back from a single committee run into the orchestrator.
#[derive(Debug, Clone, Default)]
pub struct RunTelemetry {
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub rounds: u64,
}

impl RunTelemetry {
    pub fn add(&mut self, other: &RunTelemetry) {
        self.bytes_sent += other.bytes_sent;
        self.bytes_received += other.bytes_received;
        self.rounds += other.rounds;
    }
}

/// The outcome of one committee's sub-protocol: the owner index and its basis factor.
#[derive(Debug, Clone)]
pub struct BasisResult {
    pub owner: usize,
    pub value: crate::field::FieldElement,
    pub telemetry: RunTelemetry,
}
