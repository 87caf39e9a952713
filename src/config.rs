//! Layered runtime configuration, built on the `config` crate the way the teacher layers its own
//! `NetworkConfig`/`ServerConfig`: defaults, then an optional file, then environment overrides.

use std::time::Duration;

use serde::Deserialize;

use crate::committee::{MAX_PARTIES, MIN_PARTIES};
use crate::error::ConfigError;
use crate::field::{DEFAULT_GENERATOR_DEC, DEFAULT_PRIME_DEC};
use crate::net::peer::CloseOptions;
use crate::net::port_pool::{DEFAULT_MAX_PORT, DEFAULT_MIN_PORT};

/// Runtime knobs for a single interpolation run.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Lower bound on party count, inclusive.
    pub min_parties: usize,
    /// Upper bound on party count, inclusive.
    pub max_parties: usize,
    /// Per-`Recv` deadline in milliseconds, per spec §4.6/§4.7.
    pub recv_timeout_ms: u64,
    /// Inclusive `[min, max]` TCP port range the port pool draws from.
    pub port_range: (u16, u16),
    /// Field modulus, base-10. Defaults to the crate's ~384-bit prime.
    pub prime: String,
    /// Multiplicative group generator, base-10.
    pub generator: String,
    /// Grace period given to a listener task when closing an endpoint.
    pub listener_grace_ms: u64,
    /// Grace period given to cached writer sockets when closing an endpoint.
    pub writer_grace_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_parties: MIN_PARTIES,
            max_parties: MAX_PARTIES,
            recv_timeout_ms: 5_000,
            port_range: (DEFAULT_MIN_PORT, DEFAULT_MAX_PORT),
            prime: DEFAULT_PRIME_DEC.to_string(),
            generator: DEFAULT_GENERATOR_DEC.to_string(),
            listener_grace_ms: 50,
            writer_grace_ms: 50,
        }
    }
}

impl Config {
    /// Loads configuration layered as defaults -> `config/default.toml` (if present) ->
    /// `LAGRANGE_*` environment variables, mirroring the teacher's layered `config::Config`
    /// builder.
    pub fn load() -> Result<Self, ConfigError> {
        let built = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::Environment::with_prefix("LAGRANGE"))
            .build()?;
        let parsed: Self = built.try_deserialize()?;
        parsed.validate()?;
        Ok(parsed)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.min_parties < 2 || self.min_parties > self.max_parties {
            return Err(ConfigError::InvalidPartyCount(self.min_parties, 2, self.max_parties));
        }
        Ok(())
    }

    pub fn recv_timeout(&self) -> Duration {
        Duration::from_millis(self.recv_timeout_ms)
    }

    pub fn close_options(&self) -> CloseOptions {
        CloseOptions {
            listener_grace: Duration::from_millis(self.listener_grace_ms),
            writer_grace: Duration::from_millis(self.writer_grace_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_internally_consistent() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.port_range, (DEFAULT_MIN_PORT, DEFAULT_MAX_PORT));
    }

    #[test]
    fn rejects_inverted_party_bounds() {
        let mut config = Config::default();
        config.min_parties = 9;
        config.max_parties = 3;
        assert!(config.validate().is_err());
    }
}
