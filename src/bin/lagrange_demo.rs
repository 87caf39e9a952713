//! Runs one interpolation over loopback sockets and prints `y*` plus the run's telemetry.
//!
//! Example: `lagrange-demo --points 1:5,2:7,3:9 --x-star 4`

use std::collections::HashMap;

use clap::Parser;
use lagrange_mpc::config::Config;
use lagrange_mpc::field::FieldParams;
use lagrange_mpc::net::port_pool::PortPool;
use lagrange_mpc::orchestrator::{self, Point};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(about = "Secure multi-party Lagrange interpolation demo")]
struct Args {
    /// Comma-separated `index:x:y` triples, one per party (e.g. `1:1:5,2:2:7,3:3:9`).
    #[arg(long, value_delimiter = ',')]
    points: Vec<String>,

    /// The public evaluation point `x*`.
    #[arg(long)]
    x_star: u64,

    /// Print the result as a single JSON line instead of human-readable text.
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct JsonReport {
    y_star: String,
    used_fallback: bool,
    bytes_sent: u64,
    bytes_received: u64,
    rounds: u64,
    wall_time_ms: u128,
}

fn parse_point(raw: &str) -> (usize, u64, u64) {
    let parts: Vec<&str> = raw.split(':').collect();
    assert!(parts.len() == 3, "expected `index:x:y`, got {raw}");
    (
        parts[0].parse().expect("index must be an integer"),
        parts[1].parse().expect("x must be an integer"),
        parts[2].parse().expect("y must be an integer"),
    )
}

#[tokio::main]
async fn main() {
    lagrange_mpc::telemetry::init_tracing();

    let args = Args::parse();
    let config = Config::load().unwrap_or_else(|err| {
        tracing::warn!(error = %err, "failed to load config, using defaults");
        Config::default()
    });

    let params = FieldParams::new(
        config.prime.parse().expect("configured prime must parse"),
        config.generator.parse().expect("configured generator must parse"),
    );

    let mut points = HashMap::new();
    for raw in &args.points {
        let (index, x, y) = parse_point(raw);
        points.insert(index, Point { x: params.elem(num_bigint::BigUint::from(x)), y: params.elem(num_bigint::BigUint::from(y)) });
    }
    let x_star = params.elem(num_bigint::BigUint::from(args.x_star));

    let pool = PortPool::new(config.port_range.0, config.port_range.1);

    match orchestrator::run(
        &points,
        &x_star,
        &params,
        &pool,
        config.recv_timeout(),
        config.close_options(),
        config.min_parties,
        config.max_parties,
    )
    .await
    {
        Ok(outcome) => {
            if args.json {
                let report = JsonReport {
                    y_star: outcome.y_star.to_string(),
                    used_fallback: outcome.used_fallback,
                    bytes_sent: outcome.telemetry.bytes_sent,
                    bytes_received: outcome.telemetry.bytes_received,
                    rounds: outcome.telemetry.rounds,
                    wall_time_ms: outcome.wall_time.as_millis(),
                };
                println!("{}", serde_json::to_string(&report).expect("report serializes"));
            } else {
                println!("y* = {}", outcome.y_star);
                if outcome.used_fallback {
                    println!("(plaintext fallback was used — at least one committee failed)");
                }
                println!(
                    "telemetry: {} bytes sent, {} bytes received, {} rounds, {:?} wall time",
                    outcome.telemetry.bytes_sent,
                    outcome.telemetry.bytes_received,
                    outcome.telemetry.rounds,
                    outcome.wall_time,
                );
            }
        }
        Err(err) => {
            eprintln!("interpolation failed: {err}");
            std::process::exit(1);
        }
    }
}
