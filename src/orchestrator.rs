//! Drives one interpolation run end to end: validates input, plans committees, runs every
//! sub-protocol concurrently, combines the results into `y*`, and falls back to plaintext
//! Lagrange interpolation if any committee failed.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::warn;

use crate::committee::{self, Committee};
use crate::error::{Error, FieldError};
use crate::field::{FieldElement, FieldParams};
use crate::net::peer::CloseOptions;
use crate::net::port_pool::PortPool;
use crate::protocol::{four_party, three_party, RunTelemetry};
use crate::telemetry;

/// One party's private point, indexed `1..=n`.
#[derive(Clone, Debug)]
pub struct Point {
    pub x: FieldElement,
    pub y: FieldElement,
}

/// The outcome of a full interpolation run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub y_star: FieldElement,
    pub used_fallback: bool,
    pub telemetry: RunTelemetry,
    pub wall_time: Duration,
}

/// Runs the full protocol over `points` at evaluation point `x_star`.
///
/// # Errors
/// Returns [`Error::Argument`] when `n` is outside `[min_parties, max_parties]`, or
/// [`Error::Domain`] when two parties hold the same `x_i`.
pub async fn run(
    points: &HashMap<usize, Point>,
    x_star: &FieldElement,
    params: &FieldParams,
    pool: &PortPool,
    recv_timeout: Duration,
    close_opts: CloseOptions,
    min_parties: usize,
    max_parties: usize,
) -> Result<RunOutcome, Error> {
    let start = Instant::now();
    let n = points.len();
    if n < min_parties || n > max_parties {
        return Err(Error::Argument(format!(
            "party count {n} out of range [{min_parties}, {max_parties}]"
        )));
    }
    validate_distinct_x(points)?;

    let committees = committee::plan(n, min_parties, max_parties)?;
    let x: HashMap<usize, FieldElement> = points.iter().map(|(&i, p)| (i, p.x.clone())).collect();

    let mut join_set = tokio::task::JoinSet::new();
    for committee in committees {
        let x = x.clone();
        let x_star = x_star.clone();
        let params = params.clone();
        let pool = pool.clone();
        join_set.spawn(async move {
            let committee_start = Instant::now();
            let outcome = run_committee(&committee, &x, &x_star, &params, &pool, recv_timeout, close_opts).await;
            (outcome, committee_start.elapsed())
        });
    }

    let mut acc: HashMap<usize, FieldElement> = points.keys().map(|&i| (i, params.one())).collect();
    let mut telemetry_acc = RunTelemetry::default();
    let mut any_failed = false;
    let mut max_compute = Duration::ZERO;

    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok((Ok(result), elapsed)) => {
                max_compute = max_compute.max(elapsed);
                telemetry_acc.add(&result.telemetry);
                let entry = acc.get_mut(&result.owner).expect("committee owner is one of the input points");
                *entry = entry.mul(&result.value);
            }
            Ok((Err(err), elapsed)) => {
                max_compute = max_compute.max(elapsed);
                warn!(error = %err, "sub-protocol committee failed, falling back to plaintext");
                any_failed = true;
            }
            Err(join_err) => {
                warn!(error = %join_err, "sub-protocol task panicked, falling back to plaintext");
                any_failed = true;
            }
        }
    }

    telemetry::record_send_bytes(telemetry_acc.bytes_sent);
    telemetry::record_recv_bytes(telemetry_acc.bytes_received);

    let (y_star, used_fallback) = if any_failed {
        (plaintext_interpolate(points, x_star, params)?, true)
    } else {
        (combine(points, &acc, params), false)
    };

    let wall_time = start.elapsed();
    telemetry::record_run_time(wall_time);
    telemetry::record_max_compute_time(max_compute);

    Ok(RunOutcome { y_star, used_fallback, telemetry: telemetry_acc, wall_time })
}

fn validate_distinct_x(points: &HashMap<usize, Point>) -> Result<(), Error> {
    let mut seen = std::collections::HashSet::new();
    for point in points.values() {
        if !seen.insert(point.x.value().clone()) {
            return Err(Error::Domain(FieldError::NotInvertible));
        }
    }
    Ok(())
}

async fn run_committee(
    committee: &Committee,
    x: &HashMap<usize, FieldElement>,
    x_star: &FieldElement,
    params: &FieldParams,
    pool: &PortPool,
    deadline: Duration,
    close_opts: CloseOptions,
) -> Result<crate::protocol::BasisResult, Error> {
    if committee.is_four_party() {
        four_party::run(committee, x, x_star, params, pool, deadline, close_opts).await
    } else {
        three_party::run(committee, x, x_star, params, pool, deadline, close_opts).await
    }
}

fn combine(points: &HashMap<usize, Point>, acc: &HashMap<usize, FieldElement>, params: &FieldParams) -> FieldElement {
    let mut sum = params.zero();
    for (i, point) in points {
        sum = sum.add(&acc[i].mul(&point.y));
    }
    sum
}

/// Plaintext Lagrange interpolation, used only as the orchestrator's correctness floor when a
/// sub-protocol fails. Offers no privacy: every `x_i` is used in the clear.
fn plaintext_interpolate(
    points: &HashMap<usize, Point>,
    x_star: &FieldElement,
    params: &FieldParams,
) -> Result<FieldElement, Error> {
    let mut y_star = params.zero();
    for (i, pi) in points {
        let mut term = pi.y.clone();
        for (j, pj) in points {
            if i == j {
                continue;
            }
            let denom = pi.x.sub(&pj.x).inverse()?;
            term = term.mul(&x_star.sub(&pj.x)).mul(&denom);
        }
        y_star = y_star.add(&term);
    }
    Ok(y_star)
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigUint;

    fn small_params() -> FieldParams {
        FieldParams::new(BigUint::from(104_729u32), BigUint::from(3u32))
    }

    fn point(params: &FieldParams, x: u64, y: u64) -> Point {
        Point { x: params.elem(BigUint::from(x)), y: params.elem(BigUint::from(y)) }
    }

    #[test]
    fn plaintext_matches_degree_one_line() {
        let params = small_params();
        let mut points = HashMap::new();
        points.insert(1, point(&params, 1, 5));
        points.insert(2, point(&params, 2, 7));
        let x_star = params.elem(BigUint::from(3u32));
        // y = 2x + 3, so y(3) = 9
        let y_star = plaintext_interpolate(&points, &x_star, &params).unwrap();
        assert_eq!(y_star.value(), &BigUint::from(9u32));
    }

    #[test]
    fn duplicate_x_is_rejected() {
        let params = small_params();
        let mut points = HashMap::new();
        points.insert(1, point(&params, 1, 5));
        points.insert(2, point(&params, 1, 6));
        assert!(matches!(validate_distinct_x(&points), Err(Error::Domain(FieldError::NotInvertible))));
    }
}
