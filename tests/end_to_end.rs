//! End-to-end scenarios from the spec's testable-properties table: real TCP loopback sockets,
//! the full committee plan, and both the masked-multiplication path and the plaintext fallback.

use std::collections::HashMap;
use std::time::Duration;

use num_bigint::BigUint;

use lagrange_mpc::committee::{MAX_PARTIES, MIN_PARTIES};
use lagrange_mpc::error::{Error, FieldError};
use lagrange_mpc::field::FieldParams;
use lagrange_mpc::net::peer::CloseOptions;
use lagrange_mpc::net::port_pool::PortPool;
use lagrange_mpc::orchestrator::{self, Point};

fn point(params: &FieldParams, x: u64, y: u64) -> Point {
    Point { x: params.elem(BigUint::from(x)), y: params.elem(BigUint::from(y)) }
}

async fn run(
    points: &HashMap<usize, Point>,
    x_star: u64,
    params: &FieldParams,
    pool: &PortPool,
    recv_timeout: Duration,
) -> Result<orchestrator::RunOutcome, Error> {
    orchestrator::run(
        points,
        &params.elem(BigUint::from(x_star)),
        params,
        pool,
        recv_timeout,
        CloseOptions::default(),
        MIN_PARTIES,
        MAX_PARTIES,
    )
    .await
}

// S1: f(x) = x^2 + 2 through (1,3),(2,6),(3,11); f(5) = 27. Three-party committees only (n=3).
#[tokio::test]
async fn s1_three_party_quadratic() {
    let params = FieldParams::default_params();
    let pool = PortPool::new(7500, 7599);
    let mut points = HashMap::new();
    points.insert(1, point(&params, 1, 3));
    points.insert(2, point(&params, 2, 6));
    points.insert(3, point(&params, 3, 11));

    let outcome = run(&points, 5, &params, &pool, Duration::from_secs(5)).await.unwrap();

    assert!(!outcome.used_fallback);
    assert_eq!(outcome.y_star.value(), &BigUint::from(27u32));
    assert_eq!(pool.free_count(), 100);
}

// S2: f(x) = x^3 through (1,1),(2,8),(3,27),(4,64); f(5) = 125. Exercises the four-party path.
#[tokio::test]
async fn s2_four_party_cubic() {
    let params = FieldParams::default_params();
    let pool = PortPool::new(7600, 7699);
    let mut points = HashMap::new();
    points.insert(1, point(&params, 1, 1));
    points.insert(2, point(&params, 2, 8));
    points.insert(3, point(&params, 3, 27));
    points.insert(4, point(&params, 4, 64));

    let outcome = run(&points, 5, &params, &pool, Duration::from_secs(5)).await.unwrap();

    assert!(!outcome.used_fallback);
    assert_eq!(outcome.y_star.value(), &BigUint::from(125u32));
    assert_eq!(pool.free_count(), 100);
}

// S3: f(x) = x^2 through (1,1),(2,4),(3,9); f(9) = 81. Odd party count, three-party path.
#[tokio::test]
async fn s3_three_party_square() {
    let params = FieldParams::default_params();
    let pool = PortPool::new(7700, 7799);
    let mut points = HashMap::new();
    for i in 1u64..=3 {
        points.insert(i as usize, point(&params, i, i * i));
    }

    let outcome = run(&points, 9, &params, &pool, Duration::from_secs(5)).await.unwrap();

    assert!(!outcome.used_fallback);
    assert_eq!(outcome.y_star.value(), &BigUint::from(81u32));
}

// S4: f(x) = x^2 through (1,1),(2,4),(3,9),(4,16); f(9) = 81. Even party count, four-party path.
#[tokio::test]
async fn s4_four_party_square() {
    let params = FieldParams::default_params();
    let pool = PortPool::new(7800, 7899);
    let mut points = HashMap::new();
    for i in 1u64..=4 {
        points.insert(i as usize, point(&params, i, i * i));
    }

    let outcome = run(&points, 9, &params, &pool, Duration::from_secs(5)).await.unwrap();

    assert!(!outcome.used_fallback);
    assert_eq!(outcome.y_star.value(), &BigUint::from(81u32));
}

// S5: duplicate x_i across parties surfaces as a DomainError before any committee runs.
#[tokio::test]
async fn s5_duplicate_x_is_domain_error() {
    let params = FieldParams::default_params();
    let pool = PortPool::new(7900, 7909);
    let mut points = HashMap::new();
    points.insert(1, point(&params, 1, 5));
    points.insert(2, point(&params, 1, 6));
    points.insert(3, point(&params, 2, 7));

    let result = run(&points, 10, &params, &pool, Duration::from_secs(5)).await;

    assert!(matches!(result, Err(Error::Domain(FieldError::NotInvertible))));
    assert_eq!(pool.free_count(), 10);
}

// S6: below MIN_PARTIES surfaces as an ArgumentError before any committee runs.
#[tokio::test]
async fn s6_below_min_parties_is_argument_error() {
    let params = FieldParams::default_params();
    let pool = PortPool::new(7910, 7919);
    let mut points = HashMap::new();
    points.insert(1, point(&params, 1, 1));
    points.insert(2, point(&params, 2, 4));

    let result = run(&points, 10, &params, &pool, Duration::from_secs(5)).await;

    assert!(matches!(result, Err(Error::Argument(_))));
    assert_eq!(pool.free_count(), 10);
}

// Port conservation (testable property 6): the pool's free-count is restored regardless of
// whether the run succeeded or fell back.
#[tokio::test]
async fn port_pool_is_conserved_across_a_full_run() {
    let params = FieldParams::default_params();
    let pool = PortPool::new(7920, 7999);
    let before = pool.free_count();
    let mut points = HashMap::new();
    points.insert(1, point(&params, 1, 3));
    points.insert(2, point(&params, 2, 6));
    points.insert(3, point(&params, 3, 11));

    run(&points, 5, &params, &pool, Duration::from_secs(5)).await.unwrap();

    assert_eq!(pool.free_count(), before);
}

// Failure-injection property: forcing every recv to time out immediately still yields the
// correct y* via the plaintext fallback, and the orchestrator reports that it fell back.
#[tokio::test]
async fn timed_out_committees_still_produce_the_correct_answer_via_fallback() {
    let params = FieldParams::default_params();
    let pool = PortPool::new(8000, 8099);
    let mut points = HashMap::new();
    points.insert(1, point(&params, 1, 3));
    points.insert(2, point(&params, 2, 6));
    points.insert(3, point(&params, 3, 11));

    // A deadline this tight expires before any peer can complete even one round, forcing every
    // committee into ProtocolIncomplete and exercising the plaintext correctness floor.
    let outcome = run(&points, 5, &params, &pool, Duration::from_nanos(1)).await.unwrap();

    assert!(outcome.used_fallback);
    assert_eq!(outcome.y_star.value(), &BigUint::from(27u32));
    assert_eq!(pool.free_count(), 100);
}
