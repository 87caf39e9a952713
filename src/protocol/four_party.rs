//! Four-party basis computation (spec §4.7): the single 4-tuple committee per owner when `n` is
//! even. Structurally a generalization of [`super::three_party`] from a product of two
//! differences to a product of three: `(x_i-x_j)(x_i-x_k)(x_i-x_l)`.
//!
//! Expanding that product gives `x_i³ - x_i²·S1 + x_i·S2 - P3` where `S1 = x_j+x_k+x_l`,
//! `S2 = x_j x_k + x_j x_l + x_k x_l`, and `P3 = x_j x_k x_l`. Rather than mask `S1`, `S2`, `P3`
//! separately, each party runs one role in a symmetric 4-way mesh: party at position `pos` learns
//! the product of the *other three* parties' values, masked under a one-share row it does not hold
//! any other element of. The owner's instance of that product is `P3` directly; each peer's
//! instance is exactly the cross term it needs to blind and forward (`x_i x_k x_l` for `j`, etc.),
//! and summing those three cross terms together with `P3` and a fresh zero-share reconstructs
//! `x_i²·S1 - x_i·S2 + P3` without anyone learning an `S2` or `S1` in the clear.

use std::time::Duration;

use crate::committee::Committee;
use crate::error::{Error, ProtocolIncomplete};
use crate::field::{FieldElement, FieldParams};
use crate::net::peer::{CloseOptions, PeerEndpoint};
use crate::net::port_pool::PortPool;
use crate::protocol::common::{addr, close_all, recv_exact, send_value, spawn_node, Node};
use crate::protocol::{BasisResult, RunTelemetry};
use crate::sharing::{one_share, zero_share, Shares};

/// Runs the four-party sub-protocol for `committee` and returns the owner's basis factor.
pub async fn run(
    committee: &Committee,
    x: &std::collections::HashMap<usize, FieldElement>,
    x_star: &FieldElement,
    params: &FieldParams,
    pool: &PortPool,
    deadline: Duration,
    close_opts: CloseOptions,
) -> Result<BasisResult, Error> {
    debug_assert!(committee.is_four_party());
    let positions: Vec<usize> = committee.all().collect(); // [owner, j, k, l]

    let nodes = {
        let mut nodes = Vec::with_capacity(4);
        for _ in 0..4 {
            nodes.push(spawn_node(pool, close_opts).await?);
        }
        nodes
    };
    let addrs: Vec<(String, u16)> = nodes.iter().map(addr).collect();
    let x_vals: Vec<FieldElement> = positions.iter().map(|p| x[p].clone()).collect();

    // Four one-shares of size 4, one per recovery role: tp_shares[r] lets the party at position
    // `r` recover the product of the other three parties' values.
    let tp_shares: Vec<Shares> = {
        let mut rows = Vec::with_capacity(4);
        for _ in 0..4 {
            rows.push(one_share(4, params)?);
        }
        rows
    };
    let s1_zero = zero_share(4, params)?;
    let delta_zero = zero_share(4, params)?;
    let num_one = one_share(4, params)?;

    let node_refs: Vec<&Node> = nodes.iter().collect();

    let owner_fut = owner_role(
        nodes[0].endpoint.clone(),
        addrs.clone(),
        x_vals.clone(),
        params.clone(),
        deadline,
        tp_shares.clone(),
        s1_zero.clone(),
        delta_zero.clone(),
        num_one.clone(),
    );
    let peer_futs = (1..4).map(|pos| {
        peer_role(
            nodes[pos].endpoint.clone(),
            pos,
            addrs.clone(),
            x_vals.clone(),
            x_star.clone(),
            params.clone(),
            deadline,
            tp_shares.clone(),
            s1_zero.clone(),
            delta_zero.clone(),
            num_one.clone(),
        )
    });

    let (owner_result, _peer_results) =
        tokio::join!(owner_fut, futures::future::join_all(peer_futs));

    let mut telemetry = RunTelemetry::default();
    for node in &nodes {
        crate::protocol::common::fold_stats(&mut telemetry, node.endpoint.stats());
    }
    close_all(&node_refs).await;

    let value = owner_result?;
    Ok(BasisResult { owner: committee.owner, value, telemetry })
}

/// Sends `x_self` masked under each row this position doesn't own, then receives the 3 masked
/// values addressed to its own row and unmasks their product.
async fn triple_product_of_others(
    endpoint: &PeerEndpoint,
    pos: usize,
    addrs: &[(String, u16)],
    x_self: &FieldElement,
    params: &FieldParams,
    deadline: Duration,
    tp_shares: &[Shares],
) -> Result<FieldElement, ProtocolIncomplete> {
    let masked: Vec<(usize, FieldElement)> = (0..4)
        .filter(|&r| r != pos)
        .map(|r| (r, x_self.mul(&tp_shares[r][pos])))
        .collect();
    let sends = masked.iter().map(|(r, value)| send_value(endpoint, &addrs[*r].0, addrs[*r].1, value));
    let (received, ..) = tokio::join!(
        recv_exact(endpoint, 3, deadline, params),
        futures::future::join_all(sends),
    );
    let received = received?;
    let mut product = params.one();
    for v in &received {
        product = product.mul(v);
    }
    Ok(tp_shares[pos][pos].mul(&product))
}

#[allow(clippy::too_many_arguments)]
async fn owner_role(
    endpoint: PeerEndpoint,
    addrs: Vec<(String, u16)>,
    x_vals: Vec<FieldElement>,
    params: FieldParams,
    deadline: Duration,
    tp_shares: Vec<Shares>,
    s1_zero: Shares,
    delta_zero: Shares,
    num_one: Shares,
) -> Result<FieldElement, Error> {
    let x_i = &x_vals[0];
    let p3 = triple_product_of_others(&endpoint, 0, &addrs, x_i, &params, deadline, &tp_shares).await?;

    let s1_contributions = recv_exact(&endpoint, 3, deadline, &params).await?;
    let mut s1 = s1_zero[0].clone();
    for v in &s1_contributions {
        s1 = s1.add(v);
    }

    let a_term = x_i.mul(x_i).mul(x_i).sub(&p3).sub(&x_i.mul(x_i).mul(&s1));

    let deltas = recv_exact(&endpoint, 3, deadline, &params).await?;
    let mut denominator = delta_zero[0].add(&a_term);
    for d in &deltas {
        denominator = denominator.add(d);
    }

    let numerator_parts = recv_exact(&endpoint, 3, deadline, &params).await?;
    let mut numerator = num_one[0].clone();
    for part in &numerator_parts {
        numerator = numerator.mul(part);
    }

    Ok(numerator.div(&denominator)?)
}

#[allow(clippy::too_many_arguments)]
async fn peer_role(
    endpoint: PeerEndpoint,
    pos: usize,
    addrs: Vec<(String, u16)>,
    x_vals: Vec<FieldElement>,
    x_star: FieldElement,
    params: FieldParams,
    deadline: Duration,
    tp_shares: Vec<Shares>,
    s1_zero: Shares,
    delta_zero: Shares,
    num_one: Shares,
) -> Result<(), Error> {
    let x_self = &x_vals[pos];
    let tp_self = triple_product_of_others(&endpoint, pos, &addrs, x_self, &params, deadline, &tp_shares).await?;

    let owner_addr = &addrs[0];
    let s1_contribution = s1_zero[pos].add(x_self);
    send_value(&endpoint, &owner_addr.0, owner_addr.1, &s1_contribution).await;

    let delta = delta_zero[pos].add(&tp_self);
    send_value(&endpoint, &owner_addr.0, owner_addr.1, &delta).await;

    let numerator_part = num_one[pos].mul(&x_star.sub(x_self));
    send_value(&endpoint, &owner_addr.0, owner_addr.1, &numerator_part).await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::committee::Committee;
    use std::collections::HashMap;

    fn small_params() -> FieldParams {
        FieldParams::new(num_bigint::BigUint::from(104_729u32), num_bigint::BigUint::from(3u32))
    }

    #[tokio::test]
    async fn computes_correct_basis_factor() {
        let params = small_params();
        let pool = PortPool::new(7400, 7499);
        let committee = Committee { owner: 1, members: vec![2, 3, 4] };

        let mut x = HashMap::new();
        x.insert(1, params.elem(num_bigint::BigUint::from(1u32)));
        x.insert(2, params.elem(num_bigint::BigUint::from(2u32)));
        x.insert(3, params.elem(num_bigint::BigUint::from(3u32)));
        x.insert(4, params.elem(num_bigint::BigUint::from(4u32)));
        let x_star = params.elem(num_bigint::BigUint::from(7u32));

        let result = run(
            &committee,
            &x,
            &x_star,
            &params,
            &pool,
            Duration::from_secs(2),
            CloseOptions::default(),
        )
        .await
        .unwrap();

        // L_1(7) = (7-2)(7-3)(7-4) / (1-2)(1-3)(1-4) = 5*4*3 / (-1*-2*-3) = 60 / -6 = -10
        let expected = params.elem(num_bigint::BigUint::from(10u32)).neg();
        assert_eq!(result.value.value(), expected.value());
        assert_eq!(pool.free_count(), 100);
    }
}
