//! Probability that the AMM's collateral cannot cover aggregated trader claims.
//!
//! The base price follows a lognormal one-period model. At horizon the AMM holds
//! `S2·e^Y·(M2 − K2) + M1 + L1` in quote currency and defaults when that is
//! negative. With quanto collateral the shortfall is approximated by a normal
//! variable Z whose mean and variance come from the joint lognormal moments of
//! S2 and S3.

use tracing::debug;

use crate::error::{RiskError, RiskResult};
use crate::normal;
use crate::types::{AmmSnapshot, CollateralPool, MarketState, Position};

/// Saturated distance-to-default. Used instead of infinities at the boundaries.
pub const DD_SATURATION: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DefaultProbability {
    pub probability: f64,
    pub distance_to_default: f64,
}

impl DefaultProbability {
    fn from_dd(distance_to_default: f64) -> Self {
        Self {
            probability: normal::cdf(distance_to_default),
            distance_to_default,
        }
    }

    fn certain_default() -> Self {
        Self {
            probability: 1.0,
            distance_to_default: DD_SATURATION,
        }
    }

    fn no_default() -> Self {
        Self {
            probability: 0.0,
            distance_to_default: -DD_SATURATION,
        }
    }

    pub fn is_saturated(&self) -> bool {
        self.distance_to_default.abs() == DD_SATURATION
    }
}

/// Default probability without quanto collateral. M3 is ignored.
pub fn prob_def_no_quanto(
    position: &Position,
    market: &MarketState,
    pool: &CollateralPool,
) -> RiskResult<DefaultProbability> {
    market.validate()?;
    let net_base = pool.m2 - position.k2;
    let shortfall = -position.l1 - pool.m1;

    if net_base >= 0.0 && shortfall <= 0.0 {
        debug!(net_base, shortfall, "default model saturated: no default possible");
        return Ok(DefaultProbability::no_default());
    }
    if net_base <= 0.0 && shortfall >= 0.0 {
        // shortfall == 0 with a net short base position defaults for any price
        debug!(net_base, shortfall, "default model saturated: default certain");
        return Ok(DefaultProbability::certain_default());
    }
    if market.sigma2 <= 0.0 {
        return Err(RiskError::domain(
            "base volatility must be positive for a non-degenerate default probability",
        ));
    }

    let mu_y = market.drift - 0.5 * market.sigma2 * market.sigma2;
    let denom = market.index_s2 * net_base;
    let mut dd = ((shortfall / denom).ln() - mu_y) / market.sigma2;
    if net_base < 0.0 {
        dd = -dd;
    }
    Ok(DefaultProbability::from_dd(dd))
}

/// Variance of the normalized settlement value Z for quanto coefficient `c3`.
pub fn quanto_variance(market: &MarketState, c3: f64) -> f64 {
    let s2 = market.sigma2;
    let s3 = market.sigma3;
    (2.0 * market.drift).exp()
        * (((s3 * s3).exp() - 1.0) * c3 * c3
            + ((s2 * s2).exp() - 1.0)
            + 2.0 * ((s2 * s3 * market.rho23).exp() - 1.0) * c3)
}

/// Default probability with quanto collateral M3. With M3 == 0 this is exactly
/// [`prob_def_no_quanto`].
pub fn prob_def_quanto(
    position: &Position,
    market: &MarketState,
    pool: &CollateralPool,
) -> RiskResult<DefaultProbability> {
    if pool.m3 == 0.0 {
        return prob_def_no_quanto(position, market, pool);
    }
    market.validate()?;
    market.require_quanto()?;

    let net_base = pool.m2 - position.k2;
    if net_base == 0.0 {
        return Err(RiskError::config(
            "quanto coefficient undefined: M2 equals K2",
        ));
    }
    let base_value = market.index_s2 * net_base;
    let c3 = pool.m3 * market.index_s3 / base_value;

    let variance = quanto_variance(market, c3);
    if !variance.is_finite() || variance <= 0.0 {
        return Err(RiskError::domain(format!(
            "settlement variance must be positive, got {variance}"
        )));
    }
    let mu_z = market.drift.exp() * (1.0 + c3);

    let mut dd = ((-position.l1 - pool.m1) / base_value - mu_z) / variance.sqrt();
    if net_base < 0.0 {
        dd = -dd;
    }
    Ok(DefaultProbability::from_dd(dd))
}

/// Picks the quanto variant iff the snapshot holds quanto collateral.
pub fn default_probability(snapshot: &AmmSnapshot) -> RiskResult<DefaultProbability> {
    snapshot.validate()?;
    if snapshot.pool.has_quanto() {
        prob_def_quanto(&snapshot.position, &snapshot.market, &snapshot.pool)
    } else {
        prob_def_no_quanto(&snapshot.position, &snapshot.market, &snapshot.pool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn market() -> MarketState {
        MarketState {
            index_s2: 38000.0,
            index_s3: 2000.0,
            sigma2: 0.05,
            sigma3: 0.07,
            rho23: 0.5,
            drift: 0.0,
        }
    }

    fn position() -> Position {
        Position::new(0.4, 0.4 * 36000.0)
    }

    #[test]
    fn no_quanto_reference_value() {
        let pool = CollateralPool::new(10.0, 0.06, 0.0);
        let res = prob_def_no_quanto(&position(), &market(), &pool).unwrap();
        assert!((res.probability - 0.013_624_986_789_704_379).abs() < 1e-14);
        assert!((res.distance_to_default - (-2.207_918_233_139_494)).abs() < 1e-12);
    }

    #[test]
    fn quanto_reference_value() {
        let pool = CollateralPool::new(10.0, 0.06, 0.2);
        let res = prob_def_quanto(&position(), &market(), &pool).unwrap();
        assert!((res.probability - 0.001_411_363_900_083_552_7).abs() < 1e-15);
        assert!((res.distance_to_default - (-2.986_411_226_483_645_5)).abs() < 1e-12);
    }

    #[test]
    fn quanto_with_empty_m3_matches_no_quanto() {
        let pool = CollateralPool::new(10.0, 0.06, 0.0);
        let a = prob_def_quanto(&position(), &market(), &pool).unwrap();
        let b = prob_def_no_quanto(&position(), &market(), &pool).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn covered_claims_never_default() {
        // base cushion above K2 and no quote shortfall
        let pos = Position::new(0.4, 14400.0);
        let pool = CollateralPool::new(100.0, 0.5, 0.0);
        let res = prob_def_no_quanto(&pos, &market(), &pool).unwrap();
        assert_eq!(res.probability, 0.0);
        assert_eq!(res.distance_to_default, -DD_SATURATION);
        assert!(res.is_saturated());
    }

    #[test]
    fn uncovered_short_always_defaults() {
        let pos = Position::new(1.0, -100.0);
        let pool = CollateralPool::new(0.0, 0.5, 0.0);
        let res = prob_def_no_quanto(&pos, &market(), &pool).unwrap();
        assert_eq!(res.probability, 1.0);
        assert_eq!(res.distance_to_default, DD_SATURATION);

        // zero quote shortfall with a net short base position
        let pos = Position::new(1.0, 0.0);
        let res = prob_def_no_quanto(&pos, &market(), &pool).unwrap();
        assert_eq!(res.probability, 1.0);
    }

    #[test]
    fn quanto_rejects_balanced_base() {
        let pos = Position::new(0.06, 14400.0);
        let pool = CollateralPool::new(10.0, 0.06, 0.2);
        let err = prob_def_quanto(&pos, &market(), &pool).unwrap_err();
        assert!(matches!(err, RiskError::InvalidConfiguration { .. }));
    }

    #[test]
    fn quanto_rejects_missing_s3() {
        let m = MarketState {
            index_s3: 0.0,
            ..market()
        };
        let pool = CollateralPool::new(10.0, 0.06, 0.2);
        let err = prob_def_quanto(&position(), &m, &pool).unwrap_err();
        assert!(matches!(err, RiskError::InvalidConfiguration { .. }));
    }

    #[test]
    fn overflowing_variance_is_rejected() {
        let m = MarketState {
            sigma3: 30.0,
            ..market()
        };
        let pool = CollateralPool::new(10.0, 0.06, 0.2);
        let err = prob_def_quanto(&position(), &m, &pool).unwrap_err();
        assert!(matches!(err, RiskError::DomainViolation { .. }));
    }

    #[test]
    fn zero_volatility_is_rejected() {
        let m = MarketState::without_quanto(38000.0, 0.0, 0.0);
        let pool = CollateralPool::new(10.0, 0.06, 0.0);
        let err = prob_def_no_quanto(&position(), &m, &pool).unwrap_err();
        assert!(matches!(err, RiskError::DomainViolation { .. }));
    }

    #[test]
    fn snapshot_dispatch_uses_quanto_only_with_m3() {
        let with_m3 = AmmSnapshot::new(market(), position(), CollateralPool::new(10.0, 0.06, 0.2));
        let q = default_probability(&with_m3).unwrap();
        assert!((q.probability - 0.001_411_363_900_083_552_7).abs() < 1e-15);

        let without = AmmSnapshot::new(market(), position(), CollateralPool::new(10.0, 0.06, 0.0));
        let q = default_probability(&without).unwrap();
        assert!((q.probability - 0.013_624_986_789_704_379).abs() < 1e-14);
    }
}
