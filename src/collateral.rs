//! Collateral target solver.
//!
//! Inverts the default model: given a target distance-to-default, find the AMM
//! collateral balance that achieves it. Quote and base collateral have closed
//! forms. Quanto collateral reduces to a quadratic in M3 where the target enters
//! squared, so both roots are reported and the larger one is selected.
//!
//! Each target assumes the other two balances are zero.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{RiskError, RiskResult};
use crate::normal;
use crate::types::{CollateralCurrency, MarketState, Position};

fn check_target(target_dd: f64) -> RiskResult<()> {
    if !target_dd.is_finite() {
        return Err(RiskError::domain("target distance-to-default must be finite"));
    }
    Ok(())
}

fn lognormal_mu(market: &MarketState) -> f64 {
    market.drift - 0.5 * market.sigma2 * market.sigma2
}

/// Quote-currency collateral M1 reaching `target_dd`.
pub fn target_collateral_m1(
    position: &Position,
    market: &MarketState,
    target_dd: f64,
) -> RiskResult<f64> {
    market.validate()?;
    check_target(target_dd)?;
    let mu = lognormal_mu(market);
    let sig = market.sigma2;
    let growth = if position.k2 < 0.0 {
        (mu + sig * target_dd).exp()
    } else {
        (mu - sig * target_dd).exp()
    };
    Ok(position.k2 * market.index_s2 * growth - position.l1)
}

/// Base-currency collateral M2 reaching `target_dd`.
pub fn target_collateral_m2(
    position: &Position,
    market: &MarketState,
    target_dd: f64,
) -> RiskResult<f64> {
    market.validate()?;
    check_target(target_dd)?;
    let mu = lognormal_mu(market);
    let sig = market.sigma2;
    let growth = if position.l1 < 0.0 {
        (mu + sig * target_dd).exp()
    } else {
        (mu - sig * target_dd).exp()
    };
    Ok(position.k2 - position.l1 / (growth * market.index_s2))
}

/// Which root of the quanto quadratic was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectedRoot {
    First,
    Second,
}

/// Both roots of `a0·M3² + b0·M3 + c0 = 0` plus the one taken as the target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuantoCollateralTarget {
    /// (−b0 + √disc) / 2a0
    pub root1: f64,
    /// (−b0 − √disc) / 2a0
    pub root2: f64,
    pub selected: SelectedRoot,
}

impl QuantoCollateralTarget {
    pub fn value(&self) -> f64 {
        match self.selected {
            SelectedRoot::First => self.root1,
            SelectedRoot::Second => self.root2,
        }
    }
}

// roots of the quanto quadratic for a squared target quantile
fn quanto_roots(position: &Position, market: &MarketState, dd_squared: f64) -> RiskResult<(f64, f64)> {
    market.validate()?;
    market.require_quanto()?;
    if position.k2 == 0.0 {
        return Err(RiskError::config(
            "quanto collateral target undefined for zero exposure K2",
        ));
    }
    let s2 = market.index_s2;
    let s3 = market.index_s3;
    let r = market.drift;

    let kappa = position.l1 / s2 / position.k2;
    let a = (market.sigma3 * market.sigma3).exp() - 1.0;
    let b = 2.0 * ((market.sigma3 * market.sigma2 * market.rho23).exp() - 1.0);
    let c = (market.sigma2 * market.sigma2).exp() - 1.0;
    let v = -s3 / s2 / position.k2;

    let a0 = (a * dd_squared - 1.0) * v * v;
    let b0 = (b * dd_squared - 2.0 + 2.0 * kappa * (-r).exp()) * v;
    let c0 = c * dd_squared - kappa * kappa * (-2.0 * r).exp() + 2.0 * kappa * (-r).exp() - 1.0;

    if !(a0.is_finite() && b0.is_finite() && c0.is_finite()) {
        return Err(RiskError::domain(format!(
            "quanto quadratic coefficients overflow (a0 {a0}, b0 {b0}, c0 {c0})"
        )));
    }
    if a0 == 0.0 {
        return Err(RiskError::config("degenerate quanto quadratic (a0 == 0)"));
    }
    let disc = b0 * b0 - 4.0 * a0 * c0;
    if !disc.is_finite() || disc < 0.0 {
        return Err(RiskError::domain(format!(
            "no real quanto collateral level reaches the target (discriminant {disc})"
        )));
    }
    let sq = disc.sqrt();
    Ok(((-b0 + sq) / (2.0 * a0), (-b0 - sq) / (2.0 * a0)))
}

/// Quanto-currency collateral M3 reaching `target_dd`. The larger root is the
/// economically valid one; the smaller one solves the squared equation only.
pub fn target_collateral_m3(
    position: &Position,
    market: &MarketState,
    target_dd: f64,
) -> RiskResult<QuantoCollateralTarget> {
    check_target(target_dd)?;
    let (root1, root2) = quanto_roots(position, market, target_dd * target_dd)?;
    let selected = if root1 >= root2 {
        SelectedRoot::First
    } else {
        SelectedRoot::Second
    };
    debug!(root1, root2, ?selected, "quanto collateral roots");
    Ok(QuantoCollateralTarget {
        root1,
        root2,
        selected,
    })
}

/// Quanto target for a default probability `q` in (0, 1). Returns both roots
/// unselected; the caller validates which one applies.
pub fn target_collateral_m3_from_probability(
    q: f64,
    position: &Position,
    market: &MarketState,
) -> RiskResult<(f64, f64)> {
    let dd = normal::inverse_cdf(q)?;
    quanto_roots(position, market, dd * dd)
}

/// Target for the balance matching `currency`.
pub fn target_collateral(
    currency: CollateralCurrency,
    position: &Position,
    market: &MarketState,
    target_dd: f64,
) -> RiskResult<f64> {
    match currency {
        CollateralCurrency::Quote => target_collateral_m1(position, market, target_dd),
        CollateralCurrency::Base => target_collateral_m2(position, market, target_dd),
        CollateralCurrency::Quanto => {
            target_collateral_m3(position, market, target_dd).map(|t| t.value())
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmmFundParams {
    /// Target dd in normal conditions.
    pub target_dd_baseline: f64,
    /// Looser target dd used while the default fund is under target.
    pub target_dd_stress: f64,
    /// Floor for the AMM fund, in collateral currency.
    pub min_size_cc: f64,
}

impl Default for AmmFundParams {
    fn default() -> Self {
        Self {
            target_dd_baseline: -2.582_807_452_0,
            target_dd_stress: -2.053_748_910_631_823,
            min_size_cc: 0.25,
        }
    }
}

impl AmmFundParams {
    pub fn validate(&self) -> RiskResult<()> {
        if !(self.target_dd_baseline < 0.0 && self.target_dd_stress < 0.0) {
            return Err(RiskError::config("AMM target distances must be negative"));
        }
        if self.target_dd_stress < self.target_dd_baseline {
            return Err(RiskError::config(
                "stress target must be looser than the baseline target",
            ));
        }
        if !(self.min_size_cc >= 0.0) {
            return Err(RiskError::config("AMM minimum size must not be negative"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AmmFundTarget {
    pub baseline: f64,
    pub stress: f64,
}

/// Baseline and stress AMM fund targets, floored at the minimum size.
pub fn amm_fund_target(
    params: &AmmFundParams,
    currency: CollateralCurrency,
    position: &Position,
    market: &MarketState,
) -> RiskResult<AmmFundTarget> {
    params.validate()?;
    let baseline = target_collateral(currency, position, market, params.target_dd_baseline)?;
    let stress = target_collateral(currency, position, market, params.target_dd_stress)?;
    Ok(AmmFundTarget {
        baseline: baseline.max(params.min_size_cc),
        stress: stress.max(params.min_size_cc),
    })
}
