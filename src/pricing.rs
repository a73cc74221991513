//! Perpetual price curve.
//!
//! The quote for a trade of size `k` is the index price shifted by the default
//! probability of the post-trade AMM state. Trades that move the AMM away from
//! its minimal-risk exposure `kStar` pay the premium; trades towards it receive
//! it. A minimal spread is added in the direction of the trade.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::default_probability::default_probability;
use crate::error::{RiskError, RiskResult};
use crate::types::{sign, AmmSnapshot};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingParams {
    pub min_spread: f64,
    /// Used instead of `min_spread` while the default fund is under target.
    pub min_spread_in_stress: f64,
}

impl Default for PricingParams {
    fn default() -> Self {
        Self {
            min_spread: 0.0005,
            min_spread_in_stress: 0.001,
        }
    }
}

impl PricingParams {
    pub fn validate(&self) -> RiskResult<()> {
        if !(self.min_spread >= 0.0 && self.min_spread_in_stress >= 0.0) {
            return Err(RiskError::config("minimal spreads must not be negative"));
        }
        Ok(())
    }

    /// Spread for the current default fund funding ratio (fund / target). The
    /// normal spread needs a fund strictly above target.
    pub fn min_spread_for(&self, default_fund_to_target: f64) -> f64 {
        if default_fund_to_target > 1.0 {
            self.min_spread
        } else {
            debug!(default_fund_to_target, "default fund not above target, stressed spread");
            self.min_spread_in_stress
        }
    }
}

/// Shift of kStar caused by quanto collateral:
/// h = (S3/S2)·(e^{ρσ2σ3} − 1)/(e^{σ2²} − 1)·M3
pub fn quanto_bias(snapshot: &AmmSnapshot) -> RiskResult<f64> {
    let market = &snapshot.market;
    let m3 = snapshot.pool.m3;
    if m3 == 0.0 {
        return Ok(0.0);
    }
    market.require_quanto()?;
    let base_var = (market.sigma2 * market.sigma2).exp() - 1.0;
    if base_var <= 0.0 {
        return Err(RiskError::domain("quanto bias needs a positive base volatility"));
    }
    let cov = (market.rho23 * market.sigma2 * market.sigma3).exp() - 1.0;
    Ok(market.index_s3 / market.index_s2 * cov / base_var * m3)
}

/// AMM minimal-risk exposure point, quanto bias included when M3 > 0.
pub fn k_star(snapshot: &AmmSnapshot) -> RiskResult<f64> {
    snapshot.validate()?;
    let mut k_star = snapshot.pool.m2 - snapshot.position.k2;
    if snapshot.pool.has_quanto() {
        k_star += quanto_bias(snapshot)?;
    }
    Ok(k_star)
}

/// Price for a trade of signed size `k` against the pre-trade `snapshot`.
pub fn perp_price(snapshot: &AmmSnapshot, k: f64, min_spread: f64) -> RiskResult<f64> {
    if !k.is_finite() {
        return Err(RiskError::domain("trade size must be finite"));
    }
    if !(min_spread >= 0.0) {
        return Err(RiskError::domain("minimal spread must not be negative"));
    }
    let k_star = k_star(snapshot)?;
    let q = default_probability(&snapshot.with_trade(k))?.probability;
    let s2 = snapshot.market.index_s2;
    Ok(s2 * (1.0 + sign(k - k_star) * q + sign(k) * min_spread))
}

/// Price at zero size. The spread term vanishes, the risk premium does not.
pub fn mid_price(snapshot: &AmmSnapshot) -> RiskResult<f64> {
    perp_price(snapshot, 0.0, 0.0)
}

/// Worst price a trader in `direction` accepts, `slippage` as a fraction.
pub fn slippage_price(mid: f64, slippage: f64, direction: f64) -> RiskResult<f64> {
    if !(slippage >= 0.0) {
        return Err(RiskError::domain("slippage must not be negative"));
    }
    Ok(mid * (1.0 + sign(direction) * slippage))
}

/// Slippage limit around the one-lot mid, the average of bid and ask for one lot.
pub fn slippage_price_from_mid(
    snapshot: &AmmSnapshot,
    lot_size: f64,
    min_spread: f64,
    slippage: f64,
    direction: f64,
) -> RiskResult<f64> {
    if !(lot_size > 0.0) {
        return Err(RiskError::config("lot size must be positive"));
    }
    let bid = perp_price(snapshot, -lot_size, min_spread)?;
    let ask = perp_price(snapshot, lot_size, min_spread)?;
    slippage_price(0.5 * (bid + ask), slippage, direction)
}

// price a trader budgets for when trading k. the curve price, unless the
// slippage limit is worse for the trader.
pub fn trade_entry_price(
    snapshot: &AmmSnapshot,
    k: f64,
    lot_size: f64,
    min_spread: f64,
    slippage: f64,
) -> RiskResult<f64> {
    let curve = perp_price(snapshot, k, min_spread)?;
    let limit = slippage_price_from_mid(snapshot, lot_size, min_spread, slippage, k)?;
    Ok(if k > 0.0 {
        curve.max(limit)
    } else if k < 0.0 {
        curve.min(limit)
    } else {
        curve
    })
}
