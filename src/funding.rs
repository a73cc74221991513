// 5.0: funding rate. the premium of the AMM mid price over the index is clamped
// into a dead band, then a small bias pushes traders towards reducing the AMM's
// exposure. 5.0 has the params, 5.1 the rate, 5.2 the per-account fee.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::{RiskError, RiskResult};
use crate::pricing::{k_star, mid_price};
use crate::types::{sign_decimal, AmmSnapshot};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundingParams {
    // premiums within [-delta, delta] pay no funding
    pub clamp_delta: Decimal,
    // added with the sign of -kStar
    pub exposure_bias: Decimal,
}

impl Default for FundingParams {
    fn default() -> Self {
        Self {
            clamp_delta: dec!(0.0005),
            exposure_bias: dec!(0.0001),
        }
    }
}

impl FundingParams {
    pub fn validate(&self) -> RiskResult<()> {
        if self.clamp_delta < Decimal::ZERO || self.exposure_bias < Decimal::ZERO {
            return Err(RiskError::config(
                "funding clamp and bias must not be negative",
            ));
        }
        Ok(())
    }
}

// 5.1: how far the AMM mid price is from the index. positive = mid above index
pub fn premium_rate_from_quote(mid_price: f64, index_price: f64) -> RiskResult<Decimal> {
    if !(index_price > 0.0 && mid_price.is_finite() && index_price.is_finite()) {
        return Err(RiskError::domain("premium needs a finite mid and a positive index"));
    }
    Decimal::from_f64((mid_price - index_price) / index_price)
        .ok_or_else(|| RiskError::domain("premium rate not representable"))
}

// max(p, d) + min(p, -d) + sign(-kStar)·b. sign(0) = 0, so a balanced AMM
// adds no bias.
pub fn calculate_funding_rate(
    premium_rate: Decimal,
    k_star: Decimal,
    params: &FundingParams,
) -> Decimal {
    let delta = params.clamp_delta;
    premium_rate.max(delta) + premium_rate.min(-delta) + sign_decimal(-k_star) * params.exposure_bias
}

/// Funding rate from the snapshot's mid price and minimal-risk exposure.
pub fn funding_rate_for_snapshot(
    snapshot: &AmmSnapshot,
    params: &FundingParams,
) -> RiskResult<Decimal> {
    params.validate()?;
    let premium = premium_rate_from_quote(mid_price(snapshot)?, snapshot.market.index_s2)?;
    let k_star = Decimal::from_f64(k_star(snapshot)?)
        .ok_or_else(|| RiskError::domain("kStar not representable"))?;
    Ok(calculate_funding_rate(premium, k_star, params))
}

// 5.2: unpaid funding since the account's entry snapshot. positive means the
// account pays; longs pay when the accumulated unit funding grew.
pub fn accumulated_funding_fee(
    unit_funding_now: Decimal,
    unit_funding_at_entry: Decimal,
    position_bc: Decimal,
) -> Decimal {
    (unit_funding_now - unit_funding_at_entry) * position_bc
}
