// 9.0: default fund sizing. the fund has to absorb the AMM's loss under the
// worst plausible move in either direction, not the expected one. the exposure
// on each side is the aggregated open interest plus n traders each holding the
// largest single position on the opposite side.

use rust_decimal::prelude::MathematicalOps;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{RiskError, RiskResult};
use crate::margin::IndexPrices;
use crate::types::CollateralCurrency;

/// A (down, up) pair, e.g. lowest and highest stress return.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TwoSided {
    pub down: Decimal,
    pub up: Decimal,
}

impl TwoSided {
    pub fn new(down: Decimal, up: Decimal) -> Self {
        Self { down, up }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultFundParams {
    /// Log-return stress bounds of the base asset.
    pub stress_return_s2: TwoSided,
    /// Log-return stress bounds of the quanto asset.
    pub stress_return_s3: TwoSided,
}

impl Default for DefaultFundParams {
    fn default() -> Self {
        Self {
            stress_return_s2: TwoSided::new(dec!(-0.5), dec!(0.2)),
            stress_return_s3: TwoSided::new(dec!(-0.1), dec!(0.1)),
        }
    }
}

impl DefaultFundParams {
    pub fn validate(&self) -> RiskResult<()> {
        for pair in [self.stress_return_s2, self.stress_return_s3] {
            if pair.down > Decimal::ZERO || pair.up < Decimal::ZERO {
                return Err(RiskError::config(
                    "stress returns must satisfy down <= 0 <= up",
                ));
            }
            if pair.down < -MAX_STRESS_RETURN || pair.up > MAX_STRESS_RETURN {
                return Err(RiskError::config(format!(
                    "stress log-returns must lie within +-{MAX_STRESS_RETURN}"
                )));
            }
        }
        Ok(())
    }
}

/// Loss per unit of base price for each stress direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StressLoss {
    pub down: Decimal,
    pub up: Decimal,
}

/// Largest accepted stress log-return magnitude (a factor of about 22000).
pub const MAX_STRESS_RETURN: Decimal = dec!(10);

// checked_exp alone stops the series at 2e-7
const EXP_TOLERANCE: Decimal = dec!(0.000000000000000000001);

fn exp(x: Decimal) -> RiskResult<Decimal> {
    x.checked_exp_with_tolerance(EXP_TOLERANCE)
        .ok_or_else(|| RiskError::domain(format!("exp({x}) overflows")))
}

// loss per unit of base valued in an asset that moved by log-return r
fn at_stressed_price(loss: Decimal, r: Decimal) -> RiskResult<Decimal> {
    loss.checked_mul(exp(-r)?)
        .ok_or_else(|| RiskError::domain(format!("stress loss {loss} overflows at return {r}")))
}

// 9.1: the downside hits the long open interest plus n short-side traders at
// their largest long, and symmetrically for the upside.
pub fn stress_loss(
    amm_k2: &TwoSided,
    trader_k2: &TwoSided,
    trader_count: u32,
    stress_return_s2: &TwoSided,
) -> RiskResult<StressLoss> {
    let n = Decimal::from(trader_count);
    let down_exposure = amm_k2.down.abs() + n * trader_k2.up.abs();
    let up_exposure = amm_k2.up.abs() + n * trader_k2.down.abs();
    Ok(StressLoss {
        down: down_exposure * (Decimal::ONE - exp(stress_return_s2.down)?),
        up: up_exposure * (exp(stress_return_s2.up)? - Decimal::ONE),
    })
}

// 9.2: worst stress loss in the requested collateral currency. base and quanto
// amounts are valued at the stressed price of that currency.
pub fn default_fund_target_size(
    amm_k2: &TwoSided,
    trader_k2: &TwoSided,
    trader_count: u32,
    params: &DefaultFundParams,
    prices: &IndexPrices,
    currency: CollateralCurrency,
) -> RiskResult<Decimal> {
    params.validate()?;
    let index_s2 = prices.index_s2.value();
    let loss = stress_loss(amm_k2, trader_k2, trader_count, &params.stress_return_s2)?;

    let size = match currency {
        CollateralCurrency::Quote => index_s2 * loss.down.max(loss.up),
        CollateralCurrency::Base => {
            let r2 = &params.stress_return_s2;
            at_stressed_price(loss.down, r2.down)?.max(at_stressed_price(loss.up, r2.up)?)
        }
        CollateralCurrency::Quanto => {
            let index_s3 = prices.collateral_price(currency)?;
            let r3 = &params.stress_return_s3;
            let worst = at_stressed_price(loss.down, r3.down)?.max(at_stressed_price(loss.up, r3.up)?);
            index_s2 / index_s3 * worst
        }
    };
    debug!(%currency, down = %loss.down, up = %loss.up, %size, "default fund target");
    Ok(size)
}
