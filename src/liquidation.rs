//! Liquidation of margin accounts.
//!
//! An account is evaluated fresh on every call: SAFE at the maintenance rate
//! means nothing happens. Otherwise the engine sizes the smallest lot-rounded
//! trade after which the account is back at the initial (target) margin rate,
//! or closes the whole position when the balance cannot even pay the fees.
//! This module also provides the price at which an account hits maintenance.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::FeeParams;
use crate::error::{RiskError, RiskResult};
use crate::margin::{
    base_to_collateral_fx, margin_balance, quote_to_collateral, IndexPrices, MarginAccount,
    MarginRateParams,
};
use crate::solver::{newton, SolverParams};
use crate::types::{sign_decimal, CollateralCurrency, MarketState, PriceSource};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidationParameters {
    pub liquidation_fee: Decimal,
    pub trading_fee: Decimal,
    pub lot_size: Decimal,
    pub maintenance_margin_rate: Decimal,
    /// Rate the account is restored to after a partial liquidation.
    pub initial_margin_rate: Decimal,
}

impl LiquidationParameters {
    /// Rates for an account of `position_bc` under the size-dependent schedule.
    pub fn from_schedule(
        rates: &MarginRateParams,
        fees: &FeeParams,
        position_bc: Decimal,
    ) -> Self {
        Self {
            liquidation_fee: fees.liquidation_fee,
            trading_fee: fees.trading_fee,
            lot_size: fees.lot_size,
            maintenance_margin_rate: rates.maintenance_rate(position_bc),
            initial_margin_rate: rates.initial_rate(position_bc),
        }
    }

    pub fn total_fee_rate(&self) -> Decimal {
        self.liquidation_fee + self.trading_fee
    }

    pub fn validate(&self) -> RiskResult<()> {
        if self.lot_size <= Decimal::ZERO {
            return Err(RiskError::config("lot size must be positive"));
        }
        if self.liquidation_fee < Decimal::ZERO || self.trading_fee < Decimal::ZERO {
            return Err(RiskError::config("fees must not be negative"));
        }
        if self.maintenance_margin_rate <= Decimal::ZERO {
            return Err(RiskError::config("maintenance margin rate must be positive"));
        }
        if self.maintenance_margin_rate > self.initial_margin_rate {
            return Err(RiskError::config(
                "maintenance margin rate exceeds initial margin rate",
            ));
        }
        // the partial-liquidation equation divides by (initial rate - fees)
        if self.initial_margin_rate <= self.total_fee_rate() {
            return Err(RiskError::config(
                "initial margin rate must exceed liquidation plus trading fee",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LiquidationDecision {
    /// Margin safe at the maintenance rate.
    Safe,
    Partial { amount: Decimal },
    Full { amount: Decimal },
}

impl LiquidationDecision {
    /// Signed trade amount, same sign as the position. Zero when safe.
    pub fn amount(&self) -> Decimal {
        match self {
            LiquidationDecision::Safe => Decimal::ZERO,
            LiquidationDecision::Partial { amount } | LiquidationDecision::Full { amount } => {
                *amount
            }
        }
    }
}

/// Rounds the magnitude of `value` up to a multiple of `lot_size`.
pub fn grow_to_lot(value: Decimal, lot_size: Decimal) -> RiskResult<Decimal> {
    if lot_size <= Decimal::ZERO {
        return Err(RiskError::config("lot size must be positive"));
    }
    let lots = value / lot_size;
    let lots = if value < Decimal::ZERO {
        lots.floor()
    } else {
        lots.ceil()
    };
    Ok(lots * lot_size)
}

// 6.1: size of the liquidation trade. the partial amount solves
//   balance - |x|·fee·fx = (|pos| - |x|)·im·fx
// for x, with x signed like the position.
pub fn liquidation_amount(
    account: &MarginAccount,
    prices: &IndexPrices,
    params: &LiquidationParameters,
) -> RiskResult<LiquidationDecision> {
    params.validate()?;
    let position = account.position_bc;
    if position.is_zero() {
        return Ok(LiquidationDecision::Safe);
    }

    let balance = margin_balance(account, prices)?;
    let fx = base_to_collateral_fx(prices, account.currency, PriceSource::Index)?;
    let abs_position = position.abs();

    if balance > abs_position * params.maintenance_margin_rate * fx {
        return Ok(LiquidationDecision::Safe);
    }

    let fee_rate = params.total_fee_rate();
    if balance <= abs_position * fee_rate * fx {
        warn!(%position, %balance, "margin balance below fee floor, full liquidation");
        return Ok(LiquidationDecision::Full { amount: position });
    }

    let target = params.initial_margin_rate;
    let raw = (abs_position * target - balance / fx)
        / (sign_decimal(position) * (target - fee_rate));
    let mut amount = grow_to_lot(raw, params.lot_size)?;
    if amount.is_zero() {
        // balance sits exactly on the target rate
        amount = sign_decimal(position) * params.lot_size;
    }

    if amount.abs() >= abs_position {
        debug!(%position, %raw, "liquidation amount covers the position");
        return Ok(LiquidationDecision::Full { amount: position });
    }
    debug!(%position, %raw, %amount, "partial liquidation");
    Ok(LiquidationDecision::Partial { amount })
}

/// Account after the liquidation trade `amount` is executed at mark price.
/// Locked-in value shrinks pro rata, fees are charged at the index rate and
/// the P&L of the closed part is realized into cash.
pub fn apply_liquidation(
    account: &MarginAccount,
    prices: &IndexPrices,
    params: &LiquidationParameters,
    amount: Decimal,
) -> RiskResult<MarginAccount> {
    if amount.is_zero() {
        return Ok(*account);
    }
    let position = account.position_bc;
    if position.is_zero()
        || sign_decimal(amount) != sign_decimal(position)
        || amount.abs() > position.abs()
    {
        return Err(RiskError::domain(
            "liquidation amount must reduce the position without flipping it",
        ));
    }

    let new_position = position - amount;
    let closed_value_qc = account.locked_in_value_qc * amount / position;
    let new_locked_in = if new_position.is_zero() {
        Decimal::ZERO
    } else {
        account.locked_in_value_qc - closed_value_qc
    };

    let fx = base_to_collateral_fx(prices, account.currency, PriceSource::Index)?;
    let fee = amount.abs() * params.total_fee_rate() * fx;
    let realized_qc = amount * prices.mark_price() - closed_value_qc;
    let realized = quote_to_collateral(realized_qc, prices, account.currency)?;

    Ok(MarginAccount {
        position_bc: new_position,
        locked_in_value_qc: new_locked_in,
        cash_cc: account.cash_cc - fee + realized,
        currency: account.currency,
    })
}

// 6.2: liquidation prices. the account is at maintenance when
//   balance(S) = |pos|·m·fx(S)
// with mark = index. quote and base have closed forms; quanto needs S3 to move
// with S2 and is solved numerically. None means no positive price exists.

pub fn liquidation_price_quote(
    account: &MarginAccount,
    maintenance_rate: Decimal,
) -> Option<Decimal> {
    let position = account.position_bc;
    let denom = position - position.abs() * maintenance_rate;
    if position.is_zero() || denom.is_zero() {
        return None;
    }
    positive((account.locked_in_value_qc - account.cash_cc) / denom)
}

pub fn liquidation_price_base(
    account: &MarginAccount,
    maintenance_rate: Decimal,
) -> Option<Decimal> {
    let position = account.position_bc;
    let denom = position - position.abs() * maintenance_rate + account.cash_cc;
    if position.is_zero() || denom.is_zero() {
        return None;
    }
    positive(account.locked_in_value_qc / denom)
}

/// S3 is assumed to follow S2 with log-return ratio sigma3/sigma2. Solves
///   cash·(S3/S2)·e^{x·σ3/σ2} − α·e^x − L/S2 = 0,  α = |pos|·m − pos
/// for the log move x and returns S2·e^x.
pub fn liquidation_price_quanto(
    account: &MarginAccount,
    maintenance_rate: Decimal,
    market: &MarketState,
    solver: &SolverParams,
) -> RiskResult<Option<f64>> {
    market.validate()?;
    market.require_quanto()?;
    if market.sigma2 <= 0.0 {
        return Err(RiskError::domain(
            "quanto liquidation price needs a positive base volatility",
        ));
    }
    if account.position_bc.is_zero() {
        return Ok(None);
    }

    let position = to_f64(account.position_bc)?;
    let locked_in = to_f64(account.locked_in_value_qc)?;
    let cash = to_f64(account.cash_cc)?;
    let m = to_f64(maintenance_rate)?;

    let ratio = market.sigma3 / market.sigma2;
    let cash_in_base = cash * market.index_s3 / market.index_s2;
    let alpha = position.abs() * m - position;
    let locked_in_base = locked_in / market.index_s2;

    let res = newton(
        |x| {
            let quanto = cash_in_base * (x * ratio).exp();
            let base = alpha * x.exp();
            (quanto - base - locked_in_base, quanto * ratio - base)
        },
        0.0,
        solver,
    )?;
    debug!(log_move = res.root, iterations = res.iterations, "quanto liquidation price");
    Ok(Some(market.index_s2 * res.root.exp()))
}

/// Liquidation price for the account's collateral currency. `market` is only
/// read for quanto accounts.
pub fn liquidation_price(
    account: &MarginAccount,
    maintenance_rate: Decimal,
    market: &MarketState,
    solver: &SolverParams,
) -> RiskResult<Option<Decimal>> {
    match account.currency {
        CollateralCurrency::Quote => Ok(liquidation_price_quote(account, maintenance_rate)),
        CollateralCurrency::Base => Ok(liquidation_price_base(account, maintenance_rate)),
        CollateralCurrency::Quanto => {
            match liquidation_price_quanto(account, maintenance_rate, market, solver)? {
                Some(price) => Decimal::from_f64(price)
                    .map(Some)
                    .ok_or_else(|| RiskError::domain("liquidation price out of range")),
                None => Ok(None),
            }
        }
    }
}

fn positive(price: Decimal) -> Option<Decimal> {
    if price > Decimal::ZERO {
        Some(price)
    } else {
        None
    }
}

fn to_f64(value: Decimal) -> RiskResult<f64> {
    value
        .to_f64()
        .ok_or_else(|| RiskError::domain("value not representable as f64"))
}
