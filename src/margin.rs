//! Trader margin accounting in collateral currency.
//!
//! A margin account holds a base-currency position, the quote value locked in
//! when it was opened, and cash in the perpetual's collateral currency. The
//! margin balance values the position at the mark price and converts the P&L
//! into collateral currency. Margin requirements scale with position size.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::{RiskError, RiskResult};
use crate::types::{CollateralCurrency, Price, PriceSource};

/// Size-dependent margin rate schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarginRateParams {
    pub initial_alpha: Decimal,
    pub beta: Decimal,
    pub maintenance_alpha: Decimal,
    pub initial_cap: Decimal,
}

impl Default for MarginRateParams {
    fn default() -> Self {
        Self {
            initial_alpha: dec!(0.06),
            beta: dec!(0.10),
            maintenance_alpha: dec!(0.04),
            initial_cap: dec!(0.10),
        }
    }
}

impl MarginRateParams {
    pub fn validate(&self) -> RiskResult<()> {
        if self.maintenance_alpha <= Decimal::ZERO || self.beta < Decimal::ZERO {
            return Err(RiskError::config(
                "maintenance alpha must be positive and beta non-negative",
            ));
        }
        if self.maintenance_alpha > self.initial_alpha {
            return Err(RiskError::config(
                "maintenance alpha must not exceed initial alpha",
            ));
        }
        if self.initial_cap < self.initial_alpha {
            return Err(RiskError::config("initial margin cap below initial alpha"));
        }
        Ok(())
    }

    /// min(alpha_init + beta·|pos|, cap)
    pub fn initial_rate(&self, position_bc: Decimal) -> Decimal {
        (self.initial_alpha + self.beta * position_bc.abs()).min(self.initial_cap)
    }

    /// Keeps the same distance to the initial rate once the cap binds.
    pub fn maintenance_rate(&self, position_bc: Decimal) -> Decimal {
        let cap = self.initial_cap - (self.initial_alpha - self.maintenance_alpha);
        (self.maintenance_alpha + self.beta * position_bc.abs()).min(cap)
    }
}

// 3.1: prices one margin evaluation is made against. mark = S2 + premium.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexPrices {
    pub index_s2: Price,
    /// None when the perpetual has no quanto collateral.
    pub index_s3: Option<Price>,
    /// Absolute premium over S2 in quote currency.
    pub mark_premium: Decimal,
}

impl IndexPrices {
    /// S3 of zero means no quanto leg.
    pub fn new(index_s2: Decimal, index_s3: Decimal, mark_premium: Decimal) -> RiskResult<Self> {
        let index_s2 =
            Price::new(index_s2).ok_or_else(|| RiskError::domain("index price S2 must be positive"))?;
        if index_s3 < Decimal::ZERO {
            return Err(RiskError::domain("index price S3 must not be negative"));
        }
        Ok(Self {
            index_s2,
            index_s3: Price::new(index_s3),
            mark_premium,
        })
    }

    pub fn mark_price(&self) -> Decimal {
        self.index_s2.value() + self.mark_premium
    }

    /// Price of one unit of collateral currency in quote currency.
    pub fn collateral_price(&self, currency: CollateralCurrency) -> RiskResult<Decimal> {
        match currency {
            CollateralCurrency::Quote => Ok(Decimal::ONE),
            CollateralCurrency::Base => Ok(self.index_s2.value()),
            CollateralCurrency::Quanto => self
                .index_s3
                .map(|p| p.value())
                .ok_or_else(|| RiskError::config("quanto collateral requires S3 > 0")),
        }
    }

    fn price(&self, source: PriceSource) -> Decimal {
        match source {
            PriceSource::Index => self.index_s2.value(),
            PriceSource::Mark => self.mark_price(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarginAccount {
    pub position_bc: Decimal,
    /// Signed like the position.
    pub locked_in_value_qc: Decimal,
    pub cash_cc: Decimal,
    pub currency: CollateralCurrency,
}

impl MarginAccount {
    pub fn new(
        position_bc: Decimal,
        locked_in_value_qc: Decimal,
        cash_cc: Decimal,
        currency: CollateralCurrency,
    ) -> Self {
        Self {
            position_bc,
            locked_in_value_qc,
            cash_cc,
            currency,
        }
    }

    /// Average entry price, None for a flat account.
    pub fn entry_price(&self) -> Option<Decimal> {
        if self.position_bc.is_zero() {
            return None;
        }
        Some(self.locked_in_value_qc / self.position_bc)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarginStatus {
    Safe,
    Unsafe,
}

/// Converts a quote-currency amount into collateral currency.
pub fn quote_to_collateral(
    amount_qc: Decimal,
    prices: &IndexPrices,
    currency: CollateralCurrency,
) -> RiskResult<Decimal> {
    Ok(amount_qc / prices.collateral_price(currency)?)
}

/// Value of one unit of base currency in collateral currency. The caller
/// chooses whether the base leg is valued at index or mark.
pub fn base_to_collateral_fx(
    prices: &IndexPrices,
    currency: CollateralCurrency,
    source: PriceSource,
) -> RiskResult<Decimal> {
    Ok(prices.price(source) / prices.collateral_price(currency)?)
}

/// (pos·mark − L)·fx + cash, in collateral currency.
pub fn margin_balance(account: &MarginAccount, prices: &IndexPrices) -> RiskResult<Decimal> {
    let pnl_qc = account.position_bc * prices.mark_price() - account.locked_in_value_qc;
    Ok(quote_to_collateral(pnl_qc, prices, account.currency)? + account.cash_cc)
}

/// Safe iff margin balance > |pos|·rate·fx.
pub fn margin_status(
    account: &MarginAccount,
    prices: &IndexPrices,
    margin_rate: Decimal,
    source: PriceSource,
) -> RiskResult<MarginStatus> {
    if margin_rate < Decimal::ZERO {
        return Err(RiskError::domain("margin rate must not be negative"));
    }
    let balance = margin_balance(account, prices)?;
    let fx = base_to_collateral_fx(prices, account.currency, source)?;
    let required = account.position_bc.abs() * margin_rate * fx;
    Ok(if balance > required {
        MarginStatus::Safe
    } else {
        MarginStatus::Unsafe
    })
}

pub fn is_margin_safe(
    account: &MarginAccount,
    prices: &IndexPrices,
    margin_rate: Decimal,
    source: PriceSource,
) -> RiskResult<bool> {
    Ok(margin_status(account, prices, margin_rate, source)? == MarginStatus::Safe)
}

/// Position notional at index over margin balance. None once the balance is
/// exhausted, where leverage is no longer meaningful.
pub fn trader_leverage(account: &MarginAccount, prices: &IndexPrices) -> RiskResult<Option<Decimal>> {
    let balance = margin_balance(account, prices)?;
    if balance <= Decimal::ZERO {
        return Ok(None);
    }
    let fx = base_to_collateral_fx(prices, account.currency, PriceSource::Index)?;
    Ok(Some(account.position_bc.abs() * fx / balance))
}

/// Fee for trading `delta_position_bc`, in collateral currency.
pub fn trading_fee_cc(
    delta_position_bc: Decimal,
    fee_rate: Decimal,
    prices: &IndexPrices,
    currency: CollateralCurrency,
) -> RiskResult<Decimal> {
    let fx = base_to_collateral_fx(prices, currency, PriceSource::Index)?;
    Ok(delta_position_bc.abs() * fee_rate * fx)
}

/// Truncates the magnitude of `value` to a multiple of `step`.
pub fn shrink_to_lot(value: Decimal, step: Decimal) -> RiskResult<Decimal> {
    if step <= Decimal::ZERO {
        return Err(RiskError::config("lot size must be positive"));
    }
    Ok((value / step).trunc() * step)
}

// headroom kept back on withdrawals, as a fraction of one lot
const WITHDRAW_LOT_FRACTION: Decimal = dec!(0.1);

// 3.2: cash the trader can take out and still be initial-margin safe at mark.
pub fn max_margin_to_withdraw(
    account: &MarginAccount,
    prices: &IndexPrices,
    rates: &MarginRateParams,
    lot_size: Decimal,
) -> RiskResult<Decimal> {
    let balance = margin_balance(account, prices)?;
    let mark_fx = base_to_collateral_fx(prices, account.currency, PriceSource::Mark)?;
    let index_fx = base_to_collateral_fx(prices, account.currency, PriceSource::Index)?;
    let required = account.position_bc.abs() * rates.initial_rate(account.position_bc) * mark_fx;
    let amount = shrink_to_lot(balance - required, lot_size * index_fx * WITHDRAW_LOT_FRACTION)?;
    Ok(amount.max(Decimal::ZERO))
}

// 3.3: collateral to deposit so that after trading to `target_position_bc` at
// `entry_price` the account runs at `leverage` on mark:
//   |pos_new|·mark/lev = pnl_open + (pos_new - pos_old)·(mark - entry)
// plus the trading fee. closing trades only pay the fee. cash already in the
// account counts towards it.
pub fn required_margin_collateral(
    account: &MarginAccount,
    prices: &IndexPrices,
    fee_rate: Decimal,
    target_position_bc: Decimal,
    leverage: Decimal,
    entry_price: Decimal,
) -> RiskResult<Decimal> {
    if leverage <= Decimal::ZERO {
        return Err(RiskError::config("leverage must be positive"));
    }
    if entry_price <= Decimal::ZERO {
        return Err(RiskError::domain("entry price must be positive"));
    }
    let current = account.position_bc;
    let trade = target_position_bc - current;
    let mark = prices.mark_price();

    let mut required = trading_fee_cc(trade, fee_rate, prices, account.currency)?;
    let closing = current * target_position_bc >= Decimal::ZERO && current * trade < Decimal::ZERO;
    if !closing {
        let open_pnl_qc = current * mark - account.locked_in_value_qc;
        let trade_pnl_qc = trade * (mark - entry_price);
        let shortfall_qc = target_position_bc.abs() * mark / leverage - open_pnl_qc - trade_pnl_qc;
        required += quote_to_collateral(shortfall_qc.max(Decimal::ZERO), prices, account.currency)?;
    }
    Ok((required - account.cash_cc).max(Decimal::ZERO))
}
