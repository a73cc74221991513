// 1.0: value types every pricing/risk call is built from. all are plain numeric
// records constructed fresh by the caller; nothing here is cached between calls.
// naming follows the AMM's point of view: K2/L1 are aggregated trader claims
// against the AMM, M1/M2/M3 are the AMM's collateral balances.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{RiskError, RiskResult};

// 1.1: sign with sign(0) = 0. f64::signum returns 1.0 for +0.0 so it is never used.
pub fn sign(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

pub fn sign_decimal(x: Decimal) -> Decimal {
    if x > Decimal::ZERO {
        Decimal::ONE
    } else if x < Decimal::ZERO {
        Decimal::NEGATIVE_ONE
    } else {
        Decimal::ZERO
    }
}

/// Which balance collateralizes the perpetual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollateralCurrency {
    /// M1, e.g. USD for BTCUSD.
    Quote = 1,
    /// M2, e.g. BTC for BTCUSD.
    Base = 2,
    /// M3, a third currency, e.g. BTC for ETHUSD.
    Quanto = 3,
}

impl fmt::Display for CollateralCurrency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollateralCurrency::Quote => write!(f, "quote"),
            CollateralCurrency::Base => write!(f, "base"),
            CollateralCurrency::Quanto => write!(f, "quanto"),
        }
    }
}

/// Price used to convert base-currency amounts. Always chosen by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    Index,
    Mark,
}

// 1.2: decimal price in quote currency per unit of base. must be positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Price(Decimal);

impl Price {
    #[must_use]
    pub fn new(value: Decimal) -> Option<Self> {
        if value > Decimal::ZERO {
            Some(Self(value))
        } else {
            None
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// 1.3: index prices and the volatility/correlation assumptions for one call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketState {
    /// S2: base asset in quote currency.
    pub index_s2: f64,
    /// S3: quanto asset in quote currency. 0 when no quanto asset is in use.
    pub index_s3: f64,
    pub sigma2: f64,
    pub sigma3: f64,
    pub rho23: f64,
    /// r: risk-free/drift rate.
    pub drift: f64,
}

impl MarketState {
    /// Market without a quanto leg.
    pub fn without_quanto(index_s2: f64, sigma2: f64, drift: f64) -> Self {
        Self {
            index_s2,
            index_s3: 0.0,
            sigma2,
            sigma3: 0.0,
            rho23: 0.0,
            drift,
        }
    }

    pub fn validate(&self) -> RiskResult<()> {
        let all = [
            self.index_s2,
            self.index_s3,
            self.sigma2,
            self.sigma3,
            self.rho23,
            self.drift,
        ];
        if all.iter().any(|v| !v.is_finite()) {
            return Err(RiskError::domain("market inputs must be finite"));
        }
        if self.index_s2 <= 0.0 {
            return Err(RiskError::domain("index price S2 must be positive"));
        }
        if self.index_s3 < 0.0 {
            return Err(RiskError::domain("index price S3 must not be negative"));
        }
        if self.sigma2 < 0.0 || self.sigma3 < 0.0 {
            return Err(RiskError::domain("volatilities must not be negative"));
        }
        if !(-1.0..=1.0).contains(&self.rho23) {
            return Err(RiskError::domain("correlation must lie in [-1, 1]"));
        }
        Ok(())
    }

    /// Quanto formulas need a live S3.
    pub fn require_quanto(&self) -> RiskResult<()> {
        if self.index_s3 <= 0.0 {
            return Err(RiskError::config("quanto formula requires S3 > 0"));
        }
        Ok(())
    }
}

// 1.4: aggregated trader exposure against the AMM.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// K2: open base-currency exposure.
    pub k2: f64,
    /// L1: locked-in quote value, same sign convention as K2.
    pub l1: f64,
}

impl Position {
    pub fn new(k2: f64, l1: f64) -> Self {
        Self { k2, l1 }
    }

    /// Exposure after a trade of size `k` at index price `s2`.
    /// K2 and L1 always move together.
    pub fn after_trade(&self, k: f64, s2: f64) -> Self {
        Self {
            k2: self.k2 + k,
            l1: self.l1 + k * s2,
        }
    }
}

// 1.5: the AMM's collateral. normally only one balance is non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CollateralPool {
    pub m1: f64,
    pub m2: f64,
    pub m3: f64,
}

impl CollateralPool {
    pub fn new(m1: f64, m2: f64, m3: f64) -> Self {
        Self { m1, m2, m3 }
    }

    pub fn has_quanto(&self) -> bool {
        self.m3 > 0.0
    }
}

// 1.6: one consistent view of market, exposure and pool. the price curve and the
// default model read the same snapshot so their inputs cannot diverge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AmmSnapshot {
    pub market: MarketState,
    pub position: Position,
    pub pool: CollateralPool,
}

impl AmmSnapshot {
    pub fn new(market: MarketState, position: Position, pool: CollateralPool) -> Self {
        Self {
            market,
            position,
            pool,
        }
    }

    pub fn validate(&self) -> RiskResult<()> {
        self.market.validate()?;
        let values = [
            self.position.k2,
            self.position.l1,
            self.pool.m1,
            self.pool.m2,
            self.pool.m3,
        ];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(RiskError::domain("position and pool values must be finite"));
        }
        if self.pool.has_quanto() {
            self.market.require_quanto()?;
        }
        Ok(())
    }

    /// Same market and pool, exposure moved by a trade of size `k`.
    pub fn with_trade(&self, k: f64) -> Self {
        Self {
            position: self.position.after_trade(k, self.market.index_s2),
            ..*self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_of_zero_is_zero() {
        assert_eq!(sign(0.0), 0.0);
        assert_eq!(sign(-0.0), 0.0);
        assert_eq!(sign(2.5), 1.0);
        assert_eq!(sign(-1e-300), -1.0);
        assert_eq!(sign_decimal(Decimal::ZERO), Decimal::ZERO);
        assert_eq!(sign_decimal(Decimal::new(-3, 1)), Decimal::NEGATIVE_ONE);
    }

    #[test]
    fn price_must_be_positive() {
        assert_eq!(Price::new(Decimal::new(38000, 0)).map(|p| p.value()), Some(Decimal::new(38000, 0)));
        assert!(Price::new(Decimal::ZERO).is_none());
        assert!(Price::new(Decimal::new(-1, 0)).is_none());
    }

    #[test]
    fn trade_moves_k2_and_l1_together() {
        let pos = Position::new(0.4, 14400.0);
        let after = pos.after_trade(0.1, 38000.0);
        assert!((after.k2 - 0.5).abs() < 1e-12);
        assert!((after.l1 - 18200.0).abs() < 1e-9);
    }

    #[test]
    fn market_validation() {
        let ok = MarketState::without_quanto(38000.0, 0.05, 0.0);
        assert!(ok.validate().is_ok());

        let bad_price = MarketState { index_s2: 0.0, ..ok };
        assert!(matches!(
            bad_price.validate(),
            Err(RiskError::DomainViolation { .. })
        ));

        let bad_rho = MarketState { rho23: 1.5, ..ok };
        assert!(matches!(bad_rho.validate(), Err(RiskError::DomainViolation { .. })));
    }

    #[test]
    fn quanto_pool_requires_s3() {
        let market = MarketState::without_quanto(38000.0, 0.05, 0.0);
        let snap = AmmSnapshot::new(
            market,
            Position::new(0.4, 14400.0),
            CollateralPool::new(0.0, 0.0, 0.2),
        );
        assert!(matches!(
            snap.validate(),
            Err(RiskError::InvalidConfiguration { .. })
        ));
    }
}
