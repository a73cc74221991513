// 7.0 config.rs: every tunable of the risk core in one place. nothing here is
// global; callers hold a RiskConfig and pass the relevant part to each call.
// 7.1 FeeParams has trading/liquidation fees and the lot size.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::collateral::AmmFundParams;
use crate::default_fund::{DefaultFundParams, TwoSided};
use crate::error::{RiskError, RiskResult};
use crate::funding::FundingParams;
use crate::liquidation::LiquidationParameters;
use crate::margin::MarginRateParams;
use crate::pricing::PricingParams;
use crate::solver::SolverParams;

/** 7.1: fees as fractions of notional. trading fee = treasury 3bps + PnL participants 3bps */
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeParams {
    pub trading_fee: Decimal,
    pub liquidation_fee: Decimal,
    // minimum position increment in base currency
    pub lot_size: Decimal,
}

impl Default for FeeParams {
    fn default() -> Self {
        Self {
            trading_fee: dec!(0.0006),
            liquidation_fee: dec!(0.002),
            lot_size: dec!(0.0001),
        }
    }
}

impl FeeParams {
    pub fn validate(&self) -> RiskResult<()> {
        if self.trading_fee < Decimal::ZERO || self.liquidation_fee < Decimal::ZERO {
            return Err(RiskError::config("fees must not be negative"));
        }
        if self.lot_size <= Decimal::ZERO {
            return Err(RiskError::config("lot size must be positive"));
        }
        Ok(())
    }
}

// The complete risk configuration of one perpetual
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RiskConfig {
    pub margin_rates: MarginRateParams,
    pub fees: FeeParams,
    pub pricing: PricingParams,
    pub amm_fund: AmmFundParams,
    pub default_fund: DefaultFundParams,
    pub funding: FundingParams,
    pub solver: SolverParams,
}

impl RiskConfig {
    // Wider spreads, higher margins and harsher stress moves
    pub fn conservative() -> Self {
        let mut config = Self::default();
        config.margin_rates.initial_alpha = dec!(0.10);
        config.margin_rates.maintenance_alpha = dec!(0.06);
        config.margin_rates.initial_cap = dec!(0.20);
        config.pricing.min_spread = 0.001;
        config.pricing.min_spread_in_stress = 0.002;
        // roughly 5 bps and 50 bps default probability
        config.amm_fund.target_dd_baseline = -3.290_526_731_491_894_5;
        config.amm_fund.target_dd_stress = -2.575_829_303_548_9;
        config.default_fund.stress_return_s2 = TwoSided::new(dec!(-0.7), dec!(0.3));
        config.default_fund.stress_return_s3 = TwoSided::new(dec!(-0.2), dec!(0.2));
        config
    }

    /// Liquidation parameters for an account holding `position_bc`.
    pub fn liquidation_parameters(&self, position_bc: Decimal) -> LiquidationParameters {
        LiquidationParameters::from_schedule(&self.margin_rates, &self.fees, position_bc)
    }

    // Validate the configuration for internal consistency
    pub fn validate(&self) -> RiskResult<()> {
        self.margin_rates.validate()?;
        self.fees.validate()?;
        self.pricing.validate()?;
        self.amm_fund.validate()?;
        self.default_fund.validate()?;
        self.funding.validate()?;
        self.solver.validate()?;

        // the smallest position gets the lowest rates; those must still cover fees
        self.liquidation_parameters(Decimal::ZERO).validate()
    }
}
