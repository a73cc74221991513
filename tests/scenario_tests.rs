//! Regression scenarios with fixed reference values.
//!
//! Each scenario runs a full path through the public API: model, solver,
//! price curve, liquidation, default fund and funding.

use perps_amm_risk::*;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn btc_quanto_market() -> MarketState {
    MarketState {
        index_s2: 38_000.0,
        index_s3: 2_000.0,
        sigma2: 0.05,
        sigma3: 0.07,
        rho23: 0.5,
        drift: 0.0,
    }
}

#[test]
fn amm_long_traders_default_probability() {
    let snapshot = AmmSnapshot::new(
        btc_quanto_market(),
        Position::new(0.4, 14_400.0),
        CollateralPool::new(10.0, 0.06, 0.0),
    );
    let q = default_probability(&snapshot).unwrap();
    assert!((q.probability - 0.013_624_986_789_704_379).abs() < 1e-14);
    assert!((q.distance_to_default - (-2.207_918_233_139_494)).abs() < 1e-12);

    // quanto collateral lowers the default probability
    let with_quanto = AmmSnapshot {
        pool: CollateralPool::new(10.0, 0.06, 0.2),
        ..snapshot
    };
    let q3 = default_probability(&with_quanto).unwrap();
    assert!((q3.probability - 0.001_411_363_900_083_552_7).abs() < 1e-15);
    assert!(q3.probability < q.probability);
}

#[test]
fn collateral_targets_hit_fifteen_bps() {
    let market = MarketState {
        index_s2: 36_000.0,
        ..btc_quanto_market()
    };
    let position = Position::new(1.0, -36_000.0);
    let target = normal::inverse_cdf(0.0015).unwrap();

    for currency in [CollateralCurrency::Quote, CollateralCurrency::Base, CollateralCurrency::Quanto] {
        let amount = target_collateral(currency, &position, &market, target).unwrap();
        let pool = match currency {
            CollateralCurrency::Quote => CollateralPool::new(amount, 0.0, 0.0),
            CollateralCurrency::Base => CollateralPool::new(0.0, amount, 0.0),
            CollateralCurrency::Quanto => CollateralPool::new(0.0, 0.0, amount),
        };
        let q = default_probability(&AmmSnapshot::new(market, position, pool)).unwrap();
        assert!((q.probability - 0.0015).abs() < 1e-9, "{currency}: {}", q.probability);
    }

    let (r1, r2) = target_collateral_m3_from_probability(0.0015, &position, &market).unwrap();
    assert!((r1 - 30.484_765_170_421_984).abs() < 1e-7);
    assert!((r2 - 44.190_518_094_684_12).abs() < 1e-7);
}

#[test]
fn amm_fund_floor_and_stress() {
    let market = MarketState {
        index_s2: 36_000.0,
        ..btc_quanto_market()
    };
    let params = AmmFundParams::default();
    let target = amm_fund_target(&params, CollateralCurrency::Quote, &Position::new(1.0, -36_000.0), &market).unwrap();
    assert!(target.baseline > target.stress);
    assert!(target.stress > params.min_size_cc);
}

#[test]
fn price_curve_quotes() {
    let snapshot = AmmSnapshot::new(
        btc_quanto_market(),
        Position::new(0.4, 14_400.0),
        CollateralPool::new(10.0, 0.06, 0.02),
    );
    let bid = perp_price(&snapshot, -0.01, 0.05).unwrap();
    let ask = perp_price(&snapshot, 0.01, 0.05).unwrap();
    assert!((bid - 36_375.904_050_683_61).abs() < 1e-6);
    assert!((ask - 40_303.072_725_539_7).abs() < 1e-6);

    // stressed spread widens the quote
    let pricing = PricingParams::default();
    let calm = perp_price(&snapshot, 0.01, pricing.min_spread_for(1.2)).unwrap();
    let stressed = perp_price(&snapshot, 0.01, pricing.min_spread_for(0.8)).unwrap();
    assert!(stressed > calm);
}

#[test]
fn trader_funds_a_curve_trade_at_target_leverage() {
    let snapshot = AmmSnapshot::new(
        btc_quanto_market(),
        Position::new(0.4, 14_400.0),
        CollateralPool::new(10.0, 0.06, 0.02),
    );
    let entry = trade_entry_price(&snapshot, 0.01, 0.0001, 0.05, 0.0).unwrap();
    assert!((entry - 40_303.072_725_539_7).abs() < 1e-6);
    let entry = Decimal::from_f64(entry).unwrap();

    let prices = IndexPrices::new(dec!(38000), dec!(2000), Decimal::ZERO).unwrap();
    let flat = MarginAccount::new(Decimal::ZERO, Decimal::ZERO, Decimal::ZERO, CollateralCurrency::Quote);
    let fee_rate = FeeParams::default().trading_fee;
    let required = required_margin_collateral(&flat, &prices, fee_rate, dec!(0.01), dec!(5), entry).unwrap();

    let fee = trading_fee_cc(dec!(0.01), fee_rate, &prices, CollateralCurrency::Quote).unwrap();
    let opened = MarginAccount::new(dec!(0.01), dec!(0.01) * entry, required - fee, CollateralCurrency::Quote);
    let leverage = trader_leverage(&opened, &prices).unwrap().unwrap();
    assert!((leverage - dec!(5)).abs() < dec!(0.000000001));
}

#[test]
fn squeezed_short_is_liquidated_to_target() {
    let config = RiskConfig::default();
    let prices = IndexPrices::new(dec!(60000), dec!(60000), dec!(1000)).unwrap();
    let account = MarginAccount::new(dec!(-1), dec!(-35000), dec!(0.5), CollateralCurrency::Base);

    let mut params = config.liquidation_parameters(account.position_bc);
    params.lot_size = dec!(0.0002);
    assert_eq!(
        margin_status(&account, &prices, params.maintenance_margin_rate, PriceSource::Index).unwrap(),
        MarginStatus::Unsafe
    );

    let decision = liquidation_amount(&account, &prices, &params).unwrap();
    assert_eq!(decision, LiquidationDecision::Partial { amount: dec!(-0.3424) });

    let after = apply_liquidation(&account, &prices, &params, decision.amount()).unwrap();
    let balance = margin_balance(&after, &prices).unwrap();
    assert!((balance - dec!(0.06577642666666672)).abs() < dec!(0.000000000001));
    assert!(balance >= after.position_bc.abs() * params.initial_margin_rate);
}

#[test]
fn default_fund_in_three_currencies() {
    let amm_k2 = TwoSided::new(dec!(-0.7), dec!(0.8));
    let trader_k2 = TwoSided::new(dec!(-0.11), dec!(0.15));
    let params = DefaultFundParams {
        stress_return_s2: TwoSided::new(dec!(-0.3), dec!(0.2)),
        stress_return_s3: TwoSided::new(dec!(-0.32), dec!(0.18)),
    };
    let prices = IndexPrices::new(dec!(2000), dec!(31000), Decimal::ZERO).unwrap();
    let size = |currency| {
        default_fund_target_size(&amm_k2, &trader_k2, 4, &params, &prices, currency).unwrap()
    };
    assert!((size(CollateralCurrency::Quote) - dec!(673.8726262275334)).abs() < dec!(0.0000001));
    assert!((size(CollateralCurrency::Base) - dec!(0.4548164498488039)).abs() < dec!(0.0000000001));
    assert!((size(CollateralCurrency::Quanto) - dec!(0.02993576461948139)).abs() < dec!(0.0000000001));
}

#[test]
fn funding_follows_amm_exposure() {
    let snapshot = AmmSnapshot::new(
        MarketState::without_quanto(15_448.34, 0.05, 0.0),
        Position::new(0.309_152_670_7, 1_025.990_581),
        CollateralPool::new(0.0, 0.25, 0.0),
    );
    let rate = funding_rate_for_snapshot(&snapshot, &FundingParams::default()).unwrap();
    assert!(rate > Decimal::ZERO);

    let fee = accumulated_funding_fee(dec!(0.0125), dec!(0.0100), dec!(-2));
    assert_eq!(fee, dec!(-0.005));
}
