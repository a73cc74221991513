// perps-amm-risk: risk and pricing core of a perpetual futures AMM.
// the AMM quotes from its own default probability, sizes its collateral and
// default fund against stress moves, and liquidates under-margined traders.
// all computation is pure: no I/O, no shared state, no caching.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: market state, price, AMM exposure, collateral pool, snapshot
//   2.x  error.rs: RiskError kinds
//        normal.rs: standard normal cdf / inverse
//        default_probability.rs: AMM default probability, quanto and plain
//        collateral.rs: collateral targets M1/M2/M3, AMM fund targets
//        pricing.rs: perpetual price curve, kStar, mid price, slippage
//   3.x  margin.rs: margin rate schedule, FX, margin balance, leverage,
//        withdrawable margin, required collateral
//   5.x  funding.rs: funding rate, premium, accumulated funding fee
//   6.x  liquidation.rs: liquidation amount, application, liquidation prices
//   7.x  config.rs: fees, RiskConfig aggregate, presets
//   8.x  solver.rs: bounded newton iteration
//   9.x  default_fund.rs: default fund target under stress returns

pub mod collateral;
pub mod config;
pub mod default_fund;
pub mod default_probability;
pub mod error;
pub mod funding;
pub mod liquidation;
pub mod margin;
pub mod normal;
pub mod pricing;
pub mod solver;
pub mod types;

// re exports for convenience
pub use collateral::*;
pub use config::*;
pub use default_fund::*;
pub use default_probability::*;
pub use error::*;
pub use funding::*;
pub use liquidation::*;
pub use margin::*;
pub use pricing::*;
pub use solver::*;
pub use types::*;
