pub mod reports;
pub mod scenarios;
pub mod seeds;
pub mod tester;

pub use scenarios::{Scenario, list_scenarios};
pub use seeds::{SeedInfo, resolve_seed_inputs};
pub use tester::*;
