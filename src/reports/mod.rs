//! Cost analysis queries over the billing views.

pub mod customers;
pub mod increases;
pub mod summary;

pub use customers::CustomerGrouping;
pub use increases::{CostChange, IncreaseSummary, IncreaseThresholds, YearMonth};
pub use summary::{SmokeTest, smoke_test};
