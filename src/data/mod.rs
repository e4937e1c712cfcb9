//! Dataset handling
//!
//! - Column roles and manual overrides
//! - CSV loading conformed to the roles
//! - Shuffled train/validation split
//! - Literal passenger records for prediction

mod loader;
mod passenger;
mod schema;
mod split;

pub use loader::{conform_scoring_frame, conform_training_frame, DataLoader, LoaderOptions};
pub use passenger::{passengers_to_frame, sample_passengers, Passenger};
pub use schema::{AppliedOverride, ColumnRole, ColumnRoleSet, OverrideReport, ReclassificationRule};
pub use split::{train_test_split, TrainTestData};
