//! Seeder outcomes and run-level reports.

pub mod model;
pub mod render;
pub mod summary;
pub mod verification;

pub use model::{ModeParseError, RunHeader, RunMode, SeedReport, SeederResult, TrackedResource};
pub use render::{MAX_RENDERED_ERRORS, print_report, render_report};
pub use summary::{Summary, create_report, flatten_results, summarize};
pub use verification::{CheckStatus, Expectation, Verification, VerificationCheck};
