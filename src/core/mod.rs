mod finding;
mod label;
mod result;
mod severity;

pub use finding::{Finding, ReviewStatus};
pub use label::ComplianceLabel;
pub use result::{AnalysisResult, SeveritySummary};
pub use severity::Severity;
