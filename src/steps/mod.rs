// src/steps/mod.rs

//! Built-in step types.

pub mod bibtex;
pub mod checks;
pub mod clean;
pub mod file_listing;
pub mod graph_dot;
pub mod latex;
pub mod latex_log;
pub mod options;
pub mod report;

pub use bibtex::BibTeX;
pub use checks::{CheckForMissingBuildRule, CheckForOutput};
pub use clean::Clean;
pub use file_listing::ParseLaTeXFileListing;
pub use graph_dot::GraphDot;
pub use latex::LaTeX;
pub use latex_log::{ParseLaTeXLog, ParsedLog};
pub use options::{ApplyOptions, LoadOptions, ParseOptionsFile};
pub use report::ReportLogMessages;

use crate::errors::Result;
use crate::rule::RuleCatalog;

/// Catalog with every built-in step type registered.
pub fn builtin_catalog() -> Result<RuleCatalog> {
    RuleCatalog::new()
        .with(LoadOptions)?
        .with(ParseOptionsFile)?
        .with(ApplyOptions)?
        .with(LaTeX)?
        .with(ParseLaTeXLog)?
        .with(ParseLaTeXFileListing)?
        .with(BibTeX)?
        .with(CheckForMissingBuildRule)?
        .with(CheckForOutput)?
        .with(ReportLogMessages)?
        .with(Clean)?
        .with(GraphDot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Command, Phase};

    #[test]
    fn builtin_catalog_covers_every_command() {
        let catalog = builtin_catalog().unwrap();
        assert_eq!(catalog.len(), 12);
        assert_eq!(catalog.for_phase(Command::Build, Phase::Execute).len(), 4);
        assert_eq!(catalog.for_phase(Command::Build, Phase::Finalize).len(), 2);
        assert_eq!(catalog.for_phase(Command::Load, Phase::Initialize).len(), 2);
        assert_eq!(catalog.for_phase(Command::Scrub, Phase::Execute).len(), 1);
        assert!(catalog.get("GraphDot").is_some());
    }
}
