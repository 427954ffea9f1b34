//! Classify pull requests against a fixed set of low-risk edit categories and
//! label the ones that can be merged without human review.

pub mod config;
pub mod context;
pub mod diff;
pub mod error;
pub mod github;
pub mod oracle;
pub mod output;
pub mod policy;
pub mod prompt_loader;
pub mod run;
