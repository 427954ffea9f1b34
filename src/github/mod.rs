mod client;
mod pr;

pub use pr::{GhHost, PullRequestHost};
