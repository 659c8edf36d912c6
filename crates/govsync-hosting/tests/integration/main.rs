//! Integration tests for govsync-hosting
//!
//! Uses wiremock to simulate the GitHub REST API and verifies the
//! repository discovery, contents operations and throttling behavior
//! of GitHubPlatform.

mod common;

mod test_contents;
mod test_discovery;
mod test_throttling;
