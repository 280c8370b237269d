//! Bakes the source revision and build timestamp into the binary for
//! `--version` and `/doxy/version`.

use std::env;
use std::process::Command;

use chrono::{DateTime, SecondsFormat, Utc};

fn main() {
    println!("cargo:rustc-env=DOXY_GIT_REVISION={}", git_revision());
    println!("cargo:rustc-env=DOXY_BUILD_TIME={}", build_time());

    println!("cargo:rerun-if-changed=../.git/HEAD");
    println!("cargo:rerun-if-changed=../.git/index");
    println!("cargo:rerun-if-env-changed=SOURCE_DATE_EPOCH");
}

/// `git describe` of the checkout, marked `-dirty` for uncommitted changes
fn git_revision() -> String {
    Command::new("git")
        .args(["describe", "--always", "--dirty", "--abbrev=12"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|revision| revision.trim().to_string())
        .filter(|revision| !revision.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

/// RFC 3339 build time. `SOURCE_DATE_EPOCH` pins it for reproducible builds.
fn build_time() -> String {
    let time = env::var("SOURCE_DATE_EPOCH")
        .ok()
        .and_then(|epoch| epoch.trim().parse::<i64>().ok())
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .unwrap_or_else(Utc::now);

    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}
