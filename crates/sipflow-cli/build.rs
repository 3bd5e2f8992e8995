use std::env;
use std::process::Command;

use time::OffsetDateTime;
use time::macros::format_description;

const UNKNOWN: &str = "unknown";

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    for var in ["SIPFLOW_COMMIT", "GITHUB_SHA", "SOURCE_DATE_EPOCH"] {
        println!("cargo:rerun-if-env-changed={var}");
    }

    // Packagers without a git checkout can pin the commit explicitly.
    let commit = ["SIPFLOW_COMMIT", "GITHUB_SHA"]
        .iter()
        .find_map(|var| env::var(var).ok().filter(|v| !v.trim().is_empty()))
        .or_else(|| git(&["rev-parse", "HEAD"]))
        .unwrap_or_else(|| UNKNOWN.to_string());
    let short: String = commit.chars().take(10).collect();

    let date = env::var("SOURCE_DATE_EPOCH")
        .ok()
        .and_then(|epoch| epoch_date(&epoch))
        .or_else(|| git(&["log", "-1", "--format=%cs"]))
        .unwrap_or_else(|| UNKNOWN.to_string());

    println!("cargo:rustc-env=SIPFLOW_BUILD_COMMIT={short}");
    println!("cargo:rustc-env=SIPFLOW_BUILD_DATE={date}");
}

/// `YYYY-MM-DD` for a reproducible-build epoch.
fn epoch_date(epoch: &str) -> Option<String> {
    let secs: i64 = epoch.trim().parse().ok()?;
    OffsetDateTime::from_unix_timestamp(secs)
        .ok()?
        .format(format_description!("[year]-[month]-[day]"))
        .ok()
}

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!value.is_empty()).then_some(value)
}
