use std::process::Command;

/// Expose the source revision as `CHIRP_GIT_SHA`.
///
/// Packagers building outside a git checkout can set `CHIRP_GIT_SHA`
/// themselves; otherwise `git describe` is asked and `unknown` is the fallback.
fn main() {
    println!("cargo:rerun-if-env-changed=CHIRP_GIT_SHA");
    println!("cargo:rerun-if-changed=../../.git/HEAD");

    let revision = std::env::var("CHIRP_GIT_SHA")
        .ok()
        .filter(|v| !v.is_empty())
        .or_else(describe)
        .unwrap_or_else(|| "unknown".to_string());

    println!("cargo:rustc-env=CHIRP_GIT_SHA={revision}");
}

fn describe() -> Option<String> {
    let out = Command::new("git")
        .args(["describe", "--always", "--dirty", "--abbrev=8"])
        .output()
        .ok()?;
    out.status
        .success()
        .then(|| String::from_utf8_lossy(&out.stdout).trim().to_string())
        .filter(|s| !s.is_empty())
}
