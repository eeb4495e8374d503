use std::process::Command;

// Exposes COPHESELECT_BUILD to the crate: taken from the environment when set
// (release builds outside a checkout), from `git describe` otherwise.
fn main() {
    println!("cargo:rerun-if-env-changed=COPHESELECT_BUILD");
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/index");

    let build = std::env::var("COPHESELECT_BUILD")
        .ok()
        .or_else(git_describe)
        .map(|b| b.trim().to_string())
        .filter(|b| !b.is_empty());

    if let Some(build) = build {
        println!("cargo:rustc-env=COPHESELECT_BUILD={}", build);
    }
}

fn git_describe() -> Option<String> {
    let output = Command::new("git")
        .args(["describe", "--always", "--dirty", "--abbrev=7"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout).ok()
}
