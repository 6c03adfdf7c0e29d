// Embed the git hash in --version. Optional; no git = no hash.
fn main() {
    let version = std::env::var("CARGO_PKG_VERSION").unwrap_or_default();
    if let Ok(output) = std::process::Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
    {
        if output.status.success() {
            if let Ok(s) = String::from_utf8(output.stdout) {
                let hash = s.trim();
                println!("cargo:rustc-env=EVENTCARD_LONG_VERSION={version} ({hash})");
            }
        }
    }
}
