use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/index");
    println!("cargo:rerun-if-env-changed=PROMPTFOO_BUILD_VERSION");

    // An explicit build version (set by release tooling) wins over git.
    if let Ok(version) = std::env::var("PROMPTFOO_BUILD_VERSION") {
        if !version.trim().is_empty() {
            println!("cargo:rustc-env=PROMPTFOO_VERSION={}", version.trim());
            return;
        }
    }

    let output = Command::new("git")
        .args(["describe", "--tags", "--always", "--dirty"])
        .output();

    let version = match output {
        Ok(o) if o.status.success() => {
            let git_output = String::from_utf8(o.stdout)
                .unwrap_or_default()
                .trim()
                .to_string();

            // Strip 'v' prefix if present (e.g., "v1.0.0" -> "1.0.0")
            let version = git_output.strip_prefix('v').unwrap_or(&git_output);

            if version.is_empty() {
                fallback_version()
            } else {
                version.to_string()
            }
        }
        // Not a git checkout (e.g. a packaged crate): use the manifest version
        _ => fallback_version(),
    };

    println!("cargo:rustc-env=PROMPTFOO_VERSION={}", version);
}

fn fallback_version() -> String {
    std::env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "0.0.0-unknown".to_string())
}
