//! Browser driver discovery.
//!
//! [`resolve_driver_path`] is a pure function: it inspects the filesystem but
//! never modifies it and never fails. [`find_browser_executable`] walks the
//! usual install locations to produce a path worth resolving.

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Resolve the real executable behind a reported driver install path.
///
/// On macOS an installer may report a manifest or notice file that sits next
/// to the binary rather than the binary itself. Candidates are checked in
/// order:
///
/// 1. `<dir>/<executable_name>`
/// 2. `<dir>/<executable_name>-mac-arm64/<executable_name>` (or `-mac-x64`)
/// 3. `<dir>/../<executable_name>`
///
/// The first candidate that exists and is executable wins. On any other OS,
/// or when nothing qualifies, `reported` is returned unchanged.
pub fn resolve_driver_path(reported: &Path, os: &str, arch: &str, executable_name: &str) -> PathBuf {
    if !is_macos(os) {
        return reported.to_path_buf();
    }

    for candidate in candidate_paths(reported, arch, executable_name) {
        if is_executable(&candidate) {
            if candidate != reported {
                debug!(
                    reported = %reported.display(),
                    resolved = %candidate.display(),
                    "Resolved driver executable"
                );
            }
            return candidate;
        }
    }

    reported.to_path_buf()
}

fn candidate_paths(reported: &Path, arch: &str, executable_name: &str) -> Vec<PathBuf> {
    let Some(dir) = reported.parent() else {
        return Vec::new();
    };

    let arch_dir = format!("{executable_name}-mac-{}", arch_variant(arch));
    let mut candidates = vec![
        dir.join(executable_name),
        dir.join(&arch_dir).join(executable_name),
    ];
    if let Some(parent) = dir.parent() {
        candidates.push(parent.join(executable_name));
    }
    candidates
}

fn is_macos(os: &str) -> bool {
    os.eq_ignore_ascii_case("macos") || os.eq_ignore_ascii_case("darwin")
}

fn arch_variant(arch: &str) -> &'static str {
    let arch = arch.to_ascii_lowercase();
    if arch.contains("arm") || arch.contains("aarch64") {
        "arm64"
    } else {
        "x64"
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    match std::fs::metadata(path) {
        Ok(meta) => meta.is_file() && meta.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Locate a Chrome/Chromium executable already present on this machine.
///
/// Checks, in order: the `CHROMIUM_PATH` environment variable, well-known
/// per-platform install locations, then `PATH`.
pub fn find_browser_executable() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("CHROMIUM_PATH") {
        let path = PathBuf::from(path);
        if path.exists() {
            info!(path = %path.display(), "Using browser from CHROMIUM_PATH");
            return Some(path);
        }
        warn!(path = %path.display(), "CHROMIUM_PATH points to a missing file");
    }

    for path in well_known_paths() {
        if path.exists() {
            info!(path = %path.display(), "Found browser");
            return Some(path);
        }
    }

    for cmd in ["chromium", "chromium-browser", "google-chrome", "google-chrome-stable", "chrome"] {
        if let Ok(path) = which::which(cmd) {
            info!(path = %path.display(), "Found browser on PATH");
            return Some(path);
        }
    }

    None
}

fn well_known_paths() -> Vec<PathBuf> {
    let paths: &[&str] = if cfg!(target_os = "windows") {
        &[
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files\Chromium\Application\chrome.exe",
        ]
    } else if cfg!(target_os = "macos") {
        &[
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/opt/homebrew/bin/chromium",
        ]
    } else {
        &[
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/snap/bin/chromium",
            "/opt/google/chrome/chrome",
        ]
    };

    let mut out: Vec<PathBuf> = paths.iter().map(PathBuf::from).collect();
    if cfg!(target_os = "macos") {
        if let Some(home) = dirs::home_dir() {
            out.push(home.join("Applications/Google Chrome.app/Contents/MacOS/Google Chrome"));
        }
    }
    out
}
