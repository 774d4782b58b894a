//! Fingerprints `static/css/main.css` so the stylesheet can be served with
//! immutable cache headers.
//!
//! The short hash is exported as `CSS_HASH` and the stylesheet is copied to
//! `static/css/derived/main.<hash>.css`.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

/// Hex digits of the digest kept in the file name.
const HASH_LEN: usize = 8;

fn main() {
    let manifest_dir = PathBuf::from(
        env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR must be set by Cargo"),
    );
    fingerprint_css(&manifest_dir);
}

fn fingerprint_css(manifest_dir: &Path) {
    let source = manifest_dir.join("static/css/main.css");
    println!("cargo:rerun-if-changed={}", source.display());

    let Ok(content) = fs::read(&source) else {
        println!("cargo:warning=static/css/main.css not found, stylesheet link will be broken");
        println!("cargo:rustc-env=CSS_HASH=");
        return;
    };

    let digest = format!("{:x}", Sha256::digest(&content));
    let hash = &digest[..HASH_LEN];
    println!("cargo:rustc-env=CSS_HASH={hash}");

    let derived = manifest_dir.join("static/css/derived");
    fs::create_dir_all(&derived).expect("Failed to create static/css/derived");

    // Drop stale fingerprints so the directory only holds the current build
    if let Ok(entries) = fs::read_dir(&derived) {
        for entry in entries.flatten() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with("main.") && name.ends_with(".css") && name != format!("main.{hash}.css") {
                let _ = fs::remove_file(entry.path());
            }
        }
    }

    fs::copy(&source, derived.join(format!("main.{hash}.css")))
        .expect("Failed to write fingerprinted stylesheet");
}
