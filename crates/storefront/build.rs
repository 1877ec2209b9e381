//! Build script for the storefront crate.
//!
//! Fingerprints `static/css/main.css` so the stylesheet can be served with
//! immutable cache headers under a content-addressed name.

use std::env;
use std::fs;
use std::path::Path;

use sha2::{Digest, Sha256};

fn main() {
    fingerprint_css();
}

/// Copy main.css to `static/css/derived/main.<hash>.css`.
///
/// Sets `CSS_HASH` for use with `env!("CSS_HASH")`. When the stylesheet is
/// missing the hash is empty and templates fall back to the undecorated name.
fn fingerprint_css() {
    let manifest_dir =
        env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR must be set by Cargo");
    let css_path = Path::new(&manifest_dir).join("static/css/main.css");

    println!("cargo:rerun-if-changed={}", css_path.display());

    let Ok(content) = fs::read(&css_path) else {
        println!("cargo:rustc-env=CSS_HASH=");
        return;
    };

    let digest = format!("{:x}", Sha256::digest(&content));
    let short_hash = digest.get(..8).unwrap_or(&digest);

    println!("cargo:rustc-env=CSS_HASH={short_hash}");

    let derived_dir = Path::new(&manifest_dir).join("static/css/derived");
    fs::create_dir_all(&derived_dir).expect("Failed to create derived CSS directory");
    fs::copy(&css_path, derived_dir.join(format!("main.{short_hash}.css")))
        .expect("Failed to copy CSS to derived directory");
}
