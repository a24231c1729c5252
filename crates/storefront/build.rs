//! Fingerprints the storefront's static assets.
//!
//! Each asset is copied to `static/<kind>/derived/<stem>.<hash>.<ext>` and the
//! short hash is exported as a compile-time env var for the template filters.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

/// (env var, path relative to the manifest dir)
const ASSETS: &[(&str, &str)] = &[
    ("CSS_HASH", "static/css/main.css"),
    ("JS_HASH", "static/js/razorpay.js"),
];

fn main() {
    let Ok(manifest_dir) = env::var("CARGO_MANIFEST_DIR") else {
        println!("cargo:warning=CARGO_MANIFEST_DIR not set, skipping asset hashing");
        for (var, _) in ASSETS {
            println!("cargo:rustc-env={var}=");
        }
        return;
    };

    for (var, rel) in ASSETS {
        let hash = fingerprint(&Path::new(&manifest_dir).join(rel)).unwrap_or_else(|e| {
            println!("cargo:warning=Could not fingerprint {rel}: {e}");
            String::new()
        });
        println!("cargo:rustc-env={var}={hash}");
    }
}

fn fingerprint(source: &Path) -> std::io::Result<String> {
    println!("cargo:rerun-if-changed={}", source.display());

    let content = fs::read(source)?;
    let digest = format!("{:x}", Sha256::digest(&content));
    let short = digest[..8].to_string();

    let dir = source.parent().unwrap_or_else(|| Path::new("."));
    let derived: PathBuf = dir.join("derived");
    fs::create_dir_all(&derived)?;

    let stem = source.file_stem().and_then(|s| s.to_str()).unwrap_or("asset");
    let ext = source.extension().and_then(|s| s.to_str()).unwrap_or("bin");
    fs::copy(source, derived.join(format!("{stem}.{short}.{ext}")))?;

    Ok(short)
}
