// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::env;
use std::fs;
use std::io::Write;
use std::path::Path;

fn main() {
    let out_dir = match env::var("OUT_DIR") {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("cargo:warning=OUT_DIR not set: {e}");
            std::process::exit(1);
        }
    };
    let dest_path = Path::new(&out_dir).join("env_names.rs");

    let mut file = match fs::File::create(&dest_path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("cargo:warning=failed to create env_names.rs: {e}");
            std::process::exit(1);
        }
    };

    let contents = r#"/// Environment variable: set to 0/false/no/off to forbid starting daemons.
pub const TRK_AUTO_START_DAEMON: &str = "TRK_AUTO_START_DAEMON";

/// Environment variable: path of the trkd binary to spawn.
pub const TRK_DAEMON_BINARY: &str = "TRK_DAEMON_BINARY";

/// Environment variable: controls log level filtering (used by tracing-subscriber).
pub const RUST_LOG: &str = "RUST_LOG";
"#;

    if let Err(e) = file.write_all(contents.as_bytes()) {
        eprintln!("cargo:warning=failed to write env_names.rs: {e}");
        std::process::exit(1);
    }
}
