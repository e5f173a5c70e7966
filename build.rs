// Build script for draw-wheel
// Copies the sample config file next to the build artifacts

use std::env;
use std::fs;
use std::path::Path;

fn main() {
    println!("cargo:rerun-if-changed=draw_wheel.toml");

    let out_dir = env::var("OUT_DIR").unwrap();

    // OUT_DIR = target/<profile>/build/<crate>-<hash>/out
    let out_path = Path::new(&out_dir);
    let target_dir = out_path
        .ancestors()
        .nth(3)
        .expect("Could not find target directory");

    let config_src = Path::new("draw_wheel.toml");
    let config_dst = target_dir.join("draw_wheel.toml");

    if config_src.exists() {
        fs::copy(config_src, &config_dst).expect("Failed to copy config file");
    }
}
