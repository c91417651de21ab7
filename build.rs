//! Build script for detecting the OpenCV installation and providing installation guidance.
//!
//! The `opencv` crate links against the system library; this script only reports
//! what it finds so a failed link comes with a hint.

use std::env;
use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    check_opencv();
    check_pkg_config();

    println!(
        "cargo:rustc-env=BUILD_TARGET={}",
        env::var("TARGET").unwrap_or_default()
    );
}

fn check_opencv() {
    println!("cargo:rerun-if-env-changed=PKG_CONFIG_PATH");
    println!("cargo:rerun-if-env-changed=OPENCV_LINK_PATHS");
    println!("cargo:rerun-if-env-changed=OPENCV_INCLUDE_PATHS");

    let found = ["opencv4", "opencv"].iter().find_map(|name| {
        Command::new("pkg-config")
            .args(["--modversion", name])
            .output()
            .ok()
            .filter(|output| output.status.success())
            .map(|output| String::from_utf8_lossy(&output.stdout).trim().to_string())
    });

    match found {
        Some(version) => {
            println!("cargo:warning=Found OpenCV version: {version}");
            // seamless_clone lives in the photo module
            if !has_module("opencv4", "photo") {
                println!("cargo:warning=Could not confirm the OpenCV photo module; seamless cloning needs it.");
            }
        }
        None => {
            println!("cargo:warning=OpenCV not found via pkg-config. Make sure OpenCV is installed.");
            println!("cargo:warning=On Ubuntu: sudo apt-get install libopencv-dev");
            println!("cargo:warning=On macOS: brew install opencv");
        }
    }
}

fn has_module(package: &str, module: &str) -> bool {
    Command::new("pkg-config")
        .args(["--libs", package])
        .output()
        .map(|output| String::from_utf8_lossy(&output.stdout).contains(&format!("opencv_{module}")))
        .unwrap_or(false)
}

fn check_pkg_config() {
    let output = Command::new("pkg-config").arg("--version").output();

    match output {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout);
            println!("cargo:warning=Found pkg-config version: {}", version.trim());
        }
        _ => {
            println!("cargo:warning=pkg-config not found. This is required to find system libraries.");
            println!("cargo:warning=On Ubuntu: sudo apt-get install pkg-config");
            println!("cargo:warning=On macOS: brew install pkg-config");
        }
    }
}
