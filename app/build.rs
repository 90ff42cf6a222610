//! Puts the memory layout of the selected board where cortex-m-rt's linker script finds it.

use std::{env, fs, path::PathBuf};

fn main() {
    let memory = if env::var_os("CARGO_FEATURE_TIM").is_some() {
        "memory_h743.x"
    } else {
        "memory_g474.x"
    };

    let out = PathBuf::from(env::var_os("OUT_DIR").expect("OUT_DIR is set by cargo"));
    fs::copy(memory, out.join("memory.x")).expect("board memory layout is readable");
    println!("cargo:rustc-link-search={}", out.display());
    println!("cargo:rerun-if-changed={}", memory);
    println!("cargo:rerun-if-changed=build.rs");

    println!("cargo:rustc-link-arg-bins=--nmagic");
    println!("cargo:rustc-link-arg-bins=-Tlink.x");
    println!("cargo:rustc-link-arg-bins=-Tdefmt.x");
}
