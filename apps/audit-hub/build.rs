//! Build Script for Audit Hub
//!
//! Generates Rust protobuf stubs from workspace proto definitions.
//!
//! # Panics Policy
//!
//! Build scripts use `.expect()` and panic on failure: there is no caller
//! to propagate errors to, and the build must halt with a readable message.
#![allow(clippy::expect_used)]

use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=../../packages/proto/audit/");

    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let proto_root = manifest_dir.join("../../packages/proto");
    let proto_files = [proto_root.join("audit/v1/audit.proto")];

    for proto in &proto_files {
        println!("cargo:rerun-if-changed={}", proto.display());
    }

    // Descriptor set is compiled in-process.
    let fds = protox::compile(&proto_files, [&proto_root])
        .expect("Failed to compile audit.proto into a descriptor set");

    tonic_prost_build::configure()
        .build_client(true) // Enable client for integration tests
        .build_server(true)
        .compile_fds(fds)
        .expect("Failed to compile protobuf definitions");
}
