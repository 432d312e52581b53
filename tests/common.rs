//! tests/common.rs
//! Shared fixtures for the integration tests

use intunewin_rs::{ContainerBuilder, ContainerFile, ContainerOptions};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs::File;
use std::io::Cursor;
use std::path::Path;

/// Small chunk size so multi-chunk paths run on tiny payloads.
#[allow(dead_code)] // Used across multiple test files
pub const TEST_CHUNK_SIZE: usize = 64;

/// Length of the sample payload used by the packaging scenarios.
#[allow(dead_code)] // Used across multiple test files
pub const SAMPLE_LEN: usize = 3078;

#[allow(dead_code)] // Used across multiple test files
pub const TEST_KEY: [u8; 32] = [0x11; 32];
#[allow(dead_code)] // Used across multiple test files
pub const TEST_MAC_KEY: [u8; 32] = [0x22; 32];
#[allow(dead_code)] // Used across multiple test files
pub const TEST_IV: [u8; 16] = [0x33; 16];

/// Deterministic, non-repeating-looking payload of `len` bytes.
#[allow(dead_code)] // Used across multiple test files
pub fn sample_payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i.wrapping_mul(31) ^ (i >> 3)) as u8).collect()
}

/// The "App" / "payload.bin" / "run.cmd" builder with seeded keys.
#[allow(dead_code)] // Used across multiple test files
pub fn app_builder() -> ContainerBuilder {
    ContainerBuilder::new("App")
        .description("Sample application")
        .content_file_name("payload.bin")
        .setup_file("run.cmd")
        .options(ContainerOptions::new().with_chunk_size(TEST_CHUNK_SIZE))
}

#[allow(dead_code)] // Used across multiple test files
pub fn create_app(path: &Path, seed: u64) -> ContainerFile<File> {
    app_builder()
        .create_with_rng(path, &mut StdRng::seed_from_u64(seed))
        .unwrap()
}

#[allow(dead_code)] // Used across multiple test files
pub fn create_app_in_memory(seed: u64) -> ContainerFile<Cursor<Vec<u8>>> {
    app_builder()
        .create_in_with_rng(Cursor::new(Vec::<u8>::new()), &mut StdRng::seed_from_u64(seed))
        .unwrap()
}
