// ─── Launcher Core ───
// Keeps a local mirror of each remote-defined build in sync before launch.
//
// Architecture:
//   core/
//     hasher      — SHA-256 digests + local mod inventory
//     remote/     — Remote source trait, HTTP client, manifest + descriptor
//     downloader/ — Streaming temp-then-rename downloads with progress
//     installer/  — Version archive extraction
//     version/    — Installed version gate
//     mods/       — Mod plan + reconciliation
//     build/      — Build records + prepare/destroy lifecycle
//     state/      — Paths, config, application wiring

pub mod build;
pub mod downloader;
pub mod error;
pub mod hasher;
pub mod http;
pub mod installer;
pub mod mods;
pub mod progress;
pub mod remote;
pub mod state;
pub mod version;

#[cfg(test)]
pub(crate) mod testing;
