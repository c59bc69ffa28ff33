//! Clear TPM ownership from the command line.
//!
//! The owner secret comes from exactly one of: a non-echoing prompt, a literal
//! `-o` value, an environment variable named by `-o` (`-t`), hex text (`-x`),
//! or the well-known all-zero secret (`-z`). `-f` skips the secret entirely
//! and relies on physical presence. Every buffer that held secret bytes is
//! zeroed before it is released, whatever the outcome.
//!
//! # Get Started
//!
//! ## Against the TPM resource manager:
//! ```bash
//! tpm_clear -o
//! ```
//!
//! ## Against a simulator:
//! ```bash
//! tpm_clear -T mssim:host=localhost,port=2321 -z
//! ```

pub mod cli;
pub mod config;
pub mod credential;
pub mod secret;
pub mod tpm;
pub mod workflow;
