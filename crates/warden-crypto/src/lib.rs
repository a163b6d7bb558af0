//! Warden Crypto - cryptographic primitives for the agent execution core.
//!
//! This crate provides:
//! - Ed25519 key pairs with secure memory handling
//! - Signatures for capability tokens and audit entries
//! - BLAKE3 content hashing for audit chains and verification
//! - ChaCha20-Poly1305 authenticated encryption for the secrets store
//!
//! # Security Philosophy
//!
//! **Cryptography over prompts.** Authorization comes from ed25519
//! signatures and capability tokens, not from hoping the model follows
//! instructions.
//!
//! # Example
//!
//! ```
//! use warden_crypto::{KeyPair, ContentHash};
//!
//! let keypair = KeyPair::generate();
//!
//! let message = b"important data";
//! let signature = keypair.sign(message);
//!
//! assert!(keypair.verify(message, &signature).is_ok());
//!
//! let hash = ContentHash::hash(message);
//! println!("Hash: {}", hash.to_hex());
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod aead;
mod error;
mod hash;
mod keypair;
mod signature;
mod verifier;

pub use aead::{AeadKey, NONCE_LEN};
pub use error::{CryptoError, CryptoResult};
pub use hash::ContentHash;
pub use keypair::{KeyPair, PublicKey};
pub use signature::Signature;
pub use verifier::{KeyId, SignatureVerifier};
