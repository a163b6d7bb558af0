//! Prelude module - commonly used types for convenient import.
//!
//! Use `use warden_crypto::prelude::*;` to import all essential types.
//!
//! # Example
//!
//! ```rust
//! use warden_crypto::prelude::*;
//!
//! let keypair = KeyPair::generate();
//!
//! let message = b"hello";
//! let signature = keypair.sign(message);
//! assert!(keypair.verify(message, &signature).is_ok());
//!
//! let hash = ContentHash::hash(message);
//! ```

// Errors
pub use crate::{CryptoError, CryptoResult};

// Key types
pub use crate::{KeyId, KeyPair, PublicKey};

// Signature
pub use crate::Signature;

// Signature verification
pub use crate::SignatureVerifier;

// Hashing
pub use crate::ContentHash;

// Authenticated encryption
pub use crate::{AeadKey, NONCE_LEN};
