extern crate quick_error;

mod internal;
pub mod pre;

pub mod bootstrap;
pub mod config;
pub mod decrypt;
pub mod errors;
pub mod grant;
pub mod keystore;
pub mod message_kit;
pub mod network;
pub mod participant;
pub mod policy;
pub mod workdir;

pub use crate::bootstrap::generate_mayank;
pub use crate::decrypt::{decrypting_msg, PolicyPayload};
pub use crate::errors::{ReaderErrors, Result};
