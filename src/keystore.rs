//! Where the participant's decrypting and signing keys come from.

use crate::errors::Result;
use crate::pre::{KeyPair, Params, Signer};

use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde::{Deserialize, Serialize};

pub trait KeySource {
    /// `(decrypting keys, signing keys)`
    fn load(&self, params: &Rc<Params>) -> Result<(KeyPair, Signer)>;
}

/// Fresh random keys on every load.
#[derive(Debug, Default, Clone, Copy)]
pub struct EphemeralKeys;

impl KeySource for EphemeralKeys {
    fn load(&self, params: &Rc<Params>) -> Result<(KeyPair, Signer)> {
        Ok((KeyPair::new(params), Signer::new(params)))
    }
}

#[derive(Serialize, Deserialize)]
struct KeyRecord {
    public_key: String,
    secret_key: String,
}

#[derive(Serialize, Deserialize)]
struct KeyFileRecord {
    decrypting: KeyRecord,
    signing: KeyRecord,
}

impl KeyRecord {
    fn new((pk, sk): (Vec<u8>, Vec<u8>)) -> Self {
        KeyRecord {
            public_key: hex::encode(pk),
            secret_key: hex::encode(sk),
        }
    }

    fn decode(&self) -> Result<(Vec<u8>, Vec<u8>)> {
        Ok((hex::decode(&self.public_key)?, hex::decode(&self.secret_key)?))
    }
}

/// Keys persisted as JSON:
///
/// ```json
/// {
///   "decrypting": { "public_key": "02..", "secret_key": ".." },
///   "signing": { "public_key": "03..", "secret_key": ".." }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct KeyFile {
    pub path: PathBuf,
}

impl KeyFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        KeyFile {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn save(&self, decrypting: &KeyPair, signing: &Signer) -> Result<()> {
        let record = KeyFileRecord {
            decrypting: KeyRecord::new(decrypting.to_bytes()),
            signing: KeyRecord::new(signing.to_bytes()),
        };
        fs::write(&self.path, serde_json::to_string_pretty(&record)?)?;
        Ok(())
    }
}

impl KeySource for KeyFile {
    fn load(&self, params: &Rc<Params>) -> Result<(KeyPair, Signer)> {
        let record: KeyFileRecord = serde_json::from_str(&fs::read_to_string(&self.path)?)?;
        let (pk, sk) = record.decrypting.decode()?;
        let decrypting = KeyPair::from_bytes(&pk, &sk, params)?;
        let (pk, sk) = record.signing.decode()?;
        let signing = Signer::from_bytes(&pk, &sk, params)?;
        Ok((decrypting, signing))
    }
}
