//! Data source side ("Enrico"): encrypts signed payloads under a policy key.

use crate::errors::{ReaderErrors, Result};
use crate::pre::{encrypt, Capsule, CurvePoint, Params, Signature, Signer};

use std::rc::Rc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// A data source bound to one policy public key.
///
/// Built with a signer when producing kits; the recipient rebuilds it
/// from the two public keys only, which is enough to verify.
pub struct DataSource {
    policy_pubkey: CurvePoint,
    verifying_key: CurvePoint,
    signer: Option<Signer>,
}

impl DataSource {
    pub fn new(policy_pubkey: &CurvePoint) -> Self {
        let signer = Signer::new(policy_pubkey.params());
        DataSource {
            policy_pubkey: policy_pubkey.clone(),
            verifying_key: signer.public_key().clone(),
            signer: Some(signer),
        }
    }

    pub fn from_public_keys(policy_pubkey: &CurvePoint, verifying_key: &CurvePoint) -> Self {
        DataSource {
            policy_pubkey: policy_pubkey.clone(),
            verifying_key: verifying_key.clone(),
            signer: None,
        }
    }

    pub fn policy_pubkey(&self) -> &CurvePoint {
        &self.policy_pubkey
    }

    pub fn verifying_key(&self) -> &CurvePoint {
        &self.verifying_key
    }

    /// Fails with `InvalidKit` on a verify-only data source.
    pub fn encrypt_message(&self, msg: &str, timestamp: SystemTime) -> Result<MessageKit> {
        let payload = Plaintext::new(msg, timestamp).to_json()?;
        self.encrypt_raw(&payload)
    }

    /// Signs and encrypts an already serialized payload.
    pub(crate) fn encrypt_raw(&self, payload: &[u8]) -> Result<MessageKit> {
        let signer = self
            .signer
            .as_ref()
            .ok_or(ReaderErrors::InvalidKit("data source has no signing key"))?;
        let mut signed = signer.sign_sha2(payload).to_bytes();
        signed.extend_from_slice(payload);

        let (ciphertext, capsule) = encrypt(&self.policy_pubkey, &signed)?;
        Ok(MessageKit {
            sender_verifying_key: self.verifying_key.clone(),
            capsule,
            ciphertext,
        })
    }

    /// Splits `signature || payload` and checks the signature.
    pub(crate) fn verify_signed(&self, signed: &[u8]) -> Result<Vec<u8>> {
        let params = self.verifying_key.params();
        let sig_len = Signature::expected_bytes_length(params);
        if signed.len() < sig_len {
            return Err(ReaderErrors::InvalidSignature);
        }
        let (sig, payload) = signed.split_at(sig_len);
        let sig = Signature::from_bytes(sig, params).map_err(|_| ReaderErrors::InvalidSignature)?;
        if !sig.verify_sha2(payload, &self.verifying_key) {
            return Err(ReaderErrors::InvalidSignature);
        }
        Ok(payload.to_vec())
    }
}

/// What the data source publishes per message.
///
/// Wire layout: `verifying_key || capsule || ciphertext`.
#[derive(Debug)]
pub struct MessageKit {
    pub sender_verifying_key: CurvePoint,
    pub capsule: Capsule,
    pub ciphertext: Vec<u8>,
}

impl MessageKit {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.sender_verifying_key.to_bytes();
        bytes.extend_from_slice(&self.capsule.to_bytes());
        bytes.extend_from_slice(&self.ciphertext);
        bytes
    }

    pub fn from_bytes(bytes: &[u8], params: &Rc<Params>) -> Result<Self> {
        let key_len = CurvePoint::expected_bytes_length(params);
        let capsule_len = Capsule::expected_bytes_length(params);
        if bytes.len() <= key_len + capsule_len {
            return Err(ReaderErrors::InvalidKit("truncated"));
        }
        let (key, rest) = bytes.split_at(key_len);
        let (capsule, ciphertext) = rest.split_at(capsule_len);

        let sender_verifying_key = CurvePoint::from_bytes(key, params)
            .map_err(|_| ReaderErrors::InvalidKit("bad sender key"))?;
        let capsule = Capsule::from_bytes(capsule, params)
            .map_err(|_| ReaderErrors::InvalidKit("bad capsule"))?;
        Ok(MessageKit {
            sender_verifying_key,
            capsule,
            ciphertext: ciphertext.to_vec(),
        })
    }
}

#[derive(Serialize, Deserialize)]
struct PlaintextRecord {
    msg: String,
    timestamp: u64,
}

/// A decrypted payload: the message and when the data source produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Plaintext {
    pub msg: Vec<u8>,
    pub timestamp: SystemTime,
}

impl Plaintext {
    pub fn new(msg: &str, timestamp: SystemTime) -> Self {
        Plaintext {
            msg: msg.as_bytes().to_vec(),
            timestamp,
        }
    }

    /// `{"msg": "...", "timestamp": <unix seconds>}`. Pre-epoch times are
    /// rejected.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        let record = PlaintextRecord {
            msg: String::from_utf8_lossy(&self.msg).into_owned(),
            timestamp: self
                .timestamp
                .duration_since(UNIX_EPOCH)
                .map_err(|_| ReaderErrors::InvalidTimestamp)?
                .as_secs(),
        };
        Ok(serde_json::to_vec(&record)?)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let record: PlaintextRecord = serde_json::from_slice(bytes)?;
        let timestamp = UNIX_EPOCH
            .checked_add(Duration::from_secs(record.timestamp))
            .ok_or(ReaderErrors::InvalidTimestamp)?;
        Ok(Plaintext {
            msg: record.msg.into_bytes(),
            timestamp,
        })
    }
}
