//! The policy metadata record a policy author publishes for its recipients.

use crate::errors::Result;
use crate::pre::{CurvePoint, Params};

use std::fs;
use std::path::Path;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

/// On-disk form: both keys hex encoded, label as plain text.
///
/// ```json
/// { "policy_pubkey": "02..", "arjun_sig_pubkey": "03..", "label": "heart-data" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyMetadata {
    pub policy_pubkey: String,
    pub arjun_sig_pubkey: String,
    pub label: String,
}

/// The record with its keys parsed, as handed to the policy join.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedPolicy {
    pub policy_pubkey: CurvePoint,
    pub author_verifying_key: CurvePoint,
    pub label: Vec<u8>,
}

impl PolicyMetadata {
    pub fn new(policy_pubkey: &CurvePoint, author_verifying_key: &CurvePoint, label: &str) -> Self {
        PolicyMetadata {
            policy_pubkey: hex::encode(policy_pubkey.to_bytes()),
            arjun_sig_pubkey: hex::encode(author_verifying_key.to_bytes()),
            label: label.to_owned(),
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path.as_ref(), serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn decode(&self, params: &Rc<Params>) -> Result<DecodedPolicy> {
        let policy_pubkey = CurvePoint::from_bytes(&hex::decode(&self.policy_pubkey)?, params)?;
        let author_bytes = hex::decode(&self.arjun_sig_pubkey)?;
        let author_verifying_key = CurvePoint::from_bytes(&author_bytes, params)?;
        Ok(DecodedPolicy {
            policy_pubkey,
            author_verifying_key,
            label: self.label.as_bytes().to_vec(),
        })
    }
}
