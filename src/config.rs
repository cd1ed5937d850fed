use crate::errors::Result;
use crate::participant::ParticipantOptions;

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// https URI of the node to learn the network from
    pub seed_uri: String,
    /// policy metadata file published by the policy author
    pub metadata_path: PathBuf,
    /// scratch directory, wiped at bootstrap
    pub workdir: PathBuf,

    // learning
    pub start_learning_now: bool,
    pub abort_on_learning_error: bool,

    /// verify cfrag correctness proofs before combining
    pub check_proofs: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            seed_uri: "https://localhost:9151".to_owned(),
            metadata_path: PathBuf::from("policy-metadata.json"),
            workdir: PathBuf::from("./tmp"),
            start_learning_now: true,
            abort_on_learning_error: false,
            check_proofs: true,
        }
    }
}

impl Config {
    /// Fields missing from the file keep their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn participant_options(&self) -> ParticipantOptions {
        ParticipantOptions {
            start_learning_now: self.start_learning_now,
            abort_on_learning_error: self.abort_on_learning_error,
            check_proofs: self.check_proofs,
        }
    }
}
