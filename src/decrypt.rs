//! Finding the one readable message among a policy's candidate kits.

use crate::errors::{ReaderErrors, Result};
use crate::message_kit::{DataSource, MessageKit, Plaintext};
use crate::network::Middleware;
use crate::participant::Participant;
use crate::pre::CurvePoint;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Serialized kits plus the serialized verifying key of their data source.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PolicyPayload {
    pub kits: Vec<Vec<u8>>,
    pub data_source: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct PayloadRecord {
    kits: Vec<String>,
    data_source: String,
}

impl PolicyPayload {
    /// `{"kits": ["<hex>", ...], "data_source": "<hex>"}`
    pub fn from_json(raw: &str) -> Result<Self> {
        let record: PayloadRecord = serde_json::from_str(raw)?;
        let kits = record
            .kits
            .iter()
            .map(hex::decode)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(PolicyPayload {
            kits,
            data_source: hex::decode(&record.data_source)?,
        })
    }

    pub fn to_json(&self) -> Result<String> {
        let record = PayloadRecord {
            kits: self.kits.iter().map(hex::encode).collect(),
            data_source: hex::encode(&self.data_source),
        };
        Ok(serde_json::to_string(&record)?)
    }
}

#[derive(Debug)]
pub enum CandidateOutcome {
    Decrypted(Plaintext),
    Failed { index: usize, error: ReaderErrors },
}

/// Lazily retrieves each kit in input order.
pub struct Candidates<'a, M: Middleware> {
    kits: std::iter::Enumerate<std::slice::Iter<'a, Vec<u8>>>,
    data_source: DataSource,
    participant: &'a Participant<M>,
    verifying_key: &'a CurvePoint,
}

impl<'a, M: Middleware> Candidates<'a, M> {
    fn attempt(&self, bytes: &[u8]) -> Result<Plaintext> {
        let params = self.data_source.policy_pubkey().params();
        let kit = MessageKit::from_bytes(bytes, params)?;
        let payload = self
            .participant
            .retrieve(kit, &self.data_source, self.verifying_key)?;
        Plaintext::from_json(&payload)
    }
}

impl<'a, M: Middleware> Iterator for Candidates<'a, M> {
    type Item = CandidateOutcome;

    fn next(&mut self) -> Option<CandidateOutcome> {
        let (index, bytes) = self.kits.next()?;
        Some(match self.attempt(bytes) {
            Ok(plaintext) => CandidateOutcome::Decrypted(plaintext),
            Err(error) => CandidateOutcome::Failed { index, error },
        })
    }
}

/// Fails only when the data source key cannot be decoded.
pub fn attempt_kits<'a, M: Middleware>(
    payload: &'a PolicyPayload,
    policy_pubkey: &CurvePoint,
    participant: &'a Participant<M>,
    verifying_key: &'a CurvePoint,
) -> Result<Candidates<'a, M>> {
    let source_key = CurvePoint::from_bytes(&payload.data_source, policy_pubkey.params())?;
    Ok(Candidates {
        kits: payload.kits.iter().enumerate(),
        data_source: DataSource::from_public_keys(policy_pubkey, &source_key),
        participant,
        verifying_key,
    })
}

/// Returns the message of the first kit that decrypts, `None` when none do.
pub fn decrypting_msg<M: Middleware>(
    payload: &PolicyPayload,
    policy_pubkey: &CurvePoint,
    participant: &Participant<M>,
    verifying_key: &CurvePoint,
) -> Result<Option<Vec<u8>>> {
    for outcome in attempt_kits(payload, policy_pubkey, participant, verifying_key)? {
        match outcome {
            CandidateOutcome::Decrypted(plaintext) => return Ok(Some(plaintext.msg)),
            CandidateOutcome::Failed { index, error } => {
                warn!("Kit {} could not be decrypted: {}", index, error)
            }
        }
    }
    debug!("None of {} kits decrypted", payload.kits.len());
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::generate_mayank;
    use crate::config::Config;
    use crate::grant::PolicyAuthor;
    use crate::keystore::{EphemeralKeys, KeyFile, KeySource};
    use crate::network::LocalNetwork;
    use crate::pre::{new_standard_params, KeyPair, PreErrors};

    use std::time::SystemTime;

    struct World {
        mayank: Participant<LocalNetwork>,
        policy_pubkey: CurvePoint,
        author_vk: CurvePoint,
        enrico: DataSource,
        _root: tempfile::TempDir,
    }

    fn world() -> World {
        let params = new_standard_params();
        let root = tempfile::tempdir().expect("tempdir");
        let config = Config {
            metadata_path: root.path().join("policy-metadata.json"),
            workdir: root.path().join("tmp"),
            ..Config::default()
        };

        let keys = KeyFile::new(root.path().join("mayank.json"));
        let (decrypting, signing) = EphemeralKeys.load(&params).expect("keys");
        keys.save(&decrypting, &signing).expect("save keys");

        let author = PolicyAuthor::new(&params);
        let grant = author
            .grant(decrypting.public_key(), b"heart-data", 2, 3)
            .expect("grant");
        author.metadata(&grant).save(&config.metadata_path).expect("metadata");
        let mut network = LocalNetwork::new(3).expect("network");
        network.enact(&grant, decrypting.public_key()).expect("enact");

        let (mayank, policy_pubkey, author_vk, _) =
            generate_mayank(&config, &keys, network).expect("bootstrap");
        let enrico = DataSource::new(&policy_pubkey);
        World {
            mayank,
            policy_pubkey,
            author_vk,
            enrico,
            _root: root,
        }
    }

    impl World {
        fn kit(&self, msg: &str) -> Vec<u8> {
            self.enrico
                .encrypt_message(msg, SystemTime::now())
                .expect("kit")
                .to_bytes()
        }

        fn decoy(&self, msg: &str) -> Vec<u8> {
            let params = self.policy_pubkey.params();
            let stranger = KeyPair::new(params);
            DataSource::new(stranger.public_key())
                .encrypt_message(msg, SystemTime::now())
                .expect("kit")
                .to_bytes()
        }

        fn payload(&self, kits: Vec<Vec<u8>>) -> PolicyPayload {
            PolicyPayload {
                kits,
                data_source: self.enrico.verifying_key().to_bytes(),
            }
        }

        fn run(&self, payload: &PolicyPayload) -> Result<Option<Vec<u8>>> {
            decrypting_msg(payload, &self.policy_pubkey, &self.mayank, &self.author_vk)
        }
    }

    #[test]
    fn no_kits() {
        let w = world();
        assert_eq!(w.run(&w.payload(vec![])).expect("run"), None);
    }

    #[test]
    fn single_readable_kit_anywhere() {
        let w = world();
        for position in 0..3 {
            let mut kits = vec![w.decoy("a"), w.decoy("b")];
            kits.insert(position, w.kit("the real one"));
            assert_eq!(
                w.run(&w.payload(kits)).expect("run"),
                Some(b"the real one".to_vec())
            );
        }
    }

    #[test]
    fn nothing_readable() {
        let w = world();
        let kits = vec![w.decoy("a"), vec![1, 2, 3], w.decoy("b")];
        assert_eq!(w.run(&w.payload(kits)).expect("run"), None);
    }

    #[test]
    fn earliest_readable_kit_wins() {
        let w = world();
        let kits = vec![w.decoy("a"), w.kit("first"), w.kit("second")];
        assert_eq!(w.run(&w.payload(kits)).expect("run"), Some(b"first".to_vec()));
    }

    #[test]
    fn outcomes_in_input_order() {
        let w = world();
        let mut tampered = w.kit("tampered");
        let last = tampered.len() - 1;
        tampered[last] ^= 0xff;
        let payload = w.payload(vec![vec![0u8; 4], w.decoy("a"), tampered, w.kit("ok")]);

        let outcomes: Vec<_> = attempt_kits(&payload, &w.policy_pubkey, &w.mayank, &w.author_vk)
            .expect("candidates")
            .collect();
        assert_eq!(outcomes.len(), 4);
        assert!(matches!(
            outcomes[0],
            CandidateOutcome::Failed {
                index: 0,
                error: ReaderErrors::InvalidKit(_)
            }
        ));
        assert!(matches!(
            outcomes[1],
            CandidateOutcome::Failed {
                index: 1,
                error: ReaderErrors::SenderMismatch
            }
        ));
        assert!(matches!(
            outcomes[2],
            CandidateOutcome::Failed {
                index: 2,
                error: ReaderErrors::Pre(PreErrors::DecryptionError)
            }
        ));
        match &outcomes[3] {
            CandidateOutcome::Decrypted(plaintext) => assert_eq!(plaintext.msg, b"ok".to_vec()),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn out_of_range_timestamp_is_a_failed_candidate() {
        let w = world();
        let far_future = w
            .enrico
            .encrypt_raw(br#"{"msg": "hi", "timestamp": 18446744073709551615}"#)
            .expect("kit")
            .to_bytes();
        let payload = w.payload(vec![far_future, w.kit("later")]);

        let outcomes: Vec<_> = attempt_kits(&payload, &w.policy_pubkey, &w.mayank, &w.author_vk)
            .expect("candidates")
            .collect();
        assert!(matches!(
            outcomes[0],
            CandidateOutcome::Failed {
                index: 0,
                error: ReaderErrors::InvalidTimestamp
            }
        ));
        assert_eq!(w.run(&payload).expect("run"), Some(b"later".to_vec()));
    }

    #[test]
    fn undecodable_data_source() {
        let w = world();
        let payload = PolicyPayload {
            kits: vec![w.kit("x")],
            data_source: vec![0x07; 33],
        };
        assert!(matches!(
            w.run(&payload),
            Err(ReaderErrors::Pre(PreErrors::InvalidBytes))
        ));
    }

    #[test]
    fn payload_json() {
        let w = world();
        let payload = w.payload(vec![w.kit("from json")]);
        let restored = PolicyPayload::from_json(&payload.to_json().expect("json")).expect("parse");
        assert_eq!(restored, payload);
        assert_eq!(w.run(&restored).expect("run"), Some(b"from json".to_vec()));

        assert!(matches!(
            PolicyPayload::from_json(r#"{"kits": ["zz"], "data_source": ""}"#),
            Err(ReaderErrors::Hex(_))
        ));
    }
}
