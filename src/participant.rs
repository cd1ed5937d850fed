//! The recipient participant ("Mayank"): joins policies and retrieves
//! message kits through the proxy network.

use crate::errors::{ReaderErrors, Result};
use crate::message_kit::{DataSource, MessageKit};
use crate::network::{Middleware, ReencryptionRequest, SeedNode};
use crate::policy::PolicyMetadata;
use crate::pre::{decrypt, CFrag, CurvePoint, KeyPair, Signer};
use crate::workdir::WorkDir;

use std::collections::HashMap;
use std::fmt;

use tracing::{debug, info, warn};

/// Shares needed before decryption is attempted. The policy threshold is not
/// known to the recipient; too few shares fail in the combination check.
const MIN_CFRAGS: usize = 1;

/// Capability to open re-encrypted capsules.
pub struct DecryptingPower(pub KeyPair);

/// Capability to sign as this participant.
pub struct SigningPower(pub Signer);

pub struct Powers {
    pub decrypting: DecryptingPower,
    pub signing: SigningPower,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParticipantOptions {
    pub start_learning_now: bool,
    pub abort_on_learning_error: bool,
    pub check_proofs: bool,
}

impl Default for ParticipantOptions {
    fn default() -> Self {
        ParticipantOptions {
            start_learning_now: true,
            abort_on_learning_error: false,
            check_proofs: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinedPolicy {
    pub label: Vec<u8>,
    pub policy_pubkey: CurvePoint,
    pub author_verifying_key: CurvePoint,
}

pub struct Participant<M: Middleware> {
    seed: SeedNode,
    powers: Powers,
    middleware: M,
    workdir: WorkDir,
    options: ParticipantOptions,
    policies: HashMap<Vec<u8>, JoinedPolicy>,
}

impl<M: Middleware> Participant<M> {
    pub fn new(
        seed: SeedNode,
        powers: Powers,
        middleware: M,
        workdir: WorkDir,
        options: ParticipantOptions,
    ) -> Result<Self> {
        let mut participant = Participant {
            seed,
            powers,
            middleware,
            workdir,
            options,
            policies: HashMap::new(),
        };
        if options.start_learning_now {
            participant.learn()?;
        }
        Ok(participant)
    }

    /// Learning errors only propagate with `abort_on_learning_error`.
    pub fn learn(&mut self) -> Result<usize> {
        match self.middleware.learn_from(&self.seed) {
            Ok(known) => {
                info!("Learned about {} nodes from {}", known, self.seed);
                Ok(known)
            }
            Err(err) if self.options.abort_on_learning_error => Err(err),
            Err(err) => {
                warn!("Learning from {} failed, continuing: {}", self.seed, err);
                Ok(0)
            }
        }
    }

    pub fn public_key(&self) -> &CurvePoint {
        self.powers.decrypting.0.public_key()
    }

    pub fn stamp(&self) -> &CurvePoint {
        self.powers.signing.0.public_key()
    }

    pub fn seed(&self) -> &SeedNode {
        &self.seed
    }

    pub fn options(&self) -> ParticipantOptions {
        self.options
    }

    pub fn workdir(&self) -> &WorkDir {
        &self.workdir
    }

    pub fn middleware(&self) -> &M {
        &self.middleware
    }

    pub fn middleware_mut(&mut self) -> &mut M {
        &mut self.middleware
    }

    /// Joining a label again replaces the earlier record.
    pub fn join_policy(
        &mut self,
        label: &[u8],
        policy_pubkey: &CurvePoint,
        author_verifying_key: &CurvePoint,
    ) -> Result<()> {
        let record = PolicyMetadata::new(
            policy_pubkey,
            author_verifying_key,
            &String::from_utf8_lossy(label),
        );
        self.workdir.cache_policy(label, &record)?;
        self.policies.insert(
            label.to_vec(),
            JoinedPolicy {
                label: label.to_vec(),
                policy_pubkey: policy_pubkey.clone(),
                author_verifying_key: author_verifying_key.clone(),
            },
        );
        info!("Joined policy {:?}", String::from_utf8_lossy(label));
        Ok(())
    }

    pub fn joined(&self, label: &[u8]) -> Result<&JoinedPolicy> {
        self.policies
            .get(label)
            .ok_or_else(|| ReaderErrors::NotJoined(String::from_utf8_lossy(label).into_owned()))
    }

    /// Fetches cfrags for the kit, opens it and checks the data source
    /// signature. Returns the signed payload.
    pub fn retrieve(
        &self,
        mut kit: MessageKit,
        data_source: &DataSource,
        author_verifying_key: &CurvePoint,
    ) -> Result<Vec<u8>> {
        let policy = self
            .policies
            .values()
            .find(|p| &p.policy_pubkey == data_source.policy_pubkey())
            .ok_or(ReaderErrors::PolicyMismatch)?;
        if &policy.author_verifying_key != author_verifying_key {
            return Err(ReaderErrors::PolicyMismatch);
        }
        if &kit.sender_verifying_key != data_source.verifying_key() {
            return Err(ReaderErrors::SenderMismatch);
        }

        kit.capsule
            .set_correctness_keys(&policy.policy_pubkey, self.public_key(), author_verifying_key);
        let responses = self.middleware.reencrypt(&ReencryptionRequest {
            policy_pubkey: &policy.policy_pubkey,
            recipient_pubkey: self.public_key(),
            capsule: &kit.capsule,
        })?;

        let params = policy.policy_pubkey.params();
        let mut cfrags = Vec::with_capacity(responses.len());
        for bytes in &responses {
            let cfrag = match CFrag::from_bytes(bytes, params) {
                Ok(cfrag) => cfrag,
                Err(err) => {
                    warn!("Discarding undecodable cfrag: {}", err);
                    continue;
                }
            };
            if self.options.check_proofs
                && !cfrag.verify_correctness(&kit.capsule).unwrap_or(false)
            {
                warn!("Discarding cfrag with an invalid correctness proof");
                continue;
            }
            cfrags.push(cfrag);
        }
        if cfrags.len() < MIN_CFRAGS {
            return Err(ReaderErrors::NotEnoughCFrags {
                needed: MIN_CFRAGS,
                got: cfrags.len(),
            });
        }
        debug!("Using {} of {} cfrags", cfrags.len(), responses.len());

        for cfrag in &cfrags {
            kit.capsule.attach_cfrag(cfrag);
        }
        let signed = decrypt(
            &kit.ciphertext,
            &kit.capsule,
            &self.powers.decrypting.0,
            self.options.check_proofs,
        )?;
        data_source.verify_signed(&signed)
    }
}

impl<M: Middleware> fmt::Debug for Participant<M> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Participant")
            .field("seed", &self.seed)
            .field("public_key", self.public_key())
            .field("policies", &self.policies.len())
            .finish()
    }
}
