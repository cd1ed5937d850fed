//! Policy author side: derives per-label policy keys and splits the
//! re-encryption key for a recipient.

use crate::errors::Result;
use crate::policy::PolicyMetadata;
use crate::pre::{
    generate_kfrags, hash_to_scalar, CurvePoint, KFrag, KFragMode, KeyPair, Params, Signer,
};

use std::rc::Rc;

use tracing::debug;

pub struct PolicyAuthor {
    master: KeyPair,
    signer: Signer,
}

/// Everything the network needs to enact a policy for one recipient.
pub struct Grant {
    pub label: Vec<u8>,
    pub policy_pubkey: CurvePoint,
    pub threshold: usize,
    pub kfrags: Vec<KFrag>,
}

impl PolicyAuthor {
    pub fn new(params: &Rc<Params>) -> Self {
        PolicyAuthor {
            master: KeyPair::new(params),
            signer: Signer::new(params),
        }
    }

    pub fn verifying_key(&self) -> &CurvePoint {
        self.signer.public_key()
    }

    /// Same label, same key pair.
    pub fn derive_policy_keypair(&self, label: &[u8]) -> KeyPair {
        let mut seed = self.master.private_key().to_bytes();
        seed.extend_from_slice(label);
        KeyPair::from_secret(hash_to_scalar(&seed, self.master.public_key().params()))
    }

    pub fn grant(
        &self,
        recipient_pk: &CurvePoint,
        label: &[u8],
        threshold: usize,
        shares: usize,
    ) -> Result<Grant> {
        let policy_keys = self.derive_policy_keypair(label);
        let kfrags = generate_kfrags(
            &policy_keys,
            recipient_pk,
            threshold,
            shares,
            &self.signer,
            KFragMode::DelegatingAndReceiving,
        )?;
        debug!(
            "Granted {}-of-{} policy for label {:?}",
            threshold,
            shares,
            String::from_utf8_lossy(label)
        );
        Ok(Grant {
            label: label.to_vec(),
            policy_pubkey: policy_keys.public_key().clone(),
            threshold,
            kfrags,
        })
    }

    /// The record recipients bootstrap from.
    pub fn metadata(&self, grant: &Grant) -> PolicyMetadata {
        PolicyMetadata::new(
            &grant.policy_pubkey,
            self.verifying_key(),
            &String::from_utf8_lossy(&grant.label),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ReaderErrors;
    use crate::pre::{new_standard_params, PreErrors};

    #[test]
    fn policy_keys_are_per_label() {
        let params = new_standard_params();
        let author = PolicyAuthor::new(&params);

        let a = author.derive_policy_keypair(b"heart-data");
        let again = author.derive_policy_keypair(b"heart-data");
        let b = author.derive_policy_keypair(b"sleep-data");
        assert_eq!(a.public_key(), again.public_key());
        assert!(a.public_key() != b.public_key());
    }

    #[test]
    fn grant_matches_metadata() {
        let params = new_standard_params();
        let author = PolicyAuthor::new(&params);
        let bob = KeyPair::new(&params);

        let grant = author.grant(bob.public_key(), b"heart-data", 2, 3).expect("grant");
        assert_eq!(grant.kfrags.len(), 3);
        for kfrag in &grant.kfrags {
            let valid = kfrag
                .verify(
                    author.verifying_key(),
                    Some(&grant.policy_pubkey),
                    Some(bob.public_key()),
                )
                .expect("verify");
            assert!(valid);
        }

        let decoded = author.metadata(&grant).decode(&params).expect("decode");
        assert_eq!(decoded.policy_pubkey, grant.policy_pubkey);
        assert_eq!(&decoded.author_verifying_key, author.verifying_key());
        assert_eq!(decoded.label, b"heart-data".to_vec());
    }

    #[test]
    fn bad_threshold() {
        let params = new_standard_params();
        let author = PolicyAuthor::new(&params);
        let bob = KeyPair::new(&params);
        assert!(matches!(
            author.grant(bob.public_key(), b"x", 4, 3),
            Err(ReaderErrors::Pre(PreErrors::InvalidKFragThreshold))
        ));
    }
}
