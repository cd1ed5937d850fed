//! Bootstrap of the recipient participant from a policy metadata file.

use crate::config::Config;
use crate::errors::Result;
use crate::keystore::KeySource;
use crate::network::{Middleware, SeedNode};
use crate::participant::{DecryptingPower, Participant, Powers, SigningPower};
use crate::policy::PolicyMetadata;
use crate::pre::{new_standard_params, CurvePoint};
use crate::workdir::WorkDir;

use tracing::info;

/// Builds the participant and joins the policy described by the metadata
/// file.
///
/// Returns `(participant, policy_pubkey, author_verifying_key, label)`.
pub fn generate_mayank<M, K>(
    config: &Config,
    key_source: &K,
    middleware: M,
) -> Result<(Participant<M>, CurvePoint, CurvePoint, Vec<u8>)>
where
    M: Middleware,
    K: KeySource + ?Sized,
{
    let workdir = WorkDir::acquire(&config.workdir)?;
    let seed = SeedNode::parse(&config.seed_uri)?;
    let params = new_standard_params();

    let (decrypting, signing) = key_source.load(&params)?;
    let powers = Powers {
        decrypting: DecryptingPower(decrypting),
        signing: SigningPower(signing),
    };
    let options = config.participant_options();
    let mut mayank = Participant::new(seed, powers, middleware, workdir, options)?;
    info!("Participant ready, seeded from {}", mayank.seed());

    let policy = PolicyMetadata::load(&config.metadata_path)?.decode(&params)?;
    mayank.join_policy(&policy.label, &policy.policy_pubkey, &policy.author_verifying_key)?;

    Ok((mayank, policy.policy_pubkey, policy.author_verifying_key, policy.label))
}
