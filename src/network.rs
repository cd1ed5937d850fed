//! Seed node addressing and the re-encryption network the participant talks to.

use crate::errors::{ReaderErrors, Result};
use crate::grant::Grant;
use crate::pre::{reencrypt, Capsule, CurveBN, CurvePoint, KFrag};

use std::collections::HashMap;
use std::convert::TryFrom;
use std::fmt;

use tracing::{debug, warn};
use url::Url;

pub const DEFAULT_SEED_PORT: u16 = 9151;

/// A node the participant bootstraps its view of the network from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedNode {
    host: String,
    port: u16,
}

impl SeedNode {
    /// Only `https://host[:port]` is accepted; the port defaults to 9151.
    pub fn parse(uri: &str) -> Result<Self> {
        let url = Url::parse(uri)?;
        if url.scheme() != "https" {
            return Err(ReaderErrors::UnsupportedSeed(uri.to_owned()));
        }
        let host = url
            .host_str()
            .ok_or_else(|| ReaderErrors::UnsupportedSeed(uri.to_owned()))?;
        Ok(SeedNode {
            host: host.to_owned(),
            port: url.port().unwrap_or(DEFAULT_SEED_PORT),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for SeedNode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "https://{}:{}", self.host, self.port)
    }
}

/// One retrieval: the capsule must already carry its correctness keys.
pub struct ReencryptionRequest<'a> {
    pub policy_pubkey: &'a CurvePoint,
    pub recipient_pubkey: &'a CurvePoint,
    pub capsule: &'a Capsule,
}

/// The participant's view of the proxy network.
pub trait Middleware {
    /// Returns how many nodes are known after learning.
    fn learn_from(&mut self, seed: &SeedNode) -> Result<usize>;

    /// Serialized cfrags, one per node that answered.
    fn reencrypt(&self, request: &ReencryptionRequest) -> Result<Vec<Vec<u8>>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeBehavior {
    Honest,
    Offline,
    /// Answers with a cfrag whose `E_i` does not match its proof.
    Forging,
}

type Arrangement = (Vec<u8>, Vec<u8>);

fn arrangement(policy_pubkey: &CurvePoint, recipient_pubkey: &CurvePoint) -> Arrangement {
    (policy_pubkey.to_bytes(), recipient_pubkey.to_bytes())
}

/// A proxy node holding kfrags per `(policy, recipient)` arrangement.
pub struct Ursula {
    address: SeedNode,
    behavior: NodeBehavior,
    kfrags: HashMap<Arrangement, KFrag>,
}

impl Ursula {
    pub fn new(address: SeedNode) -> Self {
        Ursula {
            address,
            behavior: NodeBehavior::Honest,
            kfrags: HashMap::new(),
        }
    }

    pub fn address(&self) -> &SeedNode {
        &self.address
    }

    pub fn holds(&self, policy_pubkey: &CurvePoint, recipient_pubkey: &CurvePoint) -> bool {
        self.kfrags
            .contains_key(&arrangement(policy_pubkey, recipient_pubkey))
    }

    fn answer(&self, request: &ReencryptionRequest) -> Option<Result<Vec<u8>>> {
        if self.behavior == NodeBehavior::Offline {
            return None;
        }
        let kfrag = self
            .kfrags
            .get(&arrangement(request.policy_pubkey, request.recipient_pubkey))?;
        let cfrag = match reencrypt(kfrag, request.capsule, true, None, true) {
            Ok(cfrag) => cfrag,
            Err(err) => return Some(Err(err.into())),
        };
        let mut bytes = cfrag.to_bytes();
        if self.behavior == NodeBehavior::Forging {
            let params = request.capsule.e().params();
            let fake = CurvePoint::mul_gen(&CurveBN::rand_curve_bn(params), params).to_bytes();
            bytes[..fake.len()].copy_from_slice(&fake);
        }
        Some(Ok(bytes))
    }
}

/// In-process network of Ursulas listening on consecutive ports.
pub struct LocalNetwork {
    nodes: Vec<Ursula>,
    known: usize,
}

impl LocalNetwork {
    /// Nodes at `https://localhost:9151`, `:9152`, ...
    pub fn new(size: usize) -> Result<Self> {
        let nodes = (0..size)
            .map(|i| {
                let port = u16::try_from(i)
                    .ok()
                    .and_then(|offset| DEFAULT_SEED_PORT.checked_add(offset))
                    .ok_or(ReaderErrors::TooManyNodes(size))?;
                Ok(Ursula::new(SeedNode {
                    host: "localhost".to_owned(),
                    port,
                }))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(LocalNetwork { nodes, known: 0 })
    }

    pub fn nodes(&self) -> &[Ursula] {
        &self.nodes
    }

    /// Hands one kfrag of the grant to each of the first nodes.
    pub fn enact(&mut self, grant: &Grant, recipient_pubkey: &CurvePoint) -> Result<()> {
        if grant.kfrags.len() > self.nodes.len() {
            return Err(ReaderErrors::NotEnoughNodes {
                needed: grant.kfrags.len(),
                got: self.nodes.len(),
            });
        }
        let key = arrangement(&grant.policy_pubkey, recipient_pubkey);
        for (node, kfrag) in self.nodes.iter_mut().zip(&grant.kfrags) {
            node.kfrags.insert(key.clone(), kfrag.clone());
        }
        debug!(
            "Enacted policy {:?} on {} nodes",
            String::from_utf8_lossy(&grant.label),
            grant.kfrags.len()
        );
        Ok(())
    }

    pub fn set_behavior(&mut self, index: usize, behavior: NodeBehavior) {
        if let Some(node) = self.nodes.get_mut(index) {
            node.behavior = behavior;
        }
    }

    pub fn known_nodes(&self) -> usize {
        self.known
    }
}

impl Middleware for LocalNetwork {
    fn learn_from(&mut self, seed: &SeedNode) -> Result<usize> {
        let reachable = self
            .nodes
            .iter()
            .any(|node| node.address == *seed && node.behavior != NodeBehavior::Offline);
        if !reachable {
            return Err(ReaderErrors::UnknownSeed(seed.to_string()));
        }
        self.known = self
            .nodes
            .iter()
            .filter(|node| node.behavior != NodeBehavior::Offline)
            .count();
        debug!("Learned {} nodes from {}", self.known, seed);
        Ok(self.known)
    }

    fn reencrypt(&self, request: &ReencryptionRequest) -> Result<Vec<Vec<u8>>> {
        if !self
            .nodes
            .iter()
            .any(|node| node.holds(request.policy_pubkey, request.recipient_pubkey))
        {
            return Err(ReaderErrors::NoArrangement);
        }

        let mut cfrags = Vec::new();
        for node in &self.nodes {
            match node.answer(request) {
                Some(Ok(cfrag)) => cfrags.push(cfrag),
                Some(Err(err)) => warn!("Node {} refused to re-encrypt: {}", node.address, err),
                None => {}
            }
        }
        debug!("Collected {} cfrags", cfrags.len());
        Ok(cfrags)
    }
}

impl fmt::Debug for LocalNetwork {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("LocalNetwork")
            .field("nodes", &self.nodes.len())
            .field("known", &self.known)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grant::PolicyAuthor;
    use crate::pre::{encrypt, new_standard_params, CFrag, KeyPair};

    #[test]
    fn seed_uris() {
        let seed = SeedNode::parse("https://localhost:9151").expect("seed");
        assert_eq!(seed.host(), "localhost");
        assert_eq!(seed.port(), 9151);

        let seed = SeedNode::parse("https://lynx.example.org").expect("seed");
        assert_eq!(seed.port(), DEFAULT_SEED_PORT);
        assert_eq!(seed.to_string(), "https://lynx.example.org:9151");

        assert!(matches!(
            SeedNode::parse("http://localhost:9151"),
            Err(ReaderErrors::UnsupportedSeed(_))
        ));
        assert!(matches!(SeedNode::parse("localhost"), Err(ReaderErrors::Url(_))));
    }

    #[test]
    fn node_ports_must_fit() {
        let largest = usize::from(u16::MAX - DEFAULT_SEED_PORT) + 1;
        let network = LocalNetwork::new(largest).expect("network");
        assert_eq!(network.nodes().last().map(|n| n.address().port()), Some(u16::MAX));

        assert!(matches!(
            LocalNetwork::new(largest + 1),
            Err(ReaderErrors::TooManyNodes(_))
        ));
        assert!(matches!(
            LocalNetwork::new(usize::MAX),
            Err(ReaderErrors::TooManyNodes(usize::MAX))
        ));
    }

    #[test]
    fn learning_needs_a_live_seed() {
        let mut network = LocalNetwork::new(3).expect("network");
        let seed = SeedNode::parse("https://localhost:9152").expect("seed");
        assert_eq!(network.learn_from(&seed).expect("learn"), 3);

        let stranger = SeedNode::parse("https://localhost:9999").expect("seed");
        assert!(matches!(
            network.learn_from(&stranger),
            Err(ReaderErrors::UnknownSeed(_))
        ));

        network.set_behavior(1, NodeBehavior::Offline);
        assert!(network.learn_from(&seed).is_err());
    }

    #[test]
    fn enact_and_reencrypt() {
        let params = new_standard_params();
        let author = PolicyAuthor::new(&params);
        let bob = KeyPair::new(&params);
        let grant = author.grant(bob.public_key(), b"heart-data", 2, 3).expect("grant");

        let mut network = LocalNetwork::new(2).expect("network");
        assert!(matches!(
            network.enact(&grant, bob.public_key()),
            Err(ReaderErrors::NotEnoughNodes { needed: 3, got: 2 })
        ));

        let mut network = LocalNetwork::new(4).expect("network");
        network.enact(&grant, bob.public_key()).expect("enact");
        assert_eq!(
            network
                .nodes()
                .iter()
                .filter(|n| n.holds(&grant.policy_pubkey, bob.public_key()))
                .count(),
            3
        );
        network.set_behavior(0, NodeBehavior::Offline);

        let (_, mut capsule) = encrypt(&grant.policy_pubkey, b"payload").expect("encrypt");
        capsule.set_correctness_keys(
            &grant.policy_pubkey,
            bob.public_key(),
            author.verifying_key(),
        );
        let request = ReencryptionRequest {
            policy_pubkey: &grant.policy_pubkey,
            recipient_pubkey: bob.public_key(),
            capsule: &capsule,
        };
        let cfrags = network.reencrypt(&request).expect("reencrypt");
        assert_eq!(cfrags.len(), 2);
        for bytes in &cfrags {
            let cfrag = CFrag::from_bytes(bytes, &params).expect("cfrag");
            assert!(cfrag.verify_correctness(&capsule).expect("verify"));
        }

        let eve = KeyPair::new(&params);
        let request = ReencryptionRequest {
            policy_pubkey: &grant.policy_pubkey,
            recipient_pubkey: eve.public_key(),
            capsule: &capsule,
        };
        assert!(matches!(
            network.reencrypt(&request),
            Err(ReaderErrors::NoArrangement)
        ));
    }

    #[test]
    fn forging_node_fails_proof() {
        let params = new_standard_params();
        let author = PolicyAuthor::new(&params);
        let bob = KeyPair::new(&params);
        let grant = author.grant(bob.public_key(), b"heart-data", 1, 1).expect("grant");

        let mut network = LocalNetwork::new(1).expect("network");
        network.enact(&grant, bob.public_key()).expect("enact");
        network.set_behavior(0, NodeBehavior::Forging);

        let (_, mut capsule) = encrypt(&grant.policy_pubkey, b"payload").expect("encrypt");
        capsule.set_correctness_keys(
            &grant.policy_pubkey,
            bob.public_key(),
            author.verifying_key(),
        );
        let request = ReencryptionRequest {
            policy_pubkey: &grant.policy_pubkey,
            recipient_pubkey: bob.public_key(),
            capsule: &capsule,
        };
        let cfrags = network.reencrypt(&request).expect("reencrypt");
        let cfrag = CFrag::from_bytes(&cfrags[0], &params).expect("cfrag");
        assert!(!cfrag.verify_correctness(&capsule).expect("verify"));
    }
}
