use crate::internal::curve::{CurveBN, CurvePoint, Params};
use crate::internal::errors::PreErrors;
use crate::internal::schemes::{Hash, SHA256Hash};

use std::fmt;
use std::rc::Rc;

use openssl::ec::EcKey;
use openssl::ecdsa::EcdsaSig;
use openssl::pkey::Private;

pub struct KeyPair {
    pk: CurvePoint,
    sk: CurveBN,
}

impl KeyPair {
    pub fn new(params: &Rc<Params>) -> Self {
        let key = EcKey::generate(params.group()).expect("Error in KeyPair creation");
        KeyPair {
            pk: CurvePoint::from_ec_point(key.public_key(), params),
            sk: CurveBN::from_big_num(key.private_key(), params),
        }
    }

    /// Rebuilds the pair from its secret scalar alone.
    pub fn from_secret(sk: CurveBN) -> Self {
        let pk = CurvePoint::mul_gen(&sk, sk.params());
        KeyPair { pk, sk }
    }

    pub fn to_bytes(&self) -> (Vec<u8>, Vec<u8>) {
        (self.pk.to_bytes(), self.sk.to_bytes())
    }

    /// The public half must match the secret one.
    pub fn from_bytes(pk: &[u8], sk: &[u8], params: &Rc<Params>) -> Result<Self, PreErrors> {
        let point = CurvePoint::from_bytes(pk, params)?;
        let pair = KeyPair::from_secret(CurveBN::from_bytes(sk, params)?);
        if pair.pk != point {
            return Err(PreErrors::InvalidProvidedKeys);
        }
        Ok(pair)
    }

    pub fn public_key(&self) -> &CurvePoint {
        &self.pk
    }

    pub fn private_key(&self) -> &CurveBN {
        &self.sk
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("KeyPair").field("pk", &self.pk).finish()
    }
}

/// ECDSA signature stored as two fixed-width scalars.
#[derive(Clone, PartialEq, Debug)]
pub struct Signature {
    r: CurveBN,
    s: CurveBN,
}

impl Signature {
    fn from_ecdsa_sig(sig: &EcdsaSig, params: &Rc<Params>) -> Self {
        Signature {
            r: CurveBN::from_big_num(sig.r(), params),
            s: CurveBN::from_big_num(sig.s(), params),
        }
    }

    pub fn from_bytes(bytes: &[u8], params: &Rc<Params>) -> Result<Self, PreErrors> {
        if bytes.len() != Self::expected_bytes_length(params) {
            return Err(PreErrors::InvalidBytes);
        }
        let (r, s) = bytes.split_at(bytes.len() / 2);
        Ok(Signature {
            r: CurveBN::from_bytes(r, params)?,
            s: CurveBN::from_bytes(s, params)?,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.r.to_bytes();
        bytes.extend_from_slice(&self.s.to_bytes());
        bytes
    }

    pub fn expected_bytes_length(params: &Params) -> usize {
        2 * params.group_order_size_in_bytes()
    }

    pub fn verify_sha2(&self, data: &[u8], verifying_pk: &CurvePoint) -> bool {
        self.verify::<SHA256Hash>(data, verifying_pk)
    }

    /// A malformed key or signature verifies as `false`.
    pub fn verify<H>(&self, data: &[u8], verifying_pk: &CurvePoint) -> bool
    where
        H: Hash,
    {
        let mut hash = H::new(b"");
        hash.update(data);
        let digest = hash.finalize();

        let verified = EcKey::from_public_key(verifying_pk.params().group(), verifying_pk.point())
            .and_then(|ver_key| {
                let sig = EcdsaSig::from_private_components(
                    self.r.bn().to_owned()?,
                    self.s.bn().to_owned()?,
                )?;
                sig.verify(&digest, &ver_key)
            });
        verified.unwrap_or(false)
    }
}

pub struct Signer {
    key: EcKey<Private>,
    pk: CurvePoint,
    params: Rc<Params>,
}

impl Signer {
    pub fn new(params: &Rc<Params>) -> Self {
        let key = EcKey::generate(params.group()).expect("Error in Signer creation");
        let pk = CurvePoint::from_ec_point(key.public_key(), params);
        Signer {
            key,
            pk,
            params: Rc::clone(params),
        }
    }

    pub fn to_bytes(&self) -> (Vec<u8>, Vec<u8>) {
        let sk = CurveBN::from_big_num(self.key.private_key(), &self.params);
        (self.pk.to_bytes(), sk.to_bytes())
    }

    pub fn from_bytes(pk: &[u8], sk: &[u8], params: &Rc<Params>) -> Result<Self, PreErrors> {
        let point = CurvePoint::from_bytes(pk, params)?;
        let scalar = CurveBN::from_bytes(sk, params)?;
        let key = EcKey::from_private_components(params.group(), scalar.bn(), point.point())
            .map_err(|_| PreErrors::InvalidBytes)?;
        key.check_key().map_err(|_| PreErrors::InvalidProvidedKeys)?;
        Ok(Signer {
            key,
            pk: point,
            params: Rc::clone(params),
        })
    }

    pub fn sign_sha2(&self, data: &[u8]) -> Signature {
        self.sign::<SHA256Hash>(data)
    }

    pub fn sign<H>(&self, data: &[u8]) -> Signature
    where
        H: Hash,
    {
        let mut hash = H::new(b"");
        hash.update(data);
        let digest = hash.finalize();
        let sig = EcdsaSig::sign(&digest, &self.key).expect("Error in Signer signature");
        Signature::from_ecdsa_sig(&sig, &self.params)
    }

    pub fn public_key(&self) -> &CurvePoint {
        &self.pk
    }

    pub fn params(&self) -> &Rc<Params> {
        &self.params
    }
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Signer").field("pk", &self.pk).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pre::new_standard_params;

    #[test]
    fn keypair_bytes_must_match() {
        let params = new_standard_params();
        let alice = KeyPair::new(&params);
        let bob = KeyPair::new(&params);

        let (pk, sk) = alice.to_bytes();
        let restored = KeyPair::from_bytes(&pk, &sk, &params).expect("KeyPair");
        assert_eq!(restored.public_key(), alice.public_key());

        let (bob_pk, _) = bob.to_bytes();
        assert_eq!(
            KeyPair::from_bytes(&bob_pk, &sk, &params).unwrap_err(),
            PreErrors::InvalidProvidedKeys
        );
    }

    #[test]
    fn sign_and_verify() {
        let params = new_standard_params();
        let signer = Signer::new(&params);
        let other = Signer::new(&params);

        let sig = signer.sign_sha2(b"policy label");
        assert!(sig.verify_sha2(b"policy label", signer.public_key()));
        assert!(!sig.verify_sha2(b"other label", signer.public_key()));
        assert!(!sig.verify_sha2(b"policy label", other.public_key()));

        let restored = Signature::from_bytes(&sig.to_bytes(), &params).expect("Signature");
        assert_eq!(restored, sig);
    }

    #[test]
    fn signer_from_bytes() {
        let params = new_standard_params();
        let signer = Signer::new(&params);
        let (pk, sk) = signer.to_bytes();
        let restored = Signer::from_bytes(&pk, &sk, &params).expect("Signer");
        let sig = restored.sign_sha2(b"data");
        assert!(sig.verify_sha2(b"data", signer.public_key()));
    }
}
