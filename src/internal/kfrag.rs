use crate::internal::capsule::Capsule;
use crate::internal::curve::{CurveBN, CurvePoint};
use crate::internal::errors::PreErrors;
use crate::internal::keys::Signature;

use openssl::bn::{BigNum, BigNumRef};

/// Which keys the delegator bound into the proxy signature of a kfrag.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum KFragMode {
    NoKey = 0,
    DelegatingOnly = 1,
    ReceivingOnly = 2,
    DelegatingAndReceiving = 3,
}

impl KFragMode {
    pub fn signs_delegating_key(self) -> bool {
        matches!(
            self,
            KFragMode::DelegatingOnly | KFragMode::DelegatingAndReceiving
        )
    }

    pub fn signs_receiving_key(self) -> bool {
        matches!(
            self,
            KFragMode::ReceivingOnly | KFragMode::DelegatingAndReceiving
        )
    }

    /// Message covered by the proxy signature.
    pub(crate) fn proxy_message(
        self,
        id: &BigNumRef,
        commitment: &CurvePoint,
        precursor: &CurvePoint,
        delegating_key: Option<&CurvePoint>,
        receiving_key: Option<&CurvePoint>,
    ) -> Result<Vec<u8>, PreErrors> {
        let mut message = id.to_vec();
        message.extend_from_slice(&commitment.to_bytes());
        message.extend_from_slice(&precursor.to_bytes());
        message.push(self as u8);
        if self.signs_delegating_key() {
            let key = delegating_key.ok_or(PreErrors::InvalidProvidedKeys)?;
            message.extend_from_slice(&key.to_bytes());
        }
        if self.signs_receiving_key() {
            let key = receiving_key.ok_or(PreErrors::InvalidProvidedKeys)?;
            message.extend_from_slice(&key.to_bytes());
        }
        Ok(message)
    }
}

/// A re-encryption key share, as held by one proxy.
pub struct KFrag {
    identifier: BigNum,
    re_key_share: CurveBN,
    commitment: CurvePoint,
    precursor: CurvePoint,
    signature_for_proxy: Signature,
    signature_for_receiver: Signature,
    mode: KFragMode,
}

impl KFrag {
    pub fn new(
        identifier: &BigNumRef,
        re_key_share: &CurveBN,
        commitment: &CurvePoint,
        precursor: &CurvePoint,
        signature_for_proxy: &Signature,
        signature_for_receiver: &Signature,
        mode: KFragMode,
    ) -> Self {
        KFrag {
            identifier: identifier.to_owned().expect("Error in BN cloning"),
            re_key_share: re_key_share.clone(),
            commitment: commitment.clone(),
            precursor: precursor.clone(),
            signature_for_proxy: signature_for_proxy.clone(),
            signature_for_receiver: signature_for_receiver.clone(),
            mode,
        }
    }

    /// Checks the commitment and the delegator's proxy signature.
    pub fn verify(
        &self,
        verifying_key: &CurvePoint,
        delegating_key: Option<&CurvePoint>,
        receiving_key: Option<&CurvePoint>,
    ) -> Result<bool, PreErrors> {
        let params = self.commitment.params();
        let same_params = |key: Option<&CurvePoint>| key.map_or(true, |k| k.params() == params);
        if verifying_key.params() != params
            || !same_params(delegating_key)
            || !same_params(receiving_key)
        {
            return Err(PreErrors::InvalidProvidedKeys);
        }

        if &CurvePoint::u(params) * &self.re_key_share != self.commitment {
            return Ok(false);
        }

        let message = self.mode.proxy_message(
            &self.identifier,
            &self.commitment,
            &self.precursor,
            delegating_key,
            receiving_key,
        )?;
        Ok(self.signature_for_proxy.verify_sha2(&message, verifying_key))
    }

    pub fn verify_for_capsule(&self, capsule: &Capsule) -> Result<bool, PreErrors> {
        let (delegating, receiving, verifying) = capsule.correctness_keys()?;
        self.verify(verifying, Some(delegating), Some(receiving))
    }

    pub fn re_key_share(&self) -> &CurveBN {
        &self.re_key_share
    }

    pub fn id(&self) -> &BigNumRef {
        &self.identifier
    }

    pub fn precursor(&self) -> &CurvePoint {
        &self.precursor
    }

    pub fn commitment(&self) -> &CurvePoint {
        &self.commitment
    }

    pub fn signature_for_receiver(&self) -> &Signature {
        &self.signature_for_receiver
    }

    pub fn mode(&self) -> KFragMode {
        self.mode
    }
}

impl Clone for KFrag {
    fn clone(&self) -> Self {
        KFrag::new(
            &self.identifier,
            &self.re_key_share,
            &self.commitment,
            &self.precursor,
            &self.signature_for_proxy,
            &self.signature_for_receiver,
            self.mode,
        )
    }
}
