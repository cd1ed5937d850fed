use crate::internal::curve::{CurveBN, CurvePoint, Params};
use crate::internal::errors::PreErrors;
use crate::internal::keys::Signature;
use crate::internal::kfrag::KFrag;
use crate::internal::schemes::{hash_to_curvebn, Blake2bHash, ExtendedKeccak, SHA256Hash};

use std::fmt;
use std::rc::Rc;

use openssl::bn::{BigNum, BigNumRef};

/// Splits fixed-width fields off the front of a byte string.
struct Reader<'a> {
    bytes: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Reader { bytes }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], PreErrors> {
        if self.bytes.len() < n {
            return Err(PreErrors::InvalidBytes);
        }
        let (head, tail) = self.bytes.split_at(n);
        self.bytes = tail;
        Ok(head)
    }

    fn point(&mut self, params: &Rc<Params>) -> Result<CurvePoint, PreErrors> {
        CurvePoint::from_bytes(self.take(CurvePoint::expected_bytes_length(params))?, params)
    }

    fn scalar(&mut self, params: &Rc<Params>) -> Result<CurveBN, PreErrors> {
        CurveBN::from_bytes(self.take(CurveBN::expected_bytes_length(params))?, params)
    }

    fn remaining(&self) -> usize {
        self.bytes.len()
    }
}

/// KEM capsule `(E, V, s)`, plus the keys needed to check cfrags and the
/// cfrags collected so far.
pub struct Capsule {
    e_point: CurvePoint,
    v_point: CurvePoint,
    sign: CurveBN,
    delegating_key: Option<CurvePoint>,
    receiving_key: Option<CurvePoint>,
    verifying_key: Option<CurvePoint>,
    attached_cfrags: Vec<CFrag>,
}

impl Capsule {
    pub fn new(e: &CurvePoint, v: &CurvePoint, s: &CurveBN) -> Self {
        Capsule {
            e_point: e.clone(),
            v_point: v.clone(),
            sign: s.clone(),
            delegating_key: None,
            receiving_key: None,
            verifying_key: None,
            attached_cfrags: Vec::new(),
        }
    }

    pub fn from_bytes(bytes: &[u8], params: &Rc<Params>) -> Result<Self, PreErrors> {
        if bytes.len() != Self::expected_bytes_length(params) {
            return Err(PreErrors::InvalidBytes);
        }
        let mut reader = Reader::new(bytes);
        let e_point = reader.point(params)?;
        let v_point = reader.point(params)?;
        let sign = reader.scalar(params)?;
        Ok(Capsule::new(&e_point, &v_point, &sign))
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.e_point.to_bytes();
        bytes.extend_from_slice(&self.v_point.to_bytes());
        bytes.extend_from_slice(&self.sign.to_bytes());
        bytes
    }

    pub fn expected_bytes_length(params: &Params) -> usize {
        CurveBN::expected_bytes_length(params) + 2 * CurvePoint::expected_bytes_length(params)
    }

    pub fn set_correctness_keys(
        &mut self,
        delegating: &CurvePoint,
        receiving: &CurvePoint,
        verifying: &CurvePoint,
    ) {
        self.delegating_key = Some(delegating.clone());
        self.receiving_key = Some(receiving.clone());
        self.verifying_key = Some(verifying.clone());
    }

    /// `(delegating, receiving, verifying)`, all of which must be set.
    pub fn correctness_keys(&self) -> Result<(&CurvePoint, &CurvePoint, &CurvePoint), PreErrors> {
        match (&self.delegating_key, &self.receiving_key, &self.verifying_key) {
            (Some(d), Some(r), Some(v)) => Ok((d, r, v)),
            _ => Err(PreErrors::CapsuleNoCorrectnessProvided),
        }
    }

    /// Cfrags are only checked when the capsule is opened.
    pub fn attach_cfrag(&mut self, cfrag: &CFrag) {
        self.attached_cfrags.push(cfrag.clone());
    }

    pub fn clear_cfrags(&mut self) {
        self.attached_cfrags.clear();
    }

    pub fn delegating_key(&self) -> Option<&CurvePoint> {
        self.delegating_key.as_ref()
    }

    /// `s * G == V + h * E`
    pub fn verify(&self) -> bool {
        let params = self.e_point.params();
        let mut to_hash = self.e_point.to_bytes();
        to_hash.extend_from_slice(&self.v_point.to_bytes());
        let h = hash_to_curvebn::<Blake2bHash>(&to_hash, params, None);

        CurvePoint::mul_gen(&self.sign, params) == &self.v_point + &(&self.e_point * &h)
    }

    pub fn e(&self) -> &CurvePoint {
        &self.e_point
    }

    pub fn v(&self) -> &CurvePoint {
        &self.v_point
    }

    pub fn sign(&self) -> &CurveBN {
        &self.sign
    }

    pub fn attached_cfrags(&self) -> &[CFrag] {
        &self.attached_cfrags
    }
}

impl PartialEq for Capsule {
    fn eq(&self, other: &Capsule) -> bool {
        self.e_point == other.e_point && self.v_point == other.v_point && self.sign == other.sign
    }
}

impl fmt::Debug for Capsule {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Capsule")
            .field("e", &self.e_point)
            .field("v", &self.v_point)
            .field("attached_cfrags", &self.attached_cfrags.len())
            .finish()
    }
}

/// Zero-knowledge proof that a cfrag was produced with the re-key share the
/// delegator committed to.
#[derive(Clone)]
pub struct CorrectnessProof {
    e2: CurvePoint,
    v2: CurvePoint,
    u1: CurvePoint,
    u2: CurvePoint,
    z3: CurveBN,
    kfrag_signature: Signature,
    metadata: Option<Vec<u8>>,
}

impl CorrectnessProof {
    fn read(reader: &mut Reader, params: &Rc<Params>) -> Result<Self, PreErrors> {
        let e2 = reader.point(params)?;
        let v2 = reader.point(params)?;
        let u1 = reader.point(params)?;
        let u2 = reader.point(params)?;
        let z3 = reader.scalar(params)?;
        let kfrag_signature =
            Signature::from_bytes(reader.take(Signature::expected_bytes_length(params))?, params)?;
        Ok(CorrectnessProof {
            e2,
            v2,
            u1,
            u2,
            z3,
            kfrag_signature,
            metadata: None,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        for point in &[&self.e2, &self.v2, &self.u1, &self.u2] {
            bytes.extend_from_slice(&point.to_bytes());
        }
        bytes.extend_from_slice(&self.z3.to_bytes());
        bytes.extend_from_slice(&self.kfrag_signature.to_bytes());
        bytes
    }

    pub fn expected_bytes_length(params: &Params) -> usize {
        // e2, v2, u1, u2; z3; (r, s)
        4 * CurvePoint::expected_bytes_length(params) + 3 * CurveBN::expected_bytes_length(params)
    }
}

impl fmt::Debug for CorrectnessProof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CorrectnessProof")
            .field("e2", &self.e2)
            .field("v2", &self.v2)
            .field("u1", &self.u1)
            .field("u2", &self.u2)
            .field("z3", &self.z3)
            .finish()
    }
}

fn challenge(points: &[&CurvePoint], metadata: &Option<Vec<u8>>, params: &Rc<Params>) -> CurveBN {
    let mut to_hash = Vec::new();
    for point in points {
        to_hash.extend_from_slice(&point.to_bytes());
    }
    if let Some(m) = metadata {
        to_hash.extend_from_slice(m);
    }
    hash_to_curvebn::<ExtendedKeccak>(&to_hash, params, None)
}

/// A capsule fragment: the output of one proxy re-encrypting a capsule.
pub struct CFrag {
    e_i_point: CurvePoint,
    v_i_point: CurvePoint,
    kfrag_id: BigNum,
    precursor: CurvePoint,
    proof: Option<CorrectnessProof>,
}

impl CFrag {
    pub fn new(
        e_i: &CurvePoint,
        v_i: &CurvePoint,
        kfrag_id: &BigNumRef,
        precursor: &CurvePoint,
    ) -> Self {
        CFrag {
            e_i_point: e_i.clone(),
            v_i_point: v_i.clone(),
            kfrag_id: kfrag_id.to_owned().expect("Error in BN cloning"),
            precursor: precursor.clone(),
            proof: None,
        }
    }

    /// Accepts the form with or without a trailing correctness proof.
    pub fn from_bytes(bytes: &[u8], params: &Rc<Params>) -> Result<Self, PreErrors> {
        let bare = Self::expected_bytes_length(params);
        let with_proof = bare + CorrectnessProof::expected_bytes_length(params);
        if bytes.len() != bare && bytes.len() != with_proof {
            return Err(PreErrors::InvalidBytes);
        }

        let mut reader = Reader::new(bytes);
        let e_i_point = reader.point(params)?;
        let v_i_point = reader.point(params)?;
        let kfrag_id = BigNum::from_slice(reader.take(CurveBN::expected_bytes_length(params))?)?;
        let precursor = reader.point(params)?;
        let proof = if reader.remaining() > 0 {
            Some(CorrectnessProof::read(&mut reader, params)?)
        } else {
            None
        };

        Ok(CFrag {
            e_i_point,
            v_i_point,
            kfrag_id,
            precursor,
            proof,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let width = CurveBN::expected_bytes_length(self.e_i_point.params());
        let mut bytes = self.e_i_point.to_bytes();
        bytes.extend_from_slice(&self.v_i_point.to_bytes());
        let id = self.kfrag_id.to_vec();
        assert!(id.len() <= width, "kfrag id wider than the group order");
        bytes.resize(bytes.len() + width - id.len(), 0);
        bytes.extend_from_slice(&id);
        bytes.extend_from_slice(&self.precursor.to_bytes());
        if let Some(proof) = &self.proof {
            bytes.extend_from_slice(&proof.to_bytes());
        }
        bytes
    }

    pub fn expected_bytes_length(params: &Params) -> usize {
        // e_i, v_i, precursor; kfrag id
        3 * CurvePoint::expected_bytes_length(params) + CurveBN::expected_bytes_length(params)
    }

    pub fn prove_correctness(
        &mut self,
        capsule: &Capsule,
        kfrag: &KFrag,
        metadata: Option<Vec<u8>>,
    ) -> Result<(), PreErrors> {
        if !capsule.verify() {
            return Err(PreErrors::InvalidCapsule);
        }
        let params = capsule.e().params();

        let t = CurveBN::rand_curve_bn(params);
        let u = CurvePoint::u(params);
        let u_1 = kfrag.commitment();

        let e_2 = capsule.e() * &t;
        let v_2 = capsule.v() * &t;
        let u_2 = &u * &t;

        let h = challenge(
            &[
                capsule.e(),
                &self.e_i_point,
                &e_2,
                capsule.v(),
                &self.v_i_point,
                &v_2,
                &u,
                u_1,
                &u_2,
            ],
            &metadata,
            params,
        );
        let z_3 = &t + &(&h * kfrag.re_key_share());

        self.proof = Some(CorrectnessProof {
            e2: e_2,
            v2: v_2,
            u1: u_1.clone(),
            u2: u_2,
            z3: z_3,
            kfrag_signature: kfrag.signature_for_receiver().clone(),
            metadata,
        });
        Ok(())
    }

    /// Checks the delegator's signature over the kfrag commitment and the
    /// three Chaum-Pedersen equations against the capsule.
    pub fn verify_correctness(&self, capsule: &Capsule) -> Result<bool, PreErrors> {
        let proof = self.proof.as_ref().ok_or(PreErrors::CFragNoProofProvided)?;
        let (delegating_pk, receiving_pk, verifying_pk) = capsule.correctness_keys()?;
        let params = capsule.e().params();

        let (e, v) = (capsule.e(), capsule.v());
        let (e_1, v_1) = (&self.e_i_point, &self.v_i_point);
        let u = CurvePoint::u(params);
        let (e_2, v_2, u_1, u_2) = (&proof.e2, &proof.v2, &proof.u1, &proof.u2);

        let h = challenge(&[e, e_1, e_2, v, v_1, v_2, &u, u_1, u_2], &proof.metadata, params);

        let mut receiver_message = self.kfrag_id.to_vec();
        receiver_message.extend_from_slice(&delegating_pk.to_bytes());
        receiver_message.extend_from_slice(&receiving_pk.to_bytes());
        receiver_message.extend_from_slice(&u_1.to_bytes());
        receiver_message.extend_from_slice(&self.precursor.to_bytes());
        if !proof
            .kfrag_signature
            .verify::<SHA256Hash>(&receiver_message, verifying_pk)
        {
            return Ok(false);
        }

        let z_3 = &proof.z3;
        Ok(e * z_3 == e_2 + &(e_1 * &h)
            && v * z_3 == v_2 + &(v_1 * &h)
            && &u * z_3 == u_2 + &(u_1 * &h))
    }

    pub fn precursor(&self) -> &CurvePoint {
        &self.precursor
    }

    pub fn kfrag_id(&self) -> &BigNumRef {
        &self.kfrag_id
    }

    pub fn e_i_point(&self) -> &CurvePoint {
        &self.e_i_point
    }

    pub fn v_i_point(&self) -> &CurvePoint {
        &self.v_i_point
    }

    pub fn proof(&self) -> Option<&CorrectnessProof> {
        self.proof.as_ref()
    }
}

impl Clone for CFrag {
    fn clone(&self) -> Self {
        CFrag {
            e_i_point: self.e_i_point.clone(),
            v_i_point: self.v_i_point.clone(),
            kfrag_id: self.kfrag_id.to_owned().expect("Error in BN cloning"),
            precursor: self.precursor.clone(),
            proof: self.proof.clone(),
        }
    }
}

impl PartialEq for CFrag {
    fn eq(&self, other: &CFrag) -> bool {
        self.e_i_point == other.e_i_point
            && self.v_i_point == other.v_i_point
            && self.kfrag_id == other.kfrag_id
            && self.precursor == other.precursor
    }
}

impl fmt::Debug for CFrag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("CFrag")
            .field("e_i_point", &self.e_i_point)
            .field("v_i_point", &self.v_i_point)
            .field("kfrag_id", &self.kfrag_id)
            .field("precursor", &self.precursor)
            .field("proof", &self.proof)
            .finish()
    }
}
