pub use crate::internal::capsule::{CFrag, Capsule, CorrectnessProof};
pub use crate::internal::curve::{CurveBN, CurvePoint, Params};
pub use crate::internal::errors::PreErrors;
pub use crate::internal::keys::{KeyPair, Signature, Signer};
pub use crate::internal::kfrag::{KFrag, KFragMode};

use crate::internal::schemes::{dem_decrypt, dem_encrypt, hash_to_curve_blake, kdf, DEM_MIN_SIZE};
use crate::internal::utils::{lambda_coeff, new_constant_sorrow, poly_eval};

use std::rc::Rc;

use openssl::bn::{BigNum, MsbOption};
use openssl::nid::Nid;

/// Creates the standard parameters needed to operate with this crate, i.e.
/// the SECP256K1 curve
pub fn new_standard_params() -> Rc<Params> {
    Rc::new(Params::new(Nid::SECP256K1))
}

/// Maps arbitrary bytes to a scalar of the curve.
pub fn hash_to_scalar(bytes: &[u8], params: &Rc<Params>) -> CurveBN {
    hash_to_curve_blake(bytes, params)
}

/// Performs an encryption using the DEM schema and encapsulates a key
/// for the sender using the public key provided.
///
/// Returns the ciphertext and the KEM Capsule.
pub fn encrypt(
    from_public_key: &CurvePoint,
    plaintext: &[u8],
) -> Result<(Vec<u8>, Capsule), PreErrors> {
    let (key, capsule) = encapsulate(from_public_key)?;
    let ciphertext = dem_encrypt(&key, plaintext, Some(&capsule.to_bytes()))?;
    Ok((ciphertext, capsule))
}

/// Creates a re-encryption key from the delegating key pair to the
/// receiving public key, and splits it in KFrags, using Shamir's Secret Sharing.
///
/// Requires a threshold number of KFrags out of `n`.
/// Note: the name of this function in the paper is ReKeyGen
pub fn generate_kfrags(
    delegating_keypair: &KeyPair,
    receiving_pk: &CurvePoint,
    threshold: usize,
    n: usize,
    signer: &Signer,
    mode: KFragMode,
) -> Result<Vec<KFrag>, PreErrors> {
    if threshold == 0 || threshold > n {
        return Err(PreErrors::InvalidKFragThreshold);
    }
    let params = delegating_keypair.public_key().params();
    if params != receiving_pk.params() || params != signer.params() {
        return Err(PreErrors::KeysParametersNotEq);
    }

    // Ephemeral DH with the receiver; the shared point feeds every derived secret
    let precursor = KeyPair::new(params);
    let dh_point = receiving_pk * precursor.private_key();

    let mut dh_transcript = precursor.public_key().to_bytes();
    dh_transcript.extend_from_slice(&receiving_pk.to_bytes());
    dh_transcript.extend_from_slice(&dh_point.to_bytes());

    // Secret value 'd' allows to make Umbral non-interactive
    let mut to_hash = dh_transcript.clone();
    to_hash.extend_from_slice(&new_constant_sorrow("NON_INTERACTIVE"));
    let d = hash_to_curve_blake(&to_hash, params);

    // Generating polynomial, f(0) = sk_a / d
    let mut coefficients: Vec<CurveBN> = Vec::with_capacity(threshold);
    coefficients.push(delegating_keypair.private_key() / &d);
    for _ in 1..threshold {
        coefficients.push(CurveBN::rand_curve_bn(params));
    }

    let u = CurvePoint::u(params);
    let order_bits_size = params.order().num_bits();
    let mut kfrags = Vec::with_capacity(n);
    for _ in 0..n {
        let mut kfrag_id = BigNum::new()?;
        kfrag_id.rand(order_bits_size, MsbOption::MAYBE_ZERO, false)?;

        // Share index is bound to the receiver so only they can combine cfrags
        let mut to_hash = dh_transcript.clone();
        to_hash.extend_from_slice(&new_constant_sorrow("X_COORDINATE"));
        to_hash.extend_from_slice(&kfrag_id.to_vec());
        let share_index = hash_to_curve_blake(&to_hash, params);

        let rk = poly_eval(&coefficients, &share_index);
        let commitment = &u * &rk;

        let mut receiver_message = kfrag_id.to_vec();
        receiver_message.extend_from_slice(&delegating_keypair.public_key().to_bytes());
        receiver_message.extend_from_slice(&receiving_pk.to_bytes());
        receiver_message.extend_from_slice(&commitment.to_bytes());
        receiver_message.extend_from_slice(&precursor.public_key().to_bytes());
        let signature_for_receiver = signer.sign_sha2(&receiver_message);

        let proxy_message = mode.proxy_message(
            &kfrag_id,
            &commitment,
            precursor.public_key(),
            Some(delegating_keypair.public_key()),
            Some(receiving_pk),
        )?;
        let signature_for_proxy = signer.sign_sha2(&proxy_message);

        kfrags.push(KFrag::new(
            &kfrag_id,
            &rk,
            &commitment,
            precursor.public_key(),
            &signature_for_proxy,
            &signature_for_receiver,
            mode,
        ));
    }

    Ok(kfrags)
}

/// Performs the re-encryption operation of proxies and produces a capsule
/// fragment, i.e. a CFrag, from a KFrag given in input.
pub fn reencrypt(
    kfrag: &KFrag,
    capsule: &Capsule,
    provide_proof: bool,
    metadata: Option<Vec<u8>>,
    verify_kfrag: bool,
) -> Result<CFrag, PreErrors> {
    if !capsule.verify() {
        return Err(PreErrors::InvalidCapsule);
    }
    if verify_kfrag && !kfrag.verify_for_capsule(capsule)? {
        return Err(PreErrors::InvalidKFrag);
    }

    let rk = kfrag.re_key_share();
    let e_i = capsule.e() * rk;
    let v_i = capsule.v() * rk;
    let mut cfrag = CFrag::new(&e_i, &v_i, kfrag.id(), kfrag.precursor());
    if provide_proof {
        cfrag.prove_correctness(capsule, kfrag, metadata)?;
    }
    Ok(cfrag)
}

/// Opens the capsule and gets what's inside. If it is a symmetric key, then
/// it is used to decrypt the ciphertext and return the resulting cleartext.
pub fn decrypt(
    ciphertext: &[u8],
    capsule: &Capsule,
    decrypting_keypair: &KeyPair,
    check_proof: bool,
) -> Result<Vec<u8>, PreErrors> {
    if ciphertext.len() < DEM_MIN_SIZE {
        return Err(PreErrors::CiphertextError);
    }

    let key = if capsule.attached_cfrags().is_empty() {
        // No cfrags: the delegator opening its own capsule
        decapsulate(capsule, decrypting_keypair.private_key())?
    } else {
        open_capsule(capsule, decrypting_keypair, check_proof)?
    };

    dem_decrypt(&key, ciphertext, Some(&capsule.to_bytes()))
}

fn encapsulate(from_public_key: &CurvePoint) -> Result<(Vec<u8>, Capsule), PreErrors> {
    let params = from_public_key.params();

    let r = KeyPair::new(params);
    let u = KeyPair::new(params);

    let mut to_hash = r.public_key().to_bytes();
    to_hash.extend_from_slice(&u.public_key().to_bytes());
    let h = hash_to_curve_blake(&to_hash, params);

    let s = u.private_key() + &(r.private_key() * &h);
    let shared_key = from_public_key * &(r.private_key() + u.private_key());

    let key = kdf(&shared_key.to_bytes())?;
    Ok((key, Capsule::new(r.public_key(), u.public_key(), &s)))
}

fn decapsulate(capsule: &Capsule, receiving: &CurveBN) -> Result<Vec<u8>, PreErrors> {
    if !capsule.verify() {
        return Err(PreErrors::InvalidCapsule);
    }
    let shared_key = &(capsule.e() + capsule.v()) * receiving;
    kdf(&shared_key.to_bytes())
}

fn open_capsule(
    capsule: &Capsule,
    receiver_keypair: &KeyPair,
    check_proof: bool,
) -> Result<Vec<u8>, PreErrors> {
    if !capsule.verify() {
        return Err(PreErrors::InvalidCapsule);
    }
    if check_proof {
        for cfrag in capsule.attached_cfrags() {
            if !cfrag.verify_correctness(capsule)? {
                return Err(PreErrors::InvalidCFrag);
            }
        }
    }
    decapsulate_reencrypted(capsule, receiver_keypair)
}

fn decapsulate_reencrypted(
    capsule: &Capsule,
    receiver_keypair: &KeyPair,
) -> Result<Vec<u8>, PreErrors> {
    let params = capsule.e().params();
    let pk = receiver_keypair.public_key();
    let cfrags = capsule.attached_cfrags();

    let precursor = cfrags.first().ok_or(PreErrors::CapsuleNoCFrags)?.precursor();
    let dh_point = precursor * receiver_keypair.private_key();

    let mut dh_transcript = precursor.to_bytes();
    dh_transcript.extend_from_slice(&pk.to_bytes());
    dh_transcript.extend_from_slice(&dh_point.to_bytes());

    // Combination of CFrags via Shamir's Secret Sharing reconstruction
    let mut xs: Vec<CurveBN> = Vec::with_capacity(cfrags.len());
    for cfrag in cfrags {
        if cfrag.precursor() != precursor {
            return Err(PreErrors::InvalidCFrag);
        }
        let mut to_hash = dh_transcript.clone();
        to_hash.extend_from_slice(&new_constant_sorrow("X_COORDINATE"));
        to_hash.extend_from_slice(&cfrag.kfrag_id().to_vec());
        xs.push(hash_to_curve_blake(&to_hash, params));
    }

    let mut e_prime: Option<CurvePoint> = None;
    let mut v_prime: Option<CurvePoint> = None;
    for (cfrag, x) in cfrags.iter().zip(&xs) {
        let lambda_i = lambda_coeff(x, &xs);
        let e_i = cfrag.e_i_point() * &lambda_i;
        let v_i = cfrag.v_i_point() * &lambda_i;
        e_prime = Some(match e_prime {
            Some(acc) => &acc + &e_i,
            None => e_i,
        });
        v_prime = Some(match v_prime {
            Some(acc) => &acc + &v_i,
            None => v_i,
        });
    }
    let (e_prime, v_prime) = match (e_prime, v_prime) {
        (Some(e), Some(v)) => (e, v),
        _ => return Err(PreErrors::CapsuleNoCFrags),
    };

    let mut to_hash = dh_transcript;
    to_hash.extend_from_slice(&new_constant_sorrow("NON_INTERACTIVE"));
    let d = hash_to_curve_blake(&to_hash, params);

    let mut to_hash = capsule.e().to_bytes();
    to_hash.extend_from_slice(&capsule.v().to_bytes());
    let h = hash_to_curve_blake(&to_hash, params);

    // Too few or mismatched cfrags fail here: pk_a * (s / d) == h * E' + V'
    let orig_pk = capsule
        .delegating_key()
        .ok_or(PreErrors::CapsuleNoCorrectnessProvided)?;
    if orig_pk * &(capsule.sign() / &d) != &(&e_prime * &h) + &v_prime {
        return Err(PreErrors::DecryptionError);
    }

    let shared_key = &(&e_prime + &v_prime) * &d;
    kdf(&shared_key.to_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generate_credentials(params: &Rc<Params>) -> (KeyPair, Signer, KeyPair) {
        (KeyPair::new(params), Signer::new(params), KeyPair::new(params))
    }

    fn reencrypted_capsule(threshold: usize, n: usize, take: usize) -> (Vec<u8>, Capsule, KeyPair) {
        let params = new_standard_params();
        let (alice, signer, bob) = generate_credentials(&params);

        let (ciphertext, mut capsule) =
            encrypt(alice.public_key(), b"Hello, umbral!").expect("encrypt");
        capsule.set_correctness_keys(alice.public_key(), bob.public_key(), signer.public_key());

        let kfrags = generate_kfrags(
            &alice,
            bob.public_key(),
            threshold,
            n,
            &signer,
            KFragMode::DelegatingAndReceiving,
        )
        .expect("kfrags");
        for kfrag in kfrags.iter().take(take) {
            let cfrag = reencrypt(kfrag, &capsule, true, None, true).expect("reencrypt");
            capsule.attach_cfrag(&cfrag);
        }
        (ciphertext, capsule, bob)
    }

    #[test]
    fn decrypt_simple() {
        let params = new_standard_params();
        let (alice, _, _) = generate_credentials(&params);

        let (ciphertext, capsule) =
            encrypt(alice.public_key(), b"Hello, umbral!").expect("encrypt");
        let plaintext = decrypt(&ciphertext, &capsule, &alice, true).expect("Error in Decryption");
        assert_eq!(plaintext, b"Hello, umbral!".to_vec());
    }

    #[test]
    fn decrypt_frags() {
        let (ciphertext, capsule, bob) = reencrypted_capsule(2, 5, 5);
        let plaintext = decrypt(&ciphertext, &capsule, &bob, true).expect("Error in Decryption");
        assert_eq!(plaintext, b"Hello, umbral!".to_vec());
    }

    #[test]
    fn decrypt_with_exactly_threshold_frags() {
        let (ciphertext, capsule, bob) = reencrypted_capsule(3, 5, 3);
        let plaintext = decrypt(&ciphertext, &capsule, &bob, true).expect("Error in Decryption");
        assert_eq!(plaintext, b"Hello, umbral!".to_vec());
    }

    #[test]
    fn below_threshold_fails() {
        let (ciphertext, capsule, bob) = reencrypted_capsule(3, 5, 2);
        assert_eq!(
            decrypt(&ciphertext, &capsule, &bob, true),
            Err(PreErrors::DecryptionError)
        );
    }

    #[test]
    fn wrong_receiver_fails() {
        let (ciphertext, capsule, _) = reencrypted_capsule(2, 3, 2);
        let eve = KeyPair::new(capsule.e().params());
        assert!(decrypt(&ciphertext, &capsule, &eve, false).is_err());
    }

    #[test]
    fn invalid_threshold() {
        let params = new_standard_params();
        let (alice, signer, bob) = generate_credentials(&params);
        for (threshold, n) in &[(0, 3), (4, 3)] {
            assert_eq!(
                generate_kfrags(&alice, bob.public_key(), *threshold, *n, &signer, KFragMode::NoKey)
                    .err(),
                Some(PreErrors::InvalidKFragThreshold)
            );
        }
    }

    #[test]
    fn kfrag_rejected_for_other_receiver() {
        let params = new_standard_params();
        let (alice, signer, bob) = generate_credentials(&params);
        let carl = KeyPair::new(&params);

        let (_, mut capsule) = encrypt(alice.public_key(), b"Hello, umbral!").expect("encrypt");
        capsule.set_correctness_keys(alice.public_key(), carl.public_key(), signer.public_key());

        let kfrags = generate_kfrags(
            &alice,
            bob.public_key(),
            2,
            5,
            &signer,
            KFragMode::DelegatingAndReceiving,
        )
        .expect("kfrags");
        for kfrag in &kfrags {
            assert_eq!(kfrag.verify_for_capsule(&capsule), Ok(false));
            assert_eq!(
                reencrypt(kfrag, &capsule, true, None, true).err(),
                Some(PreErrors::InvalidKFrag)
            );
        }
    }

    #[test]
    fn forged_cfrag_fails_proof_check() {
        let (ciphertext, mut capsule, bob) = reencrypted_capsule(2, 3, 2);
        let params = Rc::clone(capsule.e().params());

        let genuine = capsule.attached_cfrags()[0].clone();
        let mut bytes = genuine.to_bytes();
        // swap E_i for an unrelated point, keeping the original proof
        let fake_e = CurvePoint::mul_gen(&CurveBN::rand_curve_bn(&params), &params).to_bytes();
        bytes[..fake_e.len()].copy_from_slice(&fake_e);
        let forged = CFrag::from_bytes(&bytes, &params).expect("CFrag");

        capsule.clear_cfrags();
        capsule.attach_cfrag(&forged);
        capsule.attach_cfrag(&genuine);
        assert_eq!(
            decrypt(&ciphertext, &capsule, &bob, true),
            Err(PreErrors::InvalidCFrag)
        );
    }

    #[test]
    fn wire_forms() {
        let (_, capsule, _) = reencrypted_capsule(1, 1, 1);
        let params = Rc::clone(capsule.e().params());

        let capsule_bytes = capsule.to_bytes();
        assert_eq!(capsule_bytes.len(), Capsule::expected_bytes_length(&params));
        assert_eq!(Capsule::from_bytes(&capsule_bytes, &params).expect("Capsule"), capsule);

        let cfrag = &capsule.attached_cfrags()[0];
        let cfrag_bytes = cfrag.to_bytes();
        assert_eq!(
            cfrag_bytes.len(),
            CFrag::expected_bytes_length(&params) + CorrectnessProof::expected_bytes_length(&params)
        );
        let restored = CFrag::from_bytes(&cfrag_bytes, &params).expect("CFrag");
        assert_eq!(&restored, cfrag);
        assert!(restored.proof().is_some());

        assert_eq!(
            CFrag::from_bytes(&cfrag_bytes[1..], &params).err(),
            Some(PreErrors::InvalidBytes)
        );
    }
}
