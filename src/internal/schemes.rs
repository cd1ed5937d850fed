use crate::internal::curve::{CurveBN, Params};
use crate::internal::errors::PreErrors;

use std::rc::Rc;

use aead::{Aead, KeyInit, Payload};
use blake2::{Blake2b, Digest};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use hkdf::Hkdf;
use openssl::bn::{BigNum, BigNumContext};
use openssl::ec::{EcGroupRef, EcPoint};
use sha2::Sha256;
use sha3::Keccak256;

const DEM_KEYSIZE: usize = 32;
const DEM_NONCE_SIZE: usize = 12;
const DEM_TAG_SIZE: usize = 16;
pub const DEM_MIN_SIZE: usize = DEM_NONCE_SIZE + DEM_TAG_SIZE + 1;
const CUSTOMIZATION_STRING_LENGTH: usize = 64;

/// Domain-separated hash: the customization string is zero-padded to 64
/// bytes and absorbed before any data.
pub trait Hash {
  fn new(customization_string: &[u8]) -> Self;
  fn update(&mut self, data: &[u8]);
  fn finalize(self) -> Vec<u8>;
}

fn padded_customization(customization_string: &[u8]) -> Vec<u8> {
  assert!(
    customization_string.len() <= CUSTOMIZATION_STRING_LENGTH,
    "Customization string is larger than {} characters",
    CUSTOMIZATION_STRING_LENGTH
  );
  let mut padded = customization_string.to_vec();
  padded.resize(CUSTOMIZATION_STRING_LENGTH, 0);
  padded
}

pub struct Blake2bHash {
  digest: Blake2b,
}

impl Hash for Blake2bHash {
  fn new(customization_string: &[u8]) -> Self {
    let mut digest = Blake2b::new();
    digest.update(padded_customization(customization_string));
    Self { digest }
  }

  fn update(&mut self, data: &[u8]) {
    self.digest.update(data);
  }

  fn finalize(self) -> Vec<u8> {
    self.digest.finalize().to_vec()
  }
}

/// 64-byte Keccak: two Keccak256 lanes with distinct one-byte prefixes.
pub struct ExtendedKeccak {
  upper: Keccak256,
  lower: Keccak256,
}

impl Hash for ExtendedKeccak {
  fn new(customization_string: &[u8]) -> Self {
    let padded = padded_customization(customization_string);
    let mut upper = Keccak256::new();
    upper.update(b"\x00");
    upper.update(&padded);
    let mut lower = Keccak256::new();
    lower.update(b"\x01");
    lower.update(&padded);
    Self { upper, lower }
  }

  fn update(&mut self, data: &[u8]) {
    self.upper.update(data);
    self.lower.update(data);
  }

  fn finalize(self) -> Vec<u8> {
    let mut digest = self.upper.finalize().to_vec();
    digest.extend_from_slice(&self.lower.finalize());
    digest
  }
}

pub struct SHA256Hash {
  digest: Sha256,
}

impl Hash for SHA256Hash {
  fn new(customization_string: &[u8]) -> Self {
    let mut digest = Sha256::new();
    digest.update(padded_customization(customization_string));
    Self { digest }
  }

  fn update(&mut self, data: &[u8]) {
    self.digest.update(data);
  }

  fn finalize(self) -> Vec<u8> {
    self.digest.finalize().to_vec()
  }
}

pub fn hash_to_curve_blake(bytes: &[u8], params: &Rc<Params>) -> CurveBN {
  hash_to_curvebn::<Blake2bHash>(bytes, params, None)
}

/// Maps arbitrary bytes to a non-zero scalar: `(H(bytes) mod (n - 1)) + 1`.
pub fn hash_to_curvebn<H>(
  bytes: &[u8],
  params: &Rc<Params>,
  customization_string: Option<&[u8]>,
) -> CurveBN
where
  H: Hash,
{
  let mut customization = b"hash_to_curvebn".to_vec();
  if let Some(c) = customization_string {
    customization.extend_from_slice(c);
  }
  let mut hash = H::new(&customization);
  hash.update(bytes);

  let digest_bn = BigNum::from_slice(&hash.finalize()).expect("Error in BN creation");
  let one = BigNum::from_u32(1).expect("Error in BN creation");
  let mut order_minus_one = BigNum::new().expect("Error in BN creation");
  order_minus_one
    .checked_sub(params.order(), &one)
    .expect("Error in BN subtraction");

  let mut modulo = BigNum::new().expect("Error in BN creation");
  modulo
    .checked_rem(&digest_bn, &order_minus_one, &mut params.ctx().borrow_mut())
    .expect("Error in BN modulo");

  let mut scalar = BigNum::new().expect("Error in BN creation");
  scalar
    .checked_add(&modulo, &one)
    .expect("Error in BN addition");

  CurveBN::from_big_num(&scalar, params)
}

pub fn kdf(base_key: &[u8]) -> Result<Vec<u8>, PreErrors> {
  kdf_args(base_key, None, None)
}

/// HKDF over Blake2b producing a DEM key.
pub fn kdf_args(
  base_key: &[u8],
  salt: Option<&[u8]>,
  info: Option<&[u8]>,
) -> Result<Vec<u8>, PreErrors> {
  let default_salt = vec![0; DEM_KEYSIZE / 8];
  let salt = salt.unwrap_or(&default_salt);
  let info = info.unwrap_or(b"");
  let mut buf = vec![0; DEM_KEYSIZE];
  Hkdf::<Blake2b>::new(Some(salt), base_key)
    .expand(info, &mut buf)
    .map_err(|_| PreErrors::DerivationError)?;
  Ok(buf)
}

/// ChaCha20-Poly1305 with a random nonce prepended to the output.
pub fn dem_encrypt(key: &[u8], plaintext: &[u8], aad: Option<&[u8]>) -> Result<Vec<u8>, PreErrors> {
  if key.len() != DEM_KEYSIZE {
    return Err(PreErrors::EncryptionError);
  }
  let cipher = ChaCha20Poly1305::new(Key::from_slice(key));

  let mut nonce_bytes = [0u8; DEM_NONCE_SIZE];
  getrandom::getrandom(&mut nonce_bytes).map_err(|_| PreErrors::EncryptionError)?;
  let nonce = Nonce::from_slice(&nonce_bytes);
  let payload = Payload {
    msg: plaintext,
    aad: aad.unwrap_or(b""),
  };

  let sealed = cipher
    .encrypt(nonce, payload)
    .map_err(|_| PreErrors::EncryptionError)?;
  let mut ciphertext = nonce_bytes.to_vec();
  ciphertext.extend_from_slice(&sealed);
  Ok(ciphertext)
}

pub fn dem_decrypt(
  key: &[u8],
  ciphertext: &[u8],
  aad: Option<&[u8]>,
) -> Result<Vec<u8>, PreErrors> {
  if key.len() != DEM_KEYSIZE {
    return Err(PreErrors::DecryptionError);
  }
  if ciphertext.len() < DEM_NONCE_SIZE + DEM_TAG_SIZE {
    return Err(PreErrors::CiphertextError);
  }
  let cipher = ChaCha20Poly1305::new(Key::from_slice(key));

  let (nonce, sealed) = ciphertext.split_at(DEM_NONCE_SIZE);
  let payload = Payload {
    msg: sealed,
    aad: aad.unwrap_or(b""),
  };

  cipher
    .decrypt(Nonce::from_slice(nonce), payload)
    .map_err(|_| PreErrors::DecryptionError)
}

/// Try-and-increment hash onto the curve. Only for deriving public
/// constants such as `U`: the loop leaks timing about its input.
pub fn unsafe_hash_to_point<H>(
  data: &[u8],
  label: &[u8],
  group: &EcGroupRef,
  ctx: &mut BigNumContext,
) -> Result<EcPoint, PreErrors>
where
  H: Hash,
{
  let mut to_hash = label.len().to_be_bytes().to_vec();
  to_hash.extend_from_slice(label);
  to_hash.extend_from_slice(&data.len().to_be_bytes());
  to_hash.extend_from_slice(data);

  let curve_key_size_bytes = ((group.degree() + 7) / 8) as usize;

  for i in 0..u32::MAX {
    let mut hash = H::new(b"");
    hash.update(&to_hash);
    hash.update(&(i as usize).to_be_bytes());
    let digest = hash.finalize();

    let sign = if digest[0] & 1 == 0 { 0x02 } else { 0x03 };
    let mut compressed_point = vec![sign];
    compressed_point.extend_from_slice(&digest[1..=curve_key_size_bytes]);

    if let Ok(point) = EcPoint::from_bytes(group, &compressed_point, ctx) {
      return Ok(point);
    }
  }

  Err(PreErrors::GenericError)
}
