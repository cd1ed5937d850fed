use crate::internal::curve::CurveBN;

use sha2::{Digest, Sha512};

const CONSTANT_DIGEST_LENGTH: usize = 8;

/// Short domain-separation tag derived from a constant's name.
pub fn new_constant_sorrow(name: &str) -> Vec<u8> {
    let mut hasher = Sha512::new();
    hasher.update(name);
    hasher.finalize()[..CONSTANT_DIGEST_LENGTH].to_vec()
}

/// Lagrange coefficient at zero for `id_i` over `selected_ids`.
pub fn lambda_coeff(id_i: &CurveBN, selected_ids: &[CurveBN]) -> CurveBN {
    let mut res = CurveBN::from_u32(1, id_i.params());
    for id_j in selected_ids.iter().filter(|id_j| *id_j != id_i) {
        res = &(&res * id_j) / &(id_j - id_i);
    }
    res
}

/// Horner evaluation of `coeffs[0] + coeffs[1] x + ...` at `x`.
pub fn poly_eval(coeffs: &[CurveBN], x: &CurveBN) -> CurveBN {
    let (last, rest) = coeffs.split_last().expect("Polynomial without coefficients");
    rest.iter()
        .rev()
        .fold(last.clone(), |acc, coeff| &(&acc * x) + coeff)
}
