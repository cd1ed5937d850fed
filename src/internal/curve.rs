use crate::internal::errors::PreErrors;
use crate::internal::schemes::{unsafe_hash_to_point, Blake2bHash};

use std::cell::RefCell;
use std::fmt;
use std::ops::{Add, Div, Mul, Sub};
use std::rc::Rc;

use openssl::bn::{BigNum, BigNumContext, BigNumRef};
use openssl::ec::{EcGroup, EcGroupRef, EcPoint, EcPointRef, PointConversionForm};
use openssl::nid::Nid;

const U_POINT_LABEL: &[u8] = b"NuCypher/UmbralParameters/u";

/// Curve parameters shared by every scalar and point of a session.
///
/// Holds the OpenSSL group, its order, the second generator `U` used by
/// kfrag commitments and a scratch `BigNumContext`. The context is behind a
/// `RefCell`, so a `Params` instance (and everything built on it) is meant to
/// live on one thread.
pub struct Params {
    group: EcGroup,
    g_point: EcPoint,
    order: BigNum,
    u_point: EcPoint,
    field_order_size_in_bytes: usize,
    group_order_size_in_bytes: usize,
    ctx: Rc<RefCell<BigNumContext>>,
}

impl Params {
    pub fn new(curve_name: Nid) -> Self {
        Self::try_new(curve_name).expect("Curve parameters setup error")
    }

    pub fn try_new(curve_name: Nid) -> Result<Self, PreErrors> {
        let mut ctx = BigNumContext::new()?;
        let group = EcGroup::from_curve_name(curve_name)?;
        let g_point = group
            .generator_opt()
            .ok_or(PreErrors::GenericError)?
            .to_owned(&group)?;
        let mut order = BigNum::new()?;
        group.order(&mut order, &mut ctx)?;

        let g_bytes = g_point.to_bytes(&group, PointConversionForm::COMPRESSED, &mut ctx)?;
        let u_point =
            unsafe_hash_to_point::<Blake2bHash>(&g_bytes, U_POINT_LABEL, &group, &mut ctx)?;

        Ok(Params {
            field_order_size_in_bytes: ((group.degree() + 7) / 8) as usize,
            group_order_size_in_bytes: order.num_bytes() as usize,
            group,
            g_point,
            order,
            u_point,
            ctx: Rc::new(RefCell::new(ctx)),
        })
    }

    pub fn group(&self) -> &EcGroupRef {
        &self.group
    }

    pub fn g_point(&self) -> &EcPointRef {
        &self.g_point
    }

    pub fn order(&self) -> &BigNumRef {
        &self.order
    }

    pub fn u_point(&self) -> &EcPointRef {
        &self.u_point
    }

    pub fn field_order_size_in_bytes(&self) -> usize {
        self.field_order_size_in_bytes
    }

    pub fn group_order_size_in_bytes(&self) -> usize {
        self.group_order_size_in_bytes
    }

    pub fn ctx(&self) -> &Rc<RefCell<BigNumContext>> {
        &self.ctx
    }
}

impl PartialEq for Params {
    fn eq(&self, other: &Params) -> bool {
        self.group.curve_name() == other.group.curve_name()
    }
}

/// A scalar modulo the group order.
pub struct CurveBN {
    bn: BigNum,
    params: Rc<Params>,
}

impl CurveBN {
    pub fn from_u32(n: u32, params: &Rc<Params>) -> Self {
        CurveBN {
            bn: BigNum::from_u32(n).expect("Error in BN creation"),
            params: Rc::clone(params),
        }
    }

    pub fn from_big_num(n: &BigNumRef, params: &Rc<Params>) -> Self {
        CurveBN {
            bn: n.to_owned().expect("Error in BN cloning"),
            params: Rc::clone(params),
        }
    }

    /// Parses a fixed-width big-endian scalar; zero and values outside the
    /// group order are rejected.
    pub fn from_bytes(bytes: &[u8], params: &Rc<Params>) -> Result<Self, PreErrors> {
        if bytes.len() != Self::expected_bytes_length(params) {
            return Err(PreErrors::InvalidBytes);
        }
        let bn = BigNum::from_slice(bytes)?;
        if !Self::in_range(&bn, params) {
            return Err(PreErrors::InvalidBytes);
        }
        Ok(CurveBN {
            bn,
            params: Rc::clone(params),
        })
    }

    pub fn rand_curve_bn(params: &Rc<Params>) -> Self {
        let mut rand = BigNum::new().expect("Error in BN creation");
        loop {
            params
                .order()
                .rand_range(&mut rand)
                .expect("Error in Randomization");
            if Self::in_range(&rand, params) {
                break;
            }
        }
        CurveBN {
            bn: rand,
            params: Rc::clone(params),
        }
    }

    /// Left-padded to the group order size.
    pub fn to_bytes(&self) -> Vec<u8> {
        let width = self.params.group_order_size_in_bytes();
        let raw = self.bn.to_vec();
        assert!(raw.len() <= width, "BN size too large");
        let mut bytes = vec![0_u8; width - raw.len()];
        bytes.extend_from_slice(&raw);
        bytes
    }

    fn in_range(bn: &BigNumRef, params: &Params) -> bool {
        let zero = BigNum::new().expect("Error in BN creation");
        bn > &*zero && bn < params.order()
    }

    pub fn expected_bytes_length(params: &Params) -> usize {
        params.group_order_size_in_bytes()
    }

    pub fn invert(&self) -> Self {
        let mut res = BigNum::new().expect("Error in BN creation");
        res.mod_inverse(&self.bn, self.params.order(), &mut self.params.ctx().borrow_mut())
            .expect("Error in BN inversion");
        self.wrap(res)
    }

    pub fn bn(&self) -> &BigNumRef {
        &self.bn
    }

    pub fn params(&self) -> &Rc<Params> {
        &self.params
    }

    fn wrap(&self, bn: BigNum) -> CurveBN {
        CurveBN {
            bn,
            params: Rc::clone(&self.params),
        }
    }
}

impl Clone for CurveBN {
    fn clone(&self) -> Self {
        CurveBN::from_big_num(&self.bn, &self.params)
    }
}

impl PartialEq for CurveBN {
    fn eq(&self, other: &CurveBN) -> bool {
        self.params == other.params && self.bn == other.bn
    }
}

impl fmt::Debug for CurveBN {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "CurveBN({})", hex::encode(self.to_bytes()))
    }
}

impl Add for &CurveBN {
    type Output = CurveBN;

    fn add(self, other: &CurveBN) -> CurveBN {
        let mut res = BigNum::new().expect("Error in BN creation");
        res.mod_add(
            &self.bn,
            &other.bn,
            self.params.order(),
            &mut self.params.ctx().borrow_mut(),
        )
        .expect("Error in BN addition");
        self.wrap(res)
    }
}

impl Sub for &CurveBN {
    type Output = CurveBN;

    fn sub(self, other: &CurveBN) -> CurveBN {
        let mut res = BigNum::new().expect("Error in BN creation");
        res.mod_sub(
            &self.bn,
            &other.bn,
            self.params.order(),
            &mut self.params.ctx().borrow_mut(),
        )
        .expect("Error in BN subtraction");
        self.wrap(res)
    }
}

impl Mul for &CurveBN {
    type Output = CurveBN;

    fn mul(self, other: &CurveBN) -> CurveBN {
        let mut res = BigNum::new().expect("Error in BN creation");
        res.mod_mul(
            &self.bn,
            &other.bn,
            self.params.order(),
            &mut self.params.ctx().borrow_mut(),
        )
        .expect("Error in BN multiplication");
        self.wrap(res)
    }
}

impl Div for &CurveBN {
    type Output = CurveBN;

    fn div(self, other: &CurveBN) -> CurveBN {
        self * &other.invert()
    }
}

/// A point of the curve, always serialized in compressed form.
pub struct CurvePoint {
    point: EcPoint,
    params: Rc<Params>,
}

impl CurvePoint {
    pub fn from_ec_point(p: &EcPointRef, params: &Rc<Params>) -> Self {
        CurvePoint {
            point: p.to_owned(params.group()).expect("Error in Point cloning"),
            params: Rc::clone(params),
        }
    }

    pub fn from_bytes(bytes: &[u8], params: &Rc<Params>) -> Result<Self, PreErrors> {
        if bytes.len() != Self::expected_bytes_length(params) {
            return Err(PreErrors::InvalidBytes);
        }
        let point = EcPoint::from_bytes(params.group(), bytes, &mut params.ctx().borrow_mut())
            .map_err(|_| PreErrors::InvalidBytes)?;
        Ok(CurvePoint {
            point,
            params: Rc::clone(params),
        })
    }

    /// Second generator `U`, the base of kfrag commitments.
    pub fn u(params: &Rc<Params>) -> Self {
        CurvePoint::from_ec_point(params.u_point(), params)
    }

    pub fn mul_gen(scalar: &CurveBN, params: &Rc<Params>) -> Self {
        let mut res = EcPoint::new(params.group()).expect("Error in Point creation");
        res.mul_generator2(params.group(), &scalar.bn, &mut params.ctx().borrow_mut())
            .expect("Error in Point multiplication");
        CurvePoint {
            point: res,
            params: Rc::clone(params),
        }
    }

    pub fn expected_bytes_length(params: &Params) -> usize {
        1 + params.field_order_size_in_bytes()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.point
            .to_bytes(
                self.params.group(),
                PointConversionForm::COMPRESSED,
                &mut self.params.ctx().borrow_mut(),
            )
            .expect("Error in Point to bytes")
    }

    pub fn point(&self) -> &EcPointRef {
        &self.point
    }

    pub fn params(&self) -> &Rc<Params> {
        &self.params
    }
}

impl Clone for CurvePoint {
    fn clone(&self) -> Self {
        CurvePoint::from_ec_point(&self.point, &self.params)
    }
}

impl PartialEq for CurvePoint {
    fn eq(&self, other: &CurvePoint) -> bool {
        self.params == other.params
            && self
                .point
                .eq(
                    self.params.group(),
                    &other.point,
                    &mut self.params.ctx().borrow_mut(),
                )
                .expect("Error in Point comparison")
    }
}

impl fmt::Debug for CurvePoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "CurvePoint({})", hex::encode(self.to_bytes()))
    }
}

impl Add for &CurvePoint {
    type Output = CurvePoint;

    fn add(self, other: &CurvePoint) -> CurvePoint {
        let mut res = EcPoint::new(self.params.group()).expect("Error in Point creation");
        res.add(
            self.params.group(),
            &self.point,
            &other.point,
            &mut self.params.ctx().borrow_mut(),
        )
        .expect("Error in Point addition");
        CurvePoint {
            point: res,
            params: Rc::clone(&self.params),
        }
    }
}

impl Mul<&CurveBN> for &CurvePoint {
    type Output = CurvePoint;

    fn mul(self, scalar: &CurveBN) -> CurvePoint {
        let mut res = EcPoint::new(self.params.group()).expect("Error in Point creation");
        res.mul2(
            self.params.group(),
            &self.point,
            &scalar.bn,
            &mut self.params.ctx().borrow_mut(),
        )
        .expect("Error in Point multiplication");
        CurvePoint {
            point: res,
            params: Rc::clone(&self.params),
        }
    }
}
