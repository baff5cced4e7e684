//! Deterministic, side-effect-free threshold BLS primitives shared by
//! the DKG and beacon engines: polynomial commitments, Lagrange
//! recovery, partial signing/verification, and the scheme-selected
//! message construction rule.

pub mod bls;
pub mod error;
pub mod poly;
pub mod scheme;

pub use bls::{recover, sign_partial, verify, verify_partial, Partial, Share};
pub use error::Error;
pub use poly::{
    interpolate_g1, interpolate_g2, interpolate_public_poly, interpolate_scalar, PublicPoly, Poly,
};
pub use scheme::{randomness, SchemeId};
