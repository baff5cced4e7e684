use blstrs::{G1Affine, G1Projective, G2Affine, G2Projective, Scalar};
use bls_signatures::Serialize as BlsSerialize;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use group::{Curve, Group as _};

use crate::error::Error;
use crate::poly::{interpolate_g2, PublicPoly};

/// Domain-separation tag for hashing a message onto the G2 curve, the
/// same tag the `bls-signatures` crate (and drand itself) use for the
/// `BLS12-381` minimal-signature-size ciphersuite.
const CSUITE: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_NUL_";

/// A participant's share of the group's distributed private key. Never
/// leaves the node holding it; only its corresponding partial
/// signatures and its public commitment (in [`PublicPoly`]) do.
#[derive(Clone)]
pub struct Share {
    pub index: u32,
    pub scalar: Scalar,
}

impl Share {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + 32);
        out.write_u32::<BigEndian>(self.index).expect("vec write cannot fail");
        out.extend_from_slice(&self.scalar.to_bytes_be());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != 36 {
            return Err(Error::Malformed("share must be 36 bytes".into()));
        }
        let mut index_bytes = &bytes[..4];
        let index = index_bytes
            .read_u32::<BigEndian>()
            .map_err(|e| Error::Malformed(e.to_string()))?;
        let mut scalar_bytes = [0u8; 32];
        scalar_bytes.copy_from_slice(&bytes[4..]);
        let scalar: Option<Scalar> = Scalar::from_bytes_be(&scalar_bytes).into();
        let scalar = scalar.ok_or_else(|| Error::Malformed("invalid scalar encoding".into()))?;
        Ok(Self { index, scalar })
    }
}

/// One participant's signature over a round's message, produced with
/// [`Share`]. `t` distinct, validated partials recombine into the full
/// beacon signature via [`recover`].
#[derive(Clone)]
pub struct Partial {
    pub index: u32,
    point: G2Projective,
}

impl Partial {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + 96);
        out.write_u32::<BigEndian>(self.index).expect("vec write cannot fail");
        out.extend_from_slice(&self.point.to_affine().to_compressed());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != 100 {
            return Err(Error::Malformed("partial must be 100 bytes".into()));
        }
        let mut index_bytes = &bytes[..4];
        let index = index_bytes
            .read_u32::<BigEndian>()
            .map_err(|e| Error::Malformed(e.to_string()))?;
        let mut compressed = [0u8; 96];
        compressed.copy_from_slice(&bytes[4..]);
        let affine: Option<G2Affine> = G2Affine::from_compressed(&compressed).into();
        let affine = affine.ok_or_else(|| Error::Malformed("invalid G2 point".into()))?;
        Ok(Self {
            index,
            point: affine.into(),
        })
    }
}

fn hash_to_g2(message: &[u8]) -> G2Projective {
    G2Projective::hash_to_curve(message, CSUITE, &[])
}

/// Signs `message` (the 32-byte digest from `beacon_crypto::scheme`)
/// with a participant's share. Deterministic: identical inputs always
/// produce the identical partial, which is what lets `beacon_engine`
/// deduplicate retries from the same signer.
pub fn sign_partial(share: &Share, message: &[u8]) -> Partial {
    let point = hash_to_g2(message) * share.scalar;
    Partial {
        index: share.index,
        point,
    }
}

/// Verifies a partial signature against the group's public polynomial.
/// Rejects out-of-range or mismatched indices before touching the
/// pairing engine so a malicious index never reaches expensive crypto.
pub fn verify_partial(
    public: &PublicPoly,
    n: u32,
    message: &[u8],
    partial: &Partial,
) -> Result<bool, Error> {
    if partial.index == 0 || partial.index > n {
        return Err(Error::InvalidIndex(partial.index, n));
    }
    let pk_i = public.eval(partial.index);
    let hm = hash_to_g2(message).to_affine();
    let lhs = blstrs::pairing(&pk_i, &hm);
    let rhs = blstrs::pairing(&G1Affine::from(G1Projective::generator()), &partial.point.to_affine());
    Ok(lhs == rhs)
}

/// Recombines `t` or more validated partials into the full signature.
/// Callers are responsible for having already validated each partial
/// with [`verify_partial`]; this function only does the algebra.
pub fn recover(partials: &[Partial], t: usize) -> Result<Vec<u8>, Error> {
    let mut seen = std::collections::BTreeMap::new();
    for p in partials {
        seen.entry(p.index).or_insert_with(|| p.point);
    }
    if seen.len() < t {
        return Err(Error::Threshold {
            need: t,
            have: seen.len(),
        });
    }
    let points: Vec<(u32, G2Projective)> = seen.into_iter().collect();
    let sig = interpolate_g2(&points);
    Ok(sig.to_affine().to_compressed().to_vec())
}

/// Full verification of a recovered (or otherwise obtained) signature
/// against the group's distributed public key, mirroring the
/// `H(prev || round)` verification path `blockchain/beacon`'s drand
/// client runs for every entry it receives.
pub fn verify(public_key: &G1Affine, message: &[u8], signature: &[u8]) -> Result<(), Error> {
    let pk = bls_signatures::PublicKey::from_bytes(&public_key.to_compressed())?;
    let sig = bls_signatures::Signature::from_bytes(signature)?;
    if bls_signatures::verify_messages(&sig, &[message], &[pk]) {
        Ok(())
    } else {
        Err(Error::Verification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poly::Poly;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn setup(n: u32, t: usize) -> (PublicPoly, Vec<Share>) {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let poly = Poly::random(t - 1, &mut rng);
        let public = poly.commit();
        let shares = (1..=n)
            .map(|i| Share {
                index: i,
                scalar: poly.eval(i),
            })
            .collect();
        (public, shares)
    }

    #[test]
    fn sign_verify_recover_roundtrip() {
        let (public, shares) = setup(5, 3);
        let message = [42u8; 32];
        let partials: Vec<Partial> = shares[..3]
            .iter()
            .map(|s| sign_partial(s, &message))
            .collect();
        for (share, partial) in shares[..3].iter().zip(partials.iter()) {
            assert!(verify_partial(&public, 5, &message, partial).unwrap());
            assert_eq!(share.index, partial.index);
        }
        let sig = recover(&partials, 3).unwrap();
        assert!(verify(&public.public_key(), &message, &sig).is_ok());
    }

    #[test]
    fn recover_below_threshold_fails() {
        let (_public, shares) = setup(5, 3);
        let message = [1u8; 32];
        let partials: Vec<Partial> = shares[..2]
            .iter()
            .map(|s| sign_partial(s, &message))
            .collect();
        assert!(matches!(
            recover(&partials, 3),
            Err(Error::Threshold { need: 3, have: 2 })
        ));
    }

    #[test]
    fn any_threshold_subset_recovers_same_signature() {
        let (public, shares) = setup(5, 3);
        let message = [9u8; 32];
        let partials: Vec<Partial> = shares.iter().map(|s| sign_partial(s, &message)).collect();
        let sig_a = recover(&partials[0..3], 3).unwrap();
        let sig_b = recover(&partials[2..5], 3).unwrap();
        assert_eq!(sig_a, sig_b);
        assert!(verify(&public.public_key(), &message, &sig_a).is_ok());
    }
}
