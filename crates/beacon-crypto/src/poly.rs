use blstrs::{G1Affine, G1Projective, G2Projective, Scalar};
use ff::Field;
use group::{Curve, Group};
use rand::RngCore;

use crate::error::Error;

/// A polynomial over the scalar field, used both as a dealer's secret
/// sharing polynomial during DKG and as the public commitment to it.
///
/// Degree `t - 1` gives a `(t, n)` threshold scheme: any `t` evaluations
/// determine the polynomial (and hence its constant term, the secret)
/// by Lagrange interpolation, while `t - 1` reveal nothing about it.
#[derive(Clone, Debug)]
pub struct Poly {
    coeffs: Vec<Scalar>,
}

impl Poly {
    /// Draws a random polynomial of the given degree. `degree + 1` is the
    /// threshold `t` of the scheme this polynomial belongs to.
    pub fn random(degree: usize, rng: &mut impl RngCore) -> Self {
        let coeffs = (0..=degree).map(|_| Scalar::random(&mut *rng)).collect();
        Self { coeffs }
    }

    /// Builds a polynomial whose constant term is `secret` and whose
    /// remaining coefficients are drawn at random. Used by a resharing
    /// dealer, whose secret is its existing share rather than a fresh
    /// random value.
    pub fn with_secret(secret: Scalar, degree: usize, rng: &mut impl RngCore) -> Self {
        let mut coeffs = vec![secret];
        coeffs.extend((0..degree).map(|_| Scalar::random(&mut *rng)));
        Self { coeffs }
    }

    pub fn degree(&self) -> usize {
        self.coeffs.len() - 1
    }

    /// The constant term, i.e. `eval(0)`.
    pub fn secret(&self) -> Scalar {
        self.coeffs[0]
    }

    /// Evaluates the polynomial at `x` using Horner's method. `x = 0` is
    /// reserved for the secret itself; participant shares use `x = index`
    /// with `index >= 1`.
    pub fn eval(&self, x: u32) -> Scalar {
        let x = Scalar::from(x as u64);
        let mut acc = Scalar::ZERO;
        for coeff in self.coeffs.iter().rev() {
            acc = acc * x + coeff;
        }
        acc
    }

    /// Public commitments to each coefficient, `c_i * G1::generator()`.
    /// Recipients verify their share against these without learning the
    /// polynomial itself.
    pub fn commit(&self) -> PublicPoly {
        let commits = self
            .coeffs
            .iter()
            .map(|c| (G1Projective::generator() * c).to_affine())
            .collect();
        PublicPoly { commits }
    }
}

/// The public commitment to a [`Poly`]: one G1 point per coefficient.
/// `eval(0)` is the scheme's distributed public key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicPoly {
    commits: Vec<G1Affine>,
}

impl PublicPoly {
    pub fn from_commits(commits: Vec<G1Affine>) -> Self {
        Self { commits }
    }

    pub fn degree(&self) -> usize {
        self.commits.len() - 1
    }

    pub fn public_key(&self) -> G1Affine {
        self.commits[0]
    }

    pub fn commits(&self) -> &[G1Affine] {
        &self.commits
    }

    /// Evaluates the committed polynomial at `x` without knowing its
    /// coefficients, by taking the same weighted sum in the exponent.
    pub fn eval(&self, x: u32) -> G1Affine {
        let x = Scalar::from(x as u64);
        let mut acc = G1Projective::identity();
        for commit in self.commits.iter().rev() {
            acc = acc * x + G1Projective::from(*commit);
        }
        acc.to_affine()
    }

    /// Coefficient-wise sum of commitments from multiple dealers, used
    /// both in fresh DKG (summing the qualified set) and in resharing
    /// (summing, then the caller interpolates across dealer indices).
    pub fn add(&self, other: &PublicPoly) -> Result<PublicPoly, Error> {
        if self.commits.len() != other.commits.len() {
            return Err(Error::Malformed(
                "public polynomials have mismatched degree".into(),
            ));
        }
        let commits = self
            .commits
            .iter()
            .zip(other.commits.iter())
            .map(|(a, b)| (G1Projective::from(*a) + G1Projective::from(*b)).to_affine())
            .collect();
        Ok(PublicPoly { commits })
    }
}

/// The Lagrange basis coefficient `l_i(0)` for participant `index` given
/// the set of all participant indices taking part in the interpolation.
/// Used both to recombine shares (scalar domain, during resharing) and
/// to recombine partial signatures (group domain, during recovery).
fn lagrange_at_zero(index: u32, indices: &[u32]) -> Scalar {
    let xi = Scalar::from(index as u64);
    let mut num = Scalar::ONE;
    let mut den = Scalar::ONE;
    for &j in indices {
        if j == index {
            continue;
        }
        let xj = Scalar::from(j as u64);
        num *= xj;
        den *= xj - xi;
    }
    num * den.invert().expect("distinct indices imply nonzero denominator")
}

/// Recovers `f(0)` in the scalar field from `t` evaluations `(index, f(index))`.
pub fn interpolate_scalar(shares: &[(u32, Scalar)]) -> Scalar {
    let indices: Vec<u32> = shares.iter().map(|(i, _)| *i).collect();
    shares
        .iter()
        .fold(Scalar::ZERO, |acc, (i, v)| acc + *v * lagrange_at_zero(*i, &indices))
}

/// Recovers a full BLS signature from `t` partial signatures living in
/// G2, by the same Lagrange-in-the-exponent trick `eval` uses for G1
/// commitments.
pub fn interpolate_g2(shares: &[(u32, G2Projective)]) -> G2Projective {
    let indices: Vec<u32> = shares.iter().map(|(i, _)| *i).collect();
    shares.iter().fold(G2Projective::identity(), |acc, (i, v)| {
        acc + *v * lagrange_at_zero(*i, &indices)
    })
}

/// Recovers a G1 point (used when interpolating dealer commitments
/// across indices during a reshare) from `t` evaluations.
pub fn interpolate_g1(shares: &[(u32, G1Projective)]) -> G1Projective {
    let indices: Vec<u32> = shares.iter().map(|(i, _)| *i).collect();
    shares.iter().fold(G1Projective::identity(), |acc, (i, v)| {
        acc + *v * lagrange_at_zero(*i, &indices)
    })
}

/// Recovers the new group's public polynomial during a reshare: each
/// dealer contributes a `PublicPoly` committing to the new shares it
/// handed out, and the new polynomial's `k`-th coefficient is the
/// interpolation, across dealer indices, of the `k`-th coefficients of
/// the qualified dealers' polynomials. Mirrors [`interpolate_scalar`]
/// applied once per coefficient.
pub fn interpolate_public_poly(dealer_polys: &[(u32, PublicPoly)]) -> Result<PublicPoly, Error> {
    let degree = match dealer_polys.first() {
        Some((_, p)) => p.degree(),
        None => return Err(Error::Malformed("no dealer polynomials to interpolate".into())),
    };
    if dealer_polys.iter().any(|(_, p)| p.degree() != degree) {
        return Err(Error::Malformed(
            "dealer polynomials have mismatched degree".into(),
        ));
    }
    let commits = (0..=degree)
        .map(|k| {
            let points: Vec<(u32, G1Projective)> = dealer_polys
                .iter()
                .map(|(i, p)| (*i, G1Projective::from(p.commits()[k])))
                .collect();
            interpolate_g1(&points).to_affine()
        })
        .collect();
    Ok(PublicPoly { commits })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::ChaCha8Rng;
    use rand::SeedableRng;

    #[test]
    fn eval_matches_public_eval() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let poly = Poly::random(2, &mut rng);
        let public = poly.commit();
        for x in 1..=5u32 {
            let want = (G1Projective::generator() * poly.eval(x)).to_affine();
            assert_eq!(public.eval(x), want);
        }
    }

    #[test]
    fn interpolate_recovers_secret() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let degree = 3;
        let poly = Poly::random(degree, &mut rng);
        let shares: Vec<(u32, Scalar)> = (1..=degree as u32 + 1)
            .map(|i| (i, poly.eval(i)))
            .collect();
        assert_eq!(interpolate_scalar(&shares), poly.secret());
    }

    #[test]
    fn reshare_preserves_the_old_secret() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let old_degree = 2;
        let old_poly = Poly::random(old_degree, &mut rng);
        let old_secret = old_poly.secret();
        // Three old share holders (dealers 1..=3) each reshare their
        // point on `old_poly` into a fresh degree-1 polynomial.
        let dealer_indices: Vec<u32> = vec![1, 2, 3];
        let dealer_polys: Vec<(u32, Poly)> = dealer_indices
            .iter()
            .map(|&d| (d, Poly::with_secret(old_poly.eval(d), 1, &mut rng)))
            .collect();
        // New recipient at index 7 collects one point from each dealer
        // and interpolates across the dealer indices (old threshold).
        let points: Vec<(u32, Scalar)> = dealer_polys.iter().map(|(d, p)| (*d, p.eval(7))).collect();
        let new_share = interpolate_scalar(&points);

        let dealer_public_polys: Vec<(u32, PublicPoly)> =
            dealer_polys.iter().map(|(d, p)| (*d, p.commit())).collect();
        let new_public = interpolate_public_poly(&dealer_public_polys).unwrap();
        assert_eq!(new_public.public_key(), (G1Projective::generator() * old_secret).to_affine());
        assert_eq!(new_public.eval(7), (G1Projective::generator() * new_share).to_affine());
    }

    #[quickcheck_macros::quickcheck]
    fn interpolate_is_independent_of_subset(seed: u64, degree: u8) -> bool {
        let degree = (degree % 5) as usize + 1;
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let poly = Poly::random(degree, &mut rng);
        let all: Vec<(u32, Scalar)> = (1..=(degree as u32 + 4))
            .map(|i| (i, poly.eval(i)))
            .collect();
        let first_t: Vec<_> = all[..degree + 1].to_vec();
        let last_t: Vec<_> = all[all.len() - degree - 1..].to_vec();
        interpolate_scalar(&first_t) == poly.secret() && interpolate_scalar(&last_t) == poly.secret()
    }
}
