//! The ceremony driver. One `Participant` represents this node's view
//! of a single DKG or resharing run: it deals its own contribution,
//! validates every other dealer's, tracks responses and
//! justifications, and finally derives this node's share of the new
//! group's distributed key.
//!
//! Network delivery is the caller's job (`beacon_net`'s DKG protocol);
//! this type only holds the state machine and the algebra, the same
//! split `beacon_engine`'s round driver keeps from its transport.
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use beacon_crypto::{interpolate_public_poly, interpolate_scalar, Poly, PublicPoly, Share};
use beacon_group::Group;
use blstrs::{G1Affine, G1Projective, Scalar};
use rand::RngCore;
use x25519_dalek::{PublicKey, StaticSecret};

use crate::crypto_box;
use crate::deal::{Deal, Justification, Response};
use crate::error::Error;
use crate::state::Phase;

/// Whether this run establishes a fresh distributed key or reshares an
/// existing one. Resharing carries the old threshold (needed to know
/// how large a qualified set of old dealers must be) and this node's
/// old share (the secret it deals under the new polynomial).
#[derive(Clone)]
pub enum Mode {
    Fresh,
    Reshare { old_share: Share, old_threshold: u32 },
}

#[derive(Clone, Debug)]
pub struct Config {
    pub response_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            response_timeout: Duration::from_secs(30),
        }
    }
}

pub struct Participant {
    my_index: u32,
    x25519_secret: StaticSecret,
    group: Arc<Group>,
    mode: Mode,
    config: Config,
    phase: Phase,
    own_poly: Option<Poly>,
    deals: BTreeMap<u32, Deal>,
    decrypted_shares: BTreeMap<u32, Scalar>,
    responses: BTreeMap<u32, BTreeMap<u32, Response>>,
    disqualified: BTreeSet<u32>,
    responding_since: Option<Instant>,
}

impl Participant {
    pub fn new(
        my_index: u32,
        x25519_secret: StaticSecret,
        group: Arc<Group>,
        mode: Mode,
        config: Config,
    ) -> Result<Self, Error> {
        group.by_index(my_index).ok_or(Error::NotAMember(my_index))?;
        Ok(Self {
            my_index,
            x25519_secret,
            group,
            mode,
            config,
            phase: Phase::Idle,
            own_poly: None,
            deals: BTreeMap::new(),
            decrypted_shares: BTreeMap::new(),
            responses: BTreeMap::new(),
            disqualified: BTreeSet::new(),
            responding_since: None,
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn require_phase(&self, allowed: &[Phase]) -> Result<(), Error> {
        if allowed.contains(&self.phase) {
            Ok(())
        } else {
            Err(Error::WrongPhase(self.phase))
        }
    }

    /// Generates this node's sharing polynomial and seals a share of it
    /// to every other member. The dealer's own share is recorded
    /// directly, without a round trip through `crypto_box`.
    pub fn deal(&mut self, rng: &mut impl RngCore) -> Result<Deal, Error> {
        self.require_phase(&[Phase::Idle])?;
        let degree = self.group.threshold as usize - 1;
        let poly = match &self.mode {
            Mode::Fresh => Poly::random(degree, rng),
            Mode::Reshare { old_share, .. } => Poly::with_secret(old_share.scalar, degree, rng),
        };
        let public = poly.commit();
        let commitments: Vec<[u8; 48]> = public.commits().iter().map(|c| c.to_compressed()).collect();

        let mut shares = BTreeMap::new();
        for member in &self.group.members {
            if member.index == self.my_index {
                continue;
            }
            let recipient_key: [u8; 32] = member
                .public_key
                .as_slice()
                .try_into()
                .map_err(|_| Error::Crypto(beacon_crypto::Error::Malformed("member key must be 32 bytes".into())))?;
            let recipient = PublicKey::from(recipient_key);
            let plaintext = poly.eval(member.index).to_bytes_be();
            shares.insert(member.index, crypto_box::seal(&recipient, &plaintext));
        }

        let deal = Deal {
            dealer_index: self.my_index,
            commitments,
            shares,
        };

        let own_share = poly.eval(self.my_index);
        let expected = public.eval(self.my_index);
        let actual: G1Affine = (G1Projective::generator() * own_share).into();
        if expected != actual {
            self.phase = Phase::Aborted;
            return Err(Error::OwnDealRejected);
        }

        self.decrypted_shares.insert(self.my_index, own_share);
        self.deals.insert(self.my_index, deal.clone());
        self.responses
            .entry(self.my_index)
            .or_default()
            .insert(self.my_index, Response::Approval);
        self.own_poly = Some(poly);
        self.phase = Phase::Dealing;
        Ok(deal)
    }

    fn parse_public_poly(deal: &Deal) -> Result<PublicPoly, Error> {
        let commits: Vec<G1Affine> = deal
            .commitments
            .iter()
            .map(|bytes| {
                let affine: Option<G1Affine> = G1Affine::from_compressed(bytes).into();
                affine.ok_or(Error::InvalidShare)
            })
            .collect::<Result<_, _>>()?;
        Ok(PublicPoly::from_commits(commits))
    }

    /// Processes a deal received from another member, returning this
    /// node's verdict. A malformed or unverifiable share is a
    /// [`Response::Complaint`], not an error: the deal itself was
    /// well-formed enough to reach a verdict about.
    pub fn receive_deal(&mut self, deal: Deal) -> Result<Response, Error> {
        self.require_phase(&[Phase::Idle, Phase::Dealing, Phase::Justifying])?;
        if self.deals.contains_key(&deal.dealer_index) {
            return Err(Error::Duplicate {
                kind: "deal",
                index: deal.dealer_index,
            });
        }
        self.group
            .by_index(deal.dealer_index)
            .ok_or(Error::NotAMember(deal.dealer_index))?;
        if deal.commitments.len() != self.group.threshold as usize {
            return Ok(Response::Complaint {
                reason: "commitment length does not match the group's threshold".into(),
            });
        }
        let public = match Self::parse_public_poly(&deal) {
            Ok(p) => p,
            Err(_) => {
                return Ok(Response::Complaint {
                    reason: "commitments do not decode to valid curve points".into(),
                })
            }
        };
        let sealed = match deal.shares.get(&self.my_index) {
            Some(s) => s,
            None => {
                return Ok(Response::Complaint {
                    reason: "no share was sealed for this recipient".into(),
                })
            }
        };
        let plaintext = match crypto_box::open(&self.x25519_secret, sealed) {
            Ok(p) => p,
            Err(_) => {
                return Ok(Response::Complaint {
                    reason: "share could not be decrypted".into(),
                })
            }
        };
        let scalar = match <[u8; 32]>::try_from(plaintext.as_slice()).ok().and_then(|b| Scalar::from_bytes_be(&b).into()) {
            Some(s) => s,
            None => {
                return Ok(Response::Complaint {
                    reason: "decrypted share is not a valid scalar".into(),
                })
            }
        };
        let expected = public.eval(self.my_index);
        let actual = (G1Projective::generator() * scalar).into();
        let verdict = if expected == actual {
            self.decrypted_shares.insert(deal.dealer_index, scalar);
            Response::Approval
        } else {
            Response::Complaint {
                reason: "share does not match the dealer's commitments".into(),
            }
        };
        self.deals.insert(deal.dealer_index, deal);
        if self.phase == Phase::Dealing {
            self.phase = Phase::Responding;
            self.responding_since = Some(Instant::now());
        }
        Ok(verdict)
    }

    /// Records another participant's verdict on a dealer's deal. A
    /// complaint moves the ceremony into `Justifying` until the dealer
    /// answers it (or the set is finalized without that dealer).
    pub fn record_response(&mut self, dealer_index: u32, responder_index: u32, response: Response) {
        if matches!(response, Response::Complaint { .. }) && matches!(self.phase, Phase::Dealing | Phase::Responding) {
            self.phase = Phase::Justifying;
        }
        self.responses
            .entry(dealer_index)
            .or_default()
            .insert(responder_index, response);
    }

    /// Called on the dealer accused by a complaint: reveals the exact
    /// share it sent the complainant so every other member can check it
    /// against the dealer's public commitments.
    pub fn justify(&mut self, responder_index: u32) -> Result<Justification, Error> {
        let poly = self.own_poly.as_ref().ok_or(Error::WrongPhase(self.phase))?;
        Ok(Justification {
            dealer_index: self.my_index,
            responder_index,
            share: poly.eval(responder_index).to_bytes_be(),
        })
    }

    /// Verifies a published justification against the accused dealer's
    /// commitments. An invalid justification permanently disqualifies
    /// the dealer; a valid one resolves the complaint.
    pub fn receive_justification(&mut self, justification: Justification) -> Result<(), Error> {
        let deal = self
            .deals
            .get(&justification.dealer_index)
            .ok_or(Error::NotAMember(justification.dealer_index))?;
        let public = Self::parse_public_poly(deal)?;
        let scalar: Option<Scalar> = Scalar::from_bytes_be(&justification.share).into();
        let scalar = scalar.ok_or(Error::InvalidShare)?;
        let expected = public.eval(justification.responder_index);
        let actual: G1Affine = (G1Projective::generator() * scalar).into();
        if expected != actual {
            self.disqualified.insert(justification.dealer_index);
            return Err(Error::InvalidShare);
        }
        self.responses
            .entry(justification.dealer_index)
            .or_default()
            .insert(justification.responder_index, Response::Approval);
        if justification.responder_index == self.my_index {
            self.decrypted_shares.insert(justification.dealer_index, scalar);
        }
        Ok(())
    }

    fn is_qualified(&self, dealer: u32) -> bool {
        if self.disqualified.contains(&dealer) || !self.deals.contains_key(&dealer) {
            return false;
        }
        match self.responses.get(&dealer) {
            None => true,
            Some(verdicts) => verdicts.values().all(|r| matches!(r, Response::Approval)),
        }
    }

    /// The set of dealers whose deals survived every complaint, sorted
    /// by index. Call once the response (and, if needed, justification)
    /// window has closed.
    pub fn qualified_set(&self) -> Vec<u32> {
        let mut q: Vec<u32> = self.deals.keys().copied().filter(|d| self.is_qualified(*d)).collect();
        q.sort_unstable();
        q
    }

    /// Derives this node's final share and the new group's public
    /// polynomial from the qualified set. Fresh ceremonies sum the
    /// qualified dealers' contributions directly (standard Pedersen
    /// DKG); resharing interpolates across the old committee's indices,
    /// which preserves the old distributed secret under a new
    /// polynomial of the new threshold.
    pub fn finalize(&mut self) -> Result<(Share, PublicPoly), Error> {
        self.require_phase(&[Phase::Dealing, Phase::Responding, Phase::Justifying])?;
        let q = self.qualified_set();
        let need = match &self.mode {
            Mode::Fresh => self.group.threshold as usize,
            Mode::Reshare { old_threshold, .. } => *old_threshold as usize,
        };
        if q.len() < need {
            self.phase = Phase::Aborted;
            return Err(Error::BelowThreshold { need, have: q.len() });
        }

        let (share, public) = match &self.mode {
            Mode::Fresh => {
                let scalar = q
                    .iter()
                    .fold(Scalar::from(0u64), |acc, d| acc + self.decrypted_shares[d]);
                let mut public: Option<PublicPoly> = None;
                for d in &q {
                    let dealer_public = Self::parse_public_poly(&self.deals[d])?;
                    public = Some(match public {
                        None => dealer_public,
                        Some(acc) => acc.add(&dealer_public)?,
                    });
                }
                (scalar, public.expect("qualified set is non-empty"))
            }
            Mode::Reshare { .. } => {
                let points: Vec<(u32, Scalar)> =
                    q.iter().map(|d| (*d, self.decrypted_shares[d])).collect();
                let scalar = interpolate_scalar(&points);
                let dealer_polys: Vec<(u32, PublicPoly)> = q
                    .iter()
                    .map(|d| Self::parse_public_poly(&self.deals[d]).map(|p| (*d, p)))
                    .collect::<Result<_, _>>()?;
                let public = interpolate_public_poly(&dealer_polys)?;
                (scalar, public)
            }
        };

        self.phase = Phase::Finished;
        Ok((
            Share {
                index: self.my_index,
                scalar: share,
            },
            public,
        ))
    }

    pub fn abort(&mut self) {
        self.phase = Phase::Aborted;
    }

    /// Moves a stalled ceremony to `Aborted` once `response_timeout` has
    /// elapsed in `Responding` without reaching the qualification
    /// threshold. A no-op outside `Responding` or before the threshold
    /// has had time to elapse. Returns `true` if the ceremony aborted.
    pub fn check_timeout(&mut self) -> bool {
        if self.phase != Phase::Responding {
            return false;
        }
        let Some(since) = self.responding_since else {
            return false;
        };
        if since.elapsed() < self.config.response_timeout {
            return false;
        }
        let need = match &self.mode {
            Mode::Fresh => self.group.threshold as usize,
            Mode::Reshare { old_threshold, .. } => *old_threshold as usize,
        };
        if self.qualified_set().len() >= need {
            return false;
        }
        self.phase = Phase::Aborted;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_crypto::SchemeId;
    use beacon_group::{Group, GroupDocument, Member};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn sample_group(n: u32, threshold: u32, keys: &[StaticSecret]) -> Arc<Group> {
        let members: Vec<Member> = (1..=n)
            .map(|i| Member {
                index: i,
                address: format!("node-{i}:9000"),
                public_key: PublicKey::from(&keys[(i - 1) as usize]).to_bytes().to_vec(),
                signing_key: vec![i as u8; 32],
            })
            .collect();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let placeholder_poly = beacon_crypto::Poly::random(threshold as usize - 1, &mut rng);
        let commits = placeholder_poly
            .commit()
            .commits()
            .iter()
            .map(|c| c.to_compressed().to_vec())
            .collect();
        let doc = GroupDocument {
            scheme: SchemeId::ChainedBls12381,
            period_secs: 3,
            genesis_time: 1_700_000_000,
            transition_time: None,
            threshold,
            members,
            public_key_commits: commits,
            genesis_seed: vec![0; 32],
            predecessor_hash: None,
        };
        Arc::new(Group::try_from(doc).unwrap())
    }

    fn run_fresh_dkg(n: u32, threshold: u32) -> (Vec<Participant>, Vec<(Share, PublicPoly)>) {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let keys: Vec<StaticSecret> = (0..n).map(|_| StaticSecret::random_from_rng(&mut rng)).collect();
        let group = sample_group(n, threshold, &keys);
        let mut participants: Vec<Participant> = (1..=n)
            .map(|i| {
                Participant::new(i, keys[(i - 1) as usize].clone(), group.clone(), Mode::Fresh, Config::default())
                    .unwrap()
            })
            .collect();

        let deals: Vec<Deal> = participants.iter_mut().map(|p| p.deal(&mut rng).unwrap()).collect();

        for deal in &deals {
            for p in participants.iter_mut() {
                if p.my_index == deal.dealer_index {
                    continue;
                }
                let response = p.receive_deal(deal.clone()).unwrap();
                assert!(matches!(response, Response::Approval));
            }
        }
        let results: Vec<(Share, PublicPoly)> = participants.iter_mut().map(|p| p.finalize().unwrap()).collect();
        (participants, results)
    }

    #[test]
    fn fresh_dkg_yields_a_consistent_public_key() {
        let (_participants, results) = run_fresh_dkg(4, 3);
        let public_key = results[0].1.public_key();
        for (_, public) in &results {
            assert_eq!(public.public_key(), public_key);
        }
        for (share, public) in &results {
            let expected = public.eval(share.index);
            let actual: G1Affine = (G1Projective::generator() * share.scalar).into();
            assert_eq!(expected, actual);
        }
    }

    #[test]
    fn below_threshold_qualified_set_aborts() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let keys: Vec<StaticSecret> = (0..4).map(|_| StaticSecret::random_from_rng(&mut rng)).collect();
        let group = sample_group(4, 3, &keys);
        let mut p = Participant::new(1, keys[0].clone(), group, Mode::Fresh, Config::default()).unwrap();
        p.deal(&mut rng).unwrap();
        assert!(matches!(
            p.finalize(),
            Err(Error::BelowThreshold { need: 3, have: 1 })
        ));
        assert_eq!(p.phase(), Phase::Aborted);
    }

    #[test]
    fn receiving_a_deal_enters_responding() {
        let mut rng = ChaCha8Rng::seed_from_u64(17);
        let keys: Vec<StaticSecret> = (0..3).map(|_| StaticSecret::random_from_rng(&mut rng)).collect();
        let group = sample_group(3, 2, &keys);
        let mut dealer = Participant::new(1, keys[0].clone(), group.clone(), Mode::Fresh, Config::default()).unwrap();
        let deal = dealer.deal(&mut rng).unwrap();

        let mut other = Participant::new(2, keys[1].clone(), group, Mode::Fresh, Config::default()).unwrap();
        other.deal(&mut rng).unwrap();
        assert_eq!(other.phase(), Phase::Dealing);
        other.receive_deal(deal).unwrap();
        assert_eq!(other.phase(), Phase::Responding);
    }

    #[test]
    fn response_timeout_aborts_below_threshold() {
        let mut rng = ChaCha8Rng::seed_from_u64(19);
        let keys: Vec<StaticSecret> = (0..4).map(|_| StaticSecret::random_from_rng(&mut rng)).collect();
        let group = sample_group(4, 3, &keys);
        let config = Config { response_timeout: Duration::from_millis(1) };

        let mut dealer = Participant::new(1, keys[0].clone(), group.clone(), Mode::Fresh, config.clone()).unwrap();
        let deal = dealer.deal(&mut rng).unwrap();

        let mut other = Participant::new(2, keys[1].clone(), group, Mode::Fresh, config).unwrap();
        other.deal(&mut rng).unwrap();
        other.receive_deal(deal).unwrap();
        assert_eq!(other.phase(), Phase::Responding);

        std::thread::sleep(Duration::from_millis(5));
        assert!(other.check_timeout());
        assert_eq!(other.phase(), Phase::Aborted);
    }

    #[test]
    fn invalid_justification_disqualifies_the_dealer() {
        let mut rng = ChaCha8Rng::seed_from_u64(13);
        let keys: Vec<StaticSecret> = (0..4).map(|_| StaticSecret::random_from_rng(&mut rng)).collect();
        let group = sample_group(4, 3, &keys);
        let mut dealer = Participant::new(1, keys[0].clone(), group.clone(), Mode::Fresh, Config::default()).unwrap();
        let deal = dealer.deal(&mut rng).unwrap();

        let mut victim = Participant::new(2, keys[1].clone(), group, Mode::Fresh, Config::default()).unwrap();
        let response = victim.receive_deal(deal.clone()).unwrap();
        assert!(matches!(response, Response::Approval));

        let forged = Justification {
            dealer_index: 1,
            responder_index: 2,
            share: [0xffu8; 32],
        };
        assert!(matches!(victim.receive_justification(forged), Err(Error::InvalidShare)));
    }
}
