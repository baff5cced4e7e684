//! Peer selection (§4.7): round-robin among committee members, biased
//! toward whichever peer was most recently seen at the highest round.
use std::collections::{BTreeMap, VecDeque};

use beacon_group::Group;

pub struct PeerSelector {
    order: VecDeque<u32>,
    hints: BTreeMap<u32, u64>,
}

impl PeerSelector {
    pub fn new(group: &Group, my_index: u32) -> Self {
        let order = group
            .members
            .iter()
            .map(|m| m.index)
            .filter(|&i| i != my_index)
            .collect();
        Self {
            order,
            hints: BTreeMap::new(),
        }
    }

    /// Records that `peer_index` was last observed at `round`.
    pub fn record_hint(&mut self, peer_index: u32, round: u64) {
        self.hints
            .entry(peer_index)
            .and_modify(|seen| *seen = (*seen).max(round))
            .or_insert(round);
    }

    /// The next peer to try: the highest-hinted peer not excluded,
    /// ties broken by plain round-robin order so that, absent any
    /// hints, every peer gets an equal turn.
    pub fn next(&mut self, exclude: &[u32]) -> Option<u32> {
        let max_hint = self
            .order
            .iter()
            .filter(|i| !exclude.contains(i))
            .map(|i| self.hints.get(i).copied().unwrap_or(0))
            .max()?;
        let pos = self
            .order
            .iter()
            .position(|i| !exclude.contains(i) && self.hints.get(i).copied().unwrap_or(0) == max_hint)?;
        let chosen = self.order.remove(pos)?;
        self.order.push_back(chosen);
        Some(chosen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_crypto::{Poly, SchemeId};
    use beacon_group::{GroupDocument, Member};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn sample_group() -> Group {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let poly = Poly::random(1, &mut rng);
        let commits = poly.commit().commits().iter().map(|c| c.to_compressed().to_vec()).collect();
        let members = (1..=4u32)
            .map(|i| Member {
                index: i,
                address: format!("node-{i}"),
                public_key: vec![i as u8; 32],
                signing_key: vec![i as u8 + 20; 32],
            })
            .collect();
        Group::try_from(GroupDocument {
            scheme: SchemeId::ChainedBls12381,
            period_secs: 1,
            genesis_time: 1,
            transition_time: None,
            threshold: 2,
            members,
            public_key_commits: commits,
            genesis_seed: vec![0; 32],
            predecessor_hash: None,
        })
        .unwrap()
    }

    #[test]
    fn prefers_the_peer_hinted_at_the_highest_round() {
        let group = sample_group();
        let mut selector = PeerSelector::new(&group, 1);
        selector.record_hint(3, 10);
        selector.record_hint(2, 5);
        assert_eq!(selector.next(&[]), Some(3));
    }

    #[test]
    fn round_robins_without_hints() {
        let group = sample_group();
        let mut selector = PeerSelector::new(&group, 1);
        let first = selector.next(&[]).unwrap();
        let second = selector.next(&[]).unwrap();
        assert_ne!(first, second);
    }
}
