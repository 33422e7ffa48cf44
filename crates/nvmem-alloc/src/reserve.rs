use std::collections::BTreeMap;

use crate::types::{Dimm, CHANNELS_PER_IMC};

/// Picks the module to set aside for storage when a request reserves one.
///
/// The module that would hurt interleaving the most is preferred, in order:
/// 1. the only module on its memory controller while another controller is fully populated
/// 2. a module without a channel partner on the other controller
/// 3. the single module whose capacity differs from the rest of its socket
/// 4. the smallest module on a socket with mixed capacities
/// 5. the first module
pub struct ReserveDimmSelector<'a> {
    sockets: BTreeMap<u16, Vec<&'a Dimm>>,
}

impl<'a> ReserveDimmSelector<'a> {
    pub fn new(dimms: &'a [Dimm]) -> Self {
        let mut sockets: BTreeMap<u16, Vec<&'a Dimm>> = BTreeMap::new();
        for dimm in dimms {
            sockets.entry(dimm.socket_id).or_default().push(dimm);
        }
        Self { sockets }
    }

    pub fn select(&self) -> Option<&'a Dimm> {
        self.first_socket_match(alone_on_memory_controller)
            .or_else(|| self.first_socket_match(without_channel_partner))
            .or_else(|| self.first_socket_match(differently_sized))
            .or_else(|| self.first_socket_match(smallest_of_mixed_sizes))
            .or_else(|| self.sockets.values().next().and_then(|dimms| dimms.first().copied()))
    }

    fn first_socket_match(
        &self,
        pick: impl Fn(&[&'a Dimm]) -> Option<&'a Dimm>,
    ) -> Option<&'a Dimm> {
        self.sockets.values().find_map(|dimms| pick(dimms.as_slice()))
    }
}

fn group_by<'a, K: Ord>(dimms: &[&'a Dimm], key: impl Fn(&Dimm) -> K) -> BTreeMap<K, Vec<&'a Dimm>> {
    let mut groups: BTreeMap<K, Vec<&'a Dimm>> = BTreeMap::new();
    for dimm in dimms {
        groups.entry(key(*dimm)).or_default().push(*dimm);
    }
    groups
}

fn singletons<'a, K>(groups: &BTreeMap<K, Vec<&'a Dimm>>) -> Vec<&'a Dimm> {
    groups
        .values()
        .filter(|group| group.len() == 1)
        .map(|group| group[0])
        .collect()
}

fn alone_on_memory_controller<'a>(dimms: &[&'a Dimm]) -> Option<&'a Dimm> {
    let by_imc = group_by(dimms, |dimm| dimm.memory_controller_id);
    let isolated = singletons(&by_imc);
    let fully_populated = by_imc
        .values()
        .any(|group| group.len() == CHANNELS_PER_IMC as usize);
    if isolated.len() == 1 && fully_populated {
        return Some(isolated[0]);
    }
    None
}

fn without_channel_partner<'a>(dimms: &[&'a Dimm]) -> Option<&'a Dimm> {
    let by_channel = group_by(dimms, Dimm::channel_group);
    singletons(&by_channel).first().copied()
}

fn differently_sized<'a>(dimms: &[&'a Dimm]) -> Option<&'a Dimm> {
    let by_capacity = group_by(dimms, |dimm| dimm.capacity_bytes);
    let unique = singletons(&by_capacity);
    if unique.len() == 1 {
        return Some(unique[0]);
    }
    None
}

fn smallest_of_mixed_sizes<'a>(dimms: &[&'a Dimm]) -> Option<&'a Dimm> {
    let by_capacity = group_by(dimms, |dimm| dimm.capacity_bytes);
    if by_capacity.len() < 2 {
        return None;
    }
    by_capacity
        .values()
        .next()
        .and_then(|group| group.first().copied())
}
