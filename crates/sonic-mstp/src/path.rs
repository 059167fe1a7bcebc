//! Shortest-path search over the non-blocked topology of one VLAN.

use crate::types::{BridgeId, GlobalPortStates, PortRole, VlanId};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Finds the shortest hop path from `src` to `dst` in `vlan_id`.
///
/// A link `(u, v)` is usable only if `u` reports its port toward `v` as not
/// blocked and `v` reports its port toward `u` as not blocked. Anything the
/// snapshot does not mention counts as blocked. Neighbors are explored in
/// ascending id order, so ties between equal-length paths resolve
/// deterministically.
///
/// Returns `None` when `dst` is unreachable.
pub fn find_path(
    src: &BridgeId,
    dst: &BridgeId,
    vlan_id: VlanId,
    snapshot: &GlobalPortStates,
) -> Option<Vec<BridgeId>> {
    if snapshot.is_empty() {
        return None;
    }

    let adjacency = usable_links(vlan_id, snapshot);
    if !adjacency.contains_key(dst) {
        return None;
    }

    let mut queue = VecDeque::from([vec![src.clone()]]);
    let mut visited = BTreeSet::from([src.clone()]);

    while let Some(path) = queue.pop_front() {
        let Some(node) = path.last() else {
            continue;
        };
        if node == dst {
            return Some(path);
        }

        for &neighbor in adjacency.get(node).into_iter().flatten() {
            if visited.insert(neighbor.clone()) {
                let mut next = path.clone();
                next.push(neighbor.clone());
                queue.push_back(next);
            }
        }
    }

    None
}

/// Builds the undirected adjacency of links neither end reports blocked.
fn usable_links(
    vlan_id: VlanId,
    snapshot: &GlobalPortStates,
) -> BTreeMap<&BridgeId, BTreeSet<&BridgeId>> {
    let mut adjacency: BTreeMap<&BridgeId, BTreeSet<&BridgeId>> = BTreeMap::new();

    for (node, vlans) in snapshot {
        let Some(roles) = vlans.get(&vlan_id) else {
            continue;
        };

        for (neighbor, role) in roles {
            let Some((neighbor, _)) = snapshot.get_key_value(neighbor) else {
                continue;
            };

            let reverse = snapshot
                .get(neighbor)
                .and_then(|vlans| vlans.get(&vlan_id))
                .and_then(|roles| roles.get(node))
                .copied()
                .unwrap_or(PortRole::Blocked);

            if role.is_forwarding() && reverse.is_forwarding() {
                adjacency.entry(node).or_default().insert(neighbor);
                adjacency.entry(neighbor).or_default().insert(node);
            }
        }
    }

    adjacency
}
