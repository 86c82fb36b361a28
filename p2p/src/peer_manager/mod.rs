//! White/gray peer lists, connection-attempt weighting and the ban set.
//! Grounded on `original_source/lib/P2p/{Peerlist.h,PeerListManager.h}`.

use std::collections::HashSet;
use std::sync::RwLock;

use crate::protocol::commands::PeerlistEntry;

const DEFAULT_WHITE_LIST_CAP: usize = 1_000;
const DEFAULT_GRAY_LIST_CAP: usize = 5_000;

/// A size-bounded peer list pruned oldest-`last_seen`-first, mirroring
/// `Peerlist`'s `count`/`get`/`trim` surface.
pub struct Peerlist {
    entries: Vec<PeerlistEntry>,
    max_size: usize,
}

impl Peerlist {
    pub fn new(max_size: usize) -> Self {
        Peerlist { entries: Vec::new(), max_size }
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, index: usize) -> Option<&PeerlistEntry> {
        self.entries.get(index)
    }

    pub fn append(&mut self, entry: PeerlistEntry) {
        if let Some(existing) = self.entries.iter_mut().find(|e| e.peer_id == entry.peer_id) {
            *existing = entry;
        } else {
            self.entries.push(entry);
        }
        self.trim();
    }

    pub fn set_just_seen(&mut self, peer_id: u64, now: u64) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.peer_id == peer_id) {
            entry.last_seen = now;
        }
    }

    pub fn remove(&mut self, peer_id: u64) {
        self.entries.retain(|e| e.peer_id != peer_id);
    }

    /// Evicts the oldest-`last_seen` entries once over `max_size`.
    pub fn trim(&mut self) {
        if self.entries.len() <= self.max_size {
            return;
        }
        self.entries.sort_by_key(|e| std::cmp::Reverse(e.last_seen));
        self.entries.truncate(self.max_size);
    }

    pub fn head(&self, depth: usize) -> Vec<PeerlistEntry> {
        let mut sorted = self.entries.clone();
        sorted.sort_by_key(|e| std::cmp::Reverse(e.last_seen));
        sorted.into_iter().take(depth).collect()
    }
}

/// White (ping-confirmed) and gray (unverified) peer lists, a ban set
/// keyed by numeric IP, and the connection-attempt weighting that steers
/// most attempts toward the white list.
pub struct PeerManager {
    white: RwLock<Peerlist>,
    gray: RwLock<Peerlist>,
    banned: RwLock<HashSet<u32>>,
    white_list_weight_percent: u8,
}

impl PeerManager {
    pub fn new(white_list_weight_percent: u8) -> Self {
        PeerManager {
            white: RwLock::new(Peerlist::new(DEFAULT_WHITE_LIST_CAP)),
            gray: RwLock::new(Peerlist::new(DEFAULT_GRAY_LIST_CAP)),
            banned: RwLock::new(HashSet::new()),
            white_list_weight_percent,
        }
    }

    pub fn append_white(&self, entry: PeerlistEntry) {
        self.white.write().unwrap_or_else(|p| p.into_inner()).append(entry);
    }

    pub fn append_gray(&self, entry: PeerlistEntry) {
        self.gray.write().unwrap_or_else(|p| p.into_inner()).append(entry);
    }

    pub fn set_peer_just_seen(&self, peer_id: u64, now: u64) {
        self.white.write().unwrap_or_else(|p| p.into_inner()).set_just_seen(peer_id, now);
    }

    /// Demotes a peer that failed to respond: dropped from the white list
    /// (it's no longer ping-confirmed) rather than banned outright.
    pub fn set_peer_unreachable(&self, peer_id: u64) {
        self.white.write().unwrap_or_else(|p| p.into_inner()).remove(peer_id);
    }

    pub fn trim_white(&self) {
        self.white.write().unwrap_or_else(|p| p.into_inner()).trim();
    }

    pub fn trim_gray(&self) {
        self.gray.write().unwrap_or_else(|p| p.into_inner()).trim();
    }

    pub fn get_peerlist_head(&self, depth: usize) -> Vec<PeerlistEntry> {
        self.white.read().unwrap_or_else(|p| p.into_inner()).head(depth)
    }

    /// Merges a peer list snippet received from a peer: entries default
    /// to the gray list unless already ping-confirmed.
    pub fn merge_peerlist(&self, entries: Vec<PeerlistEntry>) {
        let white = self.white.read().unwrap_or_else(|p| p.into_inner());
        let already_white: HashSet<u64> = (0..white.count()).filter_map(|i| white.get(i).map(|e| e.peer_id)).collect();
        drop(white);
        let mut gray = self.gray.write().unwrap_or_else(|p| p.into_inner());
        for entry in entries {
            if !already_white.contains(&entry.peer_id) {
                gray.append(entry);
            }
        }
    }

    pub fn ban(&self, ip: u32) {
        self.banned.write().unwrap_or_else(|p| p.into_inner()).insert(ip);
    }

    pub fn unban(&self, ip: u32) {
        self.banned.write().unwrap_or_else(|p| p.into_inner()).remove(&ip);
    }

    pub fn is_banned(&self, ip: u32) -> bool {
        self.banned.read().unwrap_or_else(|p| p.into_inner()).contains(&ip)
    }

    /// Local, private and loopback ranges are rejected unless `allow_local`
    /// is set, matching the original's `is_ip_allowed` gating.
    pub fn is_ip_allowed(ip: std::net::Ipv4Addr, allow_local: bool) -> bool {
        if allow_local {
            return true;
        }
        !(ip.is_loopback() || ip.is_private() || ip.is_link_local() || ip.is_unspecified())
    }

    /// `true` when a connection attempt should target the white list,
    /// weighted by `white_list_weight_percent` (default 70%).
    pub fn should_prefer_white<R: rand::Rng>(&self, rng: &mut R) -> bool {
        rng.gen_range(0..100) < self.white_list_weight_percent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(peer_id: u64, last_seen: u64) -> PeerlistEntry {
        PeerlistEntry { ip: 0x0100007f, port: 18080, peer_id, last_seen }
    }

    #[test]
    fn trim_keeps_the_most_recently_seen() {
        let mut list = Peerlist::new(2);
        list.append(entry(1, 10));
        list.append(entry(2, 20));
        list.append(entry(3, 30));
        assert_eq!(list.count(), 2);
        assert!((0..list.count()).any(|i| list.get(i).unwrap().peer_id == 3));
    }

    #[test]
    fn ban_then_unban_round_trips() {
        let manager = PeerManager::new(70);
        manager.ban(0x0100007f);
        assert!(manager.is_banned(0x0100007f));
        manager.unban(0x0100007f);
        assert!(!manager.is_banned(0x0100007f));
    }

    #[test]
    fn loopback_is_disallowed_unless_explicitly_permitted() {
        let loopback = std::net::Ipv4Addr::new(127, 0, 0, 1);
        assert!(!PeerManager::is_ip_allowed(loopback, false));
        assert!(PeerManager::is_ip_allowed(loopback, true));
    }

    #[test]
    fn merge_peerlist_routes_unknown_peers_to_gray() {
        let manager = PeerManager::new(70);
        manager.merge_peerlist(vec![entry(9, 1)]);
        assert_eq!(manager.gray.read().unwrap().count(), 1);
    }
}
