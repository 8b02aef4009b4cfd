//! Open-addressed hash table keyed by short strings, used for texture and
//! material name lookup.
//!
//! Ported from the algorithm in `unordered_roadmap.c` ("URMOM = Unordered
//! RoadMap Open addressiMg"): linear probing, `state`/`hash` slot headers
//! (`occupied`, `empty`, `deleted`), and "empty terminates the probe chain"
//! so deleted slots don't need tombstone cleanup to stay correct.

const FNV_OFFSET_32: u32 = 0x811c_9dc5;
const FNV_PRIME_32: u32 = 0x0100_0193;

fn fnv1a(bytes: &[u8]) -> u32 {
    let mut hash = FNV_OFFSET_32;
    for &b in bytes {
        hash ^= b as u32;
        hash = hash.wrapping_mul(FNV_PRIME_32);
    }
    hash
}

/// Case sensitivity of key comparison and hashing.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum KeyMode {
    Sensitive,
    Insensitive,
}

fn to_hash_byte(mode: KeyMode, b: u8) -> u8 {
    match mode {
        KeyMode::Sensitive => b,
        // matches `*str & 0xdf`: upper-cases ascii letters, leaves others alone
        KeyMode::Insensitive => b & 0xdf,
    }
}

fn hash_key(mode: KeyMode, key: &str) -> u32 {
    let mut hash = FNV_OFFSET_32;
    for &b in key.as_bytes() {
        hash ^= to_hash_byte(mode, b) as u32;
        hash = hash.wrapping_mul(FNV_PRIME_32);
    }
    hash & 0x7fff_ffff
}

fn same_key(mode: KeyMode, a: &str, b: &str) -> bool {
    match mode {
        KeyMode::Sensitive => a == b,
        KeyMode::Insensitive => a.eq_ignore_ascii_case(b),
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum SlotState {
    Empty,
    Occupied,
    Deleted,
}

struct Slot<V> {
    state: SlotState,
    hash: u32,
    key: String,
    value: Option<V>,
}

impl<V> Slot<V> {
    fn empty() -> Self {
        Self { state: SlotState::Empty, hash: 0, key: String::new(), value: None }
    }
}

/// Result of [`OpenTable::insert`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct InsertOutcome {
    pub index: usize,
    pub created: bool,
}

/// Fixed-capacity open-addressing hash table. Capacity must be a power of
/// two (asserted at construction) so probing can mask instead of modulo.
pub struct OpenTable<V> {
    slots: Vec<Slot<V>>,
    mask: u32,
    mode: KeyMode,
    len: usize,
}

impl<V> OpenTable<V> {
    pub fn new(capacity: usize, mode: KeyMode) -> Self {
        assert!(capacity.is_power_of_two(), "OpenTable capacity must be a power of two");
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, Slot::empty);
        Self { slots, mask: (capacity - 1) as u32, mode, len: 0 }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the index of `key` if present.
    pub fn find(&self, key: &str) -> Option<usize> {
        let hash = hash_key(self.mode, key);
        let start = (hash & self.mask) as usize;
        let mut index = start;
        loop {
            let slot = &self.slots[index];
            match slot.state {
                SlotState::Occupied => {
                    if slot.hash == hash && same_key(self.mode, key, &slot.key) {
                        return Some(index);
                    }
                }
                SlotState::Empty => return None,
                SlotState::Deleted => {}
            }
            index = (index + 1) & self.mask as usize;
            if index == start {
                return None;
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.find(key).and_then(|i| self.slots[i].value.as_ref())
    }

    /// Inserts `key` -> `value`. If `key` already exists, its value is left
    /// untouched and `created` is `false` (matching `urmomInsert`, which
    /// returns the existing index rather than overwriting).
    pub fn insert(&mut self, key: &str, value: V) -> InsertOutcome {
        let hash = hash_key(self.mode, key);
        let start = (hash & self.mask) as usize;
        let mut index = start;
        let mut first_available: Option<usize> = None;
        loop {
            let slot = &self.slots[index];
            match slot.state {
                SlotState::Occupied => {
                    if slot.hash == hash && same_key(self.mode, key, &slot.key) {
                        return InsertOutcome { index, created: false };
                    }
                }
                SlotState::Empty => {
                    if first_available.is_none() {
                        first_available = Some(index);
                    }
                    break;
                }
                SlotState::Deleted => {
                    if first_available.is_none() {
                        first_available = Some(index);
                    }
                }
            }
            index = (index + 1) & self.mask as usize;
            if index == start {
                break;
            }
        }

        let Some(free_index) = first_available else {
            // Table is full of occupied/deleted slots with no empty terminator.
            return InsertOutcome { index: usize::MAX, created: false };
        };

        let slot = &mut self.slots[free_index];
        slot.state = SlotState::Occupied;
        slot.hash = hash;
        slot.key = key.to_owned();
        slot.value = Some(value);
        self.len += 1;
        InsertOutcome { index: free_index, created: true }
    }

    /// Removes `key`, returning its value if present.
    pub fn remove(&mut self, key: &str) -> Option<V> {
        let index = self.find(key)?;
        Some(self.remove_at(index))
    }

    pub fn remove_at(&mut self, index: usize) -> V {
        let slot = &mut self.slots[index];
        debug_assert_eq!(slot.state, SlotState::Occupied);
        slot.state = SlotState::Deleted;
        slot.hash = 1; // deleted, not empty: distinguishes from a never-used slot
        slot.key.clear();
        self.len -= 1;
        slot.value.take().expect("occupied slot always carries a value")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_must_be_power_of_two() {
        let table: OpenTable<i32> = OpenTable::new(16, KeyMode::Sensitive);
        assert_eq!(table.capacity(), 16);
    }

    #[test]
    #[should_panic]
    fn non_power_of_two_capacity_panics() {
        let _: OpenTable<i32> = OpenTable::new(15, KeyMode::Sensitive);
    }

    #[test]
    fn insert_then_find_returns_same_index() {
        let mut table = OpenTable::new(16, KeyMode::Sensitive);
        let first = table.insert("textures/wall01", 1);
        assert!(first.created);
        let found = table.find("textures/wall01").unwrap();
        assert_eq!(found, first.index);

        let second = table.insert("textures/wall01", 2);
        assert!(!second.created);
        assert_eq!(second.index, first.index);
    }

    #[test]
    fn remove_then_find_returns_none() {
        let mut table = OpenTable::new(16, KeyMode::Sensitive);
        table.insert("a", 1);
        assert!(table.remove("a").is_some());
        assert!(table.find("a").is_none());
    }

    #[test]
    fn case_insensitive_variant_ignores_ascii_case() {
        let mut table = OpenTable::new(16, KeyMode::Insensitive);
        table.insert("Water01", 7);
        assert_eq!(*table.get("WATER01").unwrap(), 7);
        assert_eq!(*table.get("water01").unwrap(), 7);
    }

    #[test]
    fn colliding_keys_are_both_findable_and_independently_removable() {
        // Capacity 4 forces a collision quickly: search for two keys that
        // land in the same starting bucket.
        let mut table: OpenTable<i32> = OpenTable::new(4, KeyMode::Sensitive);
        let mut a = None;
        let mut b = None;
        for i in 0..10_000u32 {
            let key = format!("k{i}");
            let start = (hash_key(KeyMode::Sensitive, &key) & table.mask) as usize;
            if a.is_none() {
                a = Some((key, start));
            } else if let Some((_, a_start)) = &a {
                if *a_start == start && b.is_none() {
                    b = Some((key, start));
                    break;
                }
            }
        }
        let (key_a, _) = a.unwrap();
        let (key_b, _) = b.unwrap();

        table.insert(&key_a, 1);
        table.insert(&key_b, 2);
        assert!(table.find(&key_a).is_some());
        assert!(table.find(&key_b).is_some());

        table.remove(&key_a);
        assert!(table.find(&key_a).is_none());
        assert!(table.find(&key_b).is_some());
    }
}
