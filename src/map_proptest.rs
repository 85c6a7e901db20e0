#![cfg(test)]

// Property tests for HybridMap kept inside the crate so they can run the
// structural invariant checker after every operation.

use crate::{HybridMap, KeyOrder, MapBuilder, Natural, Unordered};
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::hash::{BuildHasher, Hasher};

// Key newtype with Borrow<str> to exercise borrowed lookup.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
struct Key(String);
impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
impl std::borrow::Borrow<str> for Key {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// Pool-indexed operations to improve shrinking: indices shrink to earlier keys,
// pool length shrinks, and op lists shrink in length.
#[derive(Clone, Debug)]
enum OpI {
    Insert(usize, i32),
    InsertIfAbsent(usize, i32),
    Remove(usize),
    RemoveIfEven(usize),
    Get(usize),
    Contains(String),
    Mutate(usize, i32),
    ComputeIfPresent(usize, i32),
    Merge(usize, i32),
    RetainOdd,
    CursorRemove(usize),
    Iterate,
}

fn key_from(pool: &[String], i: usize) -> Key {
    Key(pool[i].clone())
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<OpI>)> {
    proptest::collection::vec("[a-z]{0,5}", 1..=24).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let contains_pool = proptest::sample::select(pool.clone());
        let op = prop_oneof![
            6 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Insert(i, v)),
            2 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::InsertIfAbsent(i, v)),
            3 => idx.clone().prop_map(OpI::Remove),
            1 => idx.clone().prop_map(OpI::RemoveIfEven),
            2 => idx.clone().prop_map(OpI::Get),
            1 => prop_oneof![
                contains_pool.prop_map(|s: String| s),
                "[a-z]{0,5}".prop_map(|s| s)
            ]
            .prop_map(OpI::Contains),
            1 => (idx.clone(), any::<i32>()).prop_map(|(i, d)| OpI::Mutate(i, d)),
            1 => (idx.clone(), -3i32..3).prop_map(|(i, d)| OpI::ComputeIfPresent(i, d)),
            1 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Merge(i, v)),
            1 => Just(OpI::RetainOdd),
            1 => idx.clone().prop_map(OpI::CursorRemove),
            1 => Just(OpI::Iterate),
        ];
        proptest::collection::vec(op, 1..120).prop_map(move |ops| (pool.clone(), ops))
    })
}

// Drives `sut` and a std HashMap model through the same operations.
// Invariants exercised after every op:
// - lookups, `len` and `is_empty` agree with the model;
// - bucket placement, list/tree representation and red-black properties
//   hold (`check_invariants`);
// - iteration yields each live entry exactly once.
fn run<S, O>(mut sut: HybridMap<Key, i32, S, O>, pool: &[String], ops: Vec<OpI>) -> Result<(), TestCaseError>
where
    S: BuildHasher,
    O: KeyOrder<Key> + KeyOrder<str>,
{
    let mut model: HashMap<Key, i32> = HashMap::new();
    for op in ops {
        match op {
            OpI::Insert(i, v) => {
                let k = key_from(pool, i);
                prop_assert_eq!(sut.insert(k.clone(), v), model.insert(k, v));
            }
            OpI::InsertIfAbsent(i, v) => {
                let k = key_from(pool, i);
                let existing = model.get(&k).copied();
                prop_assert_eq!(sut.insert_if_absent(k.clone(), v).copied(), existing);
                model.entry(k).or_insert(v);
            }
            OpI::Remove(i) => {
                let k = key_from(pool, i);
                prop_assert_eq!(sut.remove(&k), model.remove(&k));
            }
            OpI::RemoveIfEven(i) => {
                let k = key_from(pool, i);
                let expected = if model.get(&k).is_some_and(|v| v % 2 == 0) {
                    model.remove(&k)
                } else {
                    None
                };
                prop_assert_eq!(sut.remove_if(&k, |v| v % 2 == 0), expected);
            }
            OpI::Get(i) => {
                let k = key_from(pool, i);
                prop_assert_eq!(sut.get(pool[i].as_str()), model.get(&k));
                prop_assert_eq!(sut.contains_key(&k), model.contains_key(&k));
            }
            OpI::Contains(s) => {
                let has_model = model.keys().any(|k| k.0 == s);
                prop_assert_eq!(sut.contains_key(s.as_str()), has_model);
            }
            OpI::Mutate(i, d) => {
                let k = key_from(pool, i);
                if let Some(vr) = sut.get_mut(&k) {
                    *vr = vr.saturating_add(d);
                }
                if let Some(mv) = model.get_mut(&k) {
                    *mv = mv.saturating_add(d);
                }
            }
            OpI::ComputeIfPresent(i, d) => {
                let k = key_from(pool, i);
                let f = |v: &i32| if d == 0 { None } else { Some(v.saturating_add(d)) };
                let expected = match model.get(&k).copied() {
                    Some(v) => match f(&v) {
                        Some(nv) => {
                            model.insert(k.clone(), nv);
                            Some(nv)
                        }
                        None => {
                            model.remove(&k);
                            None
                        }
                    },
                    None => None,
                };
                prop_assert_eq!(sut.compute_if_present(&k, |_, v| f(v)).copied(), expected);
            }
            OpI::Merge(i, v) => {
                let k = key_from(pool, i);
                let merged = match model.get(&k) {
                    Some(old) => old.wrapping_add(v),
                    None => v,
                };
                model.insert(k.clone(), merged);
                prop_assert_eq!(sut.merge(k, v, |a, b| Some(a.wrapping_add(b))).copied(), Some(merged));
            }
            OpI::RetainOdd => {
                sut.retain(|_, v| *v % 2 != 0);
                model.retain(|_, v| *v % 2 != 0);
            }
            OpI::CursorRemove(i) => {
                let target = key_from(pool, i);
                let mut cursor = sut.cursor();
                let mut removed = None;
                let mut visited = 0;
                loop {
                    let step = cursor.next(&sut);
                    prop_assert!(step.is_ok(), "cursor failed without outside changes");
                    let Ok(Some((k, _))) = step else { break };
                    visited += 1;
                    if *k == target {
                        removed = cursor.remove(&mut sut).ok().map(|(_, v)| v);
                    }
                }
                prop_assert_eq!(visited, model.len());
                prop_assert_eq!(removed, model.remove(&target));
            }
            OpI::Iterate => {
                let s_keys: BTreeSet<_> = sut.keys().cloned().collect();
                let m_keys: BTreeSet<_> = model.keys().cloned().collect();
                prop_assert_eq!(s_keys, m_keys);
                let s_pairs: BTreeMap<_, _> = sut.iter().map(|(k, v)| (k.clone(), *v)).collect();
                prop_assert_eq!(s_pairs.len(), sut.len());
            }
        }

        prop_assert_eq!(sut.check_invariants(), Ok(()));
        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
    }
    for (k, v) in &model {
        prop_assert_eq!(sut.get(k), Some(v));
    }
    Ok(())
}

// Property: State-machine equivalence against std::collections::HashMap.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        let sut: HybridMap<Key, i32> = HybridMap::new();
        run(sut, &pool, ops)?;
    }
}

// Collision variant using a constant hasher to push every key into one
// bucket. Starting at 64 buckets lets that bucket become a tree.
#[derive(Clone, Default)]
struct ConstBuildHasher;
struct ConstHasher;
impl BuildHasher for ConstBuildHasher {
    type Hasher = ConstHasher;
    fn build_hasher(&self) -> Self::Hasher {
        ConstHasher
    }
}
impl Hasher for ConstHasher {
    fn write(&mut self, _bytes: &[u8]) {}
    fn finish(&self) -> u64 {
        0
    }
}

// Four distinct hashes that separate only as the table grows past 16 buckets,
// so chains split on resize and trees hold hash ties.
#[derive(Clone, Default)]
struct LowBitsBuildHasher;
struct LowBitsHasher(u64);
impl BuildHasher for LowBitsBuildHasher {
    type Hasher = LowBitsHasher;
    fn build_hasher(&self) -> Self::Hasher {
        LowBitsHasher(0)
    }
}
impl Hasher for LowBitsHasher {
    fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 = self.0.wrapping_add(u64::from(b));
        }
    }
    fn finish(&self) -> u64 {
        (self.0 & 0x3) << 4
    }
}

fn collision_map<S, O>(hasher: S, order: O) -> HybridMap<Key, i32, S, O> {
    MapBuilder::new()
        .initial_capacity(64)
        .key_order(order)
        .build_with_hasher(hasher)
        .expect("valid configuration")
}

// Property: Same state machine under worst-case collisions. With `Natural`
// the tree orders ties by key; with `Unordered` lookups must search both
// subtrees of every tie.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        run(collision_map(ConstBuildHasher, Natural), &pool, ops)?;
    }

    #[test]
    fn prop_state_machine_with_unordered_collisions((pool, ops) in arb_scenario()) {
        run(collision_map(ConstBuildHasher, Unordered), &pool, ops)?;
    }

    #[test]
    fn prop_state_machine_with_partial_collisions((pool, ops) in arb_scenario()) {
        let sut: HybridMap<Key, i32, _, Natural> = MapBuilder::new()
            .natural_order()
            .build_with_hasher(LowBitsBuildHasher)
            .expect("valid configuration");
        run(sut, &pool, ops)?;
    }
}
