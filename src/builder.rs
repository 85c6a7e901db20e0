//! `MapBuilder`: validated construction of a configured `HybridMap`.

use crate::error::MapError;
use crate::hooks::NoHooks;
use crate::map::HybridMap;
use crate::order::{Natural, Unordered};
use crate::table::{check_capacity, RawTable, DEFAULT_LOAD_FACTOR};

use hashbrown::hash_map::DefaultHashBuilder;
use std::marker::PhantomData;

/// Builds a [`HybridMap`] with various configuration knobs.
///
/// # Examples
///
/// ```rust
/// use hybrid_hashmap::{HybridMap, MapBuilder};
///
/// let mut map = MapBuilder::new()
///     // First allocation holds 1024 buckets.
///     .initial_capacity(1_000)
///     // Resize once the map is half full.
///     .load_factor(0.5)
///     // Colliding keys are ordered by `Ord` inside tree buckets.
///     .natural_order()
///     .build()
///     .unwrap();
///
/// map.insert("zero", 0);
/// assert_eq!(map.get("zero"), Some(&0));
/// assert_eq!(map.load_factor(), 0.5);
/// ```
pub struct MapBuilder<K, V, O = Unordered, H = NoHooks> {
    initial_capacity: Option<usize>,
    load_factor: f32,
    order: O,
    hooks: H,
    map_type: PhantomData<fn() -> (K, V)>,
}

impl<K, V> MapBuilder<K, V> {
    /// Construct a new `MapBuilder` with the default load factor (0.75) and
    /// a lazily allocated 16-bucket table.
    pub fn new() -> Self {
        Self {
            initial_capacity: None,
            load_factor: DEFAULT_LOAD_FACTOR,
            order: Unordered,
            hooks: NoHooks,
            map_type: PhantomData,
        }
    }
}

impl<K, V> Default for MapBuilder<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, O, H> MapBuilder<K, V, O, H> {
    /// Sets the initial capacity of the map. It is rounded up to a power of
    /// two when the table is first allocated.
    pub fn initial_capacity(self, capacity: usize) -> Self {
        Self {
            initial_capacity: Some(capacity),
            ..self
        }
    }

    /// Sets the load factor: the table doubles once `len` exceeds
    /// `capacity * load_factor`.
    pub fn load_factor(self, load_factor: f32) -> Self {
        Self { load_factor, ..self }
    }

    /// Order colliding keys by their `Ord` implementation inside tree
    /// buckets.
    pub fn natural_order(self) -> MapBuilder<K, V, Natural, H> {
        self.key_order(Natural)
    }

    /// Sets the tie-break ordering used inside tree buckets.
    pub fn key_order<O2>(self, order: O2) -> MapBuilder<K, V, O2, H> {
        MapBuilder {
            initial_capacity: self.initial_capacity,
            load_factor: self.load_factor,
            order,
            hooks: self.hooks,
            map_type: PhantomData,
        }
    }

    /// Sets the entry lifecycle callbacks.
    pub fn hooks<H2>(self, hooks: H2) -> MapBuilder<K, V, O, H2> {
        MapBuilder {
            initial_capacity: self.initial_capacity,
            load_factor: self.load_factor,
            order: self.order,
            hooks,
            map_type: PhantomData,
        }
    }

    /// Builds a `HybridMap<K, V>` with the default hasher.
    ///
    /// # Errors
    ///
    /// [`MapError::InvalidLoadFactor`] for a load factor that is not positive
    /// and finite, [`MapError::CapacityOverflow`] for an initial capacity
    /// above the maximum table size.
    pub fn build(self) -> Result<HybridMap<K, V, DefaultHashBuilder, O, H>, MapError> {
        self.build_with_hasher(DefaultHashBuilder::default())
    }

    /// Builds a `HybridMap<K, V, S>` with the given `hasher`.
    ///
    /// # Errors
    ///
    /// Same as [`build`](Self::build).
    pub fn build_with_hasher<S>(self, hasher: S) -> Result<HybridMap<K, V, S, O, H>, MapError> {
        if !(self.load_factor > 0.0 && self.load_factor.is_finite()) {
            return Err(MapError::InvalidLoadFactor(self.load_factor));
        }
        let initial_capacity = self.initial_capacity.map(check_capacity).transpose()?;
        let table = RawTable::new(initial_capacity, self.load_factor);
        Ok(HybridMap::from_parts(table, hasher, self.order, self.hooks))
    }
}
