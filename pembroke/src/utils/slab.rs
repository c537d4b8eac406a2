use std::mem::MaybeUninit;

/// A generation-checked index into a [`Slab`].
///
/// The generation is bumped every time a slot is vacated, so a key that
/// outlived its value never resolves to whatever was inserted into the same
/// slot afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct Key {
    index: usize,
    generation: u32,
}

/// A simple generational slab allocator.
///
/// A `Slab` stores values of type `T` in a contiguous array and
/// returns [`Key`]s whose slot can be reused after removal.
///
/// Internally, it keeps track of:
/// - initialized slots,
/// - free indices,
/// - the current generation of every slot,
/// - and uninitialized memory using [`MaybeUninit`].
///
/// # Safety
///
/// This type uses `unsafe` internally. Every access is guarded by the
/// `used` flag and the generation check, so stale keys are rejected
/// instead of reading uninitialized memory.
pub(crate) struct Slab<T> {
    /// Storage for items (may contain uninitialized slots).
    items: Vec<MaybeUninit<T>>,
    /// Stack of free indices that can be reused.
    free: Vec<usize>,
    /// Marks whether a slot is currently initialized.
    used: Vec<bool>,
    /// Generation of every slot.
    generations: Vec<u32>,
    /// Number of initialized slots.
    len: usize,
}

impl<T> Slab<T> {
    /// Creates a new `Slab` with a fixed initial capacity.
    ///
    /// All slots are initially free and uninitialized.
    ///
    /// # Arguments
    ///
    /// * `size` - Initial number of slots to allocate.
    pub(crate) fn new(size: usize) -> Self {
        let items = (0..size).map(|_| MaybeUninit::<T>::uninit()).collect();
        let free = (0..size).rev().collect();
        let used = vec![false; size];
        let generations = vec![0; size];

        Self {
            items,
            free,
            used,
            generations,
            len: 0,
        }
    }

    /// Inserts a value into the slab and returns its key.
    ///
    /// If a free slot is available, it is reused.
    /// Otherwise, the slab grows exponentially.
    pub(crate) fn insert(&mut self, item: T) -> Key {
        let index = if let Some(i) = self.free.pop() {
            i
        } else {
            let len = self.items.len();
            let new_len = if len == 0 { 1 } else { 2 * len };

            self.items
                .extend((len..new_len).map(|_| MaybeUninit::<T>::uninit()));
            self.free.extend(((len + 1)..new_len).rev());
            self.used.resize(new_len, false);
            self.generations.resize(new_len, 0);

            len
        };

        self.items[index] = MaybeUninit::new(item);
        self.used[index] = true;
        self.len += 1;

        Key {
            index,
            generation: self.generations[index],
        }
    }

    /// Returns `true` if `key` still refers to a live value.
    pub(crate) fn contains(&self, key: Key) -> bool {
        key.index < self.items.len()
            && self.used[key.index]
            && self.generations[key.index] == key.generation
    }

    /// Removes and returns the value stored under `key`.
    ///
    /// Returns `None` if the key is stale (already removed, or its slot has
    /// since been reused).
    pub(crate) fn remove(&mut self, key: Key) -> Option<T> {
        if !self.contains(key) {
            return None;
        }

        let index = key.index;
        self.free.push(index);
        self.used[index] = false;
        self.generations[index] = self.generations[index].wrapping_add(1);
        self.len -= 1;

        let item = unsafe { self.items[index].assume_init_read() };
        self.items[index] = MaybeUninit::uninit();

        Some(item)
    }

    /// Returns a reference to the value stored under `key`, if it is live.
    pub(crate) fn get(&self, key: Key) -> Option<&T> {
        if !self.contains(key) {
            return None;
        }

        Some(unsafe { self.items[key.index].assume_init_ref() })
    }

    /// Number of live values.
    pub(crate) fn len(&self) -> usize {
        self.len
    }
}

impl<T> Drop for Slab<T> {
    /// Drops all initialized elements stored in the slab.
    ///
    /// Uninitialized slots are ignored.
    fn drop(&mut self) {
        for (slot, &used) in self.items.iter_mut().zip(self.used.iter()) {
            if used {
                unsafe {
                    slot.assume_init_drop();
                }
            }
        }
    }
}
