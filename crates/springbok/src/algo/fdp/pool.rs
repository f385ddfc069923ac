//! Generation-checked object pool.
//!
//! Released slots keep their value (and its heap capacity) so the next `acquire` can reuse it
//! after [`Recycle::recycle`] has emptied it.

pub(crate) trait Recycle {
    fn recycle(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct PoolKey {
    index: u32,
    generation: u32,
}

#[derive(Debug, Clone)]
struct Slot<T> {
    generation: u32,
    live: bool,
    value: T,
}

#[derive(Debug, Clone)]
pub(crate) struct Pool<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
}

impl<T> Default for Pool<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }
}

impl<T: Default + Recycle> Pool<T> {
    pub(crate) fn acquire(&mut self) -> PoolKey {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.live = true;
            return PoolKey {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            live: true,
            value: T::default(),
        });
        PoolKey {
            index,
            generation: 0,
        }
    }

    pub(crate) fn get(&self, key: PoolKey) -> Option<&T> {
        self.slots
            .get(key.index as usize)
            .filter(|s| s.live && s.generation == key.generation)
            .map(|s| &s.value)
    }

    pub(crate) fn get_mut(&mut self, key: PoolKey) -> Option<&mut T> {
        self.slots
            .get_mut(key.index as usize)
            .filter(|s| s.live && s.generation == key.generation)
            .map(|s| &mut s.value)
    }

    /// Returns `false` for stale or unknown keys.
    #[cfg(test)]
    pub(crate) fn release(&mut self, key: PoolKey) -> bool {
        let Some(slot) = self.slots.get_mut(key.index as usize) else {
            return false;
        };
        if !slot.live || slot.generation != key.generation {
            return false;
        }
        Self::retire(slot);
        self.free.push(key.index);
        true
    }

    /// Releases every live slot. Storage is kept for reuse.
    pub(crate) fn clear(&mut self) {
        for (index, slot) in self.slots.iter_mut().enumerate().rev() {
            if slot.live {
                Self::retire(slot);
                self.free.push(index as u32);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn live(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn retire(slot: &mut Slot<T>) {
        slot.value.recycle();
        slot.live = false;
        slot.generation = slot.generation.wrapping_add(1);
    }
}
