//! Per-frame resource pool

/// Resources indexed by (frame in flight, batch index).
///
/// Growth is append-only: asking for an index past the end creates the
/// missing entries, and nothing is released until [`FrameResourcePool::drain`].
/// Reusing a frame's entries next time it comes around is the caller's reset.
#[derive(Debug, Clone)]
pub struct FrameResourcePool<T> {
    frames: Vec<Vec<T>>,
}

impl<T> Default for FrameResourcePool<T> {
    fn default() -> Self {
        Self { frames: Vec::new() }
    }
}

impl<T> FrameResourcePool<T> {
    /// Empty pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry for `(frame, index)`, creating every missing entry up to it with `create`
    pub fn get_or_try_insert_with<E>(
        &mut self,
        frame: usize,
        index: usize,
        mut create: impl FnMut() -> Result<T, E>,
    ) -> Result<&mut T, E> {
        if self.frames.len() <= frame {
            self.frames.resize_with(frame + 1, Vec::new);
        }
        let entries = &mut self.frames[frame];
        while entries.len() <= index {
            entries.push(create()?);
        }
        Ok(&mut entries[index])
    }

    /// Existing entry
    pub fn get(&self, frame: usize, index: usize) -> Option<&T> {
        self.frames.get(frame).and_then(|entries| entries.get(index))
    }

    /// Entries allocated for a frame
    pub fn len(&self, frame: usize) -> usize {
        self.frames.get(frame).map_or(0, Vec::len)
    }

    /// Entries across all frames
    pub fn total(&self) -> usize {
        self.frames.iter().map(Vec::len).sum()
    }

    /// Whether nothing was allocated
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Remove and return every entry
    pub fn drain(&mut self) -> Vec<T> {
        self.frames.drain(..).flatten().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_growth_is_lazy_and_idempotent() {
        let mut pool: FrameResourcePool<u32> = FrameResourcePool::new();
        let mut created = 0;

        for _ in 0..3 {
            pool.get_or_try_insert_with(1, 2, || {
                created += 1;
                Ok::<_, ()>(created)
            })
            .unwrap();
        }

        assert_eq!(created, 3);
        assert_eq!(pool.len(1), 3);
        assert_eq!(pool.len(0), 0);
        assert_eq!(pool.get(1, 2), Some(&3));
    }

    #[test]
    fn test_creation_error_propagates() {
        let mut pool: FrameResourcePool<u32> = FrameResourcePool::new();
        let result = pool.get_or_try_insert_with(0, 0, || Err("out of memory"));
        assert_eq!(result, Err("out of memory"));
        assert!(pool.is_empty());
    }

    #[test]
    fn test_drain_releases_everything() {
        let mut pool: FrameResourcePool<u32> = FrameResourcePool::new();
        pool.get_or_try_insert_with(0, 1, || Ok::<_, ()>(7)).unwrap();
        pool.get_or_try_insert_with(2, 0, || Ok::<_, ()>(9)).unwrap();
        assert_eq!(pool.drain(), vec![7, 7, 9]);
        assert_eq!(pool.total(), 0);
    }
}
