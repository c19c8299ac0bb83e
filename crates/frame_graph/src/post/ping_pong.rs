//! Ping-pong texture pair

/// Two equally sized targets alternating between read source and write
/// target.
///
/// A stage reads [`PingPong::current`], writes [`PingPong::previous`] and
/// then calls [`PingPong::swap`] so the next stage reads its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingPong<T: Copy> {
    current: T,
    previous: T,
    swaps: u32,
}

impl<T: Copy> PingPong<T> {
    /// Pair whose current side holds the chain input
    pub fn new(current: T, previous: T) -> Self {
        Self { current, previous, swaps: 0 }
    }

    /// Latest output, read by the next stage
    pub fn current(&self) -> T {
        self.current
    }

    /// The other side, written by the next stage
    pub fn previous(&self) -> T {
        self.previous
    }

    /// Make the side just written the current one
    pub fn swap(&mut self) {
        std::mem::swap(&mut self.current, &mut self.previous);
        self.swaps += 1;
    }

    /// Swaps since construction
    pub fn swap_count(&self) -> u32 {
        self.swaps
    }
}
