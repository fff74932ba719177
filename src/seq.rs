//! Sequence-number arithmetic in a finite modular space.
//!
//! Sequence numbers live in `[0, N)` and wrap after `N − 1`.  Every
//! comparison between two sequence numbers in this crate goes through
//! [`SeqSpace::distance_forward`]; raw subtraction is ambiguous once the
//! space wraps.
//!
//! ```text
//!   N = 8          base=6           next=2 (wrapped)
//!                    │                 │
//!   0   1   2   3   4   5   6   7   0   1   2
//!                           └─ outstanding ─┘
//! ```

/// A modular sequence space of size `N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeqSpace {
    modulus: u32,
}

impl SeqSpace {
    /// # Panics
    ///
    /// Panics if `modulus < 2`; validate the config first.
    pub fn new(modulus: u32) -> Self {
        assert!(modulus >= 2, "sequence space must hold at least 2 numbers");
        Self { modulus }
    }

    /// Size of the space (N).
    #[inline]
    pub fn modulus(&self) -> u32 {
        self.modulus
    }

    /// `true` when `s` is a valid sequence number in this space.
    #[inline]
    pub fn contains(&self, s: u32) -> bool {
        s < self.modulus
    }

    /// `(s + 1) mod N`.
    #[inline]
    pub fn advance(&self, s: u32) -> u32 {
        self.add(s, 1)
    }

    /// `(s + n) mod N` for any `n`.
    #[inline]
    pub fn add(&self, s: u32, n: u32) -> u32 {
        ((u64::from(s) + u64::from(n)) % u64::from(self.modulus)) as u32
    }

    /// Sequence number of the packet at absolute stream index `index`.
    #[inline]
    pub fn of_index(&self, index: usize) -> u32 {
        (index as u64 % u64::from(self.modulus)) as u32
    }

    /// Number of [`advance`](Self::advance) steps from `a` to reach `b`,
    /// always in `[0, N)`.
    #[inline]
    pub fn distance_forward(&self, a: u32, b: u32) -> u32 {
        let a = a % self.modulus;
        let b = b % self.modulus;
        if b >= a {
            b - a
        } else {
            self.modulus - a + b
        }
    }
}
