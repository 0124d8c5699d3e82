// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
/// Stateful `xoroshiro128+` generator driving the random exploration modes.
///
/// * Not cryptographically secure.
/// * Equal seeds yield equal sequences on every platform, so a random
///   exploration is reproducible from its seed.
#[derive(Debug, Clone, Copy)]
pub struct Prng {
    state: [u64; 2],
}

impl Prng {
    /// Constructs a PRNG from a single 64-bit seed via SplitMix64 expansion.
    pub fn from_seed(seed: u64) -> Self {
        fn splitmix64(state: &mut u64) -> u64 {
            *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
            let mut z = *state;
            z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
            z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
            z ^ (z >> 31)
        }

        let mut sm_state = seed;
        let mut state = [splitmix64(&mut sm_state), splitmix64(&mut sm_state)];
        if state[0] == 0 && state[1] == 0 {
            state[0] = 0x9e37_79b9_7f4a_7c15;
        }
        Self { state }
    }

    /// Next raw 64-bit output.
    pub fn next_u64(&mut self) -> u64 {
        let s0 = self.state[0];
        let mut s1 = self.state[1];
        let result = s0.wrapping_add(s1);

        s1 ^= s0;
        self.state[0] = s0.rotate_left(55) ^ s1 ^ (s1 << 14);
        self.state[1] = s1.rotate_left(36);

        result
    }

    /// Uniform index in `0..bound`; `0` when `bound` is zero.
    ///
    /// Uses rejection sampling to avoid modulo bias.
    pub fn below(&mut self, bound: usize) -> usize {
        let span = u64::try_from(bound).unwrap_or(u64::MAX);
        if span <= 1 {
            return 0;
        }
        let value = if span.is_power_of_two() {
            self.next_u64() & (span - 1)
        } else {
            let limit = u64::MAX - u64::MAX % span;
            loop {
                let candidate = self.next_u64();
                if candidate < limit {
                    break candidate % span;
                }
            }
        };
        usize::try_from(value).unwrap_or(0)
    }

    /// Fisher-Yates shuffle.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.below(i + 1);
            items.swap(i, j);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn below_handles_degenerate_bounds() {
        let mut prng = Prng::from_seed(42);
        assert_eq!(prng.below(0), 0);
        assert_eq!(prng.below(1), 0);
        assert!((0..100).all(|_| prng.below(7) < 7));
    }

    #[test]
    fn equal_seeds_give_equal_shuffles() {
        let mut a: Vec<u32> = (0..32).collect();
        let mut b = a.clone();
        Prng::from_seed(7).shuffle(&mut a);
        Prng::from_seed(7).shuffle(&mut b);
        assert_eq!(a, b);
        let mut sorted = a.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..32).collect::<Vec<_>>());
    }
}
