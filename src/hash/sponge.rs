//! Generic byte-oriented Keccak-p[1600] sponge.
//!
//! This is the permutation-level primitive underneath [`super::turboshake`]:
//! it knows nothing about TurboSHAKE's rate/round parameters or
//! KangarooTwelve's tree structure, only how to XOR bytes into a 1600-bit
//! state at an arbitrary offset, run the permutation, and extract bytes back
//! out. Built on the `keccak` crate's `p1600` function (a configurable-round
//! variant of the permutation used by `sha3`, `ascon`, and other sponge
//! constructions), rather than a full one-shot hash crate, because the
//! chunk-caching optimization in [`super::chunked`] needs direct control
//! over when a node absorbs its domain-separation byte and squeezes.

const LANES: usize = 25;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Phase {
    Absorbing,
    Squeezing,
}

/// A single sponge "node" (the C engine's `finalNode` or `queueNode`).
pub struct Sponge {
    state: [u64; LANES],
    rate: usize,
    rounds: usize,
    pos: usize,
    phase: Phase,
}

impl Sponge {
    pub fn new(rate: usize, rounds: usize) -> Self {
        assert!(rate > 0 && rate <= LANES * 8);
        Sponge {
            state: [0u64; LANES],
            rate,
            rounds,
            pos: 0,
            phase: Phase::Absorbing,
        }
    }

    /// Byte offset within the rate currently absorbed/squeezed.
    /// Corresponds to `byteIOIndex` in the C source.
    pub fn byte_io_index(&self) -> usize {
        self.pos
    }

    /// Absorbs `data`, permuting whenever a full rate-sized block accumulates.
    ///
    /// # Panics
    /// Panics if called after [`Sponge::absorb_domain_separation_byte`] has
    /// switched the node into the squeezing phase.
    pub fn absorb(&mut self, mut data: &[u8]) {
        assert_eq!(self.phase, Phase::Absorbing, "absorb after finalization");
        while !data.is_empty() {
            let take = (self.rate - self.pos).min(data.len());
            xor_into_state(&mut self.state, self.pos, &data[..take]);
            self.pos += take;
            data = &data[take..];
            if self.pos == self.rate {
                keccak::p1600(&mut self.state, self.rounds);
                self.pos = 0;
            }
        }
    }

    /// Absorbs the domain-separation byte, applies the `pad10*1` final bit,
    /// permutes once, and switches the node into the squeezing phase.
    pub fn absorb_domain_separation_byte(&mut self, sep: u8) {
        assert_eq!(self.phase, Phase::Absorbing, "double finalization");
        xor_into_state(&mut self.state, self.pos, std::slice::from_ref(&sep));
        xor_into_state(&mut self.state, self.rate - 1, &[0x80]);
        keccak::p1600(&mut self.state, self.rounds);
        self.pos = 0;
        self.phase = Phase::Squeezing;
    }

    /// Squeezes `out.len()` bytes, permuting between rate-sized blocks.
    pub fn squeeze(&mut self, out: &mut [u8]) {
        assert_eq!(self.phase, Phase::Squeezing, "squeeze before finalization");
        let mut written = 0;
        while written < out.len() {
            if self.pos == self.rate {
                keccak::p1600(&mut self.state, self.rounds);
                self.pos = 0;
            }
            let take = (self.rate - self.pos).min(out.len() - written);
            extract_from_state(&self.state, self.pos, &mut out[written..written + take]);
            self.pos += take;
            written += take;
        }
    }
}

fn xor_into_state(state: &mut [u64; LANES], offset: usize, data: &[u8]) {
    for (i, &b) in data.iter().enumerate() {
        let pos = offset + i;
        let lane = pos / 8;
        let shift = (pos % 8) * 8;
        state[lane] ^= (b as u64) << shift;
    }
}

fn extract_from_state(state: &[u64; LANES], offset: usize, out: &mut [u8]) {
    for (i, o) in out.iter_mut().enumerate() {
        let pos = offset + i;
        let lane = pos / 8;
        let shift = (pos % 8) * 8;
        *o = (state[lane] >> shift) as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn squeeze_is_deterministic_for_same_input() {
        let mut a = Sponge::new(168, 12);
        let mut b = Sponge::new(168, 12);
        a.absorb(b"hello world");
        b.absorb(b"hello world");
        a.absorb_domain_separation_byte(0x0B);
        b.absorb_domain_separation_byte(0x0B);
        let mut out_a = [0u8; 32];
        let mut out_b = [0u8; 32];
        a.squeeze(&mut out_a);
        b.squeeze(&mut out_b);
        assert_eq!(out_a, out_b);
    }

    #[test]
    fn different_domain_separator_changes_output() {
        let mut a = Sponge::new(168, 12);
        let mut b = Sponge::new(168, 12);
        a.absorb(b"hello world");
        b.absorb(b"hello world");
        a.absorb_domain_separation_byte(0x0B);
        b.absorb_domain_separation_byte(0x06);
        let mut out_a = [0u8; 32];
        let mut out_b = [0u8; 32];
        a.squeeze(&mut out_a);
        b.squeeze(&mut out_b);
        assert_ne!(out_a, out_b);
    }

    #[test]
    fn squeeze_across_multiple_rate_blocks_matches_single_large_call() {
        let mut a = Sponge::new(168, 12);
        a.absorb(b"x");
        a.absorb_domain_separation_byte(0x0B);
        let mut one_shot = [0u8; 400];
        a.squeeze(&mut one_shot);

        let mut b = Sponge::new(168, 12);
        b.absorb(b"x");
        b.absorb_domain_separation_byte(0x0B);
        let mut piecewise = [0u8; 400];
        b.squeeze(&mut piecewise[..200]);
        b.squeeze(&mut piecewise[200..]);
        assert_eq!(one_shot.to_vec(), piecewise.to_vec());
    }
}
