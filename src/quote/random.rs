use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of uniform floats in `[0, 1)`.
///
/// `Sync` is required because the store's async methods hold `&self`
/// across awaits, and those futures run on spawned tasks.
pub trait RandomSource: Send + Sync {
    fn next_f64(&mut self) -> f64;
}

/// Entropy-seeded generator used outside of tests.
pub struct StdRandom {
    rng: StdRng,
}

impl StdRandom {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl Default for StdRandom {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomSource for StdRandom {
    fn next_f64(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }
}

/// Replays a fixed list of values, wrapping around at the end.
///
/// Values outside `[0, 1)` are clamped when an index is derived from them.
#[derive(Debug, Clone)]
pub struct SequenceRandom {
    values: Vec<f64>,
    next: usize,
}

impl SequenceRandom {
    pub fn new(values: impl Into<Vec<f64>>) -> Self {
        Self {
            values: values.into(),
            next: 0,
        }
    }
}

impl RandomSource for SequenceRandom {
    fn next_f64(&mut self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let value = self.values[self.next % self.values.len()];
        self.next = self.next.wrapping_add(1);
        value
    }
}

/// Map one draw from `rng` onto `0..len`, or `None` when `len == 0`.
///
/// The slot is `floor(r * len)`, clamped so rounding can never produce
/// `len` itself.
pub fn pick_index(rng: &mut dyn RandomSource, len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    let r = rng.next_f64();
    let r = if r.is_finite() { r.clamp(0.0, 1.0) } else { 0.0 };
    let index = (r * len as f64).floor() as usize;
    Some(index.min(len - 1))
}
