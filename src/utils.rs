use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cell::RefCell;

use crate::prelude::*;

thread_local! {
    static RNG: RefCell<StdRng> = RefCell::new(StdRng::from_entropy());
}

pub async fn clock_cycles(signal: SimObject, n_cycles: u32) -> TbResult {
    for _ in 0..n_cycles {
        signal.rising_edge().await.into_result()?;
    }
    Ok(Val::None)
}

/// Reseeds the testbench random source of the current thread.
pub fn seed(seed: u64) {
    RNG.with(|r| *r.borrow_mut() = StdRng::seed_from_u64(seed));
}

#[inline]
pub fn rand() -> f32 {
    RNG.with(|r| r.borrow_mut().gen::<f32>())
}

#[inline]
pub fn rand_int(ceil: u32) -> u32 {
    RNG.with(|r| r.borrow_mut().gen_range(0..ceil.max(1)))
}
