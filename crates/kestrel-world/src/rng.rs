use std::sync::{Mutex, PoisonError};

use rand::{Rng, SeedableRng};
use rand_isaac::IsaacRng;

/// Private random source owned by one behavior instance
pub type ActorRng = IsaacRng;

/// Server-wide random source that hands out seeds for per-actor generators.
///
/// ISAAC state is not safe to share between threads, so the generator sits
/// behind its own mutex. Actors never draw from it during a tick; they get a
/// private [`ActorRng`] when their behavior is created.
#[derive(Debug)]
pub struct SeedSource {
    rng: Mutex<IsaacRng>,
}

impl SeedSource {
    /// Create a seed source from a fixed seed (reproducible runs)
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(IsaacRng::seed_from_u64(seed)),
        }
    }

    /// Create a seed source from OS entropy
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(IsaacRng::from_entropy()),
        }
    }

    /// `0` means "no fixed seed" in the config file
    pub fn from_config_seed(seed: u64) -> Self {
        if seed == 0 {
            Self::from_entropy()
        } else {
            Self::new(seed)
        }
    }

    /// Draw the next seed
    pub fn next_seed(&self) -> u64 {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        rng.r#gen::<u64>()
    }

    /// Build a private generator for a new behavior instance
    pub fn actor_rng(&self) -> ActorRng {
        ActorRng::seed_from_u64(self.next_seed())
    }
}

impl Default for SeedSource {
    fn default() -> Self {
        Self::from_entropy()
    }
}
