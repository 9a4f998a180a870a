use crate::config::MutatorKind;
use rand::Rng;

/// A `Mutator` derives a new test case from an existing one.
///
/// The fuzzing client keeps a single best input and asks its mutator for a variation on every
/// iteration, so implementations are free to be as simple or as clever as they like.
///
/// # Type Parameters
/// * `R`: The random number generator driving mutation decisions.
pub trait Mutator<R: Rng + ?Sized>: Send {
    /// Produces a mutated copy of `input_opt`.
    ///
    /// # Arguments
    /// * `input_opt`: The input to base the mutation on. `None` (or an empty input) makes the
    ///   mutator start from a single zero byte.
    /// * `rng`: Source of randomness.
    ///
    /// # Returns
    /// The new input, or an error if the mutation could not be produced.
    fn mutate(&mut self, input_opt: Option<&[u8]>, rng: &mut R) -> Result<Vec<u8>, anyhow::Error>;
}

fn starting_bytes(input_opt: Option<&[u8]>) -> Vec<u8> {
    match input_opt {
        Some(bytes) if !bytes.is_empty() => bytes.to_vec(),
        _ => vec![0u8; 1],
    }
}

/// XORs one randomly chosen byte with a random value in `0..=255`.
///
/// A value of zero leaves the input unchanged; that case is kept so every byte value stays
/// reachable with equal probability.
#[derive(Debug, Default, Clone, Copy)]
pub struct XorSingleByteMutator;

impl<R: Rng + ?Sized> Mutator<R> for XorSingleByteMutator {
    fn mutate(&mut self, input_opt: Option<&[u8]>, rng: &mut R) -> Result<Vec<u8>, anyhow::Error> {
        let mut bytes = starting_bytes(input_opt);
        let index = rng.random_range(0..bytes.len());
        let mask: u8 = rng.random();
        bytes[index] ^= mask;
        Ok(bytes)
    }
}

/// Adds a small random value (1-15) to one randomly chosen byte, wrapping on overflow.
#[derive(Debug, Default, Clone, Copy)]
pub struct FlipSingleByteMutator;

impl<R: Rng + ?Sized> Mutator<R> for FlipSingleByteMutator {
    fn mutate(&mut self, input_opt: Option<&[u8]>, rng: &mut R) -> Result<Vec<u8>, anyhow::Error> {
        let mut bytes = starting_bytes(input_opt);
        let add = rng.random_range(1u8..=15u8);
        let index = rng.random_range(0..bytes.len());
        bytes[index] = bytes[index].wrapping_add(add);
        Ok(bytes)
    }
}

/// Builds the mutator selected in the configuration.
pub fn build_mutator<R: Rng + ?Sized>(kind: MutatorKind) -> Box<dyn Mutator<R>> {
    match kind {
        MutatorKind::XorByte => Box::new(XorSingleByteMutator),
        MutatorKind::AddByte => Box::new(FlipSingleByteMutator),
    }
}
