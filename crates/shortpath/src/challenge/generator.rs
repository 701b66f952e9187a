//! Arithmetic puzzle and challenge id generation.

use rand::Rng;

/// Source of uniform random numbers
pub trait Entropy: Send + Sync {
    /// Uniform value in `0..n`. `n` must be non-zero.
    fn below(&self, n: u32) -> u32;
}

/// Thread-local OS-seeded generator
pub struct OsEntropy;

impl Entropy for OsEntropy {
    fn below(&self, n: u32) -> u32 {
        rand::rng().random_range(0..n)
    }
}

/// Reproducible generator for tests
#[cfg(test)]
pub struct SeededEntropy(parking_lot::Mutex<rand::rngs::StdRng>);

#[cfg(test)]
impl SeededEntropy {
    pub fn new(seed: u64) -> Self {
        use rand::SeedableRng;
        Self(parking_lot::Mutex::new(rand::rngs::StdRng::seed_from_u64(seed)))
    }
}

#[cfg(test)]
impl Entropy for SeededEntropy {
    fn below(&self, n: u32) -> u32 {
        self.0.lock().random_range(0..n)
    }
}

/// Produces challenge ids and `(question, answer)` pairs
pub struct ChallengeGenerator {
    entropy: Box<dyn Entropy>,
    alphabet: Vec<char>,
    id_length: usize,
}

impl ChallengeGenerator {
    /// `alphabet` must not be empty
    pub fn new(entropy: Box<dyn Entropy>, alphabet: &str, id_length: usize) -> Self {
        Self {
            entropy,
            alphabet: alphabet.chars().collect(),
            id_length,
        }
    }

    pub fn id(&self) -> String {
        let len = self.alphabet.len() as u32;
        (0..self.id_length)
            .map(|_| self.alphabet[self.entropy.below(len) as usize])
            .collect()
    }

    /// Operands are in `1..=9`; every answer is a non-negative integer
    pub fn puzzle(&self) -> (String, String) {
        let a = 1 + self.entropy.below(9);
        let b = 1 + self.entropy.below(9);

        match self.entropy.below(4) {
            0 => (format!("{a}+{b}"), (a + b).to_string()),
            1 => {
                let (hi, lo) = if a >= b { (a, b) } else { (b, a) };
                (format!("{hi}-{lo}"), (hi - lo).to_string())
            }
            2 => (format!("{a}*{b}"), (a * b).to_string()),
            _ => (format!("{}/{b}", a * b), a.to_string()),
        }
    }
}

/// Evaluate a question produced by [`ChallengeGenerator::puzzle`]
#[cfg(test)]
pub fn solve(question: &str) -> String {
    let (pos, op) = question
        .char_indices()
        .find(|(_, c)| matches!(c, '+' | '-' | '*' | '/'))
        .unwrap();
    let a: u32 = question[..pos].parse().unwrap();
    let b: u32 = question[pos + 1..].parse().unwrap();
    let value = match op {
        '+' => a + b,
        '-' => a - b,
        '*' => a * b,
        _ => a / b,
    };
    value.to_string()
}
