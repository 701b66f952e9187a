//! In-memory store of pending challenge answers.

use parking_lot::Mutex;
use shortpath_common::Challenge;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use super::ChallengeGenerator;

struct Answer {
    value: String,
    expiry: Instant,
}

/// Issues challenges and checks responses.
///
/// Each answer can be checked once. Memory stays bounded by `max_saved`:
/// once full, expired answers are dropped, and if that does not free
/// anything the whole map is cleared.
pub struct ChallengeCache {
    generator: ChallengeGenerator,
    answers: Mutex<HashMap<String, Answer>>,
    ttl: Duration,
    max_saved: usize,
}

impl ChallengeCache {
    pub fn new(generator: ChallengeGenerator, ttl: Duration, max_saved: usize) -> Self {
        Self {
            generator,
            answers: Mutex::new(HashMap::new()),
            ttl,
            max_saved,
        }
    }

    pub fn get_challenge(&self) -> Challenge {
        let id = self.generator.id();
        let (question, value) = self.generator.puzzle();
        let answer = Answer {
            value,
            expiry: Instant::now() + self.ttl,
        };

        let flushed = {
            let mut answers = self.answers.lock();
            let mut flushed = None;

            if answers.len() >= self.max_saved {
                let now = Instant::now();
                answers.retain(|_, answer| answer.expiry > now);

                if answers.len() >= self.max_saved {
                    flushed = Some(answers.len());
                    answers.clear();
                }
            }

            // An id collision overwrites the older entry
            answers.insert(id.clone(), answer);
            flushed
        };

        if let Some(dropped) = flushed {
            tracing::warn!(dropped, "Challenge cache full of live answers, cleared it");
        }
        tracing::debug!(challenge_id = %id, "Issued challenge");

        Challenge { id, question }
    }

    /// Consume the challenge `id` and report whether `answer` solves it in time
    pub fn verify(&self, id: &str, answer: &str) -> bool {
        let Some(saved) = self.answers.lock().remove(id) else {
            tracing::debug!(challenge_id = %id, "Unknown challenge");
            return false;
        };

        let passed = Instant::now() < saved.expiry && saved.value == answer;
        tracing::debug!(challenge_id = %id, passed, "Verified challenge");
        passed
    }

    /// Number of pending answers
    pub fn len(&self) -> usize {
        self.answers.lock().len()
    }

    #[cfg(test)]
    pub fn answer_for(&self, id: &str) -> Option<String> {
        self.answers.lock().get(id).map(|a| a.value.clone())
    }

    #[cfg(test)]
    pub fn contains(&self, id: &str) -> bool {
        self.answers.lock().contains_key(id)
    }

    /// Mark `id` as already expired
    #[cfg(test)]
    pub fn expire(&self, id: &str) {
        if let Some(answer) = self.answers.lock().get_mut(id) {
            answer.expiry = Instant::now();
        }
    }
}
