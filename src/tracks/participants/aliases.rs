//! Random public aliases for participants, used while a track's real names
//! are hidden from the public leaderboard.

use rand::{Rng, seq::IndexedRandom};

const PREFIXES: [&str; 10] = [
    "Neon", "Cyber", "Iron", "Shadow", "Crimson", "Azure", "Golden",
    "Electric", "Quantum", "Hyper",
];

const NOUNS: [&str; 10] = [
    "Tiger", "Eagle", "Falcon", "Wolf", "Phoenix", "Dragon", "Viper", "Storm",
    "Glitch", "Spark",
];

/// Generates an alias of the form `Team <Prefix><Noun>-<1..=99>`.
pub fn random_alias(rng: &mut impl Rng) -> String {
    let prefix = PREFIXES.choose(rng).copied().unwrap_or("Team");
    let noun = NOUNS.choose(rng).copied().unwrap_or("Entry");
    let n: u32 = rng.random_range(1..=99);
    format!("Team {prefix}{noun}-{n}")
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    #[test]
    fn aliases_have_the_expected_shape() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let re = regex::Regex::new(r"^Team [A-Z][a-z]+[A-Z][a-z]+-\d{1,2}$")
            .unwrap();
        for _ in 0..100 {
            let alias = random_alias(&mut rng);
            assert!(re.is_match(&alias), "unexpected alias {alias}");
        }
    }

    #[test]
    fn seeded_generation_is_reproducible() {
        let a = random_alias(&mut ChaCha8Rng::seed_from_u64(42));
        let b = random_alias(&mut ChaCha8Rng::seed_from_u64(42));
        assert_eq!(a, b);
    }
}
