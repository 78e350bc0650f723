use uuid::Uuid;

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Type tag that prefixes every generated identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdTag {
    Booking,
    Patient,
    Invoice,
}

impl IdTag {
    pub fn prefix(&self) -> &'static str {
        match self {
            IdTag::Booking => "BK",
            IdTag::Patient => "PT",
            IdTag::Invoice => "INV",
        }
    }
}

fn random_u128() -> u128 {
    Uuid::new_v4().as_u128()
}

/// Tag followed by a random number in `10000..=99999`, e.g. `BK48213`.
/// Collisions are possible; callers that need uniqueness use
/// [`generate_unique`].
pub fn generate(tag: IdTag) -> String {
    format!("{}{}", tag.prefix(), 10000 + random_u128() % 90000)
}

/// Draws identifiers until one is not already taken.
pub fn generate_unique(tag: IdTag, taken: impl Fn(&str) -> bool) -> String {
    loop {
        let id = generate(tag);
        if !taken(&id) {
            return id;
        }
        log::debug!("🔁 Identifier {} already in use, drawing again", id);
    }
}

/// Random lowercase base-36 code of the given length.
pub fn random_code(len: usize) -> String {
    let mut n = random_u128();
    (0..len)
        .map(|_| {
            let c = BASE36[(n % 36) as usize] as char;
            n /= 36;
            c
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn ids_carry_tag_and_five_digits() {
        for tag in [IdTag::Booking, IdTag::Patient, IdTag::Invoice] {
            let id = generate(tag);
            let digits = id.strip_prefix(tag.prefix()).unwrap();
            assert_eq!(digits.len(), 5);
            let n: u32 = digits.parse().unwrap();
            assert!((10000..=99999).contains(&n));
        }
    }

    #[test]
    fn unique_generation_skips_taken_ids() {
        let mut seen = HashSet::new();
        for _ in 0..500 {
            let id = generate_unique(IdTag::Booking, |candidate| seen.contains(candidate));
            assert!(seen.insert(id));
        }
    }

    #[test]
    fn random_code_is_lowercase_base36() {
        let code = random_code(4);
        assert_eq!(code.len(), 4);
        assert!(code.bytes().all(|b| b.is_ascii_digit() || b.is_ascii_lowercase()));
    }
}
