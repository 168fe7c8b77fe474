use bcrypt::BcryptError;
use std::sync::OnceLock;

#[cfg(not(test))]
const HASH_COST: u32 = bcrypt::DEFAULT_COST;
#[cfg(test)]
const HASH_COST: u32 = 4;

/// Salted bcrypt digest of `password`.
pub fn hash(password: &str) -> Result<String, BcryptError> {
    bcrypt::hash(password, HASH_COST)
}

/// Checks `password` against `digest`. A digest that cannot be parsed never matches.
pub fn verify(password: &str, digest: &str) -> bool {
    bcrypt::verify(password, digest).unwrap_or(false)
}

/// Login check for an account that may not exist. A missing account still
/// pays for one bcrypt verification so both failures take the same time.
pub fn verify_account(password: &str, digest: Option<&str>) -> bool {
    static DECOY: OnceLock<String> = OnceLock::new();
    match digest {
        Some(digest) => verify(password, digest),
        None => {
            let decoy = DECOY.get_or_init(|| hash("decoy").unwrap_or_default());
            verify(password, decoy);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let digest = hash("p1").unwrap();
        assert_ne!(digest, "p1");
        assert!(verify("p1", &digest));
        assert!(!verify("p2", &digest));
    }

    #[test]
    fn digests_are_salted() {
        assert_ne!(hash("same").unwrap(), hash("same").unwrap());
    }

    #[test]
    fn malformed_digest_never_matches() {
        assert!(!verify("", ""));
        assert!(!verify("p1", "not a digest"));
    }

    #[test]
    fn missing_account_never_matches() {
        assert!(!verify_account("decoy", None));
        let digest = hash("p1").unwrap();
        assert!(verify_account("p1", Some(&digest)));
        assert!(!verify_account("p2", Some(&digest)));
    }
}
