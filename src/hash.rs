use std::str::FromStr;

/// The hash algorithm used for the `bh=` tag of a DKIM signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha1,
    Sha256,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
#[error("unsupported hash algorithm {0:?} (expected sha1 or sha256)")]
pub struct UnsupportedHashAlgorithm(pub String);

impl FromStr for HashAlgorithm {
    type Err = UnsupportedHashAlgorithm;

    /// Accepts the hash name alone or the full `a=` tag value (`rsa-sha256`), ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        let name = name
            .get(..4)
            .filter(|prefix| prefix.eq_ignore_ascii_case("rsa-"))
            .map_or(name, |_| &name[4..]);

        if name.eq_ignore_ascii_case("sha256") {
            Ok(HashAlgorithm::Sha256)
        } else if name.eq_ignore_ascii_case("sha1") {
            Ok(HashAlgorithm::Sha1)
        } else {
            Err(UnsupportedHashAlgorithm(s.to_string()))
        }
    }
}

pub fn hash_sha1(data: &str) -> Vec<u8> {
    use sha1::{Digest, Sha1};

    let mut hasher = Sha1::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

pub fn hash_sha256(data: &str) -> Vec<u8> {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Base64 digest of an already canonicalized body, as found in the `bh=` tag.
pub fn body_hash(canonical_body: &str, algorithm: HashAlgorithm) -> String {
    let digest = match algorithm {
        HashAlgorithm::Sha1 => hash_sha1(canonical_body),
        HashAlgorithm::Sha256 => hash_sha256(canonical_body),
    };
    base64::encode(digest)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::canonicalization::canonicalize_body;

    #[test]
    fn parse_algorithm() {
        assert_eq!("sha256".parse::<HashAlgorithm>(), Ok(HashAlgorithm::Sha256));
        assert_eq!("SHA1".parse::<HashAlgorithm>(), Ok(HashAlgorithm::Sha1));
        assert_eq!(" rsa-sha256 ".parse::<HashAlgorithm>(), Ok(HashAlgorithm::Sha256));
        assert_eq!(
            "md5".parse::<HashAlgorithm>(),
            Err(UnsupportedHashAlgorithm("md5".to_string()))
        );
        assert!("".parse::<HashAlgorithm>().is_err());
    }

    #[test]
    fn empty_body_hash() {
        let body = canonicalize_body("");
        assert_eq!(body_hash(&body, HashAlgorithm::Sha256), "frcCV1k9oG9oKj3dpUqdJg1PxRT2RSN/XKdLCPjaYaY=");
        assert_eq!(body_hash(&body, HashAlgorithm::Sha1), "uoq1oCgLlTqpdDX/iUbLy7J1Wic=");
    }

    #[test]
    fn whitespace_variants_share_a_hash() {
        let a = canonicalize_body("Hello  world \r\n\r\n");
        let b = canonicalize_body("Hello\tworld\n");
        assert_eq!(body_hash(&a, HashAlgorithm::Sha256), body_hash(&b, HashAlgorithm::Sha256));
    }
}
