//! Field-level validation rules (spec §6). These reject before any I/O —
//! a `ConfigError` in the taxonomy of spec §7.

const DISALLOWED_NAMES: &[&str] = &[
    "admin",
    "root",
    "system",
    "network",
    "moderator",
    "support",
    "help",
    "official",
];

/// A fingerprint is 128 lowercase hex characters (spec §6).
pub fn is_valid_fingerprint(fp: &str) -> bool {
    fp.len() == 128 && fp.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
}

/// A DNA name is 3-36 chars of `[A-Za-z0-9._-]`, not in the disallowed set
/// (case-insensitive).
pub fn is_valid_dna_name(name: &str) -> bool {
    if !(3..=36).contains(&name.len()) {
        return false;
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return false;
    }
    let lower = name.to_ascii_lowercase();
    !DISALLOWED_NAMES.contains(&lower.as_str())
}

/// IPFS CID validation: v0 = `Qm` + 44 base58 chars; v1 = `b` + base32
/// lowercase (digits 2-7) or `z` + base58 (spec §6).
pub fn is_valid_ipfs_cid(cid: &str) -> bool {
    if let Some(rest) = cid.strip_prefix("Qm") {
        return rest.len() == 44 && rest.chars().all(is_base58_char);
    }
    if let Some(rest) = cid.strip_prefix('b') {
        return !rest.is_empty()
            && rest
                .chars()
                .all(|c| c.is_ascii_lowercase() || ('2'..='7').contains(&c));
    }
    if let Some(rest) = cid.strip_prefix('z') {
        return !rest.is_empty() && rest.chars().all(is_base58_char);
    }
    false
}

fn is_base58_char(c: char) -> bool {
    const ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";
    ALPHABET.contains(c)
}

/// Wallet address validation per chain (spec §6, non-exhaustive).
pub fn is_valid_wallet_address(chain: &str, address: &str) -> bool {
    match chain.to_ascii_lowercase().as_str() {
        "ethereum" | "evm" | "polygon" | "bsc" => {
            address.len() == 42
                && address.starts_with("0x")
                && address[2..].chars().all(|c| c.is_ascii_hexdigit())
        }
        "bitcoin" | "btc" => {
            (26..=35).contains(&address.len()) && address.chars().all(is_base58_char)
        }
        "solana" | "sol" => {
            (32..=44).contains(&address.len()) && address.chars().all(is_base58_char)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_validation() {
        let good = "a".repeat(128);
        assert!(is_valid_fingerprint(&good));
        assert!(!is_valid_fingerprint(&"A".repeat(128)));
        assert!(!is_valid_fingerprint(&"a".repeat(127)));
    }

    #[test]
    fn name_validation() {
        assert!(is_valid_dna_name("alice.dna-01"));
        assert!(!is_valid_dna_name("ad")); // too short
        assert!(!is_valid_dna_name("admin"));
        assert!(!is_valid_dna_name("ADMIN"));
        assert!(!is_valid_dna_name("bad name"));
    }

    #[test]
    fn cid_validation() {
        assert!(is_valid_ipfs_cid(&format!("Qm{}", "1".repeat(44))));
        assert!(is_valid_ipfs_cid("bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi"));
        assert!(!is_valid_ipfs_cid("not-a-cid"));
    }

    #[test]
    fn wallet_validation() {
        assert!(is_valid_wallet_address(
            "ethereum",
            "0x1234567890123456789012345678901234567890"
        ));
        assert!(!is_valid_wallet_address("ethereum", "0xshort"));
    }
}
