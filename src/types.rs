//! Shared base types for the node.

/// 32-byte hash value (generation signatures, gen-hashes, targets).
pub type Hash32 = [u8; 32];

/// 20-byte account address.
pub type Address = [u8; 20];

/// Parse a hex address, with or without a `0x` prefix.
pub fn parse_address(s: &str) -> Result<Address, String> {
    let raw = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
    let bytes = hex::decode(raw).map_err(|e| format!("invalid address hex '{}': {}", s, e))?;
    if bytes.len() != 20 {
        return Err(format!(
            "invalid address '{}': decoded to {} bytes, expected 20",
            s,
            bytes.len()
        ));
    }
    let mut addr = [0u8; 20];
    addr.copy_from_slice(&bytes);
    Ok(addr)
}

/// Render an address as a `0x`-prefixed hex string.
pub fn address_to_hex(addr: &Address) -> String {
    format!("0x{}", hex::encode(addr))
}

/// Current unix time in seconds.
pub fn now_unix() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
