//! Deterministic challenge-token decoder.
//!
//! The ACW challenge script scrambles a 40-character hex token with a fixed
//! position table and XORs the result against a fixed hex mask. Reproducing
//! those two steps directly yields the `acw_sc__v2` cookie value, so no
//! JavaScript evaluation is involved. The transform is pure: a given token
//! always produces the same cookie value.

use super::detect::extract_token;

/// Name of the session cookie the WAF checks.
pub const SESSION_COOKIE_NAME: &str = "acw_sc__v2";

/// Position table lifted from the deobfuscated challenge script. Output slot
/// `z` is sourced from input index `POSITION_MAP[z] - 1`; the table is a
/// bijection over 1..=40.
const POSITION_MAP: [usize; 40] = [
    15, 35, 29, 24, 33, 16, 1, 38, 10, 9, 19, 31, 40, 27, 22, 23, 25, 13, 6, 11, 39, 18, 20, 8,
    14, 21, 32, 26, 2, 30, 7, 4, 17, 5, 3, 28, 34, 37, 12, 36,
];

/// Fixed XOR mask, one byte per two hex characters.
const XOR_MASK: &str = "3000176000856006061501533003690027800375";

/// Derive the session cookie value from a suspected challenge page body.
///
/// Returns `None` when no token assignment is found (the page is not a
/// decodable challenge).
pub fn solve_challenge(body: &str) -> Option<String> {
    let token = extract_token(body)?;
    Some(decode_token(token))
}

/// Apply the permutation and XOR steps to a raw hex token.
fn decode_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();

    // Slots whose source index falls past a short token are skipped, matching
    // the sparse-array join in the original script.
    let reordered: String = POSITION_MAP
        .iter()
        .filter_map(|&source| chars.get(source - 1))
        .collect();

    let limit = reordered.len().min(XOR_MASK.len());
    let mut value = String::with_capacity(limit);
    let mut index = 0;
    while index < limit {
        // A trailing odd hex digit is XORed against a full two-char mask
        // chunk, mirroring the script's substring arithmetic.
        let end = (index + 2).min(limit);
        let mask_end = (index + 2).min(XOR_MASK.len());
        let lhs = u8::from_str_radix(&reordered[index..end], 16).unwrap_or(0);
        let rhs = u8::from_str_radix(&XOR_MASK[index..mask_end], 16).unwrap_or(0);
        value.push_str(&format!("{:02x}", lhs ^ rhs));
        index += 2;
    }
    value
}
