//! Correlation id generation.

use uuid::Uuid;

/// Length of ids produced by [`generate_request_id`].
pub const REQUEST_ID_LEN: usize = 22;

const BASE62_ALPHABET: &[u8; 62] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Returns a fresh correlation id: a random 128-bit UUID rendered as
/// [`REQUEST_ID_LEN`] base62 characters, left-padded with `0`.
#[must_use]
pub fn generate_request_id() -> String {
    encode_base62(Uuid::new_v4().as_u128())
}

fn encode_base62(mut value: u128) -> String {
    let mut digits = [b'0'; REQUEST_ID_LEN];
    for slot in digits.iter_mut().rev() {
        let index = usize::try_from(value % 62).unwrap_or_default();
        *slot = BASE62_ALPHABET.get(index).copied().unwrap_or(b'0');
        value /= 62;
    }
    digits.iter().map(|byte| char::from(*byte)).collect()
}
