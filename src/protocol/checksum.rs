//! # XOR Checksum
//!
//! Single-byte integrity check used by gamepad packets: the XOR of every
//! preceding byte, type byte included.

/// Calculate the XOR checksum of a byte slice
///
/// # Arguments
///
/// * `data` - Bytes covered by the checksum (bytes 0-10 of a gamepad packet)
///
/// # Returns
///
/// * `u8` - XOR of all bytes, `0x00` for an empty slice
///
/// # Examples
///
/// ```
/// use pad_bridge::protocol::checksum::xor_checksum;
///
/// assert_eq!(xor_checksum(&[0x01, 0x05]), 0x04);
/// ```
#[must_use]
pub fn xor_checksum(data: &[u8]) -> u8 {
    data.iter().fold(0, |acc, &byte| acc ^ byte)
}

/// Check that `expected` is the XOR checksum of `data`
#[must_use]
pub fn verify_xor_checksum(data: &[u8], expected: u8) -> bool {
    xor_checksum(data) == expected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_empty() {
        assert_eq!(xor_checksum(&[]), 0x00);
    }

    #[test]
    fn test_checksum_single_byte() {
        assert_eq!(xor_checksum(&[0xA5]), 0xA5);
    }

    #[test]
    fn test_checksum_known_vector() {
        // 0x01 ^ 0x05 ^ 0x05 ^ 0xFB ^ 0x1E = 0xE4
        let data = [0x01, 0x05, 0x00, 0x00, 0x00, 0x05, 0x00, 0xFB, 0x00, 0x1E, 0x00];
        assert_eq!(xor_checksum(&data), 0xE4);
        assert!(verify_xor_checksum(&data, 0xE4));
        assert!(!verify_xor_checksum(&data, 0xE5));
    }

    #[test]
    fn test_checksum_detects_every_single_bit_flip() {
        let data = [0x01, 0x05, 0x00, 0x00, 0x00, 0x05, 0x00, 0xFB, 0x00, 0x1E, 0x00];
        let checksum = xor_checksum(&data);

        for index in 0..data.len() {
            for bit in 0..8 {
                let mut corrupted = data;
                corrupted[index] ^= 1 << bit;
                assert!(
                    !verify_xor_checksum(&corrupted, checksum),
                    "flip of bit {} in byte {} went undetected",
                    bit,
                    index
                );
            }
        }
    }
}
