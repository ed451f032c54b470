use sha2::{Digest, Sha256};

/// Computes the canonical identifier of a block from its raw header fields.
///
/// Fabric derives a block's hash by DER-encoding the header as
/// `SEQUENCE { INTEGER number, OCTET STRING previous_hash, OCTET STRING data_hash }`
/// and hashing the encoding with SHA-256. The upstream event feed does not
/// reliably expose the hash itself, so it is always recomputed here; the
/// output must stay bit-identical to the peer's own computation.
pub fn block_header_hash(block_num: u64, prev_hash: &[u8], data_hash: &[u8]) -> String {
    let header = encode_header(block_num, prev_hash, data_hash);
    hex::encode(Sha256::digest(&header))
}

/// Lowercase hex rendering of a byte field. Empty input maps to the empty
/// string, matching the stored representation of absent upstream hashes.
pub fn to_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

fn encode_header(block_num: u64, prev_hash: &[u8], data_hash: &[u8]) -> Vec<u8> {
    let number = encode_integer(block_num);
    let prev = encode_octet_string(prev_hash);
    let data = encode_octet_string(data_hash);

    let content_len = number.len() + prev.len() + data.len();
    let mut out = Vec::with_capacity(2 + content_len);
    out.push(0x30);
    encode_length(&mut out, content_len);
    out.extend_from_slice(&number);
    out.extend_from_slice(&prev);
    out.extend_from_slice(&data);
    out
}

// The block number is a signed INTEGER: minimal big-endian two's complement,
// so zero encodes as a single 0x00 byte and a leading 0x00 is kept whenever
// the top bit of the magnitude is set.
fn encode_integer(value: u64) -> Vec<u8> {
    let be = value.to_be_bytes();
    let start = be.iter().position(|&b| b != 0).unwrap_or(be.len() - 1);
    let mut body = Vec::with_capacity(9);
    if be[start] & 0x80 != 0 {
        body.push(0x00);
    }
    body.extend_from_slice(&be[start..]);

    let mut out = Vec::with_capacity(2 + body.len());
    out.push(0x02);
    encode_length(&mut out, body.len());
    out.extend_from_slice(&body);
    out
}

// Zero-length values are legal and must be encoded, not omitted.
fn encode_octet_string(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(2 + bytes.len());
    out.push(0x04);
    encode_length(&mut out, bytes.len());
    out.extend_from_slice(bytes);
    out
}

// Definite-length encoding: short form below 128, long form above.
fn encode_length(out: &mut Vec<u8>, length: usize) {
    if length < 128 {
        out.push(length as u8);
        return;
    }
    let be = length.to_be_bytes();
    let start = be.iter().position(|&b| b != 0).unwrap_or(be.len() - 1);
    out.push(0x80 | (be.len() - start) as u8);
    out.extend_from_slice(&be[start..]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_header_der_encoding() {
        assert_eq!(
            encode_header(0, &[], &[]),
            [0x30, 0x07, 0x02, 0x01, 0x00, 0x04, 0x00, 0x04, 0x00]
        );
    }

    #[test]
    fn genesis_header_hash_matches_golden_value() {
        // Cross-implementation conformance anchor for the DER + SHA-256
        // definition; the peer produces the same digest for block 0 with
        // empty hashes.
        assert_eq!(
            block_header_hash(0, &[], &[]),
            "1d1c288c6851505be0b47a0f8e7dfb91ab2abe6ad71cef63a3791d14588d1d0e"
        );
    }

    #[test]
    fn hash_is_deterministic() {
        let prev = [0x11u8; 32];
        let data = [0x22u8; 32];
        let first = block_header_hash(20, &prev, &data);
        let second = block_header_hash(20, &prev, &data);
        assert_eq!(first, second);
        assert_eq!(
            first,
            "a68329d4e7145534edcaa2e8517581563e31d0105e62d79a3730e0784c23d58e"
        );
    }

    #[test]
    fn integer_body_keeps_sign_byte() {
        // 128 has the top bit set, so the signed INTEGER body must carry a
        // leading 0x00.
        assert_eq!(encode_integer(128), [0x02, 0x02, 0x00, 0x80]);
        assert_eq!(
            block_header_hash(128, &[], &[]),
            "2fc899e6fa44ba5e41f8476f1f3955b5794feee49c827d251dcf3196e3d8af71"
        );
    }

    #[test]
    fn long_content_uses_long_form_length() {
        let prev = [0xABu8; 100];
        let data = [0xCDu8; 100];
        let header = encode_header(7, &prev, &data);
        assert_eq!(&header[..3], &[0x30, 0x81, 0xCF]);
        assert_eq!(
            block_header_hash(7, &prev, &data),
            "e2a922f2fa58198870c68d1d8ddd6a5ae500341e7341b27e6e80fe9f45f03af6"
        );
    }

    #[test]
    fn to_hex_of_empty_input_is_empty() {
        assert_eq!(to_hex(&[]), "");
        assert_eq!(to_hex(&[0xDE, 0xAD]), "dead");
    }
}
