//! Parses a transaction's `extra` byte vector into its tagged sub-fields.
//!
//! Grounded on `original_source/lib/CryptoNoteCore/Transactions/TransactionExtra.h`.
//! Per SPEC_FULL.md §5.2, these fields participate in consensus only
//! through parse success, tag uniqueness and total length — the payload
//! of the nonce/message/TTL fields is advisory and consumed by wallets,
//! never itself a pass/fail validation condition.

use ember_crypto::PublicKey;
use integer_encoding::VarInt;

const TAG_PADDING: u8 = 0x00;
const TAG_PUBKEY: u8 = 0x01;
const TAG_NONCE: u8 = 0x02;
const TAG_MERGE_MINING: u8 = 0x03;
const TAG_MESSAGE: u8 = 0x04;
const TAG_TTL: u8 = 0x05;

/// Consensus-relevant cap on the total `extra` length, independent of the
/// original's unlimited padding count — bounds the work a node does
/// parsing an adversarial transaction.
pub const MAX_EXTRA_LEN: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtraField {
    Padding(usize),
    PublicKey(PublicKey),
    Nonce(Vec<u8>),
    MergeMining { depth: u64, merkle_root: [u8; 32] },
    Message(Vec<u8>),
    Ttl(u64),
}

/// Parses `extra`, returning every recognized field in order. Fails if
/// the vector doesn't fully parse, exceeds [`MAX_EXTRA_LEN`], or a tag
/// other than padding/pubkey appears more than once — mirroring the
/// uniqueness the original's `findTransactionExtraFieldByType` assumes by
/// only ever returning the first match.
pub fn parse_extra(extra: &[u8]) -> Result<Vec<ExtraField>, String> {
    if extra.len() > MAX_EXTRA_LEN {
        return Err(format!("extra field length {} exceeds cap {}", extra.len(), MAX_EXTRA_LEN));
    }

    let mut fields = Vec::new();
    let mut seen_unique_tags = std::collections::HashSet::new();
    let mut cursor = 0usize;

    while cursor < extra.len() {
        let tag = extra[cursor];
        cursor += 1;

        match tag {
            TAG_PADDING => {
                let mut size = 1;
                while cursor < extra.len() && extra[cursor] == TAG_PADDING {
                    cursor += 1;
                    size += 1;
                }
                fields.push(ExtraField::Padding(size));
            },
            TAG_PUBKEY => {
                require_unique(&mut seen_unique_tags, tag)?;
                let bytes = take_fixed::<32>(extra, &mut cursor, "pubkey")?;
                let pubkey = PublicKey::from_bytes(bytes).map_err(|e| e.to_string())?;
                fields.push(ExtraField::PublicKey(pubkey));
            },
            TAG_NONCE => {
                let data = take_varint_prefixed(extra, &mut cursor, "nonce")?;
                fields.push(ExtraField::Nonce(data));
            },
            TAG_MERGE_MINING => {
                require_unique(&mut seen_unique_tags, tag)?;
                let (depth, n) = u64::decode_var(&extra[cursor..]).ok_or("bad merge-mining depth varint")?;
                cursor += n;
                let merkle_root = take_fixed::<32>(extra, &mut cursor, "merge-mining merkle root")?;
                fields.push(ExtraField::MergeMining { depth, merkle_root });
            },
            TAG_MESSAGE => {
                let data = take_varint_prefixed(extra, &mut cursor, "message")?;
                fields.push(ExtraField::Message(data));
            },
            TAG_TTL => {
                require_unique(&mut seen_unique_tags, tag)?;
                let (ttl, n) = u64::decode_var(&extra[cursor..]).ok_or("bad ttl varint")?;
                cursor += n;
                fields.push(ExtraField::Ttl(ttl));
            },
            other => return Err(format!("unknown transaction-extra tag 0x{other:02x}")),
        }
    }

    Ok(fields)
}

fn require_unique(seen: &mut std::collections::HashSet<u8>, tag: u8) -> Result<(), String> {
    if !seen.insert(tag) {
        return Err(format!("duplicate transaction-extra tag 0x{tag:02x}"));
    }
    Ok(())
}

fn take_fixed<const N: usize>(extra: &[u8], cursor: &mut usize, what: &str) -> Result<[u8; N], String> {
    if *cursor + N > extra.len() {
        return Err(format!("truncated {what} field"));
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&extra[*cursor..*cursor + N]);
    *cursor += N;
    Ok(out)
}

fn take_varint_prefixed(extra: &[u8], cursor: &mut usize, what: &str) -> Result<Vec<u8>, String> {
    let (len, n) = usize::decode_var(&extra[*cursor..]).ok_or_else(|| format!("bad {what} length varint"))?;
    *cursor += n;
    if *cursor + len > extra.len() {
        return Err(format!("truncated {what} payload"));
    }
    let data = extra[*cursor..*cursor + len].to_vec();
    *cursor += len;
    Ok(data)
}

/// Returns the transaction public key carried in `extra`, required on
/// every non-coinbase transaction so outputs can be scanned by viewers.
pub fn public_key_from_extra(extra: &[u8]) -> Option<PublicKey> {
    parse_extra(extra).ok()?.into_iter().find_map(|field| match field {
        ExtraField::PublicKey(pk) => Some(pk),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use ember_crypto::SecretKey;
    use integer_encoding::VarInt;

    use super::*;

    fn encode_pubkey_extra(pubkey: &PublicKey) -> Vec<u8> {
        let mut out = vec![TAG_PUBKEY];
        out.extend_from_slice(&pubkey.to_bytes());
        out
    }

    #[test]
    fn parses_a_single_pubkey_field() {
        let pubkey = SecretKey::from_bytes_mod_order(&[4u8; 32]).public_key();
        let extra = encode_pubkey_extra(&pubkey);
        let fields = parse_extra(&extra).unwrap();
        assert_eq!(fields, vec![ExtraField::PublicKey(pubkey)]);
    }

    #[test]
    fn public_key_from_extra_finds_it_after_other_fields() {
        let pubkey = SecretKey::from_bytes_mod_order(&[5u8; 32]).public_key();
        let mut extra = vec![TAG_PADDING, TAG_PADDING];
        extra.extend(encode_pubkey_extra(&pubkey));
        let mut nonce = vec![TAG_NONCE];
        nonce.extend_from_slice(&(4usize).encode_var_vec());
        nonce.extend_from_slice(&[1, 2, 3, 4]);
        extra.extend(nonce);

        assert_eq!(public_key_from_extra(&extra), Some(pubkey));
    }

    #[test]
    fn duplicate_pubkey_tag_is_rejected() {
        let pubkey = SecretKey::from_bytes_mod_order(&[6u8; 32]).public_key();
        let mut extra = encode_pubkey_extra(&pubkey);
        extra.extend(encode_pubkey_extra(&pubkey));
        assert!(parse_extra(&extra).is_err());
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let extra = vec![0xEE];
        assert!(parse_extra(&extra).is_err());
    }

    #[test]
    fn oversized_extra_is_rejected() {
        let extra = vec![TAG_PADDING; MAX_EXTRA_LEN + 1];
        assert!(parse_extra(&extra).is_err());
    }
}
