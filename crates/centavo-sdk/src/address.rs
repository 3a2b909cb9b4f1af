//! eCash addresses: cashaddr encoding/decoding plus legacy base58check input.
//!
//! Cashaddr is the canonical format (prefix `ecash:` on mainnet). Legacy
//! base58 addresses are still accepted on input so users can paste old-style
//! strings; callers get a `legacy` flag back so they can warn about them.

use crate::error::{Error, Result};
use crate::network::Network;
use crate::script;

const CHARSET: &[u8] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressKind {
    P2pkh,
    P2sh,
}

/// A decoded address: a 160-bit hash plus its script kind. Network-agnostic;
/// the network only matters when rendering or parsing the string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address {
    pub kind: AddressKind,
    pub hash: [u8; 20],
}

/// Parse result carrying whether the input was a legacy base58 string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedAddress {
    pub address: Address,
    pub legacy: bool,
}

impl Address {
    pub fn p2pkh(hash: [u8; 20]) -> Self {
        Address {
            kind: AddressKind::P2pkh,
            hash,
        }
    }

    pub fn p2sh(hash: [u8; 20]) -> Self {
        Address {
            kind: AddressKind::P2sh,
            hash,
        }
    }

    /// The locking script paying to this address.
    pub fn to_script(&self) -> Vec<u8> {
        match self.kind {
            AddressKind::P2pkh => script::p2pkh_script(&self.hash),
            AddressKind::P2sh => script::p2sh_script(&self.hash),
        }
    }

    /// Full cashaddr form including the network prefix.
    pub fn to_cashaddr(&self, network: Network) -> String {
        encode_cashaddr(network.cashaddr_prefix(), self.kind, &self.hash)
    }

    pub fn from_cashaddr(s: &str, network: Network) -> Result<Self> {
        decode_cashaddr(s, network.cashaddr_prefix())
    }

    pub fn from_legacy(s: &str, network: Network) -> Result<Self> {
        let decoded = bs58::decode(s)
            .with_check(None)
            .into_vec()
            .map_err(|e| Error::Address(format!("bad base58: {}", e)))?;
        if decoded.len() != 21 {
            return Err(Error::Address(format!(
                "bad base58 payload length: {}",
                decoded.len()
            )));
        }
        let kind = if decoded[0] == network.legacy_p2pkh_version() {
            AddressKind::P2pkh
        } else if decoded[0] == network.legacy_p2sh_version() {
            AddressKind::P2sh
        } else {
            return Err(Error::Address(format!(
                "unknown base58 version byte: 0x{:02x}",
                decoded[0]
            )));
        };
        let mut hash = [0u8; 20];
        hash.copy_from_slice(&decoded[1..21]);
        Ok(Address { kind, hash })
    }

    pub fn is_valid(s: &str, network: Network) -> bool {
        parse_address(s, network).is_ok()
    }
}

/// Parse either address form. Cashaddr is tried first; base58 fallback sets
/// the `legacy` flag for the send tab's warning path.
pub fn parse_address(s: &str, network: Network) -> Result<ParsedAddress> {
    let s = s.trim();
    if let Ok(address) = Address::from_cashaddr(s, network) {
        return Ok(ParsedAddress {
            address,
            legacy: false,
        });
    }
    let address = Address::from_legacy(s, network)?;
    Ok(ParsedAddress {
        address,
        legacy: true,
    })
}

/// True iff the string decodes as a legacy base58 address on this network.
pub fn is_legacy_address(s: &str, network: Network) -> bool {
    Address::from_legacy(s.trim(), network).is_ok()
}

// ── cashaddr codec ──────────────────────────────────────────────────────

fn polymod(values: &[u8]) -> u64 {
    let mut c: u64 = 1;
    for &d in values {
        let c0 = (c >> 35) as u8;
        c = ((c & 0x0007_ffff_ffff) << 5) ^ u64::from(d);
        if c0 & 0x01 != 0 {
            c ^= 0x98_f2bc_8e61;
        }
        if c0 & 0x02 != 0 {
            c ^= 0x79_b76d_99e2;
        }
        if c0 & 0x04 != 0 {
            c ^= 0xf3_3e5f_b3c4;
        }
        if c0 & 0x08 != 0 {
            c ^= 0xae_2eab_e2a8;
        }
        if c0 & 0x10 != 0 {
            c ^= 0x1e_4f43_e470;
        }
    }
    c ^ 1
}

/// Expand the prefix for checksum computation: low 5 bits of each character
/// followed by a zero separator.
fn prefix_expand(prefix: &str) -> Vec<u8> {
    let mut out: Vec<u8> = prefix.bytes().map(|b| b & 0x1f).collect();
    out.push(0);
    out
}

/// Regroup bits. `pad` must be true when encoding (8→5) and false when
/// decoding (5→8), where leftover nonzero padding is an error.
fn convert_bits(data: &[u8], from: u32, to: u32, pad: bool) -> Result<Vec<u8>> {
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    let mut out = Vec::new();
    let maxv: u32 = (1 << to) - 1;
    for &value in data {
        if u32::from(value) >> from != 0 {
            return Err(Error::Address("invalid data byte".into()));
        }
        acc = (acc << from) | u32::from(value);
        bits += from;
        while bits >= to {
            bits -= to;
            out.push(((acc >> bits) & maxv) as u8);
        }
    }
    if pad {
        if bits > 0 {
            out.push(((acc << (to - bits)) & maxv) as u8);
        }
    } else if bits >= from || ((acc << (to - bits)) & maxv) != 0 {
        return Err(Error::Address("invalid padding".into()));
    }
    Ok(out)
}

fn version_byte(kind: AddressKind) -> u8 {
    // type bits << 3 | size bits; size 0 encodes a 160-bit hash.
    match kind {
        AddressKind::P2pkh => 0x00,
        AddressKind::P2sh => 0x08,
    }
}

pub(crate) fn encode_cashaddr(prefix: &str, kind: AddressKind, hash: &[u8; 20]) -> String {
    let mut payload = Vec::with_capacity(21);
    payload.push(version_byte(kind));
    payload.extend_from_slice(hash);
    let payload5 = convert_bits(&payload, 8, 5, true).expect("8-bit input cannot fail");

    let mut checksum_input = prefix_expand(prefix);
    checksum_input.extend_from_slice(&payload5);
    checksum_input.extend_from_slice(&[0u8; 8]);
    let checksum = polymod(&checksum_input);

    let mut out = String::with_capacity(prefix.len() + 1 + payload5.len() + 8);
    out.push_str(prefix);
    out.push(':');
    for &v in &payload5 {
        out.push(CHARSET[v as usize] as char);
    }
    for i in 0..8 {
        let v = ((checksum >> (5 * (7 - i))) & 0x1f) as usize;
        out.push(CHARSET[v] as char);
    }
    out
}

pub(crate) fn decode_cashaddr(s: &str, expected_prefix: &str) -> Result<Address> {
    // Mixed case is invalid; all-upper is normalized down.
    let has_lower = s.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = s.chars().any(|c| c.is_ascii_uppercase());
    if has_lower && has_upper {
        return Err(Error::Address("mixed-case cashaddr".into()));
    }
    let s = s.to_ascii_lowercase();

    let (prefix, body) = match s.split_once(':') {
        Some((p, b)) => (p.to_string(), b.to_string()),
        None => (expected_prefix.to_string(), s),
    };
    if prefix != expected_prefix {
        return Err(Error::Address(format!("wrong prefix: {}", prefix)));
    }
    if body.len() < 8 {
        return Err(Error::Address("cashaddr too short".into()));
    }

    let mut values = Vec::with_capacity(body.len());
    for c in body.bytes() {
        let v = CHARSET
            .iter()
            .position(|&b| b == c)
            .ok_or_else(|| Error::Address(format!("invalid cashaddr character: {}", c as char)))?;
        values.push(v as u8);
    }

    let mut checksum_input = prefix_expand(&prefix);
    checksum_input.extend_from_slice(&values);
    if polymod(&checksum_input) != 0 {
        return Err(Error::Address("bad cashaddr checksum".into()));
    }

    let payload = convert_bits(&values[..values.len() - 8], 5, 8, false)?;
    if payload.len() != 21 {
        return Err(Error::Address(format!(
            "unsupported cashaddr payload length: {}",
            payload.len()
        )));
    }
    let kind = match payload[0] {
        0x00 => AddressKind::P2pkh,
        0x08 => AddressKind::P2sh,
        v => {
            return Err(Error::Address(format!(
                "unsupported cashaddr version: 0x{:02x}",
                v
            )));
        }
    };
    let mut hash = [0u8; 20];
    hash.copy_from_slice(&payload[1..21]);
    Ok(Address { kind, hash })
}
