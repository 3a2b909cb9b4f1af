//! Transaction model: wire serialization, fee/size accounting, and the
//! BIP143-style signature hash used by eCash (SIGHASH_ALL | FORKID).

use rand::seq::SliceRandom;
use sha2::{Digest, Sha256};

use crate::address::Address;
use crate::error::{Error, Result};
use crate::script::ScriptOutput;

/// Outputs below this value are not created as change; the remainder is
/// absorbed into the fee instead.
pub const DUST_THRESHOLD: u64 = 546;

pub const SIGHASH_ALL_FORKID: u32 = 0x41;

/// Estimated size of a signed P2PKH input (72-byte DER signature assumption).
pub const P2PKH_INPUT_SIZE: usize = 148;

pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    second.into()
}

// ── identifiers ─────────────────────────────────────────────────────────

/// A transaction id, stored in internal (wire) byte order and displayed
/// reversed, as everywhere in the Bitcoin family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Txid([u8; 32]);

impl Txid {
    pub fn from_wire_bytes(bytes: [u8; 32]) -> Self {
        Txid(bytes)
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let mut bytes =
            hex::decode(s.trim()).map_err(|e| Error::Query(format!("bad txid hex: {}", e)))?;
        if bytes.len() != 32 {
            return Err(Error::Query(format!("bad txid length: {}", bytes.len())));
        }
        bytes.reverse();
        let mut out = [0u8; 32];
        out.copy_from_slice(&bytes);
        Ok(Txid(out))
    }

    pub fn as_wire_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Display for Txid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut reversed = self.0;
        reversed.reverse();
        write!(f, "{}", hex::encode(reversed))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutPoint {
    pub txid: Txid,
    pub vout: u32,
}

impl OutPoint {
    pub fn new(txid: Txid, vout: u32) -> Self {
        OutPoint { txid, vout }
    }
}

impl std::fmt::Display for OutPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.txid, self.vout)
    }
}

// ── spendable coins ─────────────────────────────────────────────────────

/// A spendable UTXO reference, as handed around by coin selection and the
/// send form's "pay from" list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coin {
    pub outpoint: OutPoint,
    pub value: u64,
    pub address: Address,
    /// Confirmation height; `None` while in the mempool.
    pub height: Option<u32>,
    /// Set when a coin was force-included and must not be removed from the
    /// pay-from list.
    pub unremovable: bool,
}

// ── outputs ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Destination {
    Address(Address),
    Script(ScriptOutput),
}

impl Destination {
    pub fn to_script(&self) -> Vec<u8> {
        match self {
            Destination::Address(a) => a.to_script(),
            Destination::Script(s) => s.to_vec(),
        }
    }
}

/// A requested output amount: a concrete satoshi value, or the `!`
/// "spend everything that remains" sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputValue {
    Sats(u64),
    Max,
}

impl OutputValue {
    pub fn is_max(&self) -> bool {
        matches!(self, OutputValue::Max)
    }
}

/// A requested output, as produced by payto parsing, payment requests and
/// the OP_RETURN builders, before coin selection pins down concrete values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
    pub destination: Destination,
    pub value: OutputValue,
}

/// A finalized transaction output with a concrete value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutput {
    pub destination: Destination,
    pub value: u64,
}

impl TxOutput {
    pub fn size(&self) -> usize {
        let script_len = self.destination.to_script().len();
        8 + varint_len(script_len as u64) + script_len
    }

    pub fn is_opreturn(&self) -> bool {
        match &self.destination {
            Destination::Script(s) => s.is_opreturn(),
            Destination::Address(_) => false,
        }
    }
}

// ── inputs ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxInput {
    pub outpoint: OutPoint,
    pub value: u64,
    /// Owning address, used to locate the signing key and script code.
    pub address: Option<Address>,
    /// Empty until signed.
    pub script_sig: Vec<u8>,
    pub sequence: u32,
}

impl TxInput {
    pub fn from_coin(coin: &Coin) -> Self {
        TxInput {
            outpoint: coin.outpoint,
            value: coin.value,
            address: Some(coin.address),
            script_sig: Vec::new(),
            sequence: 0xffff_ffff,
        }
    }

    pub fn is_signed(&self) -> bool {
        !self.script_sig.is_empty()
    }

    /// Serialized size, estimating a full P2PKH scriptSig while unsigned.
    pub fn size(&self) -> usize {
        if self.script_sig.is_empty() {
            P2PKH_INPUT_SIZE
        } else {
            32 + 4 + varint_len(self.script_sig.len() as u64) + self.script_sig.len() + 4
        }
    }
}

// ── transaction ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub locktime: u32,
}

impl Transaction {
    pub fn from_io(inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> Self {
        Transaction {
            version: 2,
            inputs,
            outputs,
            locktime: 0,
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.estimated_size());
        buf.extend_from_slice(&self.version.to_le_bytes());
        write_varint(&mut buf, self.inputs.len() as u64);
        for inp in &self.inputs {
            buf.extend_from_slice(inp.outpoint.txid.as_wire_bytes());
            buf.extend_from_slice(&inp.outpoint.vout.to_le_bytes());
            write_varint(&mut buf, inp.script_sig.len() as u64);
            buf.extend_from_slice(&inp.script_sig);
            buf.extend_from_slice(&inp.sequence.to_le_bytes());
        }
        self.serialize_outputs_into(&mut buf);
        buf.extend_from_slice(&self.locktime.to_le_bytes());
        buf
    }

    fn serialize_outputs_into(&self, buf: &mut Vec<u8>) {
        write_varint(buf, self.outputs.len() as u64);
        for out in &self.outputs {
            buf.extend_from_slice(&out.value.to_le_bytes());
            let script = out.destination.to_script();
            write_varint(buf, script.len() as u64);
            buf.extend_from_slice(&script);
        }
    }

    pub fn txid(&self) -> Txid {
        Txid(double_sha256(&self.serialize()))
    }

    /// Size in bytes; exact once fully signed, an estimate (72-byte
    /// signatures) while unsigned.
    pub fn estimated_size(&self) -> usize {
        4 + 4
            + varint_len(self.inputs.len() as u64)
            + self.inputs.iter().map(|i| i.size()).sum::<usize>()
            + varint_len(self.outputs.len() as u64)
            + self.outputs.iter().map(|o| o.size()).sum::<usize>()
    }

    pub fn input_value(&self) -> u64 {
        self.inputs.iter().map(|i| i.value).sum()
    }

    pub fn output_value(&self) -> u64 {
        self.outputs.iter().map(|o| o.value).sum()
    }

    pub fn fee(&self) -> u64 {
        self.input_value().saturating_sub(self.output_value())
    }

    pub fn is_complete(&self) -> bool {
        self.inputs.iter().all(|i| i.is_signed())
    }

    pub fn shuffle_inputs(&mut self) {
        self.inputs.shuffle(&mut rand::thread_rng());
    }

    /// Shuffle outputs for privacy unless the caller needs a deterministic
    /// ordering (OP_RETURN protocols).
    pub fn sort_outputs(&mut self, shuffle: bool) {
        if shuffle {
            self.outputs.shuffle(&mut rand::thread_rng());
        }
    }

    /// BIP143 signature hash for one input (SIGHASH_ALL | FORKID).
    pub fn sighash(&self, input_index: usize, script_code: &[u8]) -> Result<[u8; 32]> {
        let input = self
            .inputs
            .get(input_index)
            .ok_or_else(|| Error::Signer(format!("input index {} out of range", input_index)))?;

        let mut prevouts = Vec::with_capacity(self.inputs.len() * 36);
        let mut sequences = Vec::with_capacity(self.inputs.len() * 4);
        for inp in &self.inputs {
            prevouts.extend_from_slice(inp.outpoint.txid.as_wire_bytes());
            prevouts.extend_from_slice(&inp.outpoint.vout.to_le_bytes());
            sequences.extend_from_slice(&inp.sequence.to_le_bytes());
        }
        let hash_prevouts = double_sha256(&prevouts);
        let hash_sequence = double_sha256(&sequences);

        let mut outputs = Vec::new();
        for out in &self.outputs {
            outputs.extend_from_slice(&out.value.to_le_bytes());
            let script = out.destination.to_script();
            write_varint(&mut outputs, script.len() as u64);
            outputs.extend_from_slice(&script);
        }
        let hash_outputs = double_sha256(&outputs);

        let mut preimage = Vec::new();
        preimage.extend_from_slice(&self.version.to_le_bytes());
        preimage.extend_from_slice(&hash_prevouts);
        preimage.extend_from_slice(&hash_sequence);
        preimage.extend_from_slice(input.outpoint.txid.as_wire_bytes());
        preimage.extend_from_slice(&input.outpoint.vout.to_le_bytes());
        write_varint(&mut preimage, script_code.len() as u64);
        preimage.extend_from_slice(script_code);
        preimage.extend_from_slice(&input.value.to_le_bytes());
        preimage.extend_from_slice(&input.sequence.to_le_bytes());
        preimage.extend_from_slice(&hash_outputs);
        preimage.extend_from_slice(&self.locktime.to_le_bytes());
        preimage.extend_from_slice(&SIGHASH_ALL_FORKID.to_le_bytes());

        Ok(double_sha256(&preimage))
    }
}

// ── varints ─────────────────────────────────────────────────────────────

pub fn write_varint(buf: &mut Vec<u8>, n: u64) {
    if n < 0xfd {
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(0xfd);
        buf.extend_from_slice(&(n as u16).to_le_bytes());
    } else if n <= 0xffff_ffff {
        buf.push(0xfe);
        buf.extend_from_slice(&(n as u32).to_le_bytes());
    } else {
        buf.push(0xff);
        buf.extend_from_slice(&n.to_le_bytes());
    }
}

pub fn varint_len(n: u64) -> usize {
    if n < 0xfd {
        1
    } else if n <= 0xffff {
        3
    } else if n <= 0xffff_ffff {
        5
    } else {
        9
    }
}
