//! Minimal script construction: locking-script templates, data pushes, and
//! the OP_RETURN output policy.

use crate::error::{Error, Result};
use crate::transaction::{Destination, Output, OutputValue};

pub const OP_0: u8 = 0x00;
pub const OP_PUSHDATA1: u8 = 0x4c;
pub const OP_PUSHDATA2: u8 = 0x4d;
pub const OP_RETURN: u8 = 0x6a;
pub const OP_DUP: u8 = 0x76;
pub const OP_EQUAL: u8 = 0x87;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_HASH160: u8 = 0xa9;
pub const OP_CHECKSIG: u8 = 0xac;

/// Append a minimally-encoded data push.
pub fn push_data(buf: &mut Vec<u8>, data: &[u8]) {
    match data.len() {
        0 => buf.push(OP_0),
        n if n < OP_PUSHDATA1 as usize => {
            buf.push(n as u8);
            buf.extend_from_slice(data);
        }
        n if n <= 0xff => {
            buf.push(OP_PUSHDATA1);
            buf.push(n as u8);
            buf.extend_from_slice(data);
        }
        n => {
            buf.push(OP_PUSHDATA2);
            buf.extend_from_slice(&(n as u16).to_le_bytes());
            buf.extend_from_slice(data);
        }
    }
}

/// OP_DUP OP_HASH160 <hash> OP_EQUALVERIFY OP_CHECKSIG
pub fn p2pkh_script(hash: &[u8; 20]) -> Vec<u8> {
    let mut s = Vec::with_capacity(25);
    s.push(OP_DUP);
    s.push(OP_HASH160);
    s.push(20);
    s.extend_from_slice(hash);
    s.push(OP_EQUALVERIFY);
    s.push(OP_CHECKSIG);
    s
}

/// OP_HASH160 <hash> OP_EQUAL
pub fn p2sh_script(hash: &[u8; 20]) -> Vec<u8> {
    let mut s = Vec::with_capacity(23);
    s.push(OP_HASH160);
    s.push(20);
    s.extend_from_slice(hash);
    s.push(OP_EQUAL);
    s
}

/// An arbitrary locking script used as a transaction destination (raw script
/// payees and OP_RETURN data outputs).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScriptOutput {
    bytes: Vec<u8>,
}

impl ScriptOutput {
    pub fn new(bytes: Vec<u8>) -> Self {
        ScriptOutput { bytes }
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes =
            hex::decode(s.trim()).map_err(|e| Error::Script(format!("bad script hex: {}", e)))?;
        if bytes.is_empty() {
            return Err(Error::Script("empty script".into()));
        }
        Ok(ScriptOutput { bytes })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.bytes.clone()
    }

    pub fn is_opreturn(&self) -> bool {
        self.bytes.first() == Some(&OP_RETURN)
    }
}

/// OP_RETURN output construction. Two modes, matching the send form:
/// free text (UTF-8, single push) and raw hex (appended verbatim after the
/// opcode). Both enforce the 220-byte payload ceiling with a dedicated
/// error so callers can distinguish it from generic parse failures.
pub mod op_return {
    use super::*;

    pub const MAX_PAYLOAD_BYTES: usize = 220;

    /// `OP_RETURN <push(utf8)>`
    pub fn output_for_stringdata(text: &str) -> Result<Output> {
        let payload = text.as_bytes();
        if payload.len() > MAX_PAYLOAD_BYTES {
            return Err(Error::OpReturnTooLarge);
        }
        let mut script = Vec::with_capacity(payload.len() + 3);
        script.push(OP_RETURN);
        push_data(&mut script, payload);
        Ok(Output {
            destination: Destination::Script(ScriptOutput::new(script)),
            value: OutputValue::Sats(0),
        })
    }

    /// `OP_RETURN <raw script bytes>`. The literal input `"empty"` stands
    /// for an empty payload (bare OP_RETURN).
    pub fn output_for_rawhex(text: &str) -> Result<Output> {
        let text = if text == "empty" { "" } else { text };
        let payload = hex::decode(text.trim())
            .map_err(|_| Error::OpReturn("OP_RETURN script expected to be hexadecimal bytes".into()))?;
        if payload.len() > MAX_PAYLOAD_BYTES {
            return Err(Error::OpReturnTooLarge);
        }
        let mut script = Vec::with_capacity(payload.len() + 1);
        script.push(OP_RETURN);
        script.extend_from_slice(&payload);
        Ok(Output {
            destination: Destination::Script(ScriptOutput::new(script)),
            value: OutputValue::Sats(0),
        })
    }
}
