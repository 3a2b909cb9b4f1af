//! Software signing: BIP32-style hardened key derivation from a seed and
//! P2PKH scriptSig construction with SIGHASH_ALL | FORKID signatures.

use std::collections::HashMap;

use hmac::{Hmac, Mac};
use ripemd::Ripemd160;
use secp256k1::{All, Message, PublicKey, Scalar, Secp256k1, SecretKey};
use sha2::{Digest, Sha256, Sha512};
use zeroize::Zeroize;

use crate::address::Address;
use crate::error::{Error, Result};
use crate::script;
use crate::transaction::Transaction;

type HmacSha512 = Hmac<Sha512>;

const HARDENED: u32 = 0x8000_0000;

/// RIPEMD160(SHA256(data))
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let sha = Sha256::digest(data);
    Ripemd160::digest(sha).into()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyBranch {
    Receiving,
    Change,
}

impl KeyBranch {
    fn index(self) -> u32 {
        match self {
            KeyBranch::Receiving => 0,
            KeyBranch::Change => 1,
        }
    }
}

/// Holds the derivation root and a cache of derived keys keyed by address.
/// Only inputs whose owning address is in the cache get signed; foreign
/// inputs are left untouched, producing a partially-signed transaction.
#[derive(Clone)]
pub struct SoftwareSigner {
    secp: Secp256k1<All>,
    master_key: SecretKey,
    chain_code: [u8; 32],
    keys: HashMap<Address, SecretKey>,
}

impl SoftwareSigner {
    pub fn from_seed(seed: &[u8]) -> Result<Self> {
        if seed.is_empty() {
            return Err(Error::Signer("empty seed".into()));
        }
        let mut mac = HmacSha512::new_from_slice(b"Bitcoin seed")
            .map_err(|e| Error::Signer(e.to_string()))?;
        mac.update(seed);
        let digest = mac.finalize().into_bytes();
        let master_key =
            SecretKey::from_slice(&digest[..32]).map_err(|e| Error::Signer(e.to_string()))?;
        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&digest[32..]);
        Ok(SoftwareSigner {
            secp: Secp256k1::new(),
            master_key,
            chain_code,
            keys: HashMap::new(),
        })
    }

    fn ckd_hardened(
        &self,
        parent_key: &SecretKey,
        parent_cc: &[u8; 32],
        index: u32,
    ) -> Result<(SecretKey, [u8; 32])> {
        let mut mac =
            HmacSha512::new_from_slice(parent_cc).map_err(|e| Error::Signer(e.to_string()))?;
        let mut data = [0u8; 37];
        data[1..33].copy_from_slice(&parent_key.secret_bytes());
        data[33..37].copy_from_slice(&(HARDENED | index).to_be_bytes());
        mac.update(&data);
        data.zeroize();

        let digest = mac.finalize().into_bytes();
        let mut il = [0u8; 32];
        il.copy_from_slice(&digest[..32]);
        let tweak = Scalar::from_be_bytes(il).map_err(|e| Error::Signer(e.to_string()))?;
        il.zeroize();
        let child = (*parent_key)
            .add_tweak(&tweak)
            .map_err(|e| Error::Signer(e.to_string()))?;
        let mut cc = [0u8; 32];
        cc.copy_from_slice(&digest[32..]);
        Ok((child, cc))
    }

    fn key_at(&self, branch: KeyBranch, index: u32) -> Result<SecretKey> {
        let (branch_key, branch_cc) =
            self.ckd_hardened(&self.master_key, &self.chain_code, branch.index())?;
        let (key, _) = self.ckd_hardened(&branch_key, &branch_cc, index)?;
        Ok(key)
    }

    /// Derive the address at (branch, index) and remember its key for
    /// signing.
    pub fn derive(&mut self, branch: KeyBranch, index: u32) -> Result<Address> {
        let key = self.key_at(branch, index)?;
        let pubkey = PublicKey::from_secret_key(&self.secp, &key);
        let address = Address::p2pkh(hash160(&pubkey.serialize()));
        self.keys.insert(address, key);
        Ok(address)
    }

    pub fn knows(&self, address: &Address) -> bool {
        self.keys.contains_key(address)
    }

    /// Sign every input we hold the key for. Returns the number of inputs
    /// signed this call; the transaction may still be incomplete if some
    /// inputs belong to other parties.
    pub fn sign_transaction(&self, tx: &mut Transaction) -> Result<usize> {
        let mut signed = 0;
        for i in 0..tx.inputs.len() {
            if tx.inputs[i].is_signed() {
                continue;
            }
            let Some(address) = tx.inputs[i].address else {
                continue;
            };
            let Some(key) = self.keys.get(&address) else {
                continue;
            };
            let script_code = address.to_script();
            let digest = tx.sighash(i, &script_code)?;
            let message = Message::from_digest(digest);
            let signature = self.secp.sign_ecdsa(&message, key);

            let mut sig_bytes = signature.serialize_der().to_vec();
            sig_bytes.push(crate::transaction::SIGHASH_ALL_FORKID as u8);
            let pubkey = PublicKey::from_secret_key(&self.secp, key).serialize();

            let mut script_sig = Vec::with_capacity(sig_bytes.len() + pubkey.len() + 2);
            script::push_data(&mut script_sig, &sig_bytes);
            script::push_data(&mut script_sig, &pubkey);
            tx.inputs[i].script_sig = script_sig;
            signed += 1;
        }
        Ok(signed)
    }
}

impl Drop for SoftwareSigner {
    fn drop(&mut self) {
        self.master_key.non_secure_erase();
        self.chain_code.zeroize();
        for key in self.keys.values_mut() {
            key.non_secure_erase();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::{Coin, OutPoint, TxInput, TxOutput, Txid};
    use crate::transaction::Destination;

    fn signer() -> SoftwareSigner {
        SoftwareSigner::from_seed(&[7u8; 64]).unwrap()
    }

    #[test]
    fn derivation_is_deterministic() {
        let mut a = signer();
        let mut b = signer();
        assert_eq!(
            a.derive(KeyBranch::Receiving, 0).unwrap(),
            b.derive(KeyBranch::Receiving, 0).unwrap()
        );
        assert_ne!(
            a.derive(KeyBranch::Receiving, 0).unwrap(),
            a.derive(KeyBranch::Receiving, 1).unwrap()
        );
        assert_ne!(
            a.derive(KeyBranch::Receiving, 3).unwrap(),
            a.derive(KeyBranch::Change, 3).unwrap()
        );
    }

    #[test]
    fn different_seeds_differ() {
        let mut a = SoftwareSigner::from_seed(&[1u8; 64]).unwrap();
        let mut b = SoftwareSigner::from_seed(&[2u8; 64]).unwrap();
        assert_ne!(
            a.derive(KeyBranch::Receiving, 0).unwrap(),
            b.derive(KeyBranch::Receiving, 0).unwrap()
        );
    }

    #[test]
    fn signs_owned_inputs_only() {
        let mut signer = signer();
        let mine = signer.derive(KeyBranch::Receiving, 0).unwrap();
        let foreign = Address::p2pkh([0x99; 20]);

        let coin = |address, tag: u8| Coin {
            outpoint: OutPoint::new(Txid::from_wire_bytes([tag; 32]), 0),
            value: 5000,
            address,
            height: Some(1),
            unremovable: false,
        };
        let mut tx = Transaction::from_io(
            vec![
                TxInput::from_coin(&coin(mine, 1)),
                TxInput::from_coin(&coin(foreign, 2)),
            ],
            vec![TxOutput {
                destination: Destination::Address(Address::p2pkh([0xee; 20])),
                value: 9000,
            }],
        );

        let signed = signer.sign_transaction(&mut tx).unwrap();
        assert_eq!(signed, 1);
        assert!(tx.inputs[0].is_signed());
        assert!(!tx.inputs[1].is_signed());
        assert!(!tx.is_complete());

        // Signing again is a no-op for already-signed inputs.
        assert_eq!(signer.sign_transaction(&mut tx).unwrap(), 0);
    }

    #[test]
    fn script_sig_shape() {
        let mut signer = signer();
        let mine = signer.derive(KeyBranch::Receiving, 4).unwrap();
        let mut tx = Transaction::from_io(
            vec![TxInput::from_coin(&Coin {
                outpoint: OutPoint::new(Txid::from_wire_bytes([5; 32]), 1),
                value: 7000,
                address: mine,
                height: None,
                unremovable: false,
            })],
            vec![TxOutput {
                destination: Destination::Address(Address::p2pkh([0xee; 20])),
                value: 6500,
            }],
        );
        signer.sign_transaction(&mut tx).unwrap();
        assert!(tx.is_complete());

        let script_sig = &tx.inputs[0].script_sig;
        // <push sig> <push 33-byte pubkey>
        let sig_len = script_sig[0] as usize;
        assert!((60..=74).contains(&sig_len));
        // signature ends with the forkid sighash byte
        assert_eq!(script_sig[sig_len], 0x41);
        assert_eq!(script_sig[1 + sig_len], 33);
        assert_eq!(script_sig.len(), 1 + sig_len + 1 + 33);

        // The pubkey hashes back to the owning address.
        let pubkey = &script_sig[2 + sig_len..];
        assert_eq!(hash160(pubkey), mine.hash);
    }

    #[test]
    fn empty_seed_rejected() {
        assert!(SoftwareSigner::from_seed(&[]).is_err());
    }
}
