//! Coin selection for unsigned transactions.
//!
//! Deterministic largest-first accumulation: keeps input counts (and thus
//! fees) small and makes trial rebuilds reproducible between keystrokes.
//! Privacy comes from input/output shuffling at the builder level, not from
//! randomized selection.

use crate::address::Address;
use crate::error::{Error, Result};
use crate::transaction::{
    Coin, DUST_THRESHOLD, Destination, Transaction, TxInput, TxOutput, varint_len,
};

const P2PKH_OUTPUT_SIZE: usize = 34;

fn tx_size(n_inputs: usize, outputs: &[TxOutput], with_change: bool) -> usize {
    let n_outputs = outputs.len() + usize::from(with_change);
    8 + varint_len(n_inputs as u64)
        + n_inputs * crate::transaction::P2PKH_INPUT_SIZE
        + varint_len(n_outputs as u64)
        + outputs.iter().map(|o| o.size()).sum::<usize>()
        + if with_change { P2PKH_OUTPUT_SIZE } else { 0 }
}

/// Select coins to fund `outputs` plus fees, adding a change output when the
/// remainder clears the dust threshold. The resulting transaction always
/// balances exactly: `sum(inputs) == sum(outputs) + fee`.
pub fn make_tx(
    available: &[Coin],
    outputs: Vec<TxOutput>,
    change_addresses: &[Address],
    fee_for_size: &dyn Fn(usize) -> u64,
) -> Result<Transaction> {
    let change_address = change_addresses
        .first()
        .copied()
        .ok_or_else(|| Error::Query("no change address available".into()))?;
    let spent: u64 = outputs.iter().map(|o| o.value).sum();

    let mut candidates: Vec<&Coin> = available.iter().collect();
    candidates.sort_by(|a, b| b.value.cmp(&a.value).then(a.outpoint.vout.cmp(&b.outpoint.vout)));

    enum Funding {
        WithChange(u64),
        NoChange,
    }

    let mut selected: Vec<TxInput> = Vec::new();
    let mut total: u64 = 0;
    let mut funding = None;
    for coin in candidates {
        selected.push(TxInput::from_coin(coin));
        total += coin.value;

        // Prefer a change output when the remainder is worth keeping.
        let fee_with_change = fee_for_size(tx_size(selected.len(), &outputs, true));
        if let Some(change) = total
            .checked_sub(spent)
            .and_then(|r| r.checked_sub(fee_with_change))
        {
            if change >= DUST_THRESHOLD {
                funding = Some(Funding::WithChange(change));
                break;
            }
        }

        // Otherwise the sub-dust remainder is absorbed into the fee.
        let fee_no_change = fee_for_size(tx_size(selected.len(), &outputs, false));
        if total >= spent + fee_no_change {
            funding = Some(Funding::NoChange);
            break;
        }
    }

    match funding {
        Some(Funding::WithChange(change)) => {
            let mut outputs = outputs;
            outputs.push(TxOutput {
                destination: Destination::Address(change_address),
                value: change,
            });
            Ok(Transaction::from_io(selected, outputs))
        }
        Some(Funding::NoChange) => Ok(Transaction::from_io(selected, outputs)),
        None => Err(Error::NotEnoughFunds),
    }
}
