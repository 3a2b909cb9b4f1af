//! The unsigned-transaction builder: the engine entry point behind the send
//! form's trial rebuilds and the final pre-signing build.

use crate::address::Address;
use crate::coinchooser;
use crate::error::{Error, Result};
use crate::fee::{FeePolicy, MAX_FEE_RATE_SAT_PER_BYTE};
use crate::transaction::{Coin, Output, OutputValue, Transaction, TxInput, TxOutput};

/// Build an unsigned transaction funding `outputs` from `coins`.
///
/// At most one output may carry the max sentinel; when present, every coin
/// is spent and that output receives whatever remains after the fee. Output
/// shuffling is on by default and only disabled for order-sensitive
/// OP_RETURN protocols.
pub fn make_unsigned_transaction(
    coins: &[Coin],
    outputs: &[Output],
    fee_policy: FeePolicy,
    change_addresses: &[Address],
    shuffle_outputs: bool,
) -> Result<Transaction> {
    let mut i_max = None;
    for (i, out) in outputs.iter().enumerate() {
        if out.value.is_max() {
            if i_max.is_some() {
                return Err(Error::MultipleMaxOutputs);
            }
            i_max = Some(i);
        }
    }
    if outputs.is_empty() {
        return Err(Error::Query("no outputs".into()));
    }
    if coins.is_empty() {
        return Err(Error::NotEnoughFunds);
    }

    let fee_for_size = |size: usize| fee_policy.fee_for_size(size);

    let mut tx = match i_max {
        None => {
            let concrete: Vec<TxOutput> = outputs
                .iter()
                .map(|o| TxOutput {
                    destination: o.destination.clone(),
                    value: match o.value {
                        OutputValue::Sats(v) => v,
                        OutputValue::Max => unreachable!(),
                    },
                })
                .collect();
            coinchooser::make_tx(coins, concrete, change_addresses, &fee_for_size)?
        }
        Some(i_max) => {
            // Spend-all: every coin becomes an input, no change, and the max
            // output absorbs the remainder after the fee.
            let sendable: u64 = coins.iter().map(|c| c.value).sum();
            let inputs: Vec<TxInput> = coins.iter().map(TxInput::from_coin).collect();
            let mut concrete: Vec<TxOutput> = outputs
                .iter()
                .map(|o| TxOutput {
                    destination: o.destination.clone(),
                    value: match o.value {
                        OutputValue::Sats(v) => v,
                        OutputValue::Max => 0,
                    },
                })
                .collect();
            let trial = Transaction::from_io(inputs.clone(), concrete.clone());
            let fee = fee_for_size(trial.estimated_size());
            let others: u64 = concrete.iter().map(|o| o.value).sum();
            let amount = sendable.saturating_sub(others).saturating_sub(fee);
            if amount == 0 {
                return Err(Error::NotEnoughFunds);
            }
            concrete[i_max].value = amount;
            Transaction::from_io(inputs, concrete)
        }
    };

    // Stop users from shooting themselves in the foot with an absurd manual
    // fee: anything past the ceiling refuses to build.
    let size = tx.estimated_size() as u64;
    if tx.fee() > size * MAX_FEE_RATE_SAT_PER_BYTE {
        log::warn!(
            "refusing to build: fee {} exceeds {} sat/byte over {} bytes",
            tx.fee(),
            MAX_FEE_RATE_SAT_PER_BYTE,
            size
        );
        return Err(Error::ExcessiveFee);
    }

    tx.shuffle_inputs();
    tx.sort_outputs(shuffle_outputs);
    Ok(tx)
}
