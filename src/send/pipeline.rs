//! The signing/broadcast pipeline behind the send button.
//!
//! built → signing → {signed-complete, signed-incomplete} → broadcasting →
//! {ok, failed}. Signing and broadcasting run on background tasks; every
//! outcome re-enters the session through its event channel, so session
//! state is only ever touched from the session owner's context.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

use centavo_sdk::{ChainBackend, NO_URL, PaymentRequest, SoftwareSigner, Transaction};

use super::SessionEvent;

/// Host-provided interactive prompts (the headless stand-in for the GUI's
/// modal dialogs).
pub trait UserPrompts: Send + Sync {
    /// Yes/no confirmation; `false` aborts the operation.
    fn confirm(&self, message: &str) -> bool;

    /// Ask for the wallet password; `None` means the user cancelled.
    fn password(&self, message: &str) -> Option<String>;
}

/// One send attempt: the frozen transaction plus per-attempt UI state.
/// The low-fee flag lives here, not on the transaction, so "warn at most
/// once per transaction instance" holds across the two code paths that can
/// reach the warning.
#[derive(Debug, Clone)]
pub struct SendAttempt {
    pub tx: Transaction,
    pub label: Option<String>,
    pub warned_low_fee: bool,
    /// Invoice-list key to mark paid on success.
    pub pr_key: Option<String>,
}

async fn broadcast_raw(backend: &Arc<dyn ChainBackend>, raw: Vec<u8>) -> Result<(), String> {
    let backend = Arc::clone(backend);
    tokio::task::spawn_blocking(move || backend.broadcast(&raw).map(|_| ()))
        .await
        .map_err(|e| format!("broadcast task failed: {e}"))?
        .map_err(|e| e.to_string())
}

#[allow(clippy::too_many_arguments)]
pub fn spawn_sign_and_broadcast(
    mut attempt: SendAttempt,
    signer: SoftwareSigner,
    backend: Arc<dyn ChainBackend>,
    payment_request: Option<PaymentRequest>,
    refund_address: Option<String>,
    http: reqwest::Client,
    prompts: Arc<dyn UserPrompts>,
    events: UnboundedSender<SessionEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let unsigned = attempt.tx.clone();
        let signed = tokio::task::spawn_blocking(move || {
            let mut tx = unsigned;
            signer.sign_transaction(&mut tx).map(|_| tx)
        })
        .await;

        let tx = match signed {
            Ok(Ok(tx)) => tx,
            Ok(Err(e)) => {
                let _ = events.send(SessionEvent::SigningFailed(e.to_string()));
                return;
            }
            Err(e) => {
                let _ = events.send(SessionEvent::SigningFailed(format!(
                    "signing task failed: {e}"
                )));
                return;
            }
        };

        if !tx.is_complete() {
            // Multisig-style flows: hand the partial transaction back for
            // further co-signing instead of broadcasting.
            let _ = events.send(SessionEvent::SignedIncomplete(tx));
            return;
        }

        // The low-fee warning can be reached from the confirm step or from
        // here, depending on whether the transaction was already complete;
        // the attempt flag makes sure the user is asked at most once.
        if tx.fee() < tx.estimated_size() as u64 && !attempt.warned_low_fee {
            attempt.warned_low_fee = true;
            let proceed = prompts.confirm(
                "Warning: You're using a fee of less than 1.0 sats/B. It may take a very long \
                 time to confirm.\n\nProceed?",
            );
            if !proceed {
                let _ = events.send(SessionEvent::BroadcastDone {
                    ok: false,
                    message: String::new(),
                    txid: None,
                    pr_key: None,
                    label: None,
                });
                return;
            }
        }

        let raw = tx.serialize();
        let txid = tx.txid().to_string();

        let (ok, message, pr_key) = match payment_request {
            None => match broadcast_raw(&backend, raw).await {
                Ok(()) => (true, String::new(), None),
                Err(e) => (false, e, None),
            },
            Some(pr) => {
                if pr.has_expired() {
                    let _ = events.send(SessionEvent::PaymentRequestExpired);
                    let _ = events.send(SessionEvent::BroadcastDone {
                        ok: false,
                        message: "Payment request has expired".to_string(),
                        txid: None,
                        pr_key: None,
                        label: None,
                    });
                    return;
                }

                let refund = refund_address.unwrap_or_default();
                let (ack_ok, ack_msg) = pr.send_payment(&http, &hex::encode(&raw), &refund).await;
                let ack_msg = if ack_ok {
                    Some(ack_msg)
                } else if ack_msg == NO_URL {
                    // Merchant declared no POST endpoint: not a failure,
                    // broadcast on-chain and rely on that status alone.
                    None
                } else {
                    let _ = events.send(SessionEvent::BroadcastDone {
                        ok: false,
                        message: ack_msg,
                        txid: None,
                        pr_key: None,
                        label: None,
                    });
                    return;
                };

                let (chain_ok, chain_msg) = match broadcast_raw(&backend, raw).await {
                    Ok(()) => (true, String::new()),
                    Err(e) => (false, e),
                };

                // Prefer the merchant's ACK message over the broadcast
                // message; success is the OR of the two.
                let message = ack_msg
                    .filter(|m| !m.is_empty())
                    .unwrap_or(chain_msg);
                let ok = ack_ok || chain_ok;
                (ok, message, ok.then(|| pr.id()))
            }
        };

        let _ = events.send(SessionEvent::BroadcastDone {
            ok,
            message,
            txid: ok.then_some(txid),
            pr_key,
            label: attempt.label,
        });
    })
}
