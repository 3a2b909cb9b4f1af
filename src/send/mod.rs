//! The send session: the headless send tab.
//!
//! All shared state the GUI used to keep on widget attributes lives on this
//! one context object. Edits set a dirty flag; the host drives `tick()`
//! periodically, which drains completion events from background tasks and
//! performs at most one coalesced fee recomputation per tick, so a burst of
//! keystrokes costs one trial-transaction rebuild.

pub mod pipeline;

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use centavo_sdk::{
    Coin, Destination, Error as SdkError, InvoiceEntry, InvoiceList, InvoiceStatus, Network,
    OutPoint, Output, OutputValue, ParsedPayto, PaymentRequest, Transaction, base_unit,
    format_satoshis, op_return, parse_amount, parse_payto, parse_uri,
};

use crate::alias::{AliasRecord, AliasResolver};
use crate::config::SendConfig;
use crate::contacts::Contacts;
use crate::wallet::WalletManager;

pub use pipeline::{SendAttempt, UserPrompts};

/// Warn when a URI prefills more than this many satoshis (3,000,000 XEC);
/// the user is one click away from broadcasting it.
const URI_AMOUNT_WARNING_SATS: u64 = 300_000_000;

#[derive(Debug, Error)]
pub enum SendError {
    #[error("Payment request has expired")]
    PaymentRequestExpired,

    #[error("Invalid lines found:\n\n{0}")]
    InvalidLines(String),

    #[error("No outputs")]
    NoOutputs,

    #[error("Invalid Amount")]
    InvalidAmount,

    #[error("Insufficient funds")]
    InsufficientFunds,

    #[error("Your fee is too high. Max is 50 sat/byte.")]
    FeeTooHigh,

    #[error("{0}")]
    OpReturn(String),

    #[error("Not connected")]
    NotConnected,

    #[error("cancelled")]
    Cancelled,

    #[error(
        "Possible BTC Segwit address in 'Pay to' field. Please use CashAddr format for p2sh \
         addresses."
    )]
    SegwitSuspect,

    #[error(
        "Inconsistent number of addresses and amounts in URI: {addresses} addresses and \
         {amounts} amounts"
    )]
    InconsistentUri { addresses: usize, amounts: usize },

    #[error("invalid payment URI: {0}")]
    BadUri(String),

    #[error("wallet error: {0}")]
    Wallet(String),

    #[error("{0}")]
    Other(String),
}

/// Completions from background tasks, marshaled back into `tick()`.
#[derive(Debug)]
pub enum SessionEvent {
    AliasResolved {
        name: String,
        record: Option<AliasRecord>,
    },
    PaymentRequestFetched(Result<PaymentRequest, String>),
    SigningFailed(String),
    SignedIncomplete(Transaction),
    PaymentRequestExpired,
    BroadcastDone {
        ok: bool,
        message: String,
        txid: Option<String>,
        pr_key: Option<String>,
        label: Option<String>,
    },
}

/// User-facing outcomes surfaced by `tick()` for the host to display.
#[derive(Debug, Clone)]
pub enum SessionNotice {
    Info(String),
    Error(String),
    /// Signed but incomplete (multisig-style); show for further co-signing.
    IncompleteTransaction(Transaction),
    PaymentSent {
        txid: Option<String>,
        message: String,
    },
}

/// Typed result of one fee-recompute pass, so tests can assert on the
/// silent-ignore arm directly instead of observing the absence of UI
/// changes.
#[derive(Debug, Clone, PartialEq)]
pub enum FeeUpdateOutcome {
    /// No amount entered; nothing to compute.
    Idle,
    Ready {
        fee: u64,
        sat_per_byte: f64,
        amount: u64,
    },
    NotEnoughFunds,
    OpReturnTooLarge,
    OpReturnError(String),
    /// Construction failed for a reason the form deliberately does not
    /// surface (transient mid-typing states).
    Ignored,
}

struct SendForm {
    outputs: Vec<Output>,
    fee_override: Option<u64>,
    label: String,
    coins: Vec<Coin>,
}

struct FinalBuild {
    tx: Transaction,
    amount: u64,
    label: String,
}

pub struct SendSession {
    network: Network,
    config: SendConfig,
    prompts: Arc<dyn UserPrompts>,
    resolver: Option<Arc<dyn AliasResolver>>,
    http: reqwest::Client,

    // form state
    payto_text: String,
    parsed: ParsedPayto,
    amount_text: String,
    max_button: bool,
    message_text: String,
    op_return_text: String,
    op_return_raw: bool,
    shuffle_outputs: bool,
    manual_fee: Option<u64>,
    fee_modified: bool,
    auto_fee: Option<u64>,

    // shared send state
    pay_from: Vec<Coin>,
    payment_request: Option<PaymentRequest>,
    payto_is_pr: bool,
    payto_frozen: bool,
    amount_frozen: bool,
    alias: Option<AliasRecord>,
    alias_pending: Option<String>,
    alias_last_attempt: Option<String>,

    // derived flags
    not_enough_funds: bool,
    op_return_toolong: bool,
    require_fee_update: bool,
    status: String,

    events_tx: UnboundedSender<SessionEvent>,
    events_rx: UnboundedReceiver<SessionEvent>,
}

impl SendSession {
    pub fn new(
        network: Network,
        config: SendConfig,
        prompts: Arc<dyn UserPrompts>,
        resolver: Option<Arc<dyn AliasResolver>>,
    ) -> Self {
        let (events_tx, events_rx) = unbounded_channel();
        SendSession {
            network,
            config,
            prompts,
            resolver,
            http: reqwest::Client::new(),
            payto_text: String::new(),
            parsed: ParsedPayto::default(),
            amount_text: String::new(),
            max_button: false,
            message_text: String::new(),
            op_return_text: String::new(),
            op_return_raw: false,
            shuffle_outputs: true,
            manual_fee: None,
            fee_modified: false,
            auto_fee: None,
            pay_from: Vec::new(),
            payment_request: None,
            payto_is_pr: false,
            payto_frozen: false,
            amount_frozen: false,
            alias: None,
            alias_pending: None,
            alias_last_attempt: None,
            not_enough_funds: false,
            op_return_toolong: false,
            require_fee_update: false,
            status: String::new(),
            events_tx,
            events_rx,
        }
    }

    pub fn set_config(&mut self, config: SendConfig) {
        self.config = config;
        self.require_fee_update = true;
    }

    // ── form edits ──────────────────────────────────────────────────────

    pub fn set_payto_text(&mut self, text: &str, contacts: &Contacts) {
        if self.payto_frozen {
            return;
        }
        self.payto_text = text.to_string();
        self.reparse_payto(contacts);
        if self.alias_last_attempt.as_deref() != Some(self.payto_text.trim()) {
            self.alias = None;
        }
        self.require_fee_update = true;
    }

    fn reparse_payto(&mut self, contacts: &Contacts) {
        let network = self.network;
        self.parsed = parse_payto(
            &self.payto_text,
            network,
            self.config.decimal_point,
            &|name| contacts.resolve(name, network),
        );
        // Pay-to-many locks the amount field and displays the outputs total.
        if self.parsed.is_multiline {
            let total: u64 = self
                .parsed
                .outputs
                .iter()
                .map(|o| match o.value {
                    OutputValue::Sats(v) => v,
                    OutputValue::Max => 0,
                })
                .sum();
            self.amount_text = format_satoshis(total, self.config.decimal_point);
        }
    }

    /// Whether the amount field is currently driven by something else
    /// (pay-to-many lines or an active payment request).
    pub fn amount_locked(&self) -> bool {
        self.amount_frozen || self.parsed.is_multiline
    }

    pub fn set_amount_text(&mut self, text: &str) {
        if self.amount_locked() {
            return;
        }
        self.amount_text = text.to_string();
        self.max_button = false;
        self.require_fee_update = true;
    }

    pub fn spend_max(&mut self) {
        self.max_button = true;
        self.require_fee_update = true;
    }

    pub fn set_message(&mut self, text: &str) {
        self.message_text = text.to_string();
    }

    pub fn set_op_return(&mut self, text: &str, raw: bool) {
        self.op_return_text = text.to_string();
        self.op_return_raw = raw;
        if text.is_empty() {
            self.op_return_toolong = false;
        }
        self.require_fee_update = true;
    }

    /// Output shuffling preference. Only consulted while OP_RETURN data is
    /// present; ordinary payments always shuffle.
    pub fn set_shuffle_outputs(&mut self, shuffle: bool) {
        self.shuffle_outputs = shuffle;
    }

    pub fn shuffle_toggle_enabled(&self) -> bool {
        !self.op_return_text.is_empty()
    }

    /// Manually freeze the fee field to a fixed amount; `None` returns it
    /// to auto-computation.
    pub fn set_manual_fee(&mut self, fee: Option<u64>) {
        self.manual_fee = fee;
        self.fee_modified = fee.is_some();
        self.require_fee_update = true;
    }

    /// Replace the "pay from" coin list (explicit coin control).
    pub fn spend_coins(&mut self, coins: Vec<Coin>) {
        self.pay_from = coins;
        self.require_fee_update = true;
    }

    /// Remove one coin from the pay-from list; force-included coins stay.
    pub fn remove_pay_from(&mut self, outpoint: &OutPoint) {
        self.pay_from
            .retain(|c| c.unremovable || c.outpoint != *outpoint);
        self.require_fee_update = true;
    }

    pub fn pay_from(&self) -> &[Coin] {
        &self.pay_from
    }

    // ── accessors ───────────────────────────────────────────────────────

    pub fn is_max(&self) -> bool {
        self.max_button || self.parsed.is_max
    }

    pub fn amount(&self) -> Option<u64> {
        parse_amount(&self.amount_text, self.config.decimal_point).ok()
    }

    pub fn amount_text(&self) -> &str {
        &self.amount_text
    }

    pub fn payto_text(&self) -> &str {
        &self.payto_text
    }

    pub fn message_text(&self) -> &str {
        &self.message_text
    }

    pub fn op_return_text(&self) -> &str {
        &self.op_return_text
    }

    pub fn op_return_raw(&self) -> bool {
        self.op_return_raw
    }

    pub fn displayed_fee(&self) -> Option<u64> {
        if self.fee_modified {
            self.manual_fee
        } else {
            self.auto_fee
        }
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn not_enough_funds(&self) -> bool {
        self.not_enough_funds
    }

    pub fn op_return_toolong(&self) -> bool {
        self.op_return_toolong
    }

    pub fn payment_request(&self) -> Option<&PaymentRequest> {
        self.payment_request.as_ref()
    }

    pub fn payto_frozen(&self) -> bool {
        self.payto_frozen
    }

    pub fn resolved_alias(&self) -> Option<&AliasRecord> {
        self.alias.as_ref()
    }

    // ── timer tick ──────────────────────────────────────────────────────

    /// One pass of the session's timer: drain background completions, kick
    /// off alias resolution when the recipient looks alias-shaped, then run
    /// the coalesced fee update if any edit happened since the last tick.
    pub fn tick(
        &mut self,
        wallet: &mut WalletManager,
        contacts: &mut Contacts,
        invoices: &mut InvoiceList,
    ) -> Vec<SessionNotice> {
        let mut notices = Vec::new();
        loop {
            let event = match self.events_rx.try_recv() {
                Ok(event) => event,
                Err(_) => break,
            };
            self.apply_event(event, wallet, contacts, invoices, &mut notices);
        }

        self.maybe_resolve_alias();

        if self.require_fee_update {
            self.require_fee_update = false;
            self.do_update_fee(wallet);
        }
        notices
    }

    fn maybe_resolve_alias(&mut self) {
        if self.payto_is_pr || !self.parsed.alias_candidate || self.alias_pending.is_some() {
            return;
        }
        let Some(resolver) = self.resolver.clone() else {
            return;
        };
        let name = self.payto_text.trim().to_string();
        if self.alias_last_attempt.as_deref() == Some(name.as_str()) {
            return;
        }
        self.alias_pending = Some(name.clone());
        self.alias_last_attempt = Some(name.clone());
        let events = self.events_tx.clone();
        tokio::task::spawn_blocking(move || {
            let record = resolver.resolve(&name);
            let _ = events.send(SessionEvent::AliasResolved { name, record });
        });
    }

    fn apply_event(
        &mut self,
        event: SessionEvent,
        wallet: &mut WalletManager,
        contacts: &mut Contacts,
        invoices: &mut InvoiceList,
        notices: &mut Vec<SessionNotice>,
    ) {
        match event {
            SessionEvent::AliasResolved { name, record } => {
                self.alias_pending = None;
                if self.payto_text.trim() != name {
                    return; // stale: the field changed while resolving
                }
                let Some(record) = record else {
                    return; // failure is silent, the field stays free text
                };
                self.payto_text = format!("{} <{}>", record.name, record.address);
                contacts.add_alias(&record);
                self.reparse_payto(contacts);
                self.alias = Some(record);
                self.payto_frozen = true;
                self.require_fee_update = true;
            }
            SessionEvent::PaymentRequestFetched(result) => match result {
                Ok(request) => self.payment_request_ok(request, invoices, notices),
                Err(error) => self.payment_request_error(&error, notices),
            },
            SessionEvent::SigningFailed(message) => {
                notices.push(SessionNotice::Error(message));
            }
            SessionEvent::SignedIncomplete(tx) => {
                notices.push(SessionNotice::IncompleteTransaction(tx));
                self.do_clear();
            }
            SessionEvent::PaymentRequestExpired => {
                self.payment_request = None;
            }
            SessionEvent::BroadcastDone {
                ok,
                message,
                txid,
                pr_key,
                label,
            } => {
                if !ok {
                    // Strip an electrum-style "error: " prefix before display.
                    let message = message
                        .strip_prefix("error: ")
                        .map(str::to_string)
                        .unwrap_or(message);
                    if !message.is_empty() {
                        notices.push(SessionNotice::Error(message));
                    }
                    return;
                }
                if let (Some(txid), Some(label)) = (txid.as_deref(), label.as_deref()) {
                    wallet.set_label(txid, label);
                }
                if let (Some(key), Some(txid)) = (pr_key, txid.as_deref()) {
                    invoices.set_paid(&key, txid);
                }
                self.payment_request = None;
                notices.push(SessionNotice::PaymentSent { txid, message });
                self.do_clear();
            }
        }
    }

    // ── fee feedback loop ───────────────────────────────────────────────

    /// Request a fee recomputation on the next tick.
    pub fn update_fee(&mut self) {
        self.require_fee_update = true;
    }

    /// Recalculate the fee. If the fee was manually frozen, retain it, but
    /// still build the trial transaction to see if there are enough funds.
    pub fn do_update_fee(&mut self, wallet: &WalletManager) -> FeeUpdateOutcome {
        let freeze_fee = self.fee_modified && self.manual_fee.is_some();
        let amount = if self.is_max() {
            Some(OutputValue::Max)
        } else {
            self.amount().map(OutputValue::Sats)
        };

        let Some(amount) = amount else {
            if !freeze_fee {
                self.auto_fee = None;
            }
            self.not_enough_funds = false;
            self.status.clear();
            return FeeUpdateOutcome::Idle;
        };

        let fee_override = if freeze_fee { self.manual_fee } else { None };
        let mut outputs = self.parsed.outputs_for_amount(amount);
        if outputs.is_empty() {
            // No recipient yet: estimate against a stand-in payee so the
            // fee preview tracks the amount being typed.
            outputs.push(Output {
                destination: Destination::Address(wallet.dummy_address()),
                value: amount,
            });
        }

        if self.config.enable_opreturn && !self.op_return_text.is_empty() {
            let data_output = if self.op_return_raw {
                op_return::output_for_rawhex(&self.op_return_text)
            } else {
                op_return::output_for_stringdata(&self.op_return_text)
            };
            match data_output {
                Ok(output) => outputs.push(output),
                Err(SdkError::OpReturnTooLarge) => {
                    self.op_return_toolong = true;
                    self.status = SdkError::OpReturnTooLarge.to_string();
                    return FeeUpdateOutcome::OpReturnTooLarge;
                }
                Err(e) => {
                    self.status = e.to_string();
                    return FeeUpdateOutcome::OpReturnError(e.to_string());
                }
            }
        }

        let requested: u64 = outputs
            .iter()
            .map(|o| match o.value {
                OutputValue::Sats(v) => v,
                OutputValue::Max => 0,
            })
            .sum();

        let coins = self.coins_for_build(wallet, false);
        let policy = self.config.fee_policy(fee_override);
        match wallet.make_unsigned_transaction(&coins, &outputs, policy, true) {
            Ok(tx) => {
                self.not_enough_funds = false;
                self.op_return_toolong = false;
                let fee = match fee_override {
                    Some(fee) => fee,
                    None => {
                        let fee = tx.fee();
                        self.auto_fee = Some(fee);
                        fee
                    }
                };
                let amount = if self.is_max() {
                    let total = tx.output_value();
                    self.amount_text = format_satoshis(total, self.config.decimal_point);
                    total
                } else {
                    requested
                };
                let sat_per_byte = fee as f64 / tx.estimated_size() as f64;
                self.status.clear();
                FeeUpdateOutcome::Ready {
                    fee,
                    sat_per_byte,
                    amount,
                }
            }
            Err(SdkError::NotEnoughFunds) => {
                self.not_enough_funds = true;
                if !freeze_fee {
                    self.auto_fee = None;
                }
                let frozen = wallet.frozen_balance();
                self.status = if frozen > 0 {
                    format!(
                        "Not enough funds ({} {} are frozen)",
                        format_satoshis(frozen, self.config.decimal_point),
                        base_unit(self.config.decimal_point)
                    )
                } else {
                    "Not enough funds".to_string()
                };
                FeeUpdateOutcome::NotEnoughFunds
            }
            // Anything else is a transient mid-typing state; leave the form
            // exactly as it was.
            Err(_) => FeeUpdateOutcome::Ignored,
        }
    }

    fn coins_for_build(&self, wallet: &WalletManager, is_invoice: bool) -> Vec<Coin> {
        if !self.pay_from.is_empty() {
            self.pay_from.clone()
        } else {
            wallet.get_spendable_coins(None, is_invoice)
        }
    }

    // ── sending ─────────────────────────────────────────────────────────

    fn check_segwit_suspects(&self) -> Result<(), SendError> {
        if self.config.allow_legacy_p2sh {
            return Ok(());
        }
        let prefix = if self.network.is_mainnet() { '3' } else { '2' };
        if self
            .parsed
            .legacy_inputs
            .iter()
            .any(|s| s.starts_with(prefix))
        {
            return Err(SendError::SegwitSuspect);
        }
        Ok(())
    }

    fn warn_legacy_addresses(&self) -> Result<(), SendError> {
        if !self.config.warn_legacy_address || self.parsed.legacy_inputs.is_empty() {
            return Ok(());
        }
        let message = format!(
            "You are about to send XEC to a legacy address:\n\n{}\n\nLegacy addresses are \
             deprecated for eCash and used by Bitcoin (BTC). Proceed if what you intend to do \
             is to send XEC.",
            self.parsed.legacy_inputs.join("\n")
        );
        if self.prompts.confirm(&message) {
            Ok(())
        } else {
            Err(SendError::Cancelled)
        }
    }

    fn read_send_form(&mut self, wallet: &WalletManager) -> Result<SendForm, SendError> {
        let mut is_invoice = false;
        if let Some(pr) = &self.payment_request {
            if pr.has_expired() {
                return Err(SendError::PaymentRequestExpired);
            }
        }
        let label = self.message_text.clone();

        let mut outputs = if let Some(pr) = &self.payment_request {
            is_invoice = true;
            pr.to_outputs(self.network)
                .map_err(|e| SendError::Other(e.to_string()))?
        } else {
            if !self.parsed.errors.is_empty() {
                let lines: Vec<String> = self
                    .parsed
                    .errors
                    .iter()
                    .map(|e| format!("Line #{}: {}", e.line + 1, e.text))
                    .collect();
                return Err(SendError::InvalidLines(lines.join("\n")));
            }
            if let Some(alias) = &self.alias {
                if !alias.validated {
                    let message = format!(
                        "WARNING: the alias \"{}\" could not be validated via an additional \
                         security check, DNSSEC, and thus may not be correct.\nDo you wish to \
                         continue?",
                        alias.name
                    );
                    if !self.prompts.confirm(&message) {
                        return Err(SendError::Cancelled);
                    }
                }
            }
            if self.parsed.is_multiline {
                self.parsed.outputs.clone()
            } else if let Some(recipient) = &self.parsed.recipient {
                let amount = if self.is_max() {
                    OutputValue::Max
                } else {
                    self.amount()
                        .map(OutputValue::Sats)
                        .ok_or(SendError::InvalidAmount)?
                };
                vec![Output {
                    destination: recipient.clone(),
                    value: amount,
                }]
            } else {
                Vec::new()
            }
        };

        if self.config.enable_opreturn && !self.op_return_text.is_empty() {
            let data_output = if self.op_return_raw {
                op_return::output_for_rawhex(&self.op_return_text)
            } else {
                op_return::output_for_stringdata(&self.op_return_text)
            };
            outputs.push(data_output.map_err(|e| SendError::OpReturn(e.to_string()))?);
        }

        if outputs.is_empty() {
            return Err(SendError::NoOutputs);
        }

        let freeze_fee = self.fee_modified && self.manual_fee.is_some();
        let fee_override = if freeze_fee { self.manual_fee } else { None };
        let coins = self.coins_for_build(wallet, is_invoice);
        Ok(SendForm {
            outputs,
            fee_override,
            label,
            coins,
        })
    }

    fn build_final(&mut self, wallet: &WalletManager) -> Result<FinalBuild, SendError> {
        self.check_segwit_suspects()?;
        self.warn_legacy_addresses()?;
        let form = self.read_send_form(wallet)?;

        let shuffle = !(self.config.enable_opreturn
            && !self.op_return_text.is_empty()
            && !self.shuffle_outputs);

        let policy = self.config.fee_policy(form.fee_override);
        let tx = wallet
            .make_unsigned_transaction(&form.coins, &form.outputs, policy, shuffle)
            .map_err(|e| match e {
                SdkError::NotEnoughFunds => SendError::InsufficientFunds,
                SdkError::ExcessiveFee => SendError::FeeTooHigh,
                e => SendError::Other(e.to_string()),
            })?;

        let amount = if self.is_max() {
            tx.output_value()
        } else {
            form.outputs
                .iter()
                .map(|o| match o.value {
                    OutputValue::Sats(v) => v,
                    OutputValue::Max => 0,
                })
                .sum()
        };
        Ok(FinalBuild {
            tx,
            amount,
            label: form.label,
        })
    }

    /// Build the final transaction for display without sending.
    pub fn do_preview(&mut self, wallet: &WalletManager) -> Result<Transaction, SendError> {
        Ok(self.build_final(wallet)?.tx)
    }

    /// The send button: validate, build, confirm, then hand off to the
    /// signing/broadcast pipeline. Completion arrives through `tick()`.
    pub fn do_send(
        &mut self,
        wallet: &mut WalletManager,
    ) -> Result<tokio::task::JoinHandle<()>, SendError> {
        // The built transaction owns all of its data, so later mutations of
        // the shared pay-from list cannot retroactively alter it.
        let FinalBuild { tx, amount, label } = self.build_final(wallet)?;
        let fee = tx.fee();
        let decimal_point = self.config.decimal_point;

        let mut warned_low_fee = false;
        let mut message = vec![
            format!(
                "Amount to be sent: {} {}",
                format_satoshis(amount, decimal_point),
                base_unit(decimal_point)
            ),
            format!(
                "Mining fee: {} {}",
                format_satoshis(fee, decimal_point),
                base_unit(decimal_point)
            ),
        ];
        if fee < tx.estimated_size() as u64 {
            message.push(
                "Warning: You're using a fee of less than 1.0 sats/B. It may take a very long \
                 time to confirm."
                    .to_string(),
            );
            warned_low_fee = true;
        }
        if self.config.enable_opreturn && !self.op_return_text.is_empty() {
            message.push(
                "You are using an OP_RETURN message. This gets permanently written to the \
                 blockchain."
                    .to_string(),
            );
        }

        if wallet.status() == crate::wallet::WalletStatus::Locked {
            message.push(String::new());
            message.push("Enter your password to proceed".to_string());
            let Some(password) = self.prompts.password(&message.join("\n")) else {
                return Err(SendError::Cancelled);
            };
            wallet
                .unlock(&password)
                .map_err(|e| SendError::Wallet(e.to_string()))?;
        } else {
            message.push("Proceed?".to_string());
            if !self.prompts.confirm(&message.join("\n\n")) {
                return Err(SendError::Cancelled);
            }
        }

        let backend = wallet.backend();
        if !backend.is_connected() {
            return Err(SendError::NotConnected);
        }

        let signer = wallet
            .signer_handle()
            .map_err(|e| SendError::Wallet(e.to_string()))?;
        let attempt = SendAttempt {
            tx,
            label: (!label.is_empty()).then_some(label),
            warned_low_fee,
            pr_key: self.payment_request.as_ref().map(|pr| pr.id()),
        };
        let refund = wallet
            .refund_address()
            .map(|a| a.to_cashaddr(self.network));

        Ok(pipeline::spawn_sign_and_broadcast(
            attempt,
            signer,
            backend,
            self.payment_request.clone(),
            refund,
            self.http.clone(),
            Arc::clone(&self.prompts),
            self.events_tx.clone(),
        ))
    }

    /// Reset the send form to its initial empty state.
    pub fn do_clear(&mut self) {
        self.max_button = false;
        self.not_enough_funds = false;
        self.op_return_toolong = false;
        self.payment_request = None;
        self.payto_is_pr = false;
        self.payto_frozen = false;
        self.amount_frozen = false;
        self.alias = None;
        self.alias_pending = None;
        self.alias_last_attempt = None;
        self.payto_text.clear();
        self.parsed = ParsedPayto::default();
        self.amount_text.clear();
        self.message_text.clear();
        self.op_return_text.clear();
        self.op_return_raw = false;
        self.shuffle_outputs = true;
        self.manual_fee = None;
        self.fee_modified = false;
        self.auto_fee = None;
        self.pay_from.clear();
        self.status.clear();
    }

    // ── payment URIs & requests ─────────────────────────────────────────

    /// Populate the form from a BIP21 URI. Returns non-fatal warnings for
    /// the host to display.
    pub fn pay_to_uri(&mut self, uri: &str, contacts: &Contacts) -> Result<Vec<String>, SendError> {
        let parsed =
            parse_uri(uri, self.network, self.config.decimal_point).map_err(|e| {
                SendError::BadUri(e.to_string())
            })?;

        let mut warnings = Vec::new();
        if !parsed.extra_params.is_empty() {
            warnings.push(format!(
                "Extra parameters in URI were ignored: {}",
                parsed.extra_params.join(", ")
            ));
        }

        if let Some(url) = parsed.payment_request_url {
            self.prepare_for_payment_request();
            let http = self.http.clone();
            let events = self.events_tx.clone();
            tokio::spawn(async move {
                let result = PaymentRequest::fetch(&http, &url)
                    .await
                    .map_err(|e| e.to_string());
                let _ = events.send(SessionEvent::PaymentRequestFetched(result));
            });
            return Ok(warnings);
        }

        let n_addresses = parsed.addresses.len();
        let n_amounts = parsed.amounts.len();
        if (n_addresses == 1 && n_amounts > 1)
            || (n_addresses != 1 && n_addresses != n_amounts)
        {
            return Err(SendError::InconsistentUri {
                addresses: n_addresses,
                amounts: n_amounts,
            });
        }

        // The label doubles as a description when no message is given.
        let message = parsed.message.or(parsed.label);

        if n_amounts == 1 {
            self.amount_text = format_satoshis(parsed.amounts[0], self.config.decimal_point);
            self.max_button = false;
        }

        self.payto_text = match n_addresses {
            0 => String::new(),
            1 => parsed.addresses[0].to_cashaddr(self.network),
            _ => parsed
                .addresses
                .iter()
                .zip(parsed.amounts.iter())
                .map(|(addr, amount)| {
                    format!(
                        "{}, {}",
                        addr.to_cashaddr(self.network),
                        format_satoshis(*amount, self.config.decimal_point)
                    )
                })
                .collect::<Vec<_>>()
                .join("\n"),
        };
        self.reparse_payto(contacts);

        if let Some(message) = message {
            self.message_text = message;
        }
        if let Some(op_return) = parsed.op_return {
            self.op_return_text = op_return;
            self.op_return_raw = false;
        } else if let Some(op_return_raw) = parsed.op_return_raw {
            // secondary precedence to op_return; a blank value means a bare
            // OP_RETURN
            self.op_return_text = if op_return_raw.is_empty() {
                "empty".to_string()
            } else {
                op_return_raw
            };
            self.op_return_raw = true;
        }

        let total: u64 = parsed.amounts.iter().sum();
        if total >= URI_AMOUNT_WARNING_SATS {
            warnings.push(format!(
                "The amount field has been populated by a BIP21 payment URI with a value of {} \
                 {}. Please check the amount and destination carefully before sending the \
                 transaction.",
                format_satoshis(total, self.config.decimal_point),
                base_unit(self.config.decimal_point)
            ));
        }

        self.require_fee_update = true;
        Ok(warnings)
    }

    fn prepare_for_payment_request(&mut self) {
        self.payto_is_pr = true;
        self.payto_frozen = true;
        self.amount_frozen = true;
        self.payto_text = "please wait...".to_string();
    }

    fn payment_request_ok(
        &mut self,
        request: PaymentRequest,
        invoices: &mut InvoiceList,
        notices: &mut Vec<SessionNotice>,
    ) {
        if let Err(e) = request.verify(self.network) {
            self.payment_request_error(&e.to_string(), notices);
            return;
        }
        let key = invoices.add(InvoiceEntry::from_request(&request));
        if invoices.status(&key) == Some(InvoiceStatus::Paid) {
            notices.push(SessionNotice::Info("invoice already paid".to_string()));
            self.do_clear();
            return;
        }
        self.payto_is_pr = true;
        self.payto_frozen = true;
        self.amount_frozen = true;
        self.payto_text = request.requestor();
        self.amount_text = format_satoshis(request.amount(), self.config.decimal_point);
        self.message_text = request.memo.clone();
        self.payment_request = Some(request);
        self.require_fee_update = true;
    }

    fn payment_request_error(&mut self, error: &str, notices: &mut Vec<SessionNotice>) {
        log::warn!("payment request error: {}", error);
        self.payment_request = None;
        notices.push(SessionNotice::Error(format!(
            "There was an error processing the payment request: {}",
            error
        )));
        self.do_clear();
    }

    /// Directly install a payment request (e.g. handed over by the host).
    pub fn on_payment_request(
        &mut self,
        request: PaymentRequest,
        invoices: &mut InvoiceList,
    ) -> Vec<SessionNotice> {
        let mut notices = Vec::new();
        self.prepare_for_payment_request();
        self.payment_request_ok(request, invoices, &mut notices);
        notices
    }

    /// Pay a stored invoice from the invoice list.
    pub fn do_pay_invoice(
        &mut self,
        key: &str,
        invoices: &mut InvoiceList,
    ) -> Result<Vec<SessionNotice>, SendError> {
        let request = invoices
            .get(key)
            .and_then(|entry| entry.request.clone())
            .ok_or_else(|| SendError::Other(format!("invoice not found: {}", key)))?;
        Ok(self.on_payment_request(request, invoices))
    }

    /// Load a locally-authored invoice file into the form, resolving its
    /// exchange rate.
    pub async fn load_invoice_file(
        &mut self,
        path: &std::path::Path,
        contacts: &Contacts,
    ) -> Result<centavo_sdk::Invoice, SendError> {
        let invoice = centavo_sdk::Invoice::from_file(path)
            .map_err(|e| SendError::Other(e.to_string()))?;
        let xec = invoice
            .xec_amount(&self.http)
            .await
            .map_err(|e| SendError::Other(e.to_string()))?;
        let scale = 10u64.pow(self.config.decimal_point as u32);
        let sats = (xec * scale as f64).round() as u64;

        self.payto_text = invoice.address.clone();
        self.reparse_payto(contacts);
        self.amount_text = format_satoshis(sats, self.config.decimal_point);
        self.message_text = invoice.label.clone();
        self.require_fee_update = true;
        Ok(invoice)
    }
}
