//! Free-form recipient parsing for the send form.
//!
//! A single line is a payee: an address (cashaddr or legacy), a raw locking
//! script in hex, a contact name, or an alias-shaped string left for the
//! resolver. Multiple lines are pay-to-many: `address, amount` per line,
//! where the literal amount `!` means "send all remaining funds".

use crate::address::{Address, parse_address};
use crate::amount::parse_amount;
use crate::network::Network;
use crate::script::ScriptOutput;
use crate::transaction::{Destination, Output, OutputValue};

/// A line that failed to parse, reported with its zero-based index; the UI
/// shows them 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaytoLineError {
    pub line: usize,
    pub text: String,
}

#[derive(Debug, Clone, Default)]
pub struct ParsedPayto {
    /// Single-recipient mode: the payee, with the amount edited separately.
    pub recipient: Option<Destination>,
    /// Pay-to-many mode: one output per non-empty line.
    pub outputs: Vec<Output>,
    pub errors: Vec<PaytoLineError>,
    /// Some line used the `!` sentinel.
    pub is_max: bool,
    pub is_multiline: bool,
    /// Input that should be handed to the URI parser instead.
    pub uri: Option<String>,
    /// Single-line input that looks like a resolvable alias.
    pub alias_candidate: bool,
    /// Raw strings that decoded as legacy base58 addresses, for the
    /// legacy-address warning.
    pub legacy_inputs: Vec<String>,
}

impl ParsedPayto {
    /// Outputs to build with, materializing single-recipient mode with the
    /// externally edited amount.
    pub fn outputs_for_amount(&self, amount: OutputValue) -> Vec<Output> {
        if self.is_multiline {
            self.outputs.clone()
        } else if let Some(recipient) = &self.recipient {
            vec![Output {
                destination: recipient.clone(),
                value: amount,
            }]
        } else {
            Vec::new()
        }
    }
}

/// Heuristic for alias-shaped input: domain-like, no angle bracket (already
/// resolved) and no whitespace.
pub fn looks_like_alias(text: &str) -> bool {
    let text = text.trim();
    !text.is_empty()
        && text.contains('.')
        && !text.contains('<')
        && !text.chars().any(char::is_whitespace)
}

fn parse_destination(
    text: &str,
    network: Network,
    resolve_contact: &dyn Fn(&str) -> Option<Address>,
) -> Option<(Destination, bool)> {
    // A resolved alias renders as `name <address>`; unwrap it first.
    let text = match (text.rfind('<'), text.rfind('>')) {
        (Some(open), Some(close)) if open < close => text[open + 1..close].trim(),
        _ => text.trim(),
    };
    if let Ok(parsed) = parse_address(text, network) {
        return Some((Destination::Address(parsed.address), parsed.legacy));
    }
    if let Some(address) = resolve_contact(text) {
        return Some((Destination::Address(address), false));
    }
    // Last resort: a raw locking script in hex (non-standard payees).
    if text.len() >= 2 && text.len() % 2 == 0 {
        if let Ok(script) = ScriptOutput::from_hex(text) {
            return Some((Destination::Script(script), false));
        }
    }
    None
}

/// Parse the send form's recipient field.
pub fn parse_payto(
    text: &str,
    network: Network,
    decimal_point: u8,
    resolve_contact: &dyn Fn(&str) -> Option<Address>,
) -> ParsedPayto {
    let mut result = ParsedPayto::default();
    let lines: Vec<(usize, &str)> = text
        .lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty())
        .collect();

    if lines.is_empty() {
        return result;
    }

    if lines.len() == 1 {
        let (_, line) = lines[0];
        let line = line.trim();

        // `scheme:...?` is a payment URI; a bare `scheme:address` is just a
        // prefixed cashaddr and stays in the address path.
        if let Some((scheme, _)) = line.split_once(':') {
            if scheme.eq_ignore_ascii_case(network.uri_scheme())
                && (line.contains('?') || parse_address(line, network).is_err())
            {
                result.uri = Some(line.to_string());
                return result;
            }
        }

        match parse_destination(line, network, resolve_contact) {
            Some((destination, legacy)) => {
                if legacy {
                    result.legacy_inputs.push(line.to_string());
                }
                result.recipient = Some(destination);
            }
            None => {
                result.alias_candidate = looks_like_alias(line);
            }
        }
        return result;
    }

    result.is_multiline = true;
    for (idx, raw_line) in lines {
        let line = raw_line.trim();
        let Some((dest_text, amount_text)) = line.split_once(',') else {
            result.errors.push(PaytoLineError {
                line: idx,
                text: raw_line.to_string(),
            });
            continue;
        };

        let destination = parse_destination(dest_text.trim(), network, resolve_contact);
        let amount_text = amount_text.trim();
        let value = if amount_text == "!" {
            if result.is_max {
                None // only one output may spend the remainder
            } else {
                result.is_max = true;
                Some(OutputValue::Max)
            }
        } else {
            parse_amount(amount_text, decimal_point)
                .ok()
                .map(OutputValue::Sats)
        };

        match (destination, value) {
            (Some((destination, legacy)), Some(value)) => {
                if legacy {
                    result.legacy_inputs.push(dest_text.trim().to_string());
                }
                result.outputs.push(Output { destination, value });
            }
            _ => {
                result.errors.push(PaytoLineError {
                    line: idx,
                    text: raw_line.to_string(),
                });
            }
        }
    }
    result
}
