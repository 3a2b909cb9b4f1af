//! BIP21-style payment URI parsing and construction.
//!
//! `ecash:<addr>?amount=&label=&message=&op_return=&op_return_raw=&r=&sig=&name=`
//! plus `addresses=`/`amounts=` comma lists for pay-to-many. Unknown
//! parameters are reported back as ignorable warnings rather than failures;
//! malformed and duplicated parameters each get their own error so the user
//! sees a specific remediation message.

use thiserror::Error;

use crate::address::{Address, parse_address};
use crate::amount::{format_satoshis, parse_amount};
use crate::network::Network;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UriError {
    #[error("not a {0}: URI")]
    WrongScheme(String),

    #[error("duplicate parameter: {0}")]
    DuplicateKey(String),

    #[error("bad parameter: {name}: {detail}")]
    BadParameter { name: String, detail: String },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedUri {
    pub addresses: Vec<Address>,
    /// Amounts in satoshis, index-aligned with `addresses` for pay-to-many.
    pub amounts: Vec<u64>,
    pub label: Option<String>,
    pub message: Option<String>,
    pub op_return: Option<String>,
    pub op_return_raw: Option<String>,
    /// BIP72-style `r=` payment request URL; when present it takes over the
    /// whole form.
    pub payment_request_url: Option<String>,
    pub name: Option<String>,
    pub sig: Option<String>,
    /// Unrecognized keys, ignored but surfaced as a warning.
    pub extra_params: Vec<String>,
}

fn bad(name: &str, detail: impl Into<String>) -> UriError {
    UriError::BadParameter {
        name: name.to_string(),
        detail: detail.into(),
    }
}

fn percent_decode(s: &str) -> Result<String, String> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hex = bytes
                    .get(i + 1..i + 3)
                    .ok_or_else(|| "truncated percent escape".to_string())?;
                let byte = u8::from_str_radix(
                    std::str::from_utf8(hex).map_err(|_| "bad percent escape".to_string())?,
                    16,
                )
                .map_err(|_| "bad percent escape".to_string())?;
                out.push(byte);
                i += 3;
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8(out).map_err(|_| "invalid utf-8 after decoding".to_string())
}

fn percent_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}

/// Parse a payment URI against the given network's scheme.
pub fn parse_uri(uri: &str, network: Network, decimal_point: u8) -> Result<ParsedUri, UriError> {
    let scheme_name = network.uri_scheme();
    let uri = uri.trim();
    let (scheme, rest) = uri
        .split_once(':')
        .ok_or_else(|| UriError::WrongScheme(scheme_name.to_string()))?;
    if !scheme.eq_ignore_ascii_case(scheme_name) {
        return Err(UriError::WrongScheme(scheme_name.to_string()));
    }

    let (addr_part, query) = match rest.split_once('?') {
        Some((a, q)) => (a, Some(q)),
        None => (rest, None),
    };

    let mut out = ParsedUri::default();

    if !addr_part.is_empty() {
        let parsed = parse_address(addr_part, network)
            .map_err(|e| bad("address", e.to_string()))?;
        out.addresses.push(parsed.address);
    }

    let mut seen: Vec<String> = Vec::new();
    for pair in query.unwrap_or("").split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| bad(pair, "missing value"))?;
        let key = key.to_ascii_lowercase();
        let value = percent_decode(value).map_err(|e| bad(&key, e))?;

        // `amount` and `amounts` feed the same list; a URI may use only one
        // of the two spellings, once.
        let family = match key.as_str() {
            "amounts" => "amount".to_string(),
            _ => key.clone(),
        };
        if seen.contains(&family) {
            return Err(UriError::DuplicateKey(family));
        }
        seen.push(family);

        match key.as_str() {
            "amount" => {
                let sats = parse_amount(&value, decimal_point)
                    .map_err(|e| bad("amount", e.to_string()))?;
                out.amounts.push(sats);
            }
            "amounts" => {
                for piece in value.split(',') {
                    let sats = parse_amount(piece, decimal_point)
                        .map_err(|e| bad("amounts", e.to_string()))?;
                    out.amounts.push(sats);
                }
            }
            "addresses" => {
                for piece in value.split(',') {
                    let parsed = parse_address(piece, network)
                        .map_err(|e| bad("addresses", e.to_string()))?;
                    out.addresses.push(parsed.address);
                }
            }
            "label" => out.label = Some(value),
            "message" => out.message = Some(value),
            "op_return" => out.op_return = Some(value),
            "op_return_raw" => out.op_return_raw = Some(value),
            "r" => out.payment_request_url = Some(value),
            "name" => out.name = Some(value),
            "sig" => out.sig = Some(value),
            other => out.extra_params.push(other.to_string()),
        }
    }

    Ok(out)
}

/// Build a single-recipient payment URI.
pub fn build_uri(
    address: &Address,
    network: Network,
    amount_sats: Option<u64>,
    decimal_point: u8,
    label: Option<&str>,
    message: Option<&str>,
    op_return: Option<&str>,
) -> String {
    let mut uri = address.to_cashaddr(network);
    let mut params: Vec<String> = Vec::new();
    if let Some(sats) = amount_sats {
        params.push(format!("amount={}", format_satoshis(sats, decimal_point)));
    }
    if let Some(label) = label {
        params.push(format!("label={}", percent_encode(label)));
    }
    if let Some(message) = message {
        params.push(format!("message={}", percent_encode(message)));
    }
    if let Some(op_return) = op_return {
        params.push(format!("op_return={}", percent_encode(op_return)));
    }
    if !params.is_empty() {
        uri.push('?');
        uri.push_str(&params.join("&"));
    }
    uri
}

#[cfg(test)]
mod tests {
    use super::*;

    const NET: Network = Network::Mainnet;

    fn addr(tag: u8) -> Address {
        Address::p2pkh([tag; 20])
    }

    fn addr_body(tag: u8) -> String {
        addr(tag)
            .to_cashaddr(NET)
            .split(':')
            .nth(1)
            .unwrap()
            .to_string()
    }

    #[test]
    fn amount_and_op_return() {
        let uri = format!("ecash:{}?amount=12.34&op_return=hello", addr_body(1));
        let parsed = parse_uri(&uri, NET, 2).unwrap();
        assert_eq!(parsed.addresses, vec![addr(1)]);
        assert_eq!(parsed.amounts, vec![1234]);
        assert_eq!(parsed.op_return.as_deref(), Some("hello"));
        assert!(parsed.op_return_raw.is_none());
        assert!(parsed.extra_params.is_empty());
    }

    #[test]
    fn bare_address_uri() {
        let uri = format!("ecash:{}", addr_body(1));
        let parsed = parse_uri(&uri, NET, 2).unwrap();
        assert_eq!(parsed.addresses, vec![addr(1)]);
        assert!(parsed.amounts.is_empty());
    }

    #[test]
    fn wrong_scheme_rejected() {
        let err = parse_uri("bitcoin:whatever", NET, 2).unwrap_err();
        assert!(matches!(err, UriError::WrongScheme(_)));
        assert!(parse_uri("no-colon-here", NET, 2).is_err());
    }

    #[test]
    fn duplicate_amount_rejected() {
        let uri = format!("ecash:{}?amount=1&amount=2", addr_body(1));
        assert_eq!(
            parse_uri(&uri, NET, 2).unwrap_err(),
            UriError::DuplicateKey("amount".into())
        );
        // `amounts` collides with `amount` too.
        let uri = format!("ecash:{}?amount=1&amounts=2,3", addr_body(1));
        assert_eq!(
            parse_uri(&uri, NET, 2).unwrap_err(),
            UriError::DuplicateKey("amount".into())
        );
    }

    #[test]
    fn bad_amount_is_specific() {
        let uri = format!("ecash:{}?amount=12.345", addr_body(1));
        match parse_uri(&uri, NET, 2).unwrap_err() {
            UriError::BadParameter { name, .. } => assert_eq!(name, "amount"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn bad_address_is_specific() {
        match parse_uri("ecash:notanaddress?amount=1", NET, 2).unwrap_err() {
            UriError::BadParameter { name, .. } => assert_eq!(name, "address"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn pay_to_many_lists() {
        let uri = format!(
            "ecash:?addresses={},{}&amounts=10,20.5",
            addr_body(1),
            addr_body(2)
        );
        let parsed = parse_uri(&uri, NET, 2).unwrap();
        assert_eq!(parsed.addresses, vec![addr(1), addr(2)]);
        assert_eq!(parsed.amounts, vec![1000, 2050]);
    }

    #[test]
    fn unknown_params_are_warnings_not_errors() {
        let uri = format!("ecash:{}?amount=1&foo=bar&baz=1", addr_body(1));
        let parsed = parse_uri(&uri, NET, 2).unwrap();
        assert_eq!(parsed.extra_params, vec!["foo", "baz"]);
        assert_eq!(parsed.amounts, vec![100]);
    }

    #[test]
    fn label_and_message_are_percent_decoded() {
        let uri = format!(
            "ecash:{}?label=Luke%2DJr&message=coffee+and%20cake",
            addr_body(1)
        );
        let parsed = parse_uri(&uri, NET, 2).unwrap();
        assert_eq!(parsed.label.as_deref(), Some("Luke-Jr"));
        assert_eq!(parsed.message.as_deref(), Some("coffee and cake"));
    }

    #[test]
    fn payment_request_url() {
        let uri = format!(
            "ecash:{}?r=https%3A%2F%2Fmerchant.example%2Fpr%2F123",
            addr_body(1)
        );
        let parsed = parse_uri(&uri, NET, 2).unwrap();
        assert_eq!(
            parsed.payment_request_url.as_deref(),
            Some("https://merchant.example/pr/123")
        );
    }

    #[test]
    fn op_return_raw_round_trips() {
        let uri = format!("ecash:{}?op_return_raw=0401020304", addr_body(1));
        let parsed = parse_uri(&uri, NET, 2).unwrap();
        assert_eq!(parsed.op_return_raw.as_deref(), Some("0401020304"));
    }

    #[test]
    fn build_then_parse_round_trip() {
        let uri = build_uri(
            &addr(1),
            NET,
            Some(1234),
            2,
            Some("a label"),
            Some("the message"),
            Some("hello"),
        );
        let parsed = parse_uri(&uri, NET, 2).unwrap();
        assert_eq!(parsed.addresses, vec![addr(1)]);
        assert_eq!(parsed.amounts, vec![1234]);
        assert_eq!(parsed.label.as_deref(), Some("a label"));
        assert_eq!(parsed.message.as_deref(), Some("the message"));
        assert_eq!(parsed.op_return.as_deref(), Some("hello"));
    }

    #[test]
    fn uppercase_scheme_accepted() {
        let uri = format!("ECASH:{}?amount=1", addr_body(1));
        let parsed = parse_uri(&uri, NET, 2).unwrap();
        assert_eq!(parsed.amounts, vec![100]);
    }
}
