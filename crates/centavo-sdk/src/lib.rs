pub mod address;
pub mod amount;
pub mod builder;
pub mod chain;
pub mod coinchooser;
pub mod error;
pub mod fee;
pub mod invoice;
pub mod network;
pub mod payto;
pub mod paymentrequest;
pub mod script;
pub mod signer;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod transaction;
pub mod uri;

// Core types
pub use address::{Address, AddressKind, ParsedAddress, is_legacy_address, parse_address};
pub use amount::{ParseAmountError, base_unit, format_satoshis, parse_amount};
pub use builder::make_unsigned_transaction;
pub use chain::{ChainBackend, ElectrumBackend, UnspentEntry};
pub use error::{Error, Result};
pub use fee::{FeePolicy, FeeSlider, MAX_FEE_RATE_SAT_PER_BYTE, estimate_fee};
pub use invoice::{
    ExchangeRate, ExchangeRateApiError, Invoice, InvoiceEntry, InvoiceList, InvoiceStatus,
};
pub use network::Network;
pub use payto::{ParsedPayto, PaytoLineError, looks_like_alias, parse_payto};
pub use paymentrequest::{NO_URL, PaymentRequest, PrOutput};
pub use script::{ScriptOutput, op_return};
pub use signer::{KeyBranch, SoftwareSigner};
pub use transaction::{
    Coin, DUST_THRESHOLD, Destination, OutPoint, Output, OutputValue, Transaction, TxInput,
    TxOutput, Txid,
};
pub use uri::{ParsedUri, UriError, build_uri, parse_uri};
