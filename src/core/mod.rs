//! Core primitives shared by every ledger component
//!
//! This module provides:
//! - Account identities with an explicit null variant
//! - Asset identities with an explicit native-currency variant
//! - Exact 18-decimal fixed-point unit conversion
//! - Structured event records

pub mod address;
pub mod event;
pub mod units;

pub use address::{Account, Address, AddressError, Asset, ADDRESS_LEN, ZERO_ADDRESS};
pub use event::{Event, EventKind};
pub use units::{format_units, parse_units, tokens, UnitsError, DECIMALS, ONE_TOKEN};
