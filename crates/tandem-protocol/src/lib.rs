//! Canonical domain contracts for Tandem shared-room sessions.
//!
//! Everything in this crate is pure: room-code generation and validation,
//! the legacy title encoding kept for importing old conversation rows, the
//! sender-prefix convention that attributes transcript lines, and the
//! message role shared by the store and the wire.
//!
//! The service crate (`tandem`) depends on these contracts; nothing here
//! touches the network or the database.

mod attribution;
mod code;
mod role;
mod title;

pub use attribution::{
    Attribution, UNKNOWN_SENDER, classify, prefix_sender, sender_label, sender_name,
    strip_sender_prefix,
};
pub use code::{CODE_ALPHABET, CODE_LEN, ParseCodeError, RoomCode};
pub use role::Role;
pub use title::{LegacyTitle, PARTNER_PLACEHOLDER};
