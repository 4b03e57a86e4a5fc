//! Spend authorization
//!
//! Ledger and UTXO logic only ask "may `address` claim this output" and
//! "does this input speak for `address`" through [`AuthorizationCheck`], so a
//! real signature scheme can replace [`PlaintextUnlock`] without touching them.

use crate::core::{TXInput, TXOutput};

pub trait AuthorizationCheck: Send + Sync {
    fn output_claimable_by(&self, output: &TXOutput, address: &str) -> bool;

    fn input_claims(&self, input: &TXInput, address: &str) -> bool;
}

/// String equality between lock/unlock data and the address.
///
/// Anyone who knows an address can spend its outputs. This is not secure.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaintextUnlock;

impl AuthorizationCheck for PlaintextUnlock {
    fn output_claimable_by(&self, output: &TXOutput, address: &str) -> bool {
        output.is_locked_with(address)
    }

    fn input_claims(&self, input: &TXInput, address: &str) -> bool {
        input.can_unlock_output_with(address)
    }
}
