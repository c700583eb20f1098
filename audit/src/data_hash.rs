// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Re-derivation of the destination-chain proposal identifier ("data hash")
//! from a deposit's transfer parameters.
//!
//! The bridge contract keys proposals by
//! `keccak256(abi.encodePacked(handlerAddress, data))` where `data` is the
//! 32-byte amount, the 32-byte recipient length and the raw recipient bytes.
//! This must be reproduced bit-for-bit: a digest mismatch means relayers
//! would never find the corresponding proposal and every deposit would
//! classify as missing.

use crate::error::{AuditError, AuditResult};
use ethers::types::{Address as EthAddress, H256, U256};
use ethers::utils::keccak256;

/// Derive the proposal data hash for one transfer.
///
/// The recipient is accepted in its on-the-wire hex form, with or without a
/// `0x` prefix. Values that do not decode to a non-empty whole number of
/// bytes fail with [`AuditError::MalformedRecipient`].
pub fn derive_data_hash(
    amount: U256,
    recipient: &str,
    destination_handler: EthAddress,
) -> AuditResult<H256> {
    let stripped = recipient.strip_prefix("0x").unwrap_or(recipient);
    if stripped.is_empty() {
        return Err(AuditError::MalformedRecipient(format!(
            "empty recipient {recipient:?}"
        )));
    }
    if stripped.len() % 2 != 0 {
        return Err(AuditError::MalformedRecipient(format!(
            "odd-length recipient {recipient:?}"
        )));
    }
    let recipient_bytes = hex::decode(stripped).map_err(|e| {
        AuditError::MalformedRecipient(format!("recipient {recipient:?} is not hex: {e}"))
    })?;

    let mut amount_be = [0u8; 32];
    amount.to_big_endian(&mut amount_be);
    let mut length_be = [0u8; 32];
    U256::from(recipient_bytes.len()).to_big_endian(&mut length_be);

    let mut packed = Vec::with_capacity(20 + 64 + recipient_bytes.len());
    packed.extend_from_slice(destination_handler.as_bytes());
    packed.extend_from_slice(&amount_be);
    packed.extend_from_slice(&length_be);
    packed.extend_from_slice(&recipient_bytes);

    Ok(H256::from(keccak256(packed)))
}
