// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::config::Chain;
use crate::types::{DepositEvent, TokenMeta, TransferRecord};
use ethers::types::{Address as EthAddress, H256, U256};
use std::str::FromStr;

pub const TEST_HANDLER: &str = "0xdAC7Bb7Ce4fF441A235F08408e632FA1D799A147";
pub const TEST_TOKEN: &str = "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2";
pub const TEST_RECIPIENT: &str = "0xd242a88f202b793a80a353264f1c51d292bc951b";
pub const TEST_RESOURCE_ID: &str =
    "0x0000000000000000000000c02aaa39b223fe8d0a0e5c4f27ead9083c756cc201";

pub fn test_handler() -> EthAddress {
    EthAddress::from_str(TEST_HANDLER).unwrap()
}

pub fn test_token() -> EthAddress {
    EthAddress::from_str(TEST_TOKEN).unwrap()
}

pub fn test_resource_id() -> H256 {
    H256::from_str(TEST_RESOURCE_ID).unwrap()
}

pub fn sample_chain(chain_id: u8) -> Chain {
    Chain {
        chain_id,
        name: format!("chain-{chain_id}"),
        rpc_url: "http://localhost:8545".to_string(),
        bridge_address: EthAddress::repeat_byte(chain_id),
        handler_address: test_handler(),
        multisig_address: None,
        tx_list_api_url: None,
        tx_list_api_key: None,
        from_block: 0,
        expiry: 100,
        explorer_base_url: "https://etherscan.io/tx/".to_string(),
    }
}

pub fn sample_deposit(destination_chain_id: u8, nonce: u64) -> DepositEvent {
    DepositEvent {
        destination_chain_id,
        resource_id: test_resource_id(),
        nonce,
        block_number: 12388282,
        tx_hash: H256::repeat_byte(0x2b),
    }
}

pub fn sample_transfer_record() -> TransferRecord {
    TransferRecord {
        token_address: test_token(),
        destination_chain_id: 2,
        resource_id: test_resource_id(),
        recipient: TEST_RECIPIENT.to_string(),
        depositor: EthAddress::from_str(TEST_RECIPIENT).unwrap(),
        // 10 tokens at 18 decimals
        amount: U256::from_dec_str("10000000000000000000").unwrap(),
    }
}

pub fn sample_token_meta() -> TokenMeta {
    TokenMeta {
        name: "Wrapped Ether".to_string(),
        symbol: "WETH".to_string(),
        decimals: 18,
    }
}
