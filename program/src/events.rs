// Notifications published by the raffle program
use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{log::sol_log_data, msg, pubkey::Pubkey};

use crate::vrf::RequestId;

/// Events written to the transaction log as `Program data:` entries
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq)]
pub enum RaffleEvent {
    /// A player entered the current round
    RaffleEnter { player: Pubkey },

    /// Parameters of a new randomness request, consumed by the oracle
    RandomWordsRequested {
        request_id: RequestId,
        key_hash: [u8; 32],
        subscription_id: u64,
        request_confirmations: u16,
        callback_gas_limit: u32,
        num_words: u32,
        sender: Pubkey,
    },

    /// Upkeep fired and the round is waiting for randomness
    RequestedRaffleWinner { request_id: RequestId },

    /// The round settled and `prize` lamports went to `winner`
    WinnerPicked { winner: Pubkey, prize: u64 },
}

pub fn emit(event: &RaffleEvent) {
    match event.try_to_vec() {
        Ok(data) => sol_log_data(&[data.as_slice()]),
        Err(_) => msg!("Failed to serialize event {:?}", event),
    }
}
