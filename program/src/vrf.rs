// VRF request/response helpers for the raffle program
//
// The oracle is an external principal: `request_random_words` publishes a
// request, and the oracle later answers with `FulfillRandomWords` signed by
// the configured coordinator key.
use solana_program::{keccak, msg, pubkey::Pubkey};

use crate::config::{OracleConfig, NUM_WORDS};
use crate::events::{self, RaffleEvent};

/// Identity of a randomness request
pub type RequestId = [u8; 32];

/// Derive the identity of the next request for `consumer`
pub fn compute_request_id(consumer: &Pubkey, oracle: &OracleConfig, nonce: u64) -> RequestId {
    let mut request_id = keccak::hashv(&[
        oracle.key_hash.as_ref(),
        consumer.as_ref(),
        oracle.subscription_id.to_le_bytes().as_ref(),
        nonce.to_le_bytes().as_ref(),
    ])
    .to_bytes();
    // zero means "no request" on the wire
    while request_id == [0u8; 32] {
        request_id = keccak::hash(&request_id).to_bytes();
    }
    request_id
}

/// Issue a randomness request to the oracle and return its identity
pub fn request_random_words(consumer: &Pubkey, oracle: &OracleConfig, nonce: u64) -> RequestId {
    let request_id = compute_request_id(consumer, oracle, nonce);

    events::emit(&RaffleEvent::RandomWordsRequested {
        request_id,
        key_hash: oracle.key_hash,
        subscription_id: oracle.subscription_id,
        request_confirmations: oracle.request_confirmations,
        callback_gas_limit: oracle.callback_gas_limit,
        num_words: NUM_WORDS,
        sender: *consumer,
    });
    msg!(
        "Randomness requested: subscription={}, confirmations={}, callback_gas_limit={}",
        oracle.subscription_id,
        oracle.request_confirmations,
        oracle.callback_gas_limit
    );

    request_id
}

/// Reduce a 256-bit big-endian random word modulo `players`
pub fn winner_index(random_word: &[u8; 32], players: usize) -> usize {
    if players == 0 {
        return 0;
    }
    let modulus = players as u128;
    let remainder = random_word
        .iter()
        .fold(0u128, |acc, byte| ((acc << 8) | *byte as u128) % modulus);
    remainder as usize
}

/// Big-endian 256-bit word holding `value`
pub fn random_word_from_u64(value: u64) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&value.to_be_bytes());
    word
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RaffleConfig;

    #[test]
    fn word_seven_over_four_players() {
        assert_eq!(winner_index(&random_word_from_u64(7), 4), 3);
    }

    #[test]
    fn single_player_index_is_zero() {
        assert_eq!(winner_index(&[0xff; 32], 1), 0);
        assert_eq!(winner_index(&random_word_from_u64(12_345), 1), 0);
    }

    #[test]
    fn reduces_full_width_words() {
        // 2^256 - 1 is divisible by 3 and 5
        assert_eq!(winner_index(&[0xff; 32], 3), 0);
        assert_eq!(winner_index(&[0xff; 32], 5), 0);
        // 2^255 mod 7 == 2^(255 mod 3) == 1
        let mut word = [0u8; 32];
        word[0] = 0x80;
        assert_eq!(winner_index(&word, 7), 1);
    }

    #[test]
    fn request_ids_are_nonzero_and_unique() {
        let oracle = RaffleConfig::localnet(Pubkey::new_unique()).oracle;
        let consumer = Pubkey::new_unique();
        let first = compute_request_id(&consumer, &oracle, 0);
        let second = compute_request_id(&consumer, &oracle, 1);
        assert_ne!(first, [0u8; 32]);
        assert_ne!(first, second);
        assert_eq!(request_random_words(&consumer, &oracle, 0), first);
    }

    #[test]
    fn request_ids_differ_per_consumer() {
        let oracle = RaffleConfig::localnet(Pubkey::new_unique()).oracle;
        assert_ne!(
            compute_request_id(&Pubkey::new_unique(), &oracle, 0),
            compute_request_id(&Pubkey::new_unique(), &oracle, 0)
        );
    }
}
