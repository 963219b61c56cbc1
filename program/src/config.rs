// VRF Raffle Program - Construction-time configuration
use solana_program::{msg, pubkey::Pubkey};

use crate::error::RaffleError;

/// Random words requested per round (single winner)
pub const NUM_WORDS: u32 = 1;

/// Block confirmations the oracle waits for before answering
pub const REQUEST_CONFIRMATIONS: u16 = 3;

/// Player slots reserved in the raffle account
pub const MAX_PLAYERS: usize = 100;

/// 0.01 SOL
pub const DEFAULT_ENTRANCE_FEE: u64 = 10_000_000;

pub const DEFAULT_INTERVAL: u64 = 30;

pub const DEFAULT_CALLBACK_GAS_LIMIT: u32 = 500_000;

/// Parameters the oracle needs to serve a randomness request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OracleConfig {
    /// The only principal allowed to fulfill requests
    pub vrf_coordinator: Pubkey,
    /// Gas lane / key hash selecting the oracle's proving key
    pub key_hash: [u8; 32],
    /// Subscription funding the requests
    pub subscription_id: u64,
    /// Compute budget reserved for the fulfillment callback
    pub callback_gas_limit: u32,
    pub request_confirmations: u16,
}

/// Everything fixed when the raffle is created
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RaffleConfig {
    /// Minimum payment in lamports to enter a round
    pub entrance_fee: u64,
    /// Seconds that must elapse after a reset before upkeep can fire
    pub interval: u64,
    pub oracle: OracleConfig,
}

impl Default for RaffleConfig {
    fn default() -> Self {
        Self::localnet(Pubkey::default())
    }
}

impl RaffleConfig {
    /// Parameters for a local validator where the test suite plays the oracle
    pub fn localnet(vrf_coordinator: Pubkey) -> Self {
        Self {
            entrance_fee: DEFAULT_ENTRANCE_FEE,
            interval: DEFAULT_INTERVAL,
            oracle: OracleConfig {
                vrf_coordinator,
                key_hash: [0u8; 32],
                subscription_id: 1,
                callback_gas_limit: DEFAULT_CALLBACK_GAS_LIMIT,
                request_confirmations: REQUEST_CONFIRMATIONS,
            },
        }
    }

    /// Parameters for a live oracle; the gas lane comes from the oracle operator
    pub fn devnet(vrf_coordinator: Pubkey, key_hash: [u8; 32], subscription_id: u64) -> Self {
        Self {
            entrance_fee: DEFAULT_ENTRANCE_FEE,
            interval: DEFAULT_INTERVAL,
            oracle: OracleConfig {
                vrf_coordinator,
                key_hash,
                subscription_id,
                callback_gas_limit: DEFAULT_CALLBACK_GAS_LIMIT,
                request_confirmations: REQUEST_CONFIRMATIONS,
            },
        }
    }

    /// Reject configurations that would make the raffle unusable
    pub fn validate(&self) -> Result<(), RaffleError> {
        if self.entrance_fee == 0 {
            msg!("Entrance fee must be greater than zero");
            return Err(RaffleError::InvalidConfig);
        }
        if i64::try_from(self.interval).is_err() {
            msg!("Interval {} does not fit a unix timestamp", self.interval);
            return Err(RaffleError::InvalidConfig);
        }
        if self.oracle.callback_gas_limit == 0 {
            msg!("Callback gas limit must be greater than zero");
            return Err(RaffleError::InvalidConfig);
        }
        if self.oracle.vrf_coordinator == Pubkey::default() {
            msg!("VRF coordinator must be set");
            return Err(RaffleError::InvalidConfig);
        }
        Ok(())
    }
}
