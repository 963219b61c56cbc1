// VRF Raffle Program - Utility Functions
use solana_program::pubkey::Pubkey;

use crate::state::RAFFLE_SEED;

/// Find the program derived address of the raffle
pub fn find_raffle_address(program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[RAFFLE_SEED], program_id)
}

/// Lamports held above the rent-exempt minimum
pub fn prize_pool(lamports: u64, rent_exempt_minimum: u64) -> u64 {
    lamports.saturating_sub(rent_exempt_minimum)
}

/// Convert lamports to SOL (for display purposes)
pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / 1_000_000_000.0
}
