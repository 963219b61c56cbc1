// VRF Raffle Program - Errors
use solana_program::{
    decode_error::DecodeError, msg, program_error::PrintProgramError, program_error::ProgramError,
};
use thiserror::Error;

/// Errors that may be returned by the raffle program
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum RaffleError {
    /// Invalid instruction data passed
    #[error("Invalid instruction")]
    InvalidInstruction,

    /// Payment is below the entrance fee
    #[error("Not enough lamports sent to enter the raffle")]
    NotEnoughPayment,

    /// Entries are only accepted while the round is open
    #[error("Raffle is not open")]
    RaffleNotOpen,

    /// The player list has reached the account capacity
    #[error("Raffle has reached its player capacity")]
    RaffleFull,

    /// Upkeep conditions did not hold at call time
    #[error("Upkeep not needed")]
    UpkeepNotNeeded,

    /// Fulfillment does not match the outstanding request
    #[error("Unknown randomness request")]
    UnknownRequest,

    /// Prize payout failed
    #[error("Transfer to winner failed")]
    TransferFailed,

    /// Fulfillment signed by anyone other than the configured coordinator.
    /// Kept apart from `UnknownRequest`: a wrong caller is rejected before the
    /// request id is even looked at.
    #[error("Only the VRF coordinator can fulfill")]
    UnauthorizedCoordinator,

    /// The winner account passed does not match the selected player
    #[error("Winner account does not match the selected player")]
    WinnerAccountMismatch,

    #[error("Raffle already initialized")]
    AlreadyInitialized,

    /// Raffle account is not the program derived address
    #[error("Invalid raffle account")]
    InvalidRaffleAccount,

    #[error("Invalid raffle configuration")]
    InvalidConfig,

    #[error("Invalid raffle account data")]
    InvalidAccountData,
}

impl From<RaffleError> for ProgramError {
    fn from(e: RaffleError) -> Self {
        ProgramError::Custom(e as u32)
    }
}

impl<T> DecodeError<T> for RaffleError {
    fn type_of() -> &'static str {
        "Raffle Error"
    }
}

impl PrintProgramError for RaffleError {
    fn print<E>(&self) {
        msg!(&self.to_string());
    }
}
