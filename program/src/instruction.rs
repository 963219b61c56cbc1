use solana_program::{
    instruction::{AccountMeta, Instruction},
    program_error::ProgramError,
    pubkey::Pubkey,
    system_program,
};
use std::mem::size_of;

use crate::config::RaffleConfig;
use crate::error::RaffleError;
use crate::utils::find_raffle_address;
use crate::vrf::RequestId;

#[derive(Clone, Debug, PartialEq)]
pub enum RaffleInstruction {
    /// Create the raffle and open its first round
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` Payer funding the raffle account
    /// 1. `[writable]` The raffle account (PDA, seeds `[b"raffle"]`)
    /// 2. `[]` The VRF coordinator allowed to fulfill requests
    /// 3. `[]` The system program
    Initialize {
        /// Minimum entry payment in lamports
        entrance_fee: u64,
        /// Seconds between round reset and the next upkeep
        interval: u64,
        /// Gas lane of the oracle
        key_hash: [u8; 32],
        subscription_id: u64,
        callback_gas_limit: u32,
        request_confirmations: u16,
    },

    /// Enter the current round
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` The player paying the entry
    /// 1. `[writable]` The raffle account
    /// 2. `[]` The system program
    Enter {
        /// Lamports sent to the prize pool
        amount: u64,
    },

    /// Evaluate the upkeep predicate; the answer is published as return data
    ///
    /// Accounts expected:
    /// 0. `[]` The raffle account
    CheckUpkeep,

    /// Close entries and request randomness
    ///
    /// Accounts expected:
    /// 0. `[signer]` Any automation agent
    /// 1. `[writable]` The raffle account
    PerformUpkeep,

    /// Oracle callback delivering randomness for the outstanding request
    ///
    /// Accounts expected:
    /// 0. `[signer]` The VRF coordinator
    /// 1. `[writable]` The raffle account
    /// 2. `[writable]` The selected player, receives the prize
    FulfillRandomWords {
        request_id: RequestId,
        random_word: [u8; 32],
    },
}

impl RaffleInstruction {
    /// Unpacks a byte buffer into a RaffleInstruction
    pub fn unpack(input: &[u8]) -> Result<Self, ProgramError> {
        let (tag, rest) = input
            .split_first()
            .ok_or(RaffleError::InvalidInstruction)?;

        Ok(match tag {
            0 => {
                let (entrance_fee, rest) = Self::unpack_u64(rest)?;
                let (interval, rest) = Self::unpack_u64(rest)?;
                let (key_hash, rest) = Self::unpack_fixed_bytes::<32>(rest)?;
                let (subscription_id, rest) = Self::unpack_u64(rest)?;
                let (callback_gas_limit, rest) = Self::unpack_u32(rest)?;
                let (request_confirmations, _) = Self::unpack_u16(rest)?;
                Self::Initialize {
                    entrance_fee,
                    interval,
                    key_hash,
                    subscription_id,
                    callback_gas_limit,
                    request_confirmations,
                }
            }
            1 => {
                let (amount, _) = Self::unpack_u64(rest)?;
                Self::Enter { amount }
            }
            2 => Self::CheckUpkeep,
            3 => Self::PerformUpkeep,
            4 => {
                let (request_id, rest) = Self::unpack_fixed_bytes::<32>(rest)?;
                let (random_word, _) = Self::unpack_fixed_bytes::<32>(rest)?;
                Self::FulfillRandomWords {
                    request_id,
                    random_word,
                }
            }
            _ => return Err(RaffleError::InvalidInstruction.into()),
        })
    }

    /// Packs a RaffleInstruction into a byte buffer
    pub fn pack(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(size_of::<Self>());
        match *self {
            Self::Initialize {
                entrance_fee,
                interval,
                ref key_hash,
                subscription_id,
                callback_gas_limit,
                request_confirmations,
            } => {
                buf.push(0);
                buf.extend_from_slice(&entrance_fee.to_le_bytes());
                buf.extend_from_slice(&interval.to_le_bytes());
                buf.extend_from_slice(key_hash);
                buf.extend_from_slice(&subscription_id.to_le_bytes());
                buf.extend_from_slice(&callback_gas_limit.to_le_bytes());
                buf.extend_from_slice(&request_confirmations.to_le_bytes());
            }
            Self::Enter { amount } => {
                buf.push(1);
                buf.extend_from_slice(&amount.to_le_bytes());
            }
            Self::CheckUpkeep => buf.push(2),
            Self::PerformUpkeep => buf.push(3),
            Self::FulfillRandomWords {
                ref request_id,
                ref random_word,
            } => {
                buf.push(4);
                buf.extend_from_slice(request_id);
                buf.extend_from_slice(random_word);
            }
        }
        buf
    }

    fn unpack_u64(input: &[u8]) -> Result<(u64, &[u8]), ProgramError> {
        let (bytes, rest) = Self::unpack_fixed_bytes::<8>(input)?;
        Ok((u64::from_le_bytes(bytes), rest))
    }

    fn unpack_u32(input: &[u8]) -> Result<(u32, &[u8]), ProgramError> {
        let (bytes, rest) = Self::unpack_fixed_bytes::<4>(input)?;
        Ok((u32::from_le_bytes(bytes), rest))
    }

    fn unpack_u16(input: &[u8]) -> Result<(u16, &[u8]), ProgramError> {
        let (bytes, rest) = Self::unpack_fixed_bytes::<2>(input)?;
        Ok((u16::from_le_bytes(bytes), rest))
    }

    fn unpack_fixed_bytes<const N: usize>(input: &[u8]) -> Result<([u8; N], &[u8]), ProgramError> {
        if input.len() < N {
            return Err(RaffleError::InvalidInstruction.into());
        }
        let (bytes, rest) = input.split_at(N);
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok((out, rest))
    }
}

/// Create initialize instruction
pub fn initialize(
    program_id: &Pubkey,
    payer: &Pubkey,
    config: &RaffleConfig,
) -> Result<Instruction, ProgramError> {
    let (raffle_account, _) = find_raffle_address(program_id);
    let data = RaffleInstruction::Initialize {
        entrance_fee: config.entrance_fee,
        interval: config.interval,
        key_hash: config.oracle.key_hash,
        subscription_id: config.oracle.subscription_id,
        callback_gas_limit: config.oracle.callback_gas_limit,
        request_confirmations: config.oracle.request_confirmations,
    }
    .pack();

    let accounts = vec![
        AccountMeta::new(*payer, true),
        AccountMeta::new(raffle_account, false),
        AccountMeta::new_readonly(config.oracle.vrf_coordinator, false),
        AccountMeta::new_readonly(system_program::id(), false),
    ];

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data,
    })
}

/// Create enter instruction
pub fn enter(program_id: &Pubkey, player: &Pubkey, amount: u64) -> Result<Instruction, ProgramError> {
    let (raffle_account, _) = find_raffle_address(program_id);
    let data = RaffleInstruction::Enter { amount }.pack();

    let accounts = vec![
        AccountMeta::new(*player, true),
        AccountMeta::new(raffle_account, false),
        AccountMeta::new_readonly(system_program::id(), false),
    ];

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data,
    })
}

/// Create check_upkeep instruction
pub fn check_upkeep(program_id: &Pubkey) -> Result<Instruction, ProgramError> {
    let (raffle_account, _) = find_raffle_address(program_id);

    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![AccountMeta::new_readonly(raffle_account, false)],
        data: RaffleInstruction::CheckUpkeep.pack(),
    })
}

/// Create perform_upkeep instruction
pub fn perform_upkeep(program_id: &Pubkey, caller: &Pubkey) -> Result<Instruction, ProgramError> {
    let (raffle_account, _) = find_raffle_address(program_id);

    let accounts = vec![
        AccountMeta::new_readonly(*caller, true),
        AccountMeta::new(raffle_account, false),
    ];

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data: RaffleInstruction::PerformUpkeep.pack(),
    })
}

/// Create fulfill_random_words instruction
pub fn fulfill_random_words(
    program_id: &Pubkey,
    vrf_coordinator: &Pubkey,
    winner: &Pubkey,
    request_id: RequestId,
    random_word: [u8; 32],
) -> Result<Instruction, ProgramError> {
    let (raffle_account, _) = find_raffle_address(program_id);
    let data = RaffleInstruction::FulfillRandomWords {
        request_id,
        random_word,
    }
    .pack();

    let accounts = vec![
        AccountMeta::new_readonly(*vrf_coordinator, true),
        AccountMeta::new(raffle_account, false),
        AccountMeta::new(*winner, false),
    ];

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data,
    })
}
