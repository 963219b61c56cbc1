// VRF Raffle Program - Instruction Processor
use solana_program::{
    account_info::{next_account_info, AccountInfo},
    clock::Clock,
    entrypoint::ProgramResult,
    msg,
    program::{invoke, invoke_signed, set_return_data},
    program_error::ProgramError,
    program_pack::Pack,
    pubkey::Pubkey,
    rent::Rent,
    system_instruction,
    sysvar::Sysvar,
};

use crate::{
    config::{OracleConfig, RaffleConfig},
    error::RaffleError,
    events::{self, RaffleEvent},
    instruction::RaffleInstruction,
    state::{Raffle, RAFFLE_SEED},
    utils::{self, find_raffle_address},
    vrf::{self, RequestId},
};

/// Program state handler.
pub struct Processor;

impl Processor {
    pub fn process(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        instruction_data: &[u8],
    ) -> ProgramResult {
        let instruction = RaffleInstruction::unpack(instruction_data)?;

        match instruction {
            RaffleInstruction::Initialize {
                entrance_fee,
                interval,
                key_hash,
                subscription_id,
                callback_gas_limit,
                request_confirmations,
            } => {
                msg!("Instruction: Initialize");
                let config = RaffleConfig {
                    entrance_fee,
                    interval,
                    oracle: OracleConfig {
                        // taken from the coordinator account
                        vrf_coordinator: Pubkey::default(),
                        key_hash,
                        subscription_id,
                        callback_gas_limit,
                        request_confirmations,
                    },
                };
                Self::process_initialize(program_id, accounts, config)
            }
            RaffleInstruction::Enter { amount } => {
                msg!("Instruction: Enter");
                Self::process_enter(program_id, accounts, amount)
            }
            RaffleInstruction::CheckUpkeep => {
                msg!("Instruction: Check Upkeep");
                Self::process_check_upkeep(program_id, accounts)
            }
            RaffleInstruction::PerformUpkeep => {
                msg!("Instruction: Perform Upkeep");
                Self::process_perform_upkeep(program_id, accounts)
            }
            RaffleInstruction::FulfillRandomWords {
                request_id,
                random_word,
            } => {
                msg!("Instruction: Fulfill Random Words");
                Self::process_fulfill_random_words(program_id, accounts, request_id, random_word)
            }
        }
    }

    /// Create the singleton raffle account and open the first round
    fn process_initialize(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        mut config: RaffleConfig,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let payer_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let coordinator_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !payer_info.is_signer {
            msg!("Payer must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }

        let (expected_raffle_pubkey, bump_seed) = find_raffle_address(program_id);
        if *raffle_info.key != expected_raffle_pubkey {
            msg!("Invalid raffle account address");
            return Err(RaffleError::InvalidRaffleAccount.into());
        }

        config.oracle.vrf_coordinator = *coordinator_info.key;
        config.validate()?;

        if raffle_info.owner == program_id {
            let existing = Raffle::unpack_unchecked(&raffle_info.data.borrow())?;
            if existing.is_initialized {
                msg!("Raffle account is already initialized");
                return Err(RaffleError::AlreadyInitialized.into());
            }
        } else {
            msg!("Creating raffle account");
            Self::create_raffle_account(
                program_id,
                payer_info,
                raffle_info,
                system_program_info,
                bump_seed,
            )?;
        }

        let now = Clock::get()?.unix_timestamp;
        let raffle = Raffle::new(config, bump_seed, now);
        Raffle::pack(raffle, &mut raffle_info.data.borrow_mut())?;

        msg!(
            "Raffle initialized: EntranceFee={} SOL, Interval={}s, Coordinator={}",
            utils::lamports_to_sol(config.entrance_fee),
            config.interval,
            coordinator_info.key
        );
        Ok(())
    }

    fn process_enter(program_id: &Pubkey, accounts: &[AccountInfo], amount: u64) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let player_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !player_info.is_signer {
            msg!("Player must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }

        let mut raffle = Self::load_raffle(program_id, raffle_info)?;
        raffle.enter(*player_info.key, amount)?;

        invoke(
            &system_instruction::transfer(player_info.key, raffle_info.key, amount),
            &[
                player_info.clone(),
                raffle_info.clone(),
                system_program_info.clone(),
            ],
        )?;

        let players = raffle.number_of_players();
        Raffle::pack(raffle, &mut raffle_info.data.borrow_mut())?;

        events::emit(&RaffleEvent::RaffleEnter {
            player: *player_info.key,
        });
        msg!(
            "Player {} entered with {} lamports ({} players)",
            player_info.key,
            amount,
            players
        );
        Ok(())
    }

    /// Read-only: the answer is published with `set_return_data`
    fn process_check_upkeep(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let raffle_info = next_account_info(account_info_iter)?;

        let raffle = Self::load_raffle(program_id, raffle_info)?;
        let now = Clock::get()?.unix_timestamp;
        let balance = Self::prize_pool(raffle_info)?;

        let status = raffle.check_upkeep(now, balance);
        msg!(
            "Upkeep: time_passed={}, has_players={}, has_balance={}, is_open={}",
            status.time_passed,
            status.has_players,
            status.has_balance,
            status.is_open
        );
        set_return_data(&[status.upkeep_needed() as u8]);
        Ok(())
    }

    /// Close entries and issue exactly one randomness request
    fn process_perform_upkeep(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let caller_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;

        if !caller_info.is_signer {
            msg!("Caller must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }

        let mut raffle = Self::load_raffle(program_id, raffle_info)?;
        let now = Clock::get()?.unix_timestamp;
        let balance = Self::prize_pool(raffle_info)?;

        // conditions may have changed since an off-chain check
        raffle.ensure_upkeep_needed(now, balance)?;

        let request_id =
            vrf::request_random_words(raffle_info.key, raffle.oracle(), raffle.request_nonce);
        raffle.record_request(request_id)?;
        Raffle::pack(raffle, &mut raffle_info.data.borrow_mut())?;

        events::emit(&RaffleEvent::RequestedRaffleWinner { request_id });
        msg!("Requested raffle winner, prize pool {} lamports", balance);
        Ok(())
    }

    /// Oracle callback: settle the round, then pay the winner
    fn process_fulfill_random_words(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        request_id: RequestId,
        random_word: [u8; 32],
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let coordinator_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let winner_info = next_account_info(account_info_iter)?;

        let mut raffle = Self::load_raffle(program_id, raffle_info)?;

        if !coordinator_info.is_signer || *coordinator_info.key != raffle.oracle().vrf_coordinator {
            msg!("Only the VRF coordinator can fulfill, got {}", coordinator_info.key);
            return Err(RaffleError::UnauthorizedCoordinator.into());
        }

        let now = Clock::get()?.unix_timestamp;
        let winner = raffle.settle(&request_id, &random_word, now)?;

        if *winner_info.key != winner {
            msg!("Expected winner account {}, got {}", winner, winner_info.key);
            return Err(RaffleError::WinnerAccountMismatch.into());
        }

        let prize = Self::prize_pool(raffle_info)?;

        // round reset is committed before any lamports move
        Raffle::pack(raffle, &mut raffle_info.data.borrow_mut())?;

        if !winner_info.is_writable {
            msg!("Winner account must be writable");
            return Err(RaffleError::TransferFailed.into());
        }
        let raffle_lamports = raffle_info
            .lamports()
            .checked_sub(prize)
            .ok_or(RaffleError::TransferFailed)?;
        let winner_lamports = winner_info
            .lamports()
            .checked_add(prize)
            .ok_or(RaffleError::TransferFailed)?;
        **raffle_info.try_borrow_mut_lamports()? = raffle_lamports;
        **winner_info.try_borrow_mut_lamports()? = winner_lamports;

        events::emit(&RaffleEvent::WinnerPicked { winner, prize });
        msg!(
            "Winner picked: {} receives {} SOL",
            winner,
            utils::lamports_to_sol(prize)
        );
        Ok(())
    }

    /// Fund, allocate and assign the raffle PDA. Lamports already sitting on the
    /// address count towards rent, so a transfer made before initialization
    /// cannot block it.
    fn create_raffle_account<'a>(
        program_id: &Pubkey,
        payer_info: &AccountInfo<'a>,
        raffle_info: &AccountInfo<'a>,
        system_program_info: &AccountInfo<'a>,
        bump_seed: u8,
    ) -> ProgramResult {
        let rent = Rent::get()?;
        let required = rent
            .minimum_balance(Raffle::LEN)
            .saturating_sub(raffle_info.lamports());
        if required > 0 {
            invoke(
                &system_instruction::transfer(payer_info.key, raffle_info.key, required),
                &[
                    payer_info.clone(),
                    raffle_info.clone(),
                    system_program_info.clone(),
                ],
            )?;
        }

        let signer_seeds: &[&[u8]] = &[RAFFLE_SEED, &[bump_seed]];
        invoke_signed(
            &system_instruction::allocate(raffle_info.key, Raffle::LEN as u64),
            &[raffle_info.clone(), system_program_info.clone()],
            &[signer_seeds],
        )?;
        invoke_signed(
            &system_instruction::assign(raffle_info.key, program_id),
            &[raffle_info.clone(), system_program_info.clone()],
            &[signer_seeds],
        )
    }

    /// Load the raffle, checking owner and address
    fn load_raffle(program_id: &Pubkey, raffle_info: &AccountInfo) -> Result<Raffle, ProgramError> {
        if raffle_info.owner != program_id {
            msg!("Raffle account must be owned by this program");
            return Err(ProgramError::IncorrectProgramId);
        }

        let raffle = Raffle::unpack(&raffle_info.data.borrow())?;

        let expected = Pubkey::create_program_address(&[RAFFLE_SEED, &[raffle.bump]], program_id)?;
        if *raffle_info.key != expected {
            msg!("Invalid raffle account address");
            return Err(RaffleError::InvalidRaffleAccount.into());
        }
        Ok(raffle)
    }

    fn prize_pool(raffle_info: &AccountInfo) -> Result<u64, ProgramError> {
        let rent = Rent::get()?;
        Ok(utils::prize_pool(
            raffle_info.lamports(),
            rent.minimum_balance(raffle_info.data_len()),
        ))
    }
}
