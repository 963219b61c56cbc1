use arrayref::{array_mut_ref, array_ref, array_refs, mut_array_refs};
use solana_program::{
    clock::UnixTimestamp,
    msg,
    program_error::ProgramError,
    program_pack::{IsInitialized, Pack, Sealed},
    pubkey::{Pubkey, PUBKEY_BYTES},
};

use crate::config::{OracleConfig, RaffleConfig, MAX_PLAYERS};
use crate::error::RaffleError;
use crate::vrf::{self, RequestId};

/// Seed of the singleton raffle account
pub const RAFFLE_SEED: &[u8] = b"raffle";

const PLAYERS_LEN: usize = MAX_PLAYERS * PUBKEY_BYTES;

/// Phase of the current round
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RaffleState {
    /// Accepting entries
    Open,
    /// Waiting for the oracle to answer the outstanding request
    Calculating,
}

impl TryFrom<u8> for RaffleState {
    type Error = &'static str;

    fn try_from(val: u8) -> Result<Self, Self::Error> {
        match val {
            0 => Ok(RaffleState::Open),
            1 => Ok(RaffleState::Calculating),
            _ => Err("Invalid raffle state"),
        }
    }
}

impl From<RaffleState> for u8 {
    fn from(state: RaffleState) -> Self {
        match state {
            RaffleState::Open => 0,
            RaffleState::Calculating => 1,
        }
    }
}

/// Individual conditions behind `checkUpkeep`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UpkeepStatus {
    pub time_passed: bool,
    pub has_players: bool,
    pub has_balance: bool,
    pub is_open: bool,
}

impl UpkeepStatus {
    pub fn upkeep_needed(&self) -> bool {
        self.time_passed && self.has_players && self.has_balance && self.is_open
    }
}

/// Raffle account data
///
/// One instance exists per program. Configuration is written once by
/// `Initialize`; the round fields are reset by every fulfillment.
#[derive(Clone, Debug, PartialEq)]
pub struct Raffle {
    /// Is the account initialized
    pub is_initialized: bool,
    /// Bump of the raffle PDA
    pub bump: u8,
    pub config: RaffleConfig,
    pub state: RaffleState,
    /// Time of the last round reset
    pub last_timestamp: UnixTimestamp,
    /// Requests issued so far, feeds request id derivation
    pub request_nonce: u64,
    /// Outstanding randomness request, if any
    pub pending_request: Option<RequestId>,
    /// Winner of the last settled round (zero key before the first payout)
    pub recent_winner: Pubkey,
    /// Entries of the current round in insertion order
    pub players: Vec<Pubkey>,
}

impl Raffle {
    /// Open the first round
    pub fn new(config: RaffleConfig, bump: u8, now: UnixTimestamp) -> Self {
        Self {
            is_initialized: true,
            bump,
            config,
            state: RaffleState::Open,
            last_timestamp: now,
            request_nonce: 0,
            pending_request: None,
            recent_winner: Pubkey::default(),
            players: Vec::new(),
        }
    }

    pub fn entrance_fee(&self) -> u64 {
        self.config.entrance_fee
    }

    pub fn interval(&self) -> u64 {
        self.config.interval
    }

    pub fn oracle(&self) -> &OracleConfig {
        &self.config.oracle
    }

    pub fn state(&self) -> RaffleState {
        self.state
    }

    pub fn number_of_players(&self) -> usize {
        self.players.len()
    }

    pub fn player(&self, index: usize) -> Option<Pubkey> {
        self.players.get(index).copied()
    }

    pub fn recent_winner(&self) -> Pubkey {
        self.recent_winner
    }

    pub fn last_timestamp(&self) -> UnixTimestamp {
        self.last_timestamp
    }

    pub fn pending_request(&self) -> Option<RequestId> {
        self.pending_request
    }

    /// Record an entry for the current round
    pub fn enter(&mut self, player: Pubkey, amount: u64) -> Result<(), RaffleError> {
        if amount < self.config.entrance_fee {
            msg!(
                "Payment of {} lamports is below the entrance fee of {}",
                amount,
                self.config.entrance_fee
            );
            return Err(RaffleError::NotEnoughPayment);
        }
        if self.state != RaffleState::Open {
            msg!("Raffle is calculating, entries are closed");
            return Err(RaffleError::RaffleNotOpen);
        }
        if self.players.len() >= MAX_PLAYERS {
            msg!("Raffle already holds {} players", MAX_PLAYERS);
            return Err(RaffleError::RaffleFull);
        }
        self.players.push(player);
        Ok(())
    }

    /// Evaluate the upkeep predicate. `balance` is the prize pool in lamports.
    pub fn check_upkeep(&self, now: UnixTimestamp, balance: u64) -> UpkeepStatus {
        let elapsed = now.saturating_sub(self.last_timestamp);
        // interval fits an i64, checked at initialization
        let interval = i64::try_from(self.config.interval).unwrap_or(i64::MAX);
        UpkeepStatus {
            time_passed: elapsed > interval,
            has_players: !self.players.is_empty(),
            has_balance: balance > 0,
            is_open: self.state == RaffleState::Open,
        }
    }

    /// Re-validate the predicate before leaving the open phase
    pub fn ensure_upkeep_needed(
        &self,
        now: UnixTimestamp,
        balance: u64,
    ) -> Result<(), RaffleError> {
        if self.check_upkeep(now, balance).upkeep_needed() {
            return Ok(());
        }
        msg!(
            "UpkeepNotNeeded: balance={}, players={}, state={:?}",
            balance,
            self.players.len(),
            self.state
        );
        Err(RaffleError::UpkeepNotNeeded)
    }

    /// Move to `Calculating` with `request_id` outstanding
    pub fn record_request(&mut self, request_id: RequestId) -> Result<(), RaffleError> {
        if self.state != RaffleState::Open || self.pending_request.is_some() {
            return Err(RaffleError::UpkeepNotNeeded);
        }
        self.state = RaffleState::Calculating;
        self.pending_request = Some(request_id);
        self.request_nonce = self
            .request_nonce
            .checked_add(1)
            .ok_or(RaffleError::InvalidAccountData)?;
        Ok(())
    }

    /// Consume the oracle answer: pick the winner and reset the round.
    ///
    /// Returns the winner. The caller is responsible for paying out; if that
    /// fails the whole instruction, and with it this reset, is discarded.
    pub fn settle(
        &mut self,
        request_id: &RequestId,
        random_word: &[u8; 32],
        now: UnixTimestamp,
    ) -> Result<Pubkey, RaffleError> {
        if self.state != RaffleState::Calculating || self.pending_request.as_ref() != Some(request_id)
        {
            msg!("Fulfillment does not match the outstanding request");
            return Err(RaffleError::UnknownRequest);
        }
        // a request is only issued with players present
        if self.players.is_empty() {
            return Err(RaffleError::InvalidAccountData);
        }

        let winner_index = vrf::winner_index(random_word, self.players.len());
        let winner = self.players[winner_index];
        msg!("Winner index {} of {}", winner_index, self.players.len());

        self.recent_winner = winner;
        self.players.clear();
        self.last_timestamp = now;
        self.pending_request = None;
        self.state = RaffleState::Open;
        Ok(winner)
    }
}

impl Sealed for Raffle {}

impl IsInitialized for Raffle {
    fn is_initialized(&self) -> bool {
        self.is_initialized
    }
}

impl Pack for Raffle {
    const LEN: usize =
        1 + 1 + 8 + 8 + 32 + 32 + 8 + 4 + 2 + 1 + 8 + 8 + 1 + 32 + 32 + 4 + PLAYERS_LEN;

    fn unpack_from_slice(src: &[u8]) -> Result<Self, ProgramError> {
        let src = array_ref![src, 0, Raffle::LEN];
        let (
            is_initialized,
            bump,
            entrance_fee,
            interval,
            vrf_coordinator,
            key_hash,
            subscription_id,
            callback_gas_limit,
            request_confirmations,
            state,
            last_timestamp,
            request_nonce,
            has_pending_request,
            pending_request,
            recent_winner,
            player_count,
            players,
        ) = array_refs![src, 1, 1, 8, 8, 32, 32, 8, 4, 2, 1, 8, 8, 1, 32, 32, 4, PLAYERS_LEN];

        let state = RaffleState::try_from(state[0]).map_err(|_| ProgramError::InvalidAccountData)?;

        let player_count = u32::from_le_bytes(*player_count) as usize;
        if player_count > MAX_PLAYERS {
            return Err(ProgramError::InvalidAccountData);
        }
        let players = players
            .chunks_exact(PUBKEY_BYTES)
            .take(player_count)
            .map(|key| Pubkey::new_from_array(<[u8; PUBKEY_BYTES]>::try_from(key).unwrap_or_default()))
            .collect();

        let pending_request = match has_pending_request[0] {
            0 => None,
            1 => Some(*pending_request),
            _ => return Err(ProgramError::InvalidAccountData),
        };

        Ok(Raffle {
            is_initialized: is_initialized[0] != 0,
            bump: bump[0],
            config: RaffleConfig {
                entrance_fee: u64::from_le_bytes(*entrance_fee),
                interval: u64::from_le_bytes(*interval),
                oracle: OracleConfig {
                    vrf_coordinator: Pubkey::new_from_array(*vrf_coordinator),
                    key_hash: *key_hash,
                    subscription_id: u64::from_le_bytes(*subscription_id),
                    callback_gas_limit: u32::from_le_bytes(*callback_gas_limit),
                    request_confirmations: u16::from_le_bytes(*request_confirmations),
                },
            },
            state,
            last_timestamp: UnixTimestamp::from_le_bytes(*last_timestamp),
            request_nonce: u64::from_le_bytes(*request_nonce),
            pending_request,
            recent_winner: Pubkey::new_from_array(*recent_winner),
            players,
        })
    }

    fn pack_into_slice(&self, dst: &mut [u8]) {
        let dst = array_mut_ref![dst, 0, Raffle::LEN];
        let (
            is_initialized_dst,
            bump_dst,
            entrance_fee_dst,
            interval_dst,
            vrf_coordinator_dst,
            key_hash_dst,
            subscription_id_dst,
            callback_gas_limit_dst,
            request_confirmations_dst,
            state_dst,
            last_timestamp_dst,
            request_nonce_dst,
            has_pending_request_dst,
            pending_request_dst,
            recent_winner_dst,
            player_count_dst,
            players_dst,
        ) = mut_array_refs![dst, 1, 1, 8, 8, 32, 32, 8, 4, 2, 1, 8, 8, 1, 32, 32, 4, PLAYERS_LEN];

        let oracle = &self.config.oracle;
        is_initialized_dst[0] = self.is_initialized as u8;
        bump_dst[0] = self.bump;
        *entrance_fee_dst = self.config.entrance_fee.to_le_bytes();
        *interval_dst = self.config.interval.to_le_bytes();
        vrf_coordinator_dst.copy_from_slice(oracle.vrf_coordinator.as_ref());
        *key_hash_dst = oracle.key_hash;
        *subscription_id_dst = oracle.subscription_id.to_le_bytes();
        *callback_gas_limit_dst = oracle.callback_gas_limit.to_le_bytes();
        *request_confirmations_dst = oracle.request_confirmations.to_le_bytes();
        state_dst[0] = self.state.into();
        *last_timestamp_dst = self.last_timestamp.to_le_bytes();
        *request_nonce_dst = self.request_nonce.to_le_bytes();
        match self.pending_request {
            Some(request_id) => {
                has_pending_request_dst[0] = 1;
                *pending_request_dst = request_id;
            }
            None => {
                has_pending_request_dst[0] = 0;
                *pending_request_dst = [0u8; 32];
            }
        }
        recent_winner_dst.copy_from_slice(self.recent_winner.as_ref());
        *player_count_dst = (self.players.len() as u32).to_le_bytes();

        // stale slots are zeroed so a cleared round leaves no addresses behind
        players_dst.fill(0);
        for (slot, player) in players_dst
            .chunks_exact_mut(PUBKEY_BYTES)
            .zip(self.players.iter())
        {
            slot.copy_from_slice(player.as_ref());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vrf::random_word_from_u64;

    const START: UnixTimestamp = 1_700_000_000;

    fn open_raffle() -> Raffle {
        Raffle::new(RaffleConfig::localnet(Pubkey::new_unique()), 255, START)
    }

    fn after_interval(raffle: &Raffle) -> UnixTimestamp {
        raffle.last_timestamp + raffle.interval() as i64 + 1
    }

    #[test]
    fn starts_open_and_empty() {
        let raffle = open_raffle();
        assert_eq!(raffle.state(), RaffleState::Open);
        assert_eq!(raffle.number_of_players(), 0);
        assert_eq!(raffle.recent_winner(), Pubkey::default());
        assert_eq!(raffle.last_timestamp(), START);
        assert_eq!(raffle.pending_request(), None);
    }

    #[test]
    fn enter_rejects_underpayment() {
        let mut raffle = open_raffle();
        let fee = raffle.entrance_fee();
        for amount in [0, 1, fee / 2, fee - 1] {
            assert_eq!(
                raffle.enter(Pubkey::new_unique(), amount),
                Err(RaffleError::NotEnoughPayment)
            );
        }
        assert_eq!(raffle.number_of_players(), 0);
    }

    #[test]
    fn enter_records_players_in_order() {
        let mut raffle = open_raffle();
        let first = Pubkey::new_unique();
        let second = Pubkey::new_unique();
        raffle.enter(first, raffle.entrance_fee()).unwrap();
        raffle.enter(second, raffle.entrance_fee() * 2).unwrap();
        assert_eq!(raffle.player(0), Some(first));
        assert_eq!(raffle.player(1), Some(second));
        assert_eq!(raffle.player(2), None);
    }

    #[test]
    fn enter_rejected_while_calculating() {
        let mut raffle = open_raffle();
        raffle.enter(Pubkey::new_unique(), raffle.entrance_fee()).unwrap();
        raffle.record_request([7u8; 32]).unwrap();
        assert_eq!(
            raffle.enter(Pubkey::new_unique(), raffle.entrance_fee()),
            Err(RaffleError::RaffleNotOpen)
        );
    }

    #[test]
    fn enter_rejected_when_full() {
        let mut raffle = open_raffle();
        for _ in 0..MAX_PLAYERS {
            raffle.enter(Pubkey::new_unique(), raffle.entrance_fee()).unwrap();
        }
        assert_eq!(
            raffle.enter(Pubkey::new_unique(), raffle.entrance_fee()),
            Err(RaffleError::RaffleFull)
        );
    }

    #[test]
    fn upkeep_false_without_players() {
        let raffle = open_raffle();
        let now = START + 1_000_000;
        let status = raffle.check_upkeep(now, 1_000);
        assert!(!status.has_players);
        assert!(!status.upkeep_needed());
    }

    #[test]
    fn upkeep_false_before_interval() {
        let mut raffle = open_raffle();
        raffle.enter(Pubkey::new_unique(), raffle.entrance_fee()).unwrap();
        let balance = raffle.entrance_fee();
        // elapsed must strictly exceed the interval
        let at_interval = START + raffle.interval() as i64;
        assert!(!raffle.check_upkeep(at_interval, balance).upkeep_needed());
        assert!(!raffle.check_upkeep(START - 5, balance).upkeep_needed());
        assert!(raffle.check_upkeep(at_interval + 1, balance).upkeep_needed());
    }

    #[test]
    fn upkeep_false_without_balance() {
        let mut raffle = open_raffle();
        raffle.enter(Pubkey::new_unique(), raffle.entrance_fee()).unwrap();
        let status = raffle.check_upkeep(after_interval(&raffle), 0);
        assert!(!status.has_balance);
        assert!(!status.upkeep_needed());
    }

    #[test]
    fn upkeep_false_while_calculating() {
        let mut raffle = open_raffle();
        raffle.enter(Pubkey::new_unique(), raffle.entrance_fee()).unwrap();
        let now = after_interval(&raffle);
        raffle.ensure_upkeep_needed(now, 10).unwrap();
        raffle.record_request([1u8; 32]).unwrap();
        assert!(!raffle.check_upkeep(now, 10).is_open);
        assert_eq!(
            raffle.ensure_upkeep_needed(now, 10),
            Err(RaffleError::UpkeepNotNeeded)
        );
    }

    #[test]
    fn second_request_is_refused() {
        let mut raffle = open_raffle();
        raffle.enter(Pubkey::new_unique(), raffle.entrance_fee()).unwrap();
        raffle.record_request([1u8; 32]).unwrap();
        assert_eq!(raffle.request_nonce, 1);
        assert_eq!(
            raffle.record_request([2u8; 32]),
            Err(RaffleError::UpkeepNotNeeded)
        );
        assert_eq!(raffle.pending_request(), Some([1u8; 32]));
    }

    #[test]
    fn settle_rejects_unknown_request() {
        let mut raffle = open_raffle();
        raffle.enter(Pubkey::new_unique(), raffle.entrance_fee()).unwrap();
        let word = random_word_from_u64(3);

        // nothing issued yet
        assert_eq!(
            raffle.settle(&[1u8; 32], &word, START),
            Err(RaffleError::UnknownRequest)
        );

        raffle.record_request([1u8; 32]).unwrap();
        let before = raffle.clone();
        assert_eq!(
            raffle.settle(&[2u8; 32], &word, START),
            Err(RaffleError::UnknownRequest)
        );
        assert_eq!(raffle, before);
    }

    #[test]
    fn settle_picks_fourth_player_for_word_seven() {
        let mut raffle = open_raffle();
        let players: Vec<Pubkey> = (0..4).map(|_| Pubkey::new_unique()).collect();
        for player in &players {
            raffle.enter(*player, raffle.entrance_fee()).unwrap();
        }
        let request_id = [9u8; 32];
        raffle.record_request(request_id).unwrap();

        let now = after_interval(&raffle);
        let winner = raffle
            .settle(&request_id, &random_word_from_u64(7), now)
            .unwrap();

        assert_eq!(winner, players[3]);
        assert_eq!(raffle.recent_winner(), players[3]);
        assert_eq!(raffle.number_of_players(), 0);
        assert_eq!(raffle.state(), RaffleState::Open);
        assert_eq!(raffle.last_timestamp(), now);
        assert_eq!(raffle.pending_request(), None);
    }

    #[test]
    fn replayed_fulfillment_is_unknown() {
        let mut raffle = open_raffle();
        raffle.enter(Pubkey::new_unique(), raffle.entrance_fee()).unwrap();
        raffle.record_request([4u8; 32]).unwrap();
        raffle
            .settle(&[4u8; 32], &random_word_from_u64(1), START + 100)
            .unwrap();
        assert_eq!(
            raffle.settle(&[4u8; 32], &random_word_from_u64(1), START + 200),
            Err(RaffleError::UnknownRequest)
        );
    }

    #[test]
    fn single_player_always_wins() {
        for word in [0u64, 1, 7, 12_345, u64::MAX] {
            let mut raffle = open_raffle();
            let only = Pubkey::new_unique();
            raffle.enter(only, raffle.entrance_fee()).unwrap();
            raffle.record_request([5u8; 32]).unwrap();
            let winner = raffle
                .settle(&[5u8; 32], &random_word_from_u64(word), START + 60)
                .unwrap();
            assert_eq!(winner, only);
        }
    }

    #[test]
    fn rounds_repeat_indefinitely() {
        let mut raffle = open_raffle();
        let mut now = START;
        for round in 0..10u8 {
            raffle.enter(Pubkey::new_unique(), raffle.entrance_fee()).unwrap();
            raffle.enter(Pubkey::new_unique(), raffle.entrance_fee()).unwrap();
            now = after_interval(&raffle);
            raffle.ensure_upkeep_needed(now, 2 * raffle.entrance_fee()).unwrap();
            raffle.record_request([round; 32]).unwrap();
            raffle
                .settle(&[round; 32], &random_word_from_u64(round as u64), now)
                .unwrap();
            assert_eq!(raffle.state(), RaffleState::Open);
            assert_eq!(raffle.number_of_players(), 0);
            assert_eq!(raffle.last_timestamp(), now);
        }
        assert_eq!(raffle.request_nonce, 10);
        assert!(now > START);
    }

    #[test]
    fn pack_preserves_round() {
        let mut raffle = open_raffle();
        raffle.enter(Pubkey::new_unique(), raffle.entrance_fee()).unwrap();
        raffle.enter(Pubkey::new_unique(), raffle.entrance_fee()).unwrap();
        raffle.record_request([3u8; 32]).unwrap();

        let mut data = vec![0u8; Raffle::LEN];
        Raffle::pack(raffle.clone(), &mut data).unwrap();
        assert_eq!(Raffle::unpack(&data).unwrap(), raffle);
    }

    #[test]
    fn pack_clears_stale_player_slots() {
        let mut raffle = open_raffle();
        raffle.enter(Pubkey::new_unique(), raffle.entrance_fee()).unwrap();
        let mut data = vec![0u8; Raffle::LEN];
        Raffle::pack(raffle.clone(), &mut data).unwrap();

        raffle.players.clear();
        Raffle::pack(raffle, &mut data).unwrap();
        assert!(data[Raffle::LEN - PLAYERS_LEN..].iter().all(|b| *b == 0));
    }

    #[test]
    fn unpack_rejects_bad_state_byte() {
        let mut data = vec![0u8; Raffle::LEN];
        Raffle::pack(open_raffle(), &mut data).unwrap();
        // state byte follows the fixed configuration block
        data[1 + 1 + 8 + 8 + 32 + 32 + 8 + 4 + 2] = 9;
        assert_eq!(
            Raffle::unpack(&data),
            Err(ProgramError::InvalidAccountData)
        );
    }
}
