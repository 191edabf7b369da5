//! Move Poller (C3): reconciles tracked matches against the external
//! listing API, updating the match record and enqueuing analysis tasks for
//! any moves that arrived since the last poll.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::error::Result;
use crate::ports::{ListingApiClient, MatchSituation, MatchStore, TaskStore};
use crate::types::entities::Match;
use crate::types::enums::{MatchStatus, Player};
use crate::types::primitives::{MoveNumber, Priority};

/// Polls the listing API for every tracked live match and reconciles moves.
pub struct MovePoller<S, L> {
    store: Arc<S>,
    listing: Arc<L>,
}

impl<S, L> MovePoller<S, L>
where
    S: TaskStore + MatchStore,
    L: ListingApiClient,
{
    /// Build a poller over the given store and listing API client.
    pub const fn new(store: Arc<S>, listing: Arc<L>) -> Self {
        Self { store, listing }
    }

    /// Run one poll cycle: fetch every match the store still considers
    /// `live`, reconcile each against the listing source, and enqueue
    /// analysis tasks for any new moves.
    ///
    /// A failure reconciling one match is logged and skipped rather than
    /// aborting the cycle - per §7, one unreachable match must not prevent
    /// the rest from being polled.
    ///
    /// # Errors
    ///
    /// Returns an error only if listing the tracked matches themselves fails;
    /// per-match reconciliation failures are swallowed after logging.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<()> {
        let live_matches = self.store.get_live_matches().await?;
        debug!(count = live_matches.len(), "polling live matches");

        for existing in live_matches {
            if let Err(e) = self.reconcile(&existing).await {
                warn!(match_id = %existing.match_id, error = %e, "failed to reconcile match, skipping");
            }
        }

        Ok(())
    }

    /// Reconcile one tracked match against the listing source's current
    /// situation for it.
    async fn reconcile(&self, existing: &Match) -> Result<()> {
        let Some(situation) = self.listing.get_situation(existing.match_id.as_str()).await? else {
            debug!(match_id = %existing.match_id, "listing source has nothing for this match id");
            return Ok(());
        };

        let old_count = existing.moves.len();
        let new_count = situation.moves.len();
        let transitioned_to_finished = existing.is_live() && situation.status == MatchStatus::Finished;

        let updated = merge(existing, &situation);
        self.store.upsert_from_poll(&updated).await?;

        if new_count > old_count {
            info!(match_id = %existing.match_id, old_count, new_count, "new moves arrived");
            for move_number in (old_count + 1)..=new_count {
                self.store
                    .create_pending(
                        &existing.match_id,
                        MoveNumber::new(u32::try_from(move_number).unwrap_or(u32::MAX)),
                        Priority::LIVE_NEW,
                        situation.moves.get(move_number - 1),
                        Some(Match::mover_at(MoveNumber::new(u32::try_from(move_number).unwrap_or(u32::MAX)))),
                    )
                    .await?;
            }
        }

        if transitioned_to_finished {
            info!(match_id = %existing.match_id, new_count, "match finished, backfilling full move range");
            for move_number in 0..=new_count {
                self.store
                    .create_pending(
                        &existing.match_id,
                        MoveNumber::new(u32::try_from(move_number).unwrap_or(u32::MAX)),
                        Priority::LIVE_BACKFILL,
                        move_number.checked_sub(1).and_then(|i| situation.moves.get(i)),
                        mover_for(move_number),
                    )
                    .await?;
            }
        }

        Ok(())
    }
}

/// Merge a freshly-fetched situation into the existing match record,
/// preserving fields the source doesn't carry on every poll.
fn merge(existing: &Match, situation: &MatchSituation) -> Match {
    Match {
        match_id: existing.match_id.clone(),
        tournament: situation.tournament.clone().or_else(|| existing.tournament.clone()),
        black_name: situation.black_name.clone(),
        white_name: situation.white_name.clone(),
        status: situation.status,
        moves: situation.moves.clone(),
        board_size: situation.board_size.unwrap_or(existing.board_size),
        komi: situation.komi.unwrap_or(existing.komi),
        rules: situation.rules.clone().unwrap_or_else(|| existing.rules.clone()),
        rollup_winrate: situation.rollup_winrate.or(existing.rollup_winrate),
        rollup_score_lead: situation.rollup_score_lead.or(existing.rollup_score_lead),
        round: situation.round.clone().or_else(|| existing.round.clone()),
        date: situation.date.clone().or_else(|| existing.date.clone()),
        black_rank: situation.black_rank.clone().or_else(|| existing.black_rank.clone()),
        white_rank: situation.white_rank.clone().or_else(|| existing.white_rank.clone()),
        result: situation.result.clone().or_else(|| existing.result.clone()),
        created_at: existing.created_at,
        updated_at: existing.updated_at,
    }
}

fn mover_for(move_number: usize) -> Option<Player> {
    if move_number == 0 {
        None
    } else {
        Some(Match::mover_at(MoveNumber::new(u32::try_from(move_number).unwrap_or(u32::MAX))))
    }
}
