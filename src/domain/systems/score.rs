// Score ledger: team total, kill counter, and lazily-created individual
// tallies, all replicated through the single-writer bus.

use tracing::info;

use crate::domain::replication::{ReplicatedMap, ReplicatedValue, ReplicationBus, ReplicationOp};
use crate::domain::tuning::score::ScoreTuning;

pub struct ScoreLedger {
    tuning: ScoreTuning,
    team_score: ReplicatedValue<i64>,
    total_kills: ReplicatedValue<u64>,
    individual: ReplicatedMap<u64, i64>,
}

impl ScoreLedger {
    pub fn new(tuning: ScoreTuning) -> Self {
        Self {
            tuning,
            team_score: ReplicatedValue::new("score.team", 0),
            total_kills: ReplicatedValue::new("score.kills", 0),
            individual: ReplicatedMap::new("score.individual"),
        }
    }

    pub fn team_score(&self) -> i64 {
        *self.team_score.get()
    }

    pub fn total_kills(&self) -> u64 {
        *self.total_kills.get()
    }

    pub fn player_score(&self, player_id: u64) -> i64 {
        self.individual.get(&player_id).copied().unwrap_or(0)
    }

    /// Credits a kill to the team, and to the killer when one is known.
    pub fn award_kill(&mut self, killer: Option<u64>, bus: &mut ReplicationBus) {
        let _ = self
            .team_score
            .set(self.team_score() + self.tuning.kill_reward, bus);
        let _ = self.total_kills.set(self.total_kills() + 1, bus);

        if let Some(player_id) = killer {
            let tally = self.player_score(player_id) + self.tuning.kill_reward;
            let _ = self.individual.insert(player_id, tally, bus);
            info!(player_id, tally, team = self.team_score(), "kill scored");
        }
    }

    pub fn award_wave_bonus(&mut self, wave_number: u32, bus: &mut ReplicationBus) {
        let _ = self
            .team_score
            .set(self.team_score() + self.tuning.wave_clear_bonus, bus);
        info!(
            wave = wave_number,
            bonus = self.tuning.wave_clear_bonus,
            team = self.team_score(),
            "wave bonus"
        );
    }

    pub fn reset(&mut self, bus: &mut ReplicationBus) {
        let _ = self.team_score.set(0, bus);
        let _ = self.total_kills.set(0, bus);
        let _ = self.individual.clear(bus);
        info!("score ledger reset");
    }

    pub fn sync_ops(&self) -> Vec<ReplicationOp> {
        let mut ops = vec![self.team_score.sync_op(), self.total_kills.sync_op()];
        ops.extend(self.individual.sync_ops());
        ops
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> (ScoreLedger, ReplicationBus) {
        (
            ScoreLedger::new(ScoreTuning::default()),
            ReplicationBus::authority(),
        )
    }

    #[test]
    fn anonymous_kill_scores_team_but_no_individual() {
        let (mut score, mut bus) = ledger();

        score.award_kill(None, &mut bus);

        assert_eq!(score.team_score(), 10);
        assert_eq!(score.total_kills(), 1);
        assert_eq!(score.player_score(7), 0);
        // Team total and kill counter replicate; no individual op.
        assert_eq!(bus.drain().len(), 2);
    }

    #[test]
    fn credited_kill_creates_the_tally_lazily() {
        let (mut score, mut bus) = ledger();

        score.award_kill(Some(7), &mut bus);
        score.award_kill(Some(7), &mut bus);

        assert_eq!(score.player_score(7), 20);
        assert_eq!(score.team_score(), 20);
        assert_eq!(score.total_kills(), 2);
    }

    #[test]
    fn wave_bonus_only_raises_team_total() {
        let (mut score, mut bus) = ledger();

        score.award_wave_bonus(1, &mut bus);

        assert_eq!(score.team_score(), 50);
        assert_eq!(score.total_kills(), 0);
    }

    #[test]
    fn reset_zeroes_all_tracked_quantities() {
        let (mut score, mut bus) = ledger();
        score.award_kill(Some(7), &mut bus);
        score.award_wave_bonus(1, &mut bus);

        score.reset(&mut bus);

        assert_eq!(score.team_score(), 0);
        assert_eq!(score.total_kills(), 0);
        assert_eq!(score.player_score(7), 0);
    }

    #[test]
    fn mutations_replicate_in_write_order() {
        let (mut score, mut bus) = ledger();

        score.award_kill(Some(7), &mut bus);

        let channels: Vec<String> = bus.drain().into_iter().map(|op| op.channel).collect();
        assert_eq!(channels, vec!["score.team", "score.kills", "score.individual"]);
    }
}
