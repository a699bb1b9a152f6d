use crate::domain::error::PlanError;
use crate::domain::interval::{self, Interval};
use crate::domain::models::{Block, BlockInput, TaskRequest};
use crate::domain::normalizer;
use crate::domain::placement::{self, Placement, PlacementPolicy};

/// Stateless entry point over the interval algebra, the normalizer and placement.
///
/// Holds only its policy, so one instance per work-hour profile can be shared
/// freely between requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Scheduler {
    policy: PlacementPolicy,
}

impl Scheduler {
    pub fn new(policy: PlacementPolicy) -> Result<Self, PlanError> {
        policy.validate().map_err(PlanError::validation)?;
        Ok(Self { policy })
    }

    pub fn merge_intervals(&self, intervals: Vec<Interval>) -> Vec<Interval> {
        interval::merge_intervals(intervals)
    }

    pub fn find_slot(
        &self,
        occupied: &[Interval],
        duration_min: u32,
        window_start: u32,
        window_end: u32,
    ) -> Option<u32> {
        interval::find_slot(
            occupied,
            duration_min,
            window_start,
            window_end,
            self.policy.buffer_min,
        )
    }

    /// `find_slot` over the policy's work hours.
    pub fn find_slot_in_work_hours(&self, occupied: &[Interval], duration_min: u32) -> Option<u32> {
        let window = self.policy.work_window();
        self.find_slot(occupied, duration_min, window.start, window.end)
    }

    pub fn normalize_and_validate(&self, inputs: Vec<BlockInput>) -> Result<Vec<Block>, PlanError> {
        normalizer::normalize_and_validate(inputs)
    }

    pub fn place_task(
        &self,
        existing: &[Block],
        busy: &[Interval],
        task: &TaskRequest,
    ) -> Result<Placement, PlanError> {
        placement::place_task(&self.policy, existing, busy, task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheduler_uses_policy_buffer_and_window() {
        let scheduler = Scheduler::default();
        let occupied = vec![Interval::new(540, 600), Interval::new(630, 660)];
        assert_eq!(scheduler.find_slot_in_work_hours(&occupied, 30), Some(660));
        assert_eq!(scheduler.find_slot_in_work_hours(&[], 45), Some(540));
    }

    #[test]
    fn merge_intervals_coalesces_blocks_and_busy_time() {
        let scheduler = Scheduler::default();
        let merged = scheduler.merge_intervals(vec![
            Interval::new(630, 660),
            Interval::new(540, 600),
            Interval::new(590, 630),
        ]);
        assert_eq!(merged, vec![Interval::new(540, 660)]);
        assert!(scheduler.merge_intervals(Vec::new()).is_empty());
    }

    #[test]
    fn custom_profile_changes_the_window() {
        let scheduler = Scheduler::new(PlacementPolicy {
            work_start_min: 7 * 60,
            work_end_min: 15 * 60,
            buffer_min: 0,
            ..PlacementPolicy::default()
        })
        .expect("valid policy");

        let occupied = vec![Interval::new(420, 450)];
        assert_eq!(scheduler.find_slot_in_work_hours(&occupied, 30), Some(450));
    }

    #[test]
    fn invalid_policy_is_rejected() {
        let result = Scheduler::new(PlacementPolicy {
            work_start_min: 600,
            work_end_min: 600,
            ..PlacementPolicy::default()
        });
        assert!(result.is_err());
    }
}
