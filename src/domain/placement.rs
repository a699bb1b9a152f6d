use crate::domain::error::{Advisory, PlanError};
use crate::domain::interval::{Interval, find_slot, merge_intervals};
use crate::domain::models::{
    Block, BlockSource, DEFAULT_DURATION_MIN, MAX_DURATION_MIN, MAX_START_MIN, MIN_DURATION_MIN,
    MINUTES_PER_DAY, TaskRequest, coerce_task_id, format_minutes, truncate_title,
};
use crate::domain::normalizer::clamp_minutes;
use serde::Serialize;
use uuid::Uuid;

const MAX_BUFFER_MIN: u32 = 120;

/// Work-hour window and spacing rules used when placing new blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacementPolicy {
    pub work_start_min: u32,
    pub work_end_min: u32,
    pub buffer_min: u32,
    pub default_duration_min: u32,
}

impl Default for PlacementPolicy {
    fn default() -> Self {
        Self {
            work_start_min: 9 * 60,
            work_end_min: 18 * 60,
            buffer_min: 10,
            default_duration_min: DEFAULT_DURATION_MIN,
        }
    }
}

impl PlacementPolicy {
    pub fn validate(&self) -> Result<(), String> {
        if self.work_end_min > MINUTES_PER_DAY {
            return Err("workHours.end must not be later than 24:00".to_string());
        }
        if self.work_start_min >= self.work_end_min {
            return Err("workHours.start must be earlier than workHours.end".to_string());
        }
        if self.buffer_min > MAX_BUFFER_MIN {
            return Err(format!("bufferMinutes must be at most {MAX_BUFFER_MIN}"));
        }
        if !(MIN_DURATION_MIN..=MAX_DURATION_MIN).contains(&self.default_duration_min) {
            return Err(format!(
                "defaultTaskDurationMinutes must be within {MIN_DURATION_MIN}..={MAX_DURATION_MIN}"
            ));
        }
        Ok(())
    }

    pub fn work_window(&self) -> Interval {
        Interval::new(self.work_start_min, self.work_end_min)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementOutcome {
    WithinWorkHours,
    AfterLastBlock,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub block: Block,
    pub outcome: PlacementOutcome,
    pub work_window: Interval,
}

impl Placement {
    pub fn scheduled_after_last_block(&self) -> bool {
        self.outcome == PlacementOutcome::AfterLastBlock
    }

    /// The `NO_SLOT` notice for a fallback placement, `None` otherwise.
    pub fn advisory(&self) -> Option<Advisory> {
        if !self.scheduled_after_last_block() {
            return None;
        }
        Some(Advisory::no_slot(format!(
            "No free slot in work hours ({}-{}); scheduled after last block at {}, \
             outside preferred hours.",
            format_minutes(self.work_window.start),
            format_minutes(self.work_window.end),
            format_minutes(self.block.start_min)
        )))
    }
}

/// Proposes one new task block without moving any existing block.
pub fn place_task(
    policy: &PlacementPolicy,
    existing: &[Block],
    busy: &[Interval],
    task: &TaskRequest,
) -> Result<Placement, PlanError> {
    let title = truncate_title(&task.title);
    if title.is_empty() {
        return Err(PlanError::validation("Task title cannot be empty"));
    }

    let duration_min = clamp_minutes(
        task.duration_min
            .unwrap_or(i64::from(policy.default_duration_min)),
        MIN_DURATION_MIN,
        MAX_DURATION_MIN,
    );

    let occupied = merge_intervals(
        existing
            .iter()
            .map(Block::interval)
            .chain(busy.iter().copied())
            .collect(),
    );

    let window = policy.work_window();
    let (start_min, outcome) = match find_slot(
        &occupied,
        duration_min,
        window.start,
        window.end,
        policy.buffer_min,
    ) {
        Some(start_min) => (start_min, PlacementOutcome::WithinWorkHours),
        None => {
            let last_end = occupied
                .iter()
                .map(|interval| interval.end)
                .max()
                .unwrap_or(window.start);
            let start_min = last_end
                .saturating_add(policy.buffer_min)
                .min(MAX_START_MIN);
            (start_min, PlacementOutcome::AfterLastBlock)
        }
    };

    let proposed = Interval::new(start_min, start_min.saturating_add(duration_min));
    if let Some(anchor) = existing
        .iter()
        .find(|block| block.locked && block.interval().intersects(&proposed))
    {
        return Err(PlanError::validation(format!(
            "No room for \"{title}\" without overwriting locked block \"{}\"",
            anchor.title
        )));
    }

    Ok(Placement {
        block: Block {
            id: Uuid::new_v4().to_string(),
            title,
            start_min,
            duration_min,
            source: BlockSource::Task,
            task_id: coerce_task_id(task.task_id.as_deref()),
            locked: false,
        },
        outcome,
        work_window: window,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::ErrorCode;

    fn block(title: &str, start_min: u32, duration_min: u32, locked: bool) -> Block {
        Block {
            id: format!("id-{title}"),
            title: title.to_string(),
            start_min,
            duration_min,
            source: BlockSource::Manual,
            task_id: None,
            locked,
        }
    }

    fn task(title: &str, duration_min: Option<i64>) -> TaskRequest {
        TaskRequest {
            title: title.to_string(),
            duration_min,
            task_id: Some("65f1c0ffee".to_string()),
        }
    }

    #[test]
    fn default_policy_is_nine_to_six_with_ten_minute_buffer() {
        let policy = PlacementPolicy::default();
        assert_eq!(policy.work_window(), Interval::new(540, 1080));
        assert_eq!(policy.buffer_min, 10);
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn policy_validation_rejects_inverted_or_oversized_settings() {
        let inverted = PlacementPolicy {
            work_start_min: 1080,
            work_end_min: 540,
            ..PlacementPolicy::default()
        };
        assert!(inverted.validate().is_err());

        let wide_buffer = PlacementPolicy {
            buffer_min: 121,
            ..PlacementPolicy::default()
        };
        assert!(wide_buffer.validate().is_err());
    }

    #[test]
    fn places_task_in_first_gap_combining_blocks_and_busy_time() {
        let existing = vec![block("Standup", 540, 60, false)];
        let busy = vec![Interval::new(630, 660)];

        let placement = place_task(
            &PlacementPolicy::default(),
            &existing,
            &busy,
            &task("Write report", Some(30)),
        )
        .expect("placement");

        assert_eq!(placement.block.start_min, 660);
        assert_eq!(placement.block.duration_min, 30);
        assert_eq!(placement.block.source, BlockSource::Task);
        assert_eq!(placement.block.task_id.as_deref(), Some("65f1c0ffee"));
        assert!(!placement.block.locked);
        assert!(placement.advisory().is_none());
    }

    #[test]
    fn missing_duration_uses_policy_default_and_clamps_requests() {
        let policy = PlacementPolicy::default();
        let defaulted = place_task(&policy, &[], &[], &task("Inbox", None)).expect("placement");
        assert_eq!(defaulted.block.duration_min, DEFAULT_DURATION_MIN);

        let clamped =
            place_task(&policy, &[], &[], &task("Marathon", Some(5_000))).expect("placement");
        assert_eq!(clamped.block.duration_min, MAX_DURATION_MIN);
    }

    #[test]
    fn full_work_day_falls_back_after_last_block_with_advisory() {
        let existing = vec![block("Workshop", 540, 540, false)];

        let placement = place_task(
            &PlacementPolicy::default(),
            &existing,
            &[],
            &task("Follow-up", Some(30)),
        )
        .expect("fallback placement");

        assert_eq!(placement.block.start_min, 1090);
        assert!(placement.scheduled_after_last_block());
        let advisory = placement.advisory().expect("advisory");
        assert_eq!(advisory.code, ErrorCode::NoSlot);
        assert!(advisory.message.contains("outside preferred hours"));
    }

    #[test]
    fn all_day_event_pushes_fallback_to_last_minute() {
        let placement = place_task(
            &PlacementPolicy::default(),
            &[],
            &[Interval::new(0, 1440)],
            &task("Anything", Some(30)),
        )
        .expect("fallback placement");

        assert_eq!(placement.block.start_min, MAX_START_MIN);
        assert!(placement.scheduled_after_last_block());
    }

    #[test]
    fn fallback_never_overwrites_a_locked_block() {
        let existing = vec![
            block("Workday", 540, 540, false),
            block("Night shift", 1380, 60, true),
        ];

        let error = place_task(
            &PlacementPolicy::default(),
            &existing,
            &[],
            &task("Late task", Some(30)),
        )
        .expect_err("must refuse");

        assert_eq!(error.code(), ErrorCode::Validation);
        assert!(error.to_string().contains("Night shift"));
    }

    #[test]
    fn existing_blocks_are_left_untouched() {
        let existing = vec![
            block("Anchor", 600, 60, true),
            block("Loose", 700, 30, false),
        ];
        let before = existing.clone();

        let placement = place_task(
            &PlacementPolicy::default(),
            &existing,
            &[],
            &task("New", Some(45)),
        )
        .expect("placement");

        assert_eq!(existing, before);
        assert_eq!(placement.block.start_min, 540);
        for block in &existing {
            assert!(!block.interval().intersects(&placement.block.interval()));
        }
    }

    #[test]
    fn blank_task_title_is_rejected() {
        let error = place_task(&PlacementPolicy::default(), &[], &[], &task("  ", Some(30)))
            .expect_err("blank title");
        assert_eq!(error.code(), ErrorCode::Validation);
    }

    #[test]
    fn placement_is_deterministic_for_identical_inputs() {
        let existing = vec![block("A", 560, 40, false), block("B", 700, 20, true)];
        let busy = vec![Interval::new(620, 680), Interval::new(540, 550)];
        let policy = PlacementPolicy::default();

        let first = place_task(&policy, &existing, &busy, &task("T", Some(25))).expect("first");
        let mut shuffled_busy = busy.clone();
        shuffled_busy.reverse();
        let second =
            place_task(&policy, &existing, &shuffled_busy, &task("T", Some(25))).expect("second");

        assert_eq!(first.block.start_min, second.block.start_min);
        assert_eq!(first.outcome, second.outcome);
    }
}
