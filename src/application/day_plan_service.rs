use crate::domain::error::PlanError;
use crate::domain::interval::Interval;
use crate::domain::models::{BlockInput, DayPlan, TaskRequest, parse_date_key};
use crate::domain::normalizer::validate_block_inputs;
use crate::domain::placement::Placement;
use crate::domain::scheduler::Scheduler;
use crate::infrastructure::day_plan_repository::DayPlanRepository;
use crate::infrastructure::error::InfraError;
use std::sync::Arc;
use tracing::{info, warn};

/// Per-user, per-date plan storage on top of the scheduler's validation.
pub struct DayPlanService<R>
where
    R: DayPlanRepository + ?Sized,
{
    repository: Arc<R>,
    scheduler: Scheduler,
}

impl<R> DayPlanService<R>
where
    R: DayPlanRepository + ?Sized,
{
    pub fn new(repository: Arc<R>, scheduler: Scheduler) -> Self {
        Self {
            repository,
            scheduler,
        }
    }

    pub fn get(&self, user_id: &str, date_key: &str) -> Result<DayPlan, InfraError> {
        let (user_id, date_key) = plan_key(user_id, date_key)?;
        let mut blocks = self
            .repository
            .load(user_id, &date_key)?
            .unwrap_or_default();
        blocks.sort_by_key(|block| block.start_min);
        Ok(DayPlan { date_key, blocks })
    }

    /// Validates the whole set, then replaces the stored plan in one write.
    pub fn save(
        &self,
        user_id: &str,
        date_key: &str,
        inputs: Vec<BlockInput>,
    ) -> Result<DayPlan, InfraError> {
        let (user_id, date_key) = plan_key(user_id, date_key)?;

        let validated = validate_block_inputs(&inputs)
            .and_then(|()| self.scheduler.normalize_and_validate(inputs));
        let blocks = match validated {
            Ok(blocks) => blocks,
            Err(error) => {
                warn!(
                    user_id,
                    date_key = date_key.as_str(),
                    code = %error.code(),
                    %error,
                    "rejected day plan"
                );
                return Err(error.into());
            }
        };

        self.repository.upsert(user_id, &date_key, &blocks)?;
        info!(
            user_id,
            date_key = date_key.as_str(),
            blocks = blocks.len(),
            "saved day plan"
        );
        Ok(DayPlan { date_key, blocks })
    }

    pub fn delete(&self, user_id: &str, date_key: &str) -> Result<(String, bool), InfraError> {
        let (user_id, date_key) = plan_key(user_id, date_key)?;
        let deleted = self.repository.delete(user_id, &date_key)?;
        info!(user_id, date_key = date_key.as_str(), deleted, "deleted day plan");
        Ok((date_key, deleted))
    }

    /// Proposes a block for `task` against the stored plan; nothing is written.
    pub fn propose_task(
        &self,
        user_id: &str,
        date_key: &str,
        task: &TaskRequest,
        busy: &[Interval],
    ) -> Result<(DayPlan, Placement), InfraError> {
        let plan = self.get(user_id, date_key)?;
        let placement = self.scheduler.place_task(&plan.blocks, busy, task)?;
        info!(
            user_id,
            date_key = plan.date_key.as_str(),
            start_min = placement.block.start_min,
            duration_min = placement.block.duration_min,
            after_last_block = placement.scheduled_after_last_block(),
            "proposed task placement"
        );
        Ok((plan, placement))
    }
}

fn plan_key<'a>(user_id: &'a str, date_key: &str) -> Result<(&'a str, String), PlanError> {
    let user_id = user_id.trim();
    if user_id.is_empty() {
        return Err(PlanError::validation("userId must not be empty"));
    }
    let date = parse_date_key(date_key)?;
    Ok((user_id, date.format("%Y-%m-%d").to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::ErrorCode;
    use crate::domain::models::{Block, BlockSource};
    use crate::infrastructure::day_plan_repository::InMemoryDayPlanRepository;

    const DAY: &str = "2026-02-16";

    fn service() -> DayPlanService<InMemoryDayPlanRepository> {
        DayPlanService::new(
            Arc::new(InMemoryDayPlanRepository::default()),
            Scheduler::default(),
        )
    }

    fn input(id: Option<&str>, title: &str, start_min: i64, duration_min: i64) -> BlockInput {
        BlockInput {
            id: id.map(ToOwned::to_owned),
            title: Some(title.to_string()),
            start_min: Some(start_min),
            duration_min: Some(duration_min),
            ..BlockInput::default()
        }
    }

    #[test]
    fn get_of_unknown_day_is_an_empty_plan() {
        let plan = service().get("user-1", DAY).expect("get");
        assert_eq!(plan, DayPlan::empty(DAY));
    }

    #[test]
    fn save_returns_exactly_what_get_reads_back() {
        let service = service();
        let saved = service
            .save(
                "user-1",
                DAY,
                vec![input(None, "Review", 600, 30), input(None, "Standup", 540, 15)],
            )
            .expect("save");

        assert_eq!(saved.blocks[0].title, "Standup");
        assert_eq!(service.get("user-1", DAY).expect("get"), saved);
    }

    #[test]
    fn saving_the_same_plan_twice_is_idempotent() {
        let service = service();
        let first = service
            .save("user-1", DAY, vec![input(Some("a"), "Focus", 540, 90)])
            .expect("first save");
        let second = service
            .save(
                "user-1",
                DAY,
                first.blocks.iter().cloned().map(BlockInput::from).collect(),
            )
            .expect("second save");

        assert_eq!(
            serde_json::to_string(&first.blocks).expect("json"),
            serde_json::to_string(&second.blocks).expect("json")
        );
    }

    #[test]
    fn rejected_save_leaves_stored_plan_untouched() {
        let service = service();
        let kept = service
            .save("user-1", DAY, vec![input(Some("a"), "Keep", 540, 30)])
            .expect("first save");

        let error = service
            .save(
                "user-1",
                DAY,
                vec![input(None, "A", 540, 60), input(None, "B", 570, 30)],
            )
            .expect_err("overlap");

        assert_eq!(error.code(), ErrorCode::Overlap);
        assert_eq!(service.get("user-1", DAY).expect("get"), kept);
    }

    #[test]
    fn invalid_date_and_blank_user_are_validation_errors() {
        let service = service();
        assert_eq!(
            service.get("user-1", "16/02/2026").map_err(|error| error.code()),
            Err(ErrorCode::Validation)
        );
        assert_eq!(
            service.save("  ", DAY, Vec::new()).map_err(|error| error.code()),
            Err(ErrorCode::Validation)
        );
    }

    #[test]
    fn delete_removes_whole_plan() {
        let service = service();
        service
            .save("user-1", DAY, vec![input(None, "Focus", 540, 30)])
            .expect("save");

        assert_eq!(
            service.delete("user-1", DAY).expect("delete"),
            (DAY.to_string(), true)
        );
        assert!(service.get("user-1", DAY).expect("get").blocks.is_empty());
    }

    #[test]
    fn propose_task_places_against_stored_blocks_without_saving() {
        let service = service();
        service
            .save("user-1", DAY, vec![input(Some("a"), "Morning", 540, 60)])
            .expect("save");

        let (plan, placement) = service
            .propose_task(
                "user-1",
                DAY,
                &TaskRequest {
                    title: "Write report".to_string(),
                    duration_min: Some(30),
                    task_id: None,
                },
                &[Interval::new(630, 660)],
            )
            .expect("proposal");

        assert_eq!(plan.blocks.len(), 1);
        assert_eq!(placement.block.start_min, 660);
        assert_eq!(placement.block.source, BlockSource::Task);
        assert_eq!(service.get("user-1", DAY).expect("get").blocks.len(), 1);

        let mut merged: Vec<Block> = plan.blocks.clone();
        merged.push(placement.block);
        let saved = service
            .save(
                "user-1",
                DAY,
                merged.into_iter().map(BlockInput::from).collect(),
            )
            .expect("accepting the proposal keeps the plan valid");
        assert_eq!(saved.blocks.len(), 2);
    }
}
