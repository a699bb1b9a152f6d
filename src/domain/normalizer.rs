use crate::domain::error::PlanError;
use crate::domain::models::{
    Block, BlockInput, BlockSource, DEFAULT_DURATION_MIN, MAX_DURATION_MIN, MAX_START_MIN,
    MIN_DURATION_MIN, MINUTES_PER_DAY, coerce_task_id, truncate_title,
};
use std::collections::HashSet;
use uuid::Uuid;

/// Strict shape check for blocks arriving over the wire, run before normalization.
pub fn validate_block_inputs(inputs: &[BlockInput]) -> Result<(), PlanError> {
    let mut seen_ids = HashSet::new();

    for (index, input) in inputs.iter().enumerate() {
        let label = block_label(input, index);

        let title = input.title.as_deref().map(str::trim).unwrap_or_default();
        if title.is_empty() {
            return Err(PlanError::validation(format!(
                "Block title cannot be empty ({label})"
            )));
        }

        let start_min = input
            .start_min
            .ok_or_else(|| PlanError::validation(format!("startMin is required ({label})")))?;
        if !(0..=i64::from(MAX_START_MIN)).contains(&start_min) {
            return Err(PlanError::validation(format!(
                "startMin must be within 0..={MAX_START_MIN} ({label})"
            )));
        }

        let duration_min = input
            .duration_min
            .ok_or_else(|| PlanError::validation(format!("durationMin is required ({label})")))?;
        if !(i64::from(MIN_DURATION_MIN)..=i64::from(MAX_DURATION_MIN)).contains(&duration_min) {
            return Err(PlanError::validation(format!(
                "durationMin must be within {MIN_DURATION_MIN}..={MAX_DURATION_MIN} ({label})"
            )));
        }

        if start_min + duration_min > i64::from(MINUTES_PER_DAY) {
            return Err(PlanError::validation(format!(
                "Block \"{title}\" ends after midnight"
            )));
        }

        if let Some(source) = input.source.as_deref() {
            if BlockSource::parse(source).is_none() {
                return Err(PlanError::validation(format!(
                    "source must be manual or task, got '{source}' ({label})"
                )));
            }
        }

        if let Some(id) = input.id.as_deref().map(str::trim).filter(|id| !id.is_empty()) {
            if !seen_ids.insert(id) {
                return Err(PlanError::validation(format!("Duplicate block id '{id}'")));
            }
        }
    }

    Ok(())
}

/// Canonical form: ids assigned, titles trimmed, numbers clamped, sorted by start.
pub fn normalize_blocks(inputs: Vec<BlockInput>) -> Vec<Block> {
    let mut blocks: Vec<Block> = inputs.into_iter().map(normalize_block).collect();
    blocks.sort_by_key(|block| block.start_min);
    blocks
}

fn normalize_block(input: BlockInput) -> Block {
    let id = input
        .id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    Block {
        id,
        title: truncate_title(input.title.as_deref().unwrap_or_default()),
        start_min: clamp_minutes(input.start_min.unwrap_or(0), 0, MAX_START_MIN),
        duration_min: clamp_minutes(
            input
                .duration_min
                .unwrap_or(i64::from(DEFAULT_DURATION_MIN)),
            MIN_DURATION_MIN,
            MAX_DURATION_MIN,
        ),
        source: input
            .source
            .as_deref()
            .and_then(BlockSource::parse)
            .unwrap_or_default(),
        task_id: coerce_task_id(input.task_id.as_deref()),
        locked: input.locked.unwrap_or(false),
    }
}

pub(crate) fn clamp_minutes(value: i64, min: u32, max: u32) -> u32 {
    let clamped = value.clamp(i64::from(min), i64::from(max));
    u32::try_from(clamped).unwrap_or(min)
}

/// Whole-set consistency check over blocks already sorted by start.
pub fn validate_blocks(blocks: &[Block]) -> Result<(), PlanError> {
    if let Some(block) = blocks.iter().find(|block| block.title.trim().is_empty()) {
        return Err(PlanError::validation(format!(
            "Block title cannot be empty (block {})",
            block.id
        )));
    }

    if let Some(block) = blocks
        .iter()
        .find(|block| block.end_min() > MINUTES_PER_DAY)
    {
        return Err(PlanError::validation(format!(
            "Block \"{}\" ends after midnight",
            block.title
        )));
    }

    let mut seen_ids = HashSet::with_capacity(blocks.len());
    if let Some(block) = blocks.iter().find(|block| !seen_ids.insert(block.id.as_str())) {
        return Err(PlanError::validation(format!(
            "Duplicate block id '{}'",
            block.id
        )));
    }

    for pair in blocks.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        if next.start_min < prev.end_min() {
            return Err(PlanError::Overlap {
                first: prev.title.clone(),
                second: next.title.clone(),
            });
        }
    }

    Ok(())
}

pub fn normalize_and_validate(inputs: Vec<BlockInput>) -> Result<Vec<Block>, PlanError> {
    let blocks = normalize_blocks(inputs);
    validate_blocks(&blocks)?;
    Ok(blocks)
}

fn block_label(input: &BlockInput, index: usize) -> String {
    match input.id.as_deref().map(str::trim).filter(|id| !id.is_empty()) {
        Some(id) => format!("block {id}"),
        None => format!("block #{}", index + 1),
    }
}
