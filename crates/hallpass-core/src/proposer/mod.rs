//! Seating proposals from an external text generator.
//!
//! The generator is a black box: it is given a prompt describing the
//! schedule and returns free text that should contain a JSON object with
//! `reasoning` and `plan`. Nothing about that text is trusted. The plan is
//! handed back together with the validator's verdict and is only applied
//! through [`crate::plan::execute_plan`].

pub mod command;
mod prompt;

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, warn};

use hallpass_db::queries::{allocations, halls};

use crate::error::AllocationError;
use crate::lookup;
use crate::plan::{self, PlanVerdict};

pub use command::CommandGenerator;
pub use prompt::{ProposalInput, build_prompt};

/// Default upper bound on one generator call.
pub const DEFAULT_PROPOSAL_TIMEOUT: Duration = Duration::from_secs(120);

/// Something that turns a prompt into text.
///
/// Object-safe so the server can hold an `Arc<dyn TextGenerator>`.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Short name for logs (e.g. the command being run).
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn TextGenerator) {}
};

/// Ways the generator's reply can fail to be a proposal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProposalError {
    #[error("response contains no JSON object")]
    NoJsonObject,

    #[error("response JSON is invalid: {0}")]
    InvalidJson(String),

    #[error("response has no string \"reasoning\" field")]
    MissingReasoning,

    #[error("response has no array \"plan\" field")]
    MissingPlan,
}

/// A parsed but not yet validated proposal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Proposal {
    pub reasoning: String,
    pub plan: Vec<Value>,
}

/// Extract a proposal from free text.
///
/// Takes the span from the first `{` to the last `}`, so replies wrapped in
/// markdown fences or prose still parse.
pub fn parse_proposal(text: &str) -> Result<Proposal, ProposalError> {
    let start = text.find('{').ok_or(ProposalError::NoJsonObject)?;
    let end = text.rfind('}').ok_or(ProposalError::NoJsonObject)?;
    if end < start {
        return Err(ProposalError::NoJsonObject);
    }

    let value: Value = serde_json::from_str(&text[start..=end])
        .map_err(|err| ProposalError::InvalidJson(err.to_string()))?;

    let reasoning = match value.get("reasoning") {
        Some(Value::String(s)) => s.clone(),
        _ => return Err(ProposalError::MissingReasoning),
    };
    let plan = match value.get("plan") {
        Some(Value::Array(items)) => items.clone(),
        _ => return Err(ProposalError::MissingPlan),
    };

    Ok(Proposal { reasoning, plan })
}

/// A proposal with the validator's opinion of it, for review.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProposalReview {
    pub schedule_id: i32,
    pub reasoning: String,
    pub plan: Vec<Value>,
    pub validation: PlanVerdict,
}

/// Ask the generator for a plan covering every unseated student.
///
/// Fails with [`AllocationError::ProposalTimeout`] if the generator does not
/// answer within `timeout`. Never writes to the store.
pub async fn propose_plan(
    pool: &PgPool,
    generator: &dyn TextGenerator,
    schedule_id: i32,
    instructions: &str,
    timeout: Duration,
) -> Result<ProposalReview, AllocationError> {
    if instructions.trim().is_empty() {
        return Err(AllocationError::InvalidInput(
            "instructions are required".to_owned(),
        ));
    }
    lookup::require_schedule(pool, schedule_id).await?;

    let (unallocated, all_halls, occupied) = tokio::try_join!(
        allocations::list_unallocated(pool, schedule_id),
        halls::list_halls(pool),
        allocations::list_occupied_for_schedule(pool, schedule_id),
    )?;

    if unallocated.is_empty() {
        return Err(AllocationError::NotFound {
            entity: "unallocated students",
            id: format!("schedule {schedule_id}"),
        });
    }

    let prompt = build_prompt(&ProposalInput {
        unallocated: &unallocated,
        halls: &all_halls,
        occupied: &occupied,
        instructions,
    });

    info!(
        schedule_id,
        generator = generator.name(),
        students = unallocated.len(),
        halls = all_halls.len(),
        occupied = occupied.len(),
        "requesting seating proposal"
    );

    let text = match tokio::time::timeout(timeout, generator.generate(&prompt)).await {
        Ok(Ok(text)) => text,
        Ok(Err(err)) => {
            warn!(schedule_id, error = %err, "proposal generator failed");
            return Err(AllocationError::ProposalFailed(format!("{err:#}")));
        }
        Err(_) => {
            warn!(schedule_id, timeout_secs = timeout.as_secs(), "proposal generator timed out");
            return Err(AllocationError::ProposalTimeout(timeout));
        }
    };

    let proposal = parse_proposal(&text).inspect_err(|err| {
        warn!(schedule_id, error = %err, response_len = text.len(), "unparseable proposal");
    })?;

    // Checked against fresh state: generation can take a while.
    let validated = plan::validate_plan(pool, schedule_id, &proposal.plan).await;
    if let Err(AllocationError::Internal(err)) = validated {
        return Err(AllocationError::Internal(err));
    }
    let validation = PlanVerdict::from_result(&validated);

    info!(
        schedule_id,
        items = proposal.plan.len(),
        valid = validation.valid,
        "seating proposal received"
    );

    Ok(ProposalReview {
        schedule_id,
        reasoning: proposal.reasoning,
        plan: proposal.plan,
        validation,
    })
}
