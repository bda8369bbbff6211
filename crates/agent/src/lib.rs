//! The planbot turn pipeline.
//!
//! Each inbound message goes through:
//!
//! 1. **Intercept** explicit commands (`Translate: ...`, `Show languages`)
//! 2. **Build** the turn's capability registry
//! 3. **Plan** with the configured strategy (direct or stepwise)
//! 4. **Execute** the plan, degrading failed steps
//! 5. **Reply** through the channel
//!
//! [`Bot`] drives the pipeline for every conversation on a channel.

pub mod bot;
pub mod executor;
pub mod history;
pub mod interceptor;
pub mod planner;
pub mod response;
pub mod translation;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use bot::Bot;
pub use executor::{ExecutionReport, execute};
pub use interceptor::{CommandInterceptor, Intercept};
pub use planner::{DirectPlanner, Plan, PlanStep, Planner, StepwisePlanner, TurnContext};
pub use translation::LanguageTable;
