//! Request intake, generation dispatch and task reconciliation

pub mod assistant;
pub mod dispatcher;
pub mod intake;
pub mod reconciler;
pub mod suno_client;

pub use assistant::PromptAssistant;
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use intake::{Intake, IntakeError, Receipt, SongRequest};
pub use reconciler::{PollSummary, ReconcileOutcome, Reconciler, StatusReport};
pub use suno_client::{GenerationApi, GenerationError, SunoClient, TaskStatus};
