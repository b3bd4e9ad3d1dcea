pub mod action;
pub mod bundle;
pub mod condition;
pub mod error;
pub mod events;
pub mod id;
pub mod receiver;
pub mod topic;

pub use action::{ActionLog, ActionLogDetail, ActionLogScope};
pub use bundle::{Bundle, BundleEntry, Resource};
pub use condition::{ConditionCoding, ConditionSummary};
pub use error::{CoreError, Result};
pub use events::{EventName, PipelineEvent};
pub use id::{LineageAction, LineageEdge, ReportId};
pub use receiver::{CustomerStatus, FilterMode, Receiver, ReceiverFilters};
pub use topic::Topic;
