//! Function calling
//!
//! - Function descriptors with JSON schemas (hand-written or derived)
//! - Registry validating calls against input schemas
//! - Bounded parallel executor with per-call timeouts
//! - Dispatch state machine and the model → tools → model loop
//! - Built-in `policy_status` function

pub mod dispatcher;
pub mod executor;
pub mod function;
pub mod policy;
pub mod registry;
pub mod state;
pub mod types;

pub use dispatcher::{DispatchOutcome, ToolDispatcher};
pub use executor::ToolExecutor;
pub use function::{FunctionDescriptor, FunctionHandler};
pub use policy::{policy_status_function, PolicyDataset, PolicyQuery, PolicyStatus, POLICY_STATUS_FUNCTION};
pub use registry::FunctionRegistry;
pub use state::{DispatchEvent, DispatchState};
pub use types::{DispatchConfig, FunctionSelection, ToolErrorKind, ToolInvocation, ToolResult};
