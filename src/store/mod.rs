pub mod dynamo;

pub use dynamo::ApprovalStore;
