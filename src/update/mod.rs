pub mod checker;
pub mod dto;
pub(crate) mod handler;

pub use checker::UpdateChecker;
pub use dto::{
    BatchCheckItem, BatchCheckRequest, BatchCheckResponse, BatchResultItem, CheckUpdateRequest,
    UpdateInfo,
};
