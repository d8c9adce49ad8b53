//! Run 编排：远端 Run 的提交、轮询、工具回合与结束判定

pub mod driver;

pub use driver::{RetryPolicy, RunDriver, RunEvent, RunHandle, RunOutcome, RunPolicy, RunSummary};
