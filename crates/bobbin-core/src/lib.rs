//! bobbin-core
//!
//! 非同期処理を実行するための部品集。
//!
//! # モジュール構成
//! - **queue**: 同時実行数の上限つき優先度キュー（一時停止、ライフサイクルイベント、条件待ち）
//! - **retry**: リトライ制御（バックオフ計算、エラー履歴、締め切り）
//! - **abortable** / **timeout**: 単一 future のキャンセルとタイムアウト
//! - **ids**: タスク ID
//! - **observability**: キューのカウンタのスナップショット
//! - **error**: 設定エラーとタスクエラー

pub mod abortable;
pub mod error;
pub mod ids;
pub mod observability;
pub mod queue;
pub mod retry;
pub mod timeout;

mod sync;

pub use abortable::{CancelSession, Cancelled, abortable, cancellable};
pub use error::{ConfigError, TaskError};
pub use ids::TaskId;
pub use observability::QueueStats;
pub use queue::{
    BatchMode, Concurrency, PriorityList, QueueConfig, QueueEvent, SubmitOptions, TaskHandle,
    TaskQueue,
};
pub use retry::{RetryError, RetryFailure, RetryOperation, RetryPolicy, RetryState};
pub use timeout::{TimedOut, with_timeout, with_timeout_or};

pub use tokio_util::sync::CancellationToken;
