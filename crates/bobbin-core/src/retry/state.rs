//! RetryState - リトライセッションの状態

use serde::{Deserialize, Serialize};

/// RetryState はリトライセッションの現在位置を表現
///
/// # 状態遷移
/// - Pending -> AttemptInFlight: `attempt()`
/// - AttemptInFlight -> Waiting: 失敗してリトライを予約
/// - Waiting -> AttemptInFlight: バックオフのタイマーが発火
/// - AttemptInFlight -> Terminal: 成功、試行回数切れ、締め切り超過
/// - 任意 -> Terminal: `stop()`
/// - 任意 -> Pending: `reset()`
///
/// Terminal からは `attempt()` か `reset()` でしか抜けない。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RetryState {
    /// まだ一度も試行していない
    Pending,

    /// 操作を実行中
    AttemptInFlight,

    /// バックオフのタイマーを予約済み
    Waiting,

    /// 成功、断念、または停止済み
    Terminal,
}

impl RetryState {
    /// 終端状態か（`reset` なしでは遷移しない）
    pub fn is_terminal(self) -> bool {
        matches!(self, RetryState::Terminal)
    }

    /// リトライを予約中か
    pub fn is_waiting(self) -> bool {
        matches!(self, RetryState::Waiting)
    }
}
