use serde::Serialize;

use crate::ids::TaskId;

/// QueueEvent は [`TaskQueue`](super::TaskQueue) のライフサイクル通知
///
/// キューの管理用ロックを保持したまま発行するので、購読側は状態が変わった
/// 順番どおりに受け取ります。`Settled` は投入順ではなく完了順です。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum QueueEvent {
    /// タスクを受け付けた（取り出しを試みる前に発行）
    Submitted { task_id: TaskId, priority: i32 },

    /// タスクを取り出して実行を開始した
    Active { task_id: TaskId },

    /// 実行中のタスクが終わった。成功時の `error` は `None`
    Settled {
        task_id: TaskId,
        error: Option<String>,
    },

    /// 実行枠が空いた。続けて次の取り出しを試みる
    Next,

    /// 取り出し待ちのエントリがない
    Drained,

    /// 待機中も実行中もない
    Idle,
}
