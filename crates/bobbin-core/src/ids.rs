//! Task identifiers.
//!
//! ULID ベースの ID。生成時刻が先頭にあるので、生成順でほぼソートできる。
//! 表示形式は `task-<ULID>`。

use std::fmt;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// TaskId は投入されたタスクごとに割り当てられる ID
///
/// ライフサイクルイベントと [`TaskHandle`](crate::TaskHandle) の両方に現れるので、
/// `Submitted` / `Active` / `Settled` を同じタスクとして突き合わせられます。
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Ulid);

impl TaskId {
    pub fn generate() -> Self {
        Self(Ulid::new())
    }

    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl From<Ulid> for TaskId {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique() {
        let a = TaskId::generate();
        let b = TaskId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn display_has_prefix() {
        let ulid = Ulid::from_parts(1_700_000_000_000, 42);
        let id = TaskId::from(ulid);
        assert_eq!(id.to_string(), format!("task-{ulid}"));
        assert_eq!(id.as_ulid(), ulid);
    }

    #[test]
    fn serializes_as_plain_ulid_string() {
        let ulid = Ulid::from_parts(1_700_000_000_000, 42);
        let json = serde_json::to_string(&TaskId::from(ulid)).unwrap();
        assert_eq!(json, format!("\"{ulid}\""));
    }
}
