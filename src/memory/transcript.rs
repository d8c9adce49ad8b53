//! 本地对话记录（Transcript）
//!
//! 按产生顺序保存 user / assistant 消息，只追加不修改；合并远端记录时按值（角色、内容、注解）去重。
//! 去重按多重集计数：远端列表中某个值的第 k 次出现，仅当本地已有至少 k 条相同消息时才视为已存在，
//! 因此同一内容真实出现两次时两条都会保留，且重复合并是幂等的。

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// 消息角色（远端 Thread 仅包含这两种）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// 注解类型：引用文件片段或生成的文件路径
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationKind {
    FileCitation,
    FilePath,
}

/// 引用标记：类型 + 展示文本
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Annotation {
    pub kind: AnnotationKind,
    pub text: String,
}

/// 单条消息，创建后不可变
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            annotations: Vec::new(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            annotations: Vec::new(),
        }
    }

    pub fn with_annotations(mut self, annotations: Vec<Annotation>) -> Self {
        self.annotations = annotations;
        self
    }
}

/// 只追加的对话记录，供渲染层读取
#[derive(Clone, Debug, Default)]
pub struct TranscriptStore {
    turns: Vec<Turn>,
}

impl TranscriptStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 无条件追加（用于乐观写入的用户消息）
    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// 合并远端记录（旧到新），返回本次新追加的消息
    pub fn merge(&mut self, remote_turns: &[Turn]) -> Vec<Turn> {
        let mut local_counts: HashMap<&Turn, usize> = HashMap::new();
        for turn in &self.turns {
            *local_counts.entry(turn).or_default() += 1;
        }

        let mut seen: HashMap<&Turn, usize> = HashMap::new();
        let mut appended = Vec::new();
        for turn in remote_turns {
            let occurrence = seen.entry(turn).or_default();
            *occurrence += 1;
            let held = local_counts.get(turn).copied().unwrap_or(0);
            if *occurrence > held {
                appended.push(turn.clone());
            }
        }

        self.turns.extend(appended.iter().cloned());
        appended
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn into_turns(self) -> Vec<Turn> {
        self.turns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cited(content: &str, text: &str) -> Turn {
        Turn::assistant(content).with_annotations(vec![Annotation {
            kind: AnnotationKind::FileCitation,
            text: text.to_string(),
        }])
    }

    #[test]
    fn test_merge_skips_optimistic_user_turn() {
        let mut store = TranscriptStore::new();
        store.push(Turn::user("What is LangGraph?"));

        let remote = vec![
            Turn::user("What is LangGraph?"),
            Turn::assistant("A library for stateful agents."),
        ];
        let appended = store.merge(&remote);

        assert_eq!(appended, vec![Turn::assistant("A library for stateful agents.")]);
        assert_eq!(store.turns(), remote.as_slice());
    }

    #[test]
    fn test_merge_is_idempotent() {
        let mut store = TranscriptStore::new();
        let remote = vec![Turn::user("hi"), Turn::assistant("hello")];
        store.merge(&remote);
        let before = store.turns().to_vec();

        let appended = store.merge(&remote);
        assert!(appended.is_empty());
        assert_eq!(store.turns(), before.as_slice());
    }

    #[test]
    fn test_merge_preserves_legitimate_repeats() {
        let mut store = TranscriptStore::new();
        store.merge(&[Turn::user("ping"), Turn::assistant("pong")]);

        store.push(Turn::user("ping"));
        let remote = vec![
            Turn::user("ping"),
            Turn::assistant("pong"),
            Turn::user("ping"),
            Turn::assistant("pong"),
        ];
        let appended = store.merge(&remote);

        assert_eq!(appended, vec![Turn::assistant("pong")]);
        assert_eq!(store.turns(), remote.as_slice());
    }

    #[test]
    fn test_annotations_participate_in_equality() {
        let mut store = TranscriptStore::new();
        store.merge(&[cited("See docs", "【4:0†source】")]);
        let appended = store.merge(&[cited("See docs", "【4:1†source】")]);
        assert_eq!(appended.len(), 1);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_merge_keeps_supplied_order() {
        let mut store = TranscriptStore::new();
        let remote: Vec<Turn> = (0..5).map(|i| Turn::assistant(format!("part {i}"))).collect();
        let appended = store.merge(&remote);
        assert_eq!(appended, remote);
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_value(Turn::user("x")).unwrap();
        assert_eq!(json["role"], "user");
    }
}
