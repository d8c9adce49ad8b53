//! 记忆层：本地对话记录

pub mod transcript;

pub use transcript::{Annotation, AnnotationKind, Role, TranscriptStore, Turn};
