//! # Anti-Translate Library
//!
//! 侦测并还原被机器翻译（浏览器整页翻译）改写的 HTML 文档内容。
//!
//! ## 模块组织
//!
//! - `core` - 引擎入口、配置选项与错误类型
//! - `backup` - 原始内容快照存储
//! - `detector` - 翻译状态侦测器（启发式 + 状态机）
//! - `reverter` - 分层还原策略
//! - `markers` - 翻译引擎注入标记的固定词表
//! - `mutation` - 文档变更记录与过滤
//! - `html` - 基于 html5ever 的 DOM 工具集
//! - `env` - 环境变量配置覆盖

pub mod backup;
pub mod core;
pub mod detector;
pub mod env;
pub mod html;
pub mod markers;
pub mod mutation;
pub mod reverter;

// Re-export commonly used items for convenience
pub use crate::backup::{ContentBackup, ElementSnapshot};
pub use crate::core::{
    AntiTranslate, AntiTranslateError, AntiTranslateOptions, AntiTranslateResult,
};
pub use crate::detector::{
    DetectionReport, DetectorEvent, DetectorOptions, DetectorStats, ListenerId,
    TranslationDetector,
};
pub use crate::mutation::MutationRecord;
pub use crate::reverter::TranslationReverter;
