//! 文档变更记录
//!
//! 本库单线程协作式运行，没有浏览器的 MutationObserver；
//! 宿主在改写文档后把变更打包成 [`MutationRecord`] 批量投递给侦测器，
//! 一个批次最多触发一次启发式评估。

use markup5ever_rcdom::Handle;

use crate::markers;

/// 一次文档变更
#[derive(Clone)]
pub enum MutationRecord {
    /// 某元素的属性发生变化
    Attribute { target: Handle, name: String },
    /// 新节点被插入
    ChildList { target: Handle, added: Vec<Handle> },
}

impl MutationRecord {
    /// 该变更是否值得触发一次翻译状态评估
    ///
    /// 属性变更只关心 lang / translate / class；
    /// 节点插入只关心本身就像翻译产物的元素。
    pub fn is_translation_related(&self) -> bool {
        match self {
            MutationRecord::Attribute { name, .. } => is_translation_attribute(name),
            MutationRecord::ChildList { added, .. } => {
                added.iter().any(markers::is_translation_artifact)
            }
        }
    }
}

/// 是否为翻译相关属性
pub fn is_translation_attribute(attr_name: &str) -> bool {
    markers::WATCHED_ATTRIBUTES.contains(&attr_name)
}
