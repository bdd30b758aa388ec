//! 序列化元素内容

use html5ever::serialize::{serialize, SerializeOpts, TraversalScope};
use markup5ever_rcdom::{Handle, SerializableHandle};

use crate::core::{AntiTranslateError, AntiTranslateResult};

/// 序列化元素的完整内容子树（不含元素自身的标签）
///
/// 快照比对和还原判定都以这个字符串形式为准。
pub fn inner_markup(node: &Handle) -> AntiTranslateResult<String> {
    let mut buf: Vec<u8> = Vec::new();
    let serializable: SerializableHandle = node.clone().into();

    serialize(
        &mut buf,
        &serializable,
        SerializeOpts {
            traversal_scope: TraversalScope::ChildrenOnly(None),
            ..Default::default()
        },
    )
    .map_err(|err| AntiTranslateError::Serialize(err.to_string()))?;

    Ok(String::from_utf8_lossy(&buf).into_owned())
}
