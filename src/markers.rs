//! 翻译引擎注入标记的固定词表
//!
//! 侦测器与还原器共用同一套词表，保证"认得出"的东西一定"还原得掉"。
//! 词表覆盖 Chrome 整页翻译与 Google 翻译挂件的已知标记，
//! 不试图识别任意第三方翻译层。

use markup5ever_rcdom::Handle;

use crate::html::{get_node_attr, get_node_name};

/// Chrome 翻译在译文外包裹的标签
pub const WRAPPER_TAG: &str = "font";

/// 包裹标签上携带的 class 标记子串（匹配 translate / translated / translation）
pub const WRAPPER_CLASS_SUBSTRING: &str = "translat";

/// 各翻译服务注入的 class 子串
pub const VENDOR_CLASS_SUBSTRINGS: [&str; 4] =
    ["translated-ltr", "translated-rtl", "translated", "goog-te-"];

/// 翻译完成后挂在 body 上的方向类
pub const DIRECTIONAL_BODY_CLASSES: [&str; 3] = ["translated-ltr", "translated-rtl", "translated"];

/// Google 翻译自身控件使用的 class 子串
pub const VENDOR_WIDGET_SUBSTRING: &str = "goog-te-";

/// 标记"不要翻译"区域的 class，翻译器常把它留在页面里
pub const SKIP_MARKER_CLASS: &str = "skiptranslate";

/// 显式翻译标记属性及其取值
pub const TRANSLATED_ATTR: &str = "translate";
pub const TRANSLATED_ATTR_VALUE: &str = "yes";

/// 语言属性
pub const LANG_ATTR: &str = "lang";

/// class 属性
pub const CLASS_ATTR: &str = "class";

/// 变更监听关注的属性集合
pub const WATCHED_ATTRIBUTES: [&str; 3] = [LANG_ATTR, TRANSLATED_ATTR, CLASS_ATTR];

/// 全页清洗时需要从 class 里剔除的子串
pub const CLASS_SCRUB_SUBSTRINGS: [&str; 2] = [WRAPPER_CLASS_SUBSTRING, VENDOR_WIDGET_SUBSTRING];

/// 元素 class 是否包含给定子串
pub fn class_contains(node: &Handle, pattern: &str) -> bool {
    get_node_attr(node, CLASS_ATTR)
        .map(|class| class.contains(pattern))
        .unwrap_or(false)
}

/// 元素 class 是否含有给定的完整词条
pub fn has_class_token(node: &Handle, token: &str) -> bool {
    get_node_attr(node, CLASS_ATTR)
        .map(|class| class.split_whitespace().any(|t| t == token))
        .unwrap_or(false)
}

/// 是否为翻译器注入的包裹元素（`<font class*="translat">`）
pub fn is_wrapper_element(node: &Handle) -> bool {
    get_node_name(node) == Some(WRAPPER_TAG) && class_contains(node, WRAPPER_CLASS_SUBSTRING)
}

/// 新插入的节点是否像翻译产物
///
/// 包裹标签本身，或带有标记/供应商 class 子串的元素。
pub fn is_translation_artifact(node: &Handle) -> bool {
    let Some(name) = get_node_name(node) else {
        return false;
    };
    if name == WRAPPER_TAG {
        return true;
    }
    class_contains(node, WRAPPER_CLASS_SUBSTRING) || class_contains(node, VENDOR_WIDGET_SUBSTRING)
}

/// 文档的顶层结构容器（绝不移除，只还原属性）
pub fn is_root_container(node: &Handle) -> bool {
    matches!(get_node_name(node), Some("html") | Some("head") | Some("body"))
}
