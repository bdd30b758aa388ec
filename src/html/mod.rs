//! 基于 html5ever / markup5ever_rcdom 的 DOM 工具集
//!
//! 所有对文档树的读取和改写都经由本模块，其余模块不直接操作节点内部结构。

pub mod dom;
pub mod edit;
pub mod query;
pub mod serialize;

pub use dom::{
    get_child_node_by_name, get_node_attr, get_node_name, get_parent_node, html_to_dom,
    is_element, set_node_attr, text_content, NodeKey,
};
pub use edit::{clone_subtree, replace_children, replace_with_text, unwrap_element};
pub use query::{any_element, collect_elements, for_each_element};
pub use serialize::inner_markup;
