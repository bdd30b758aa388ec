//! DOM 基础操作：解析、属性读写、节点身份

use std::rc::Rc;

use encoding_rs::Encoding;
use html5ever::interface::{Attribute, QualName};
use html5ever::parse_document;
use html5ever::tendril::{format_tendril, TendrilSink};
use html5ever::{namespace_url, ns, LocalName};
use markup5ever_rcdom::{Handle, NodeData, RcDom};

/// 将 HTML 字节转换为 DOM
pub fn html_to_dom(data: &[u8], document_encoding: String) -> RcDom {
    let s: String;

    if let Some(encoding) = Encoding::for_label(document_encoding.as_bytes()) {
        let (string, _, _) = encoding.decode(data);
        s = string.to_string();
    } else {
        s = String::from_utf8_lossy(data).to_string();
    }

    parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut s.as_bytes())
        .unwrap()
}

/// 节点身份键
///
/// 以 `Rc` 指针地址标识元素，内容被改写后身份不变，
/// 因此快照可以在翻译改写后继续作为对照基准。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeKey(usize);

impl NodeKey {
    pub fn of(node: &Handle) -> Self {
        NodeKey(Rc::as_ptr(node) as usize)
    }
}

/// 判断节点是否为元素节点
pub fn is_element(node: &Handle) -> bool {
    matches!(node.data, NodeData::Element { .. })
}

/// 获取元素标签名
pub fn get_node_name(node: &Handle) -> Option<&'_ str> {
    match &node.data {
        NodeData::Element { name, .. } => Some(name.local.as_ref()),
        _ => None,
    }
}

/// 获取节点属性值
pub fn get_node_attr(node: &Handle, attr_name: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|attr| &*attr.name.local == attr_name)
            .map(|attr| attr.value.to_string()),
        _ => None,
    }
}

/// 设置节点属性；`None` 表示彻底移除该属性
pub fn set_node_attr(node: &Handle, attr_name: &str, attr_value: Option<String>) {
    if let NodeData::Element { attrs, .. } = &node.data {
        let attrs_mut = &mut attrs.borrow_mut();

        if let Some(position) = attrs_mut
            .iter()
            .position(|attr| &*attr.name.local == attr_name)
        {
            match attr_value {
                Some(value) => {
                    attrs_mut[position].value.clear();
                    attrs_mut[position].value.push_slice(value.as_str());
                }
                None => {
                    attrs_mut.remove(position);
                }
            }
        } else if let Some(value) = attr_value {
            // Add new attribute (the target node didn't have it originally)
            attrs_mut.push(Attribute {
                name: QualName::new(None, ns!(), LocalName::from(attr_name)),
                value: format_tendril!("{}", value),
            });
        }
    }
}

/// 根据名称获取直接子元素
pub fn get_child_node_by_name(parent: &Handle, node_name: &str) -> Option<Handle> {
    let children = parent.children.borrow();
    children
        .iter()
        .find(|child| match child.data {
            NodeData::Element { ref name, .. } => &*name.local == node_name,
            _ => false,
        })
        .cloned()
}

/// 获取父节点；已脱离文档树的节点返回 `None`
pub fn get_parent_node(child: &Handle) -> Option<Handle> {
    let weak = child.parent.take();
    let parent = weak.as_ref().and_then(|w| w.upgrade());
    child.parent.set(weak);
    parent
}

/// 按文档顺序拼接子树内所有文本节点的内容
pub fn text_content(node: &Handle) -> String {
    let mut out = String::new();
    let mut stack: Vec<Handle> = vec![node.clone()];

    while let Some(current) = stack.pop() {
        if let NodeData::Text { ref contents } = current.data {
            out.push_str(&contents.borrow());
        }
        let children = current.children.borrow();
        for child in children.iter().rev() {
            stack.push(child.clone());
        }
    }

    out
}
