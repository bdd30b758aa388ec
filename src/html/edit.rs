//! 结构性改写：子树克隆、解包、文本替换
//!
//! 还原器的全部树改写操作都集中在这里。

use std::cell::RefCell;
use std::rc::Rc;

use html5ever::tendril::format_tendril;
use markup5ever_rcdom::{Handle, Node, NodeData};

use super::dom::{get_parent_node, text_content};

/// 深拷贝一个节点及其整个子树
///
/// 拷贝出来的子树与原树不共享任何可变状态，作为快照保存后
/// 不会被后续页面改写污染。
pub fn clone_subtree(node: &Handle) -> Handle {
    let data = match &node.data {
        NodeData::Document => NodeData::Document,
        NodeData::Doctype {
            name,
            public_id,
            system_id,
        } => NodeData::Doctype {
            name: name.clone(),
            public_id: public_id.clone(),
            system_id: system_id.clone(),
        },
        NodeData::Text { contents } => NodeData::Text {
            contents: RefCell::new(contents.borrow().clone()),
        },
        NodeData::Comment { contents } => NodeData::Comment {
            contents: contents.clone(),
        },
        NodeData::Element {
            name,
            attrs,
            template_contents,
            mathml_annotation_xml_integration_point,
        } => NodeData::Element {
            name: name.clone(),
            attrs: RefCell::new(attrs.borrow().clone()),
            template_contents: RefCell::new(
                template_contents.borrow().as_ref().map(clone_subtree),
            ),
            mathml_annotation_xml_integration_point: *mathml_annotation_xml_integration_point,
        },
        NodeData::ProcessingInstruction { target, contents } => NodeData::ProcessingInstruction {
            target: target.clone(),
            contents: contents.clone(),
        },
    };

    let clone = Node::new(data);
    let children: Vec<Handle> = node.children.borrow().iter().map(clone_subtree).collect();
    for child in &children {
        child.parent.set(Some(Rc::downgrade(&clone)));
    }
    *clone.children.borrow_mut() = children;
    clone
}

/// 用模板子树的深拷贝整体替换元素的子节点
///
/// 每次都重新克隆，模板（快照中保存的原始内容）保持原样，
/// 可以反复用于还原。
pub fn replace_children(element: &Handle, template: &[Handle]) {
    let fresh: Vec<Handle> = template.iter().map(clone_subtree).collect();
    for child in &fresh {
        child.parent.set(Some(Rc::downgrade(element)));
    }
    *element.children.borrow_mut() = fresh;
}

/// 解包元素：子节点提升到父节点原位置，元素本身移除
///
/// 已脱离文档树或父节点中找不到该元素时返回 `false`。
pub fn unwrap_element(element: &Handle) -> bool {
    let Some(parent) = get_parent_node(element) else {
        return false;
    };
    let position = parent
        .children
        .borrow()
        .iter()
        .position(|child| Rc::ptr_eq(child, element));
    let Some(position) = position else {
        return false;
    };

    let children: Vec<Handle> = element.children.borrow_mut().drain(..).collect();
    for child in &children {
        child.parent.set(Some(Rc::downgrade(&parent)));
    }
    parent
        .children
        .borrow_mut()
        .splice(position..=position, children);
    element.parent.set(None);
    true
}

/// 将元素替换为它自身的纯文本内容
///
/// 翻译器注入的包裹标签以此拆除：周边结构保留，
/// 内部的嵌套内容压平成文本。
pub fn replace_with_text(element: &Handle) -> bool {
    let Some(parent) = get_parent_node(element) else {
        return false;
    };
    let position = parent
        .children
        .borrow()
        .iter()
        .position(|child| Rc::ptr_eq(child, element));
    let Some(position) = position else {
        return false;
    };

    let text = text_content(element);
    let text_node = Node::new(NodeData::Text {
        contents: RefCell::new(format_tendril!("{}", text)),
    });
    text_node.parent.set(Some(Rc::downgrade(&parent)));
    parent.children.borrow_mut()[position] = text_node;
    element.parent.set(None);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html::dom::{get_child_node_by_name, get_node_attr, html_to_dom, set_node_attr};
    use crate::html::serialize::inner_markup;
    use markup5ever_rcdom::RcDom;

    fn parse(html: &str) -> RcDom {
        html_to_dom(html.as_bytes(), "utf-8".to_string())
    }

    fn body_of(dom: &RcDom) -> Handle {
        let html = get_child_node_by_name(&dom.document, "html").unwrap();
        get_child_node_by_name(&html, "body").unwrap()
    }

    #[test]
    fn clone_subtree_is_independent() {
        let dom = parse("<div class=\"x\"><span>hello</span></div>");
        let div = get_child_node_by_name(&body_of(&dom), "div").unwrap();

        let copy = clone_subtree(&div);
        set_node_attr(&div, "class", Some("changed".to_string()));
        div.children.borrow_mut().clear();

        assert_eq!(get_node_attr(&copy, "class"), Some("x".to_string()));
        assert_eq!(inner_markup(&copy).unwrap(), "<span>hello</span>");
    }

    #[test]
    fn replace_children_restores_from_template() {
        let dom = parse("<div><b>orig</b></div>");
        let div = get_child_node_by_name(&body_of(&dom), "div").unwrap();
        let template: Vec<Handle> = div.children.borrow().iter().map(clone_subtree).collect();

        div.children.borrow_mut().clear();
        assert_eq!(inner_markup(&div).unwrap(), "");

        replace_children(&div, &template);
        assert_eq!(inner_markup(&div).unwrap(), "<b>orig</b>");

        // 模板可以反复使用
        div.children.borrow_mut().clear();
        replace_children(&div, &template);
        assert_eq!(inner_markup(&div).unwrap(), "<b>orig</b>");
    }

    #[test]
    fn unwrap_promotes_children_in_place() {
        let dom = parse("<div>a<span class=\"skiptranslate\"><b>x</b>y</span>c</div>");
        let body = body_of(&dom);
        let div = get_child_node_by_name(&body, "div").unwrap();
        let span = get_child_node_by_name(&div, "span").unwrap();

        assert!(unwrap_element(&span));
        assert_eq!(inner_markup(&div).unwrap(), "a<b>x</b>yc");
        // 再次解包同一元素：已脱离文档树
        assert!(!unwrap_element(&span));
    }

    #[test]
    fn replace_with_text_flattens_wrapper() {
        let dom = parse("<p>before <font class=\"translated\"><i>Bonjour</i></font> after</p>");
        let body = body_of(&dom);
        let p = get_child_node_by_name(&body, "p").unwrap();
        let font = get_child_node_by_name(&p, "font").unwrap();

        assert!(replace_with_text(&font));
        assert_eq!(inner_markup(&p).unwrap(), "before Bonjour after");
    }
}
