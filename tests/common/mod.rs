// 集成测试公共模块
//
// 提供 DOM 构造工具和模拟浏览器整页翻译的辅助函数

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Once;

use html5ever::interface::QualName;
use html5ever::tendril::format_tendril;
use html5ever::{local_name, namespace_url, ns};
use markup5ever_rcdom::{Handle, Node, NodeData, RcDom};

use anti_translate::html::{
    get_child_node_by_name, get_node_attr, html_to_dom, set_node_attr, text_content,
};

static INIT_LOGGING: Once = Once::new();

/// 解析测试页面（顺带初始化测试日志输出）
pub fn parse(html: &str) -> RcDom {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
    html_to_dom(html.as_bytes(), "utf-8".to_string())
}

pub fn html_of(dom: &RcDom) -> Handle {
    get_child_node_by_name(&dom.document, "html").unwrap()
}

pub fn body_of(dom: &RcDom) -> Handle {
    get_child_node_by_name(&html_of(dom), "body").unwrap()
}

/// 创建一个简单的英文测试页面
pub fn simple_english_page() -> String {
    r#"<!DOCTYPE html>
<html lang="en">
<head><title>Test Page</title></head>
<body>
    <h1>Welcome</h1>
    <p id="intro">Hello world, this is the introduction.</p>
    <div class="card">
        <p>Another paragraph with <strong>important</strong> text.</p>
    </div>
</body>
</html>"#
        .to_string()
}

/// 构造一个空属性的 HTML 元素节点
pub fn new_element(tag: &str) -> Handle {
    let name = match tag {
        "font" => QualName::new(None, ns!(html), local_name!("font")),
        "span" => QualName::new(None, ns!(html), local_name!("span")),
        "div" => QualName::new(None, ns!(html), local_name!("div")),
        "p" => QualName::new(None, ns!(html), local_name!("p")),
        other => panic!("unsupported test tag: {}", other),
    };
    Node::new(NodeData::Element {
        name,
        attrs: RefCell::new(Vec::new()),
        template_contents: RefCell::new(None),
        mathml_annotation_xml_integration_point: false,
    })
}

/// 构造一个文本节点
pub fn new_text(text: &str) -> Handle {
    Node::new(NodeData::Text {
        contents: RefCell::new(format_tendril!("{}", text)),
    })
}

/// 把子节点挂到父节点末尾
pub fn append_child(parent: &Handle, child: &Handle) {
    child.parent.set(Some(Rc::downgrade(parent)));
    parent.children.borrow_mut().push(child.clone());
}

/// 覆盖元素的首个文本子节点
pub fn set_text(element: &Handle, text: &str) {
    for child in element.children.borrow().iter() {
        if let NodeData::Text { ref contents } = child.data {
            *contents.borrow_mut() = format_tendril!("{}", text);
            return;
        }
    }
    panic!("element has no text child");
}

/// 把元素的现有子节点整体包进一个翻译包裹标签
///
/// 模拟 Chrome 整页翻译对文本容器的改写方式。
pub fn wrap_in_translation_font(element: &Handle, translated_text: &str) -> Handle {
    let font = new_element("font");
    set_node_attr(&font, "class", Some("translat-inline".to_string()));

    element.children.borrow_mut().clear();
    let text = new_text(translated_text);
    append_child(&font, &text);
    append_child(element, &font);
    font
}

/// 在整个页面上模拟一次浏览器整页翻译
///
/// 根语言改写为目标语言、html 上挂方向类、body 标记显式翻译属性、
/// 每个段落的文本被包裹标签里的"译文"替换。
pub fn simulate_page_translation(dom: &RcDom, target_lang: &str) {
    let html = html_of(dom);
    let body = body_of(dom);

    set_node_attr(&html, "lang", Some(target_lang.to_string()));
    let class = get_node_attr(&html, "class")
        .map(|c| format!("{} translated-ltr", c))
        .unwrap_or_else(|| "translated-ltr".to_string());
    set_node_attr(&html, "class", Some(class));
    set_node_attr(&body, "translate", Some("yes".to_string()));

    for paragraph in collect_paragraphs(&body) {
        let original = text_content(&paragraph);
        let translated = format!("[{}] {}", target_lang, original);
        wrap_in_translation_font(&paragraph, &translated);
    }
}

fn collect_paragraphs(root: &Handle) -> Vec<Handle> {
    let mut found = Vec::new();
    let mut stack: Vec<Handle> = vec![root.clone()];
    while let Some(node) = stack.pop() {
        if let NodeData::Element { ref name, .. } = node.data {
            if &*name.local == "p" {
                found.push(node.clone());
                continue;
            }
        }
        let children: Vec<Handle> = node.children.borrow().clone();
        for child in children.into_iter().rev() {
            stack.push(child);
        }
    }
    found
}

/// 事件计数器，配合监听器注册使用
pub struct EventCounter {
    count: Rc<Cell<u32>>,
}

impl EventCounter {
    pub fn new() -> Self {
        Self {
            count: Rc::new(Cell::new(0)),
        }
    }

    /// 返回可移交给监听器闭包的计数句柄
    pub fn handle(&self) -> Rc<Cell<u32>> {
        Rc::clone(&self.count)
    }

    pub fn get(&self) -> u32 {
        self.count.get()
    }
}
