//! 元素查找
//!
//! 遍历一律使用显式工作栈：先复制子节点列表再迭代，
//! 既限制深层文档的调用栈深度，也容忍遍历过程中树被改写。

use markup5ever_rcdom::Handle;

use super::dom::is_element;

/// 深度优先（父先于子）访问每个元素节点
pub fn for_each_element<F>(root: &Handle, mut visit: F)
where
    F: FnMut(&Handle),
{
    let mut stack: Vec<Handle> = vec![root.clone()];

    while let Some(node) = stack.pop() {
        if is_element(&node) {
            visit(&node);
        }
        let children: Vec<Handle> = node.children.borrow().clone();
        for child in children.into_iter().rev() {
            stack.push(child);
        }
    }
}

/// 收集满足条件的所有元素
pub fn collect_elements<P>(root: &Handle, mut predicate: P) -> Vec<Handle>
where
    P: FnMut(&Handle) -> bool,
{
    let mut found = Vec::new();
    for_each_element(root, |node| {
        if predicate(node) {
            found.push(node.clone());
        }
    });
    found
}

/// 是否存在满足条件的元素（短路）
pub fn any_element<P>(root: &Handle, mut predicate: P) -> bool
where
    P: FnMut(&Handle) -> bool,
{
    let mut stack: Vec<Handle> = vec![root.clone()];

    while let Some(node) = stack.pop() {
        if is_element(&node) && predicate(&node) {
            return true;
        }
        let children: Vec<Handle> = node.children.borrow().clone();
        for child in children.into_iter().rev() {
            stack.push(child);
        }
    }

    false
}
