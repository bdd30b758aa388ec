//! 原始内容快照存储
//!
//! 在翻译发生之前为页面的每个元素留一份"地面真相"：
//! 序列化后的内容、语言属性、全部属性，以及用于还原的深拷贝子树。
//! 快照以节点身份（指针）为键，内容被改写后快照依然有效；
//! 元素被移出文档树后快照成为孤儿，不做回收（上限是页面元素数）。

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::{Rc, Weak};

use chrono::{DateTime, Utc};
use markup5ever_rcdom::{Handle, Node, NodeData};
use tracing::debug;

use crate::html::{get_node_attr, get_parent_node, inner_markup, is_element, NodeKey};
use crate::markers::LANG_ATTR;

/// 元素快照（对外只读视图）
#[derive(Debug, Clone)]
pub struct ElementSnapshot {
    /// 捕获时刻元素内容子树的序列化形式
    pub markup: String,
    /// 捕获时刻的 lang 属性，原本没有则为 `None`
    pub lang: Option<String>,
    /// 捕获时刻的全部属性
    pub attributes: HashMap<String, String>,
    /// 捕获时间
    pub captured_at: DateTime<Utc>,
}

/// 存储内部的完整快照记录
pub(crate) struct StoredSnapshot {
    pub(crate) snapshot: ElementSnapshot,
    /// 子节点的深拷贝，还原时再克隆一次接回树里
    pub(crate) children: Vec<Handle>,
    /// 回指元素本身；仅用于查找，不持有所有权
    pub(crate) element: Weak<Node>,
}

/// 文本片段记录
///
/// 每个非空白文本节点一条，校验和用作内容级漂移的廉价预筛。
/// 对元素只保留弱引用，既不延长元素生命周期，
/// 元素被移除时记录也不失效。
pub(crate) struct TextFragmentRecord {
    #[allow(dead_code)]
    pub(crate) id: u64,
    pub(crate) text: String,
    pub(crate) checksum: i32,
    pub(crate) node: Weak<Node>,
    #[allow(dead_code)]
    pub(crate) parent: Weak<Node>,
}

/// 快照存储
#[derive(Default)]
pub struct ContentBackup {
    snapshots: RefCell<HashMap<NodeKey, StoredSnapshot>>,
    fragments: RefCell<Vec<TextFragmentRecord>>,
    fragment_keys: RefCell<HashSet<NodeKey>>,
    next_fragment_id: Cell<u64>,
}

impl ContentBackup {
    pub fn new() -> Self {
        Self::default()
    }

    /// 备份整棵子树并登记文本片段
    ///
    /// 深度优先、父先于子；已有快照的元素跳过，因此重复调用是无害的。
    /// 无法序列化的子树整体跳过，其余部分不受影响。
    pub fn capture_all(&self, root: &Handle) {
        self.capture_tree(root);
        self.capture_text_fragments(root);
    }

    /// 备份初始化之后才插入的动态内容
    ///
    /// 元素已有快照时什么都不做，返回 `false`。
    pub fn capture_dynamic(&self, element: &Handle) -> bool {
        if !is_element(element) {
            return false;
        }
        if self
            .snapshots
            .borrow()
            .contains_key(&NodeKey::of(element))
        {
            return false;
        }
        self.capture_tree(element);
        true
    }

    fn capture_tree(&self, root: &Handle) {
        let mut stack: Vec<Handle> = vec![root.clone()];

        while let Some(node) = stack.pop() {
            if is_element(&node) {
                self.capture_element(&node);
            }
            let children: Vec<Handle> = node.children.borrow().clone();
            for child in children.into_iter().rev() {
                stack.push(child);
            }
        }
    }

    fn capture_element(&self, element: &Handle) -> bool {
        let key = NodeKey::of(element);
        if self.snapshots.borrow().contains_key(&key) {
            return false;
        }

        let markup = match inner_markup(element) {
            Ok(markup) => markup,
            Err(err) => {
                debug!("跳过无法序列化的子树: {}", err);
                return false;
            }
        };

        let attributes = match &element.data {
            NodeData::Element { attrs, .. } => attrs
                .borrow()
                .iter()
                .map(|attr| (attr.name.local.to_string(), attr.value.to_string()))
                .collect(),
            _ => HashMap::new(),
        };

        let children: Vec<Handle> = element
            .children
            .borrow()
            .iter()
            .map(crate::html::clone_subtree)
            .collect();

        self.snapshots.borrow_mut().insert(
            key,
            StoredSnapshot {
                snapshot: ElementSnapshot {
                    markup,
                    lang: get_node_attr(element, LANG_ATTR),
                    attributes,
                    captured_at: Utc::now(),
                },
                children,
                element: Rc::downgrade(element),
            },
        );
        true
    }

    fn capture_text_fragments(&self, root: &Handle) {
        let mut stack: Vec<Handle> = vec![root.clone()];

        while let Some(node) = stack.pop() {
            if let NodeData::Text { ref contents } = node.data {
                let text = contents.borrow().to_string();
                if !text.trim().is_empty() {
                    let key = NodeKey::of(&node);
                    if self.fragment_keys.borrow_mut().insert(key) {
                        let id = self.next_fragment_id.get();
                        self.next_fragment_id.set(id + 1);
                        self.fragments.borrow_mut().push(TextFragmentRecord {
                            id,
                            checksum: checksum(&text),
                            text,
                            node: Rc::downgrade(&node),
                            parent: get_parent_node(&node)
                                .map(|p| Rc::downgrade(&p))
                                .unwrap_or_default(),
                        });
                    }
                }
            }
            let children: Vec<Handle> = node.children.borrow().clone();
            for child in children.into_iter().rev() {
                stack.push(child);
            }
        }
    }

    /// 获取元素的快照视图
    pub fn get_snapshot(&self, element: &Handle) -> Option<ElementSnapshot> {
        self.snapshots
            .borrow()
            .get(&NodeKey::of(element))
            .map(|stored| stored.snapshot.clone())
    }

    /// 元素是否已有快照
    pub fn has_snapshot(&self, element: &Handle) -> bool {
        self.snapshots.borrow().contains_key(&NodeKey::of(element))
    }

    /// 元素当前内容或 lang 属性是否偏离快照
    ///
    /// 没有快照或当前内容无法序列化时视为未修改。
    pub fn is_modified(&self, element: &Handle) -> bool {
        let map = self.snapshots.borrow();
        let Some(stored) = map.get(&NodeKey::of(element)) else {
            return false;
        };
        let current = match inner_markup(element) {
            Ok(current) => current,
            Err(_) => return false,
        };
        current != stored.snapshot.markup
            || get_node_attr(element, LANG_ATTR) != stored.snapshot.lang
    }

    /// 快照中仍在文档树里且内容已偏离的元素个数
    pub fn count_modified(&self) -> usize {
        self.live_elements()
            .iter()
            .filter(|element| self.is_modified(element))
            .count()
    }

    /// 所有快照元素中仍然存活（弱引用可升级）的那些
    pub(crate) fn live_elements(&self) -> Vec<Handle> {
        self.snapshots
            .borrow()
            .values()
            .filter_map(|stored| stored.element.upgrade())
            .collect()
    }

    /// 以完整内部记录访问某元素的快照
    pub(crate) fn with_stored<R>(
        &self,
        element: &Handle,
        f: impl FnOnce(&StoredSnapshot) -> R,
    ) -> Option<R> {
        self.snapshots
            .borrow()
            .get(&NodeKey::of(element))
            .map(f)
    }

    /// 快照数量
    pub fn len(&self) -> usize {
        self.snapshots.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.borrow().is_empty()
    }

    /// 文本片段数量
    pub fn fragment_count(&self) -> usize {
        self.fragments.borrow().len()
    }

    /// 校验和仍然匹配当前内容的文本片段数量
    pub fn intact_fragment_count(&self) -> usize {
        self.fragments
            .borrow()
            .iter()
            .filter(|record| {
                record
                    .node
                    .upgrade()
                    .map(|node| match &node.data {
                        NodeData::Text { contents } => {
                            checksum(&contents.borrow()) == record.checksum
                        }
                        _ => false,
                    })
                    .unwrap_or(false)
            })
            .count()
    }

    /// 清除所有快照与片段记录
    pub fn clear(&self) {
        self.snapshots.borrow_mut().clear();
        self.fragments.borrow_mut().clear();
        self.fragment_keys.borrow_mut().clear();
    }
}

/// 文本内容的滚动式 32 位校验和
///
/// `h = (h << 5) - h + ch`，按 wrapping 语义。只作廉价预筛，
/// 不是安全性质的散列。
pub fn checksum(text: &str) -> i32 {
    let mut hash: i32 = 0;
    for ch in text.chars() {
        hash = hash
            .wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(ch as i32);
    }
    hash
}
