//! 翻译还原器
//!
//! 从廉价、有针对性的策略到更大动作的策略逐层撤销翻译痕迹：
//! 先拆注入标记（策略 A），再还原属性并按阈值选择性恢复内容
//! （策略 B），明显纠不回来时才全树深度还原。
//!
//! 还原自己也会改写文档树，为了不被侦测器当成新的翻译活动，
//! 改写前先把监控切入 Suspended，完成后预约延迟恢复——这是一套
//! 靠调用顺序维持的手工互斥约定，不是锁。

use std::cell::Cell;
use std::rc::Rc;

use markup5ever_rcdom::Handle;
use tracing::{debug, info, warn};

use crate::backup::ContentBackup;
use crate::core::{AntiTranslateError, AntiTranslateResult};
use crate::detector::TranslationDetector;
use crate::html::{
    collect_elements, for_each_element, get_child_node_by_name, get_node_attr, inner_markup,
    replace_children, replace_with_text, set_node_attr, unwrap_element,
};
use crate::markers::{
    self, CLASS_ATTR, CLASS_SCRUB_SUBSTRINGS, DIRECTIONAL_BODY_CLASSES, LANG_ATTR,
    SKIP_MARKER_CLASS, TRANSLATED_ATTR, TRANSLATED_ATTR_VALUE, VENDOR_WIDGET_SUBSTRING,
};

/// 轻量策略放过的最大内容长度偏差比例
///
/// 超过它才整体覆盖快照内容；小幅改动当作页面自身的动态更新放行。
pub const CONTENT_RESTORE_RATIO: f64 = 0.1;

/// 轻量策略之后仍然偏离的元素超过这个数量时才做深度还原
pub const DEEP_REVERT_THRESHOLD: usize = 10;

/// 还原完成到恢复监控之间的静置时间（毫秒）
pub const RESUME_DELAY_MS: u64 = 500;

/// 翻译还原器
pub struct TranslationReverter {
    document: Handle,
    backup: Rc<ContentBackup>,
    detector: Option<Rc<TranslationDetector>>,
    /// 重入保护：一次顶层还原期间为 true
    reverting: Cell<bool>,
}

impl TranslationReverter {
    pub fn new(
        document: Handle,
        backup: Rc<ContentBackup>,
        detector: Option<Rc<TranslationDetector>>,
    ) -> Self {
        Self {
            document,
            backup,
            detector,
            reverting: Cell::new(false),
        }
    }

    /// 智能还原：分层执行全部策略
    ///
    /// 已有还原在进行中时是记录日志的空操作。单个策略失败不会
    /// 中断其余策略，重入保护在任何路径上都会释放。
    pub fn smart_revert(&self) -> bool {
        if self.reverting.get() {
            warn!("还原正在进行中，忽略重入调用");
            return false;
        }
        self.reverting.set(true);
        info!("开始智能还原");

        // 任何树改写之前先停掉两条监控触发路径，防止自激
        let was_watching = self
            .detector
            .as_deref()
            .map(TranslationDetector::suspend_monitoring)
            .unwrap_or(false);

        if let Err(err) = self.strip_injected_markup() {
            warn!("拆除注入标记失败: {}", err);
        }
        if let Err(err) = self.scrub_translation_classes() {
            warn!("清洗翻译 class 失败: {}", err);
        }
        if let Err(err) = self.restore_attributes() {
            warn!("还原属性失败: {}", err);
        }

        let still_modified = self.backup.count_modified();
        if still_modified > DEEP_REVERT_THRESHOLD {
            info!(
                still_modified,
                "轻量策略纠正不足，执行深度还原"
            );
            let root = self.revert_root();
            self.revert_partial(&root);
        }

        if was_watching {
            if let Some(detector) = self.detector.as_deref() {
                // 延迟恢复，给树留出稳定时间，避免监控看到收尾写入
                detector.schedule_resume(RESUME_DELAY_MS);
            }
        }

        self.reverting.set(false);
        info!("智能还原完成");
        true
    }

    fn revert_root(&self) -> Handle {
        get_child_node_by_name(&self.document, "html")
            .and_then(|html| get_child_node_by_name(&html, "body"))
            .unwrap_or_else(|| self.document.clone())
    }

    /// 策略 A：拆除翻译器注入的标记
    ///
    /// 包裹标签原地替换为自身文本；控件和 skiptranslate 元素解包。
    /// 顶层结构容器绝不移除。
    fn strip_injected_markup(&self) -> AntiTranslateResult<usize> {
        let mut removed = 0;

        let wrappers = collect_elements(&self.document, markers::is_wrapper_element);
        for wrapper in &wrappers {
            // 嵌套包裹在外层被压平后即已脱离文档树，直接跳过
            if replace_with_text(wrapper) {
                removed += 1;
            }
        }

        let leftovers = collect_elements(&self.document, |el| {
            markers::class_contains(el, VENDOR_WIDGET_SUBSTRING)
                || markers::has_class_token(el, SKIP_MARKER_CLASS)
        });
        for element in &leftovers {
            if markers::is_root_container(element) {
                continue;
            }
            if unwrap_element(element) {
                removed += 1;
            }
        }

        debug!(removed, "注入标记拆除完毕");
        Ok(removed)
    }

    /// 从所有普通元素的 class 里剔除翻译相关词条
    ///
    /// html/body 上的方向类在属性还原阶段单独处理。
    fn scrub_translation_classes(&self) -> AntiTranslateResult<usize> {
        let mut scrubbed = 0;

        for_each_element(&self.document, |element| {
            if markers::is_root_container(element) {
                return;
            }
            let Some(class) = get_node_attr(element, CLASS_ATTR) else {
                return;
            };
            let kept: Vec<&str> = class
                .split_whitespace()
                .filter(|token| {
                    !CLASS_SCRUB_SUBSTRINGS
                        .iter()
                        .any(|pattern| token.contains(pattern))
                })
                .collect();
            if kept.len() != class.split_whitespace().count() {
                let value = if kept.is_empty() {
                    None
                } else {
                    Some(kept.join(" "))
                };
                set_node_attr(element, CLASS_ATTR, value);
                scrubbed += 1;
            }
        });

        debug!(scrubbed, "class 清洗完毕");
        Ok(scrubbed)
    }

    /// 策略 B：还原属性与（超过阈值时的）快照内容
    fn restore_attributes(&self) -> AntiTranslateResult<usize> {
        let html = get_child_node_by_name(&self.document, "html").ok_or_else(|| {
            AntiTranslateError::DocumentNotReady("文档缺少 html 根元素".to_string())
        })?;
        let body = get_child_node_by_name(&html, "body");

        // 根语言属性退回首次观察到的值；原本没有就彻底移除
        if let Some(original) = self
            .detector
            .as_deref()
            .and_then(TranslationDetector::original_language)
        {
            let value = if original.is_empty() {
                None
            } else {
                Some(original)
            };
            set_node_attr(&html, LANG_ATTR, value.clone());
            if let Some(body) = &body {
                set_node_attr(body, LANG_ATTR, value);
            }
        }

        // html 与 body 上的方向类
        for container in std::iter::once(&html).chain(body.iter()) {
            if let Some(class) = get_node_attr(container, CLASS_ATTR) {
                let kept: Vec<&str> = class
                    .split_whitespace()
                    .filter(|token| !DIRECTIONAL_BODY_CLASSES.contains(token))
                    .collect();
                let value = if kept.is_empty() {
                    None
                } else {
                    Some(kept.join(" "))
                };
                set_node_attr(container, CLASS_ATTR, value);
            }
        }

        // 显式翻译标记属性
        let marked = collect_elements(&self.document, |el| {
            get_node_attr(el, TRANSLATED_ATTR).as_deref() == Some(TRANSLATED_ATTR_VALUE)
        });
        for element in &marked {
            set_node_attr(element, TRANSLATED_ATTR, None);
        }

        // 逐个快照元素：lang 退回快照值，内容只在偏差超过阈值时整体覆盖
        let mut restored = 0;
        for element in self.backup.live_elements() {
            self.backup.with_stored(&element, |stored| {
                set_node_attr(&element, LANG_ATTR, stored.snapshot.lang.clone());

                let current = match inner_markup(&element) {
                    Ok(current) => current,
                    Err(err) => {
                        debug!("跳过无法序列化的元素: {}", err);
                        return;
                    }
                };
                if current == stored.snapshot.markup {
                    return;
                }
                if exceeds_restore_ratio(stored.snapshot.markup.len(), current.len()) {
                    replace_children(&element, &stored.children);
                    restored += 1;
                }
            });
        }

        debug!(restored, "属性与内容还原完毕");
        Ok(restored)
    }

    /// 深度还原：遍历整棵树，无条件恢复每个偏离快照的元素
    ///
    /// 只在轻量策略明显纠正不足时使用。子节点列表在还原之后再
    /// 快照，走的是恢复出来的新树。
    pub fn revert_partial(&self, root: &Handle) -> usize {
        let mut restored = 0;
        let mut stack: Vec<Handle> = vec![root.clone()];

        while let Some(node) = stack.pop() {
            if self.backup.is_modified(&node) && self.revert_element(&node) {
                restored += 1;
            }
            let children: Vec<Handle> = node.children.borrow().clone();
            for child in children.into_iter().rev() {
                stack.push(child);
            }
        }

        info!(restored, "深度还原完毕");
        restored
    }

    /// 从快照完整恢复单个元素的内容与属性
    ///
    /// 没有快照时返回 `false`。
    pub fn revert_element(&self, element: &Handle) -> bool {
        self.backup
            .with_stored(element, |stored| {
                replace_children(element, &stored.children);
                set_node_attr(element, LANG_ATTR, stored.snapshot.lang.clone());
                for (name, value) in &stored.snapshot.attributes {
                    if name != LANG_ATTR {
                        set_node_attr(element, name, Some(value.clone()));
                    }
                }
            })
            .is_some()
    }

    /// 是否有还原正在进行
    pub fn is_reverting(&self) -> bool {
        self.reverting.get()
    }
}

/// 内容长度偏差是否超出放行阈值
///
/// 快照为空而当前非空视为超出。恰好 10% 不算超出。
fn exceeds_restore_ratio(original_len: usize, current_len: usize) -> bool {
    if original_len == 0 {
        return current_len > 0;
    }
    let diff = current_len.abs_diff(original_len) as f64 / original_len as f64;
    diff > CONTENT_RESTORE_RATIO
}
