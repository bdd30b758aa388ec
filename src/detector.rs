//! 翻译状态侦测器
//!
//! 对整页持续回答"现在是不是被翻译了"：每次评估把五条独立启发式
//! 取逻辑或作为新状态，状态翻转时向注册的监听器广播事件。
//!
//! 触发评估的两条路径互相独立：
//! - 变更驱动：宿主投递的变更批次中含有翻译相关记录时评估一次，
//!   一个批次至多一次；
//! - 时间驱动：虚拟时钟按固定间隔兜底评估，覆盖属性/节点增量
//!   观察不到的情况。
//!
//! 监控本身是一台小状态机（Stopped / Watching / Suspended），
//! Suspended 只由还原器进出，避免还原写入被自己再次侦测成翻译。

use std::cell::{Cell, RefCell};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

use markup5ever_rcdom::Handle;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::html::{any_element, get_child_node_by_name, get_node_attr};
use crate::markers::{
    self, LANG_ATTR, TRANSLATED_ATTR, TRANSLATED_ATTR_VALUE, VENDOR_CLASS_SUBSTRINGS,
};
use crate::mutation::MutationRecord;

/// 默认兜底评估间隔（毫秒）
pub const DEFAULT_CHECK_INTERVAL_MS: u64 = 1000;

/// body 尚未就绪时推迟挂载观察的重试间隔（毫秒）
pub const OBSERVE_RETRY_DELAY_MS: u64 = 100;

/// 侦测器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorOptions {
    /// 时间驱动评估的间隔，毫秒
    pub check_interval_ms: u64,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            check_interval_ms: DEFAULT_CHECK_INTERVAL_MS,
        }
    }
}

/// 单次评估中各启发式的结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DetectionReport {
    /// 注入的包裹标签（`<font class*="translat">`）
    pub wrapper_markup: bool,
    /// 根语言属性偏离首次观察到的值
    pub language_drift: bool,
    /// 显式翻译标记属性（`translate="yes"`）
    pub translate_attribute: bool,
    /// 已知翻译服务的 class 子串
    pub vendor_classes: bool,
    /// 内容级漂移（保留扩展点，最小实现恒为 false）
    pub content_divergence: bool,
}

impl DetectionReport {
    /// 任一启发式命中即视为已翻译
    pub fn any(&self) -> bool {
        self.wrapper_markup
            || self.language_drift
            || self.translate_attribute
            || self.vendor_classes
            || self.content_divergence
    }
}

/// 侦测器事件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetectorEvent {
    /// NOT_TRANSLATED → TRANSLATED
    Detected,
    /// TRANSLATED → NOT_TRANSLATED
    Reverted,
}

/// 监听器句柄，用于注销
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// 监控状态机
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MonitorMode {
    Stopped,
    Watching,
    Suspended,
}

/// 运行统计
#[derive(Debug, Clone, Copy, Default)]
pub struct DetectorStats {
    /// 执行过的评估次数
    pub checks: u64,
    /// 投递进来的变更批次数
    pub batches_delivered: u64,
    /// 其中触发了评估的批次数
    pub batches_qualified: u64,
    /// 发出的 Detected 事件数
    pub detected_events: u64,
    /// 发出的 Reverted 事件数
    pub reverted_events: u64,
}

struct ListenerEntry {
    id: ListenerId,
    event: DetectorEvent,
    callback: Rc<dyn Fn(&DetectionReport)>,
}

/// 翻译状态侦测器
pub struct TranslationDetector {
    document: Handle,
    options: DetectorOptions,
    /// 当前状态：true = TRANSLATED
    translated: Cell<bool>,
    /// 首次观察到的根语言，锁存后永不改写
    original_language: RefCell<Option<String>>,
    monitor: Cell<MonitorMode>,
    /// Suspended 状态下的恢复时刻
    resume_at: Cell<Option<u64>>,
    /// 变更观察挂载的根（body）；尚未就绪时为空
    observe_root: RefCell<Option<Handle>>,
    /// body 未就绪时的下次重试时刻
    retry_observe_at: Cell<Option<u64>>,
    /// 虚拟时钟（毫秒），由宿主通过 tick 推进
    clock: Cell<u64>,
    last_periodic_check: Cell<u64>,
    listeners: RefCell<Vec<ListenerEntry>>,
    next_listener_id: Cell<u64>,
    stats: Cell<DetectorStats>,
}

impl TranslationDetector {
    pub fn new(document: Handle, options: DetectorOptions) -> Self {
        Self {
            document,
            options,
            translated: Cell::new(false),
            original_language: RefCell::new(None),
            monitor: Cell::new(MonitorMode::Stopped),
            resume_at: Cell::new(None),
            observe_root: RefCell::new(None),
            retry_observe_at: Cell::new(None),
            clock: Cell::new(0),
            last_periodic_check: Cell::new(0),
            listeners: RefCell::new(Vec::new()),
            next_listener_id: Cell::new(0),
            stats: Cell::new(DetectorStats::default()),
        }
    }

    /// 接通两条触发路径并立即评估一次
    pub fn start(&self, now_ms: u64) {
        self.clock.set(now_ms);
        self.last_periodic_check.set(now_ms);
        self.monitor.set(MonitorMode::Watching);
        self.resume_at.set(None);
        self.try_attach_observation(now_ms);
        self.check_now();
    }

    /// 拆除两条触发路径；重复调用无害
    pub fn stop(&self) {
        self.monitor.set(MonitorMode::Stopped);
        self.resume_at.set(None);
        self.retry_observe_at.set(None);
        *self.observe_root.borrow_mut() = None;
    }

    fn try_attach_observation(&self, now_ms: u64) {
        let body = get_child_node_by_name(&self.document, "html")
            .and_then(|html| get_child_node_by_name(&html, "body"));
        match body {
            Some(body) => {
                *self.observe_root.borrow_mut() = Some(body);
                self.retry_observe_at.set(None);
            }
            None => {
                warn!("document body 尚未就绪，推迟挂载变更观察");
                self.retry_observe_at
                    .set(Some(now_ms + OBSERVE_RETRY_DELAY_MS));
            }
        }
    }

    /// 推进虚拟时钟
    ///
    /// 依次处理：Suspended 的延迟恢复、观察挂载重试、周期性兜底评估。
    /// 返回本次是否执行了评估。
    pub fn tick(&self, now_ms: u64) -> bool {
        self.clock.set(now_ms);

        if self.monitor.get() == MonitorMode::Suspended {
            if let Some(resume_at) = self.resume_at.get() {
                if now_ms >= resume_at {
                    debug!("恢复翻译监控");
                    self.monitor.set(MonitorMode::Watching);
                    self.resume_at.set(None);
                    // 恢复后重置周期相位，不立即评估，给树留时间稳定
                    self.last_periodic_check.set(now_ms);
                    if self.observe_root.borrow().is_none() {
                        self.try_attach_observation(now_ms);
                    }
                }
            }
            return false;
        }

        if self.monitor.get() != MonitorMode::Watching {
            return false;
        }

        if self.observe_root.borrow().is_none() {
            if let Some(retry_at) = self.retry_observe_at.get() {
                if now_ms >= retry_at {
                    self.try_attach_observation(now_ms);
                }
            }
        }

        if now_ms.saturating_sub(self.last_periodic_check.get()) >= self.options.check_interval_ms
        {
            self.last_periodic_check.set(now_ms);
            self.check_now();
            return true;
        }

        false
    }

    /// 接收一个变更批次
    ///
    /// 只有处于 Watching 且观察根已挂载时才处理；批次中任何一条
    /// 翻译相关记录都只换来一次评估。返回是否评估过。
    pub fn deliver_mutations(&self, records: &[MutationRecord]) -> bool {
        let mut stats = self.stats.get();
        stats.batches_delivered += 1;
        self.stats.set(stats);

        if self.monitor.get() != MonitorMode::Watching {
            return false;
        }
        if self.observe_root.borrow().is_none() {
            return false;
        }
        if !records
            .iter()
            .any(MutationRecord::is_translation_related)
        {
            return false;
        }

        let mut stats = self.stats.get();
        stats.batches_qualified += 1;
        self.stats.set(stats);

        self.check_now();
        true
    }

    /// 立即重新评估所有启发式并推动状态机
    pub fn check_now(&self) -> bool {
        let report = self.evaluate();
        let was_translated = self.translated.get();
        let translated = report.any();
        self.translated.set(translated);

        let mut stats = self.stats.get();
        stats.checks += 1;

        if translated && !was_translated {
            stats.detected_events += 1;
            self.stats.set(stats);
            info!(?report, "侦测到页面被翻译");
            self.emit(DetectorEvent::Detected, &report);
        } else if !translated && was_translated {
            stats.reverted_events += 1;
            self.stats.set(stats);
            info!("翻译已还原");
            self.emit(DetectorEvent::Reverted, &report);
        } else {
            self.stats.set(stats);
        }

        translated
    }

    fn evaluate(&self) -> DetectionReport {
        self.latch_original_language();

        DetectionReport {
            wrapper_markup: self.detect_wrapper_markup(),
            language_drift: self.detect_language_drift(),
            translate_attribute: self.detect_translate_attribute(),
            vendor_classes: self.detect_vendor_classes(),
            content_divergence: self.detect_content_divergence(),
        }
    }

    /// 首次评估时锁存根语言，之后即使翻译被还原、属性被重置也不再更新
    fn latch_original_language(&self) {
        let mut original = self.original_language.borrow_mut();
        if original.is_none() {
            *original = Some(self.current_root_language());
        }
    }

    fn current_root_language(&self) -> String {
        let html = get_child_node_by_name(&self.document, "html");
        let html_lang = html.as_ref().and_then(|h| get_node_attr(h, LANG_ATTR));
        let body_lang = html
            .as_ref()
            .and_then(|h| get_child_node_by_name(h, "body"))
            .and_then(|b| get_node_attr(&b, LANG_ATTR));
        html_lang.or(body_lang).unwrap_or_default()
    }

    /// 启发式 1：注入的包裹标签
    fn detect_wrapper_markup(&self) -> bool {
        any_element(&self.document, markers::is_wrapper_element)
    }

    /// 启发式 2：根语言属性偏离锁存值
    fn detect_language_drift(&self) -> bool {
        let current = get_child_node_by_name(&self.document, "html")
            .and_then(|h| get_node_attr(&h, LANG_ATTR))
            .unwrap_or_default();
        let original = self.original_language.borrow();
        match original.as_deref() {
            Some(original) if !original.is_empty() && !current.is_empty() => current != original,
            _ => false,
        }
    }

    /// 启发式 3：显式翻译标记属性
    fn detect_translate_attribute(&self) -> bool {
        any_element(&self.document, |el| {
            get_node_attr(el, TRANSLATED_ATTR).as_deref() == Some(TRANSLATED_ATTR_VALUE)
        })
    }

    /// 启发式 4：已知翻译服务的 class 子串
    fn detect_vendor_classes(&self) -> bool {
        any_element(&self.document, |el| {
            VENDOR_CLASS_SUBSTRINGS
                .iter()
                .any(|pattern| markers::class_contains(el, pattern))
        })
    }

    /// 启发式 5：内容级漂移
    ///
    /// 保留的扩展点：本意是对照快照存储检查文本漂移，但逐次评估
    /// 全量比对的代价对轮询节奏来说太高，最小实现恒为未命中。
    fn detect_content_divergence(&self) -> bool {
        false
    }

    /// 注册事件监听器
    pub fn on(
        &self,
        event: DetectorEvent,
        callback: impl Fn(&DetectionReport) + 'static,
    ) -> ListenerId {
        let id = ListenerId(self.next_listener_id.get());
        self.next_listener_id.set(id.0 + 1);
        self.listeners.borrow_mut().push(ListenerEntry {
            id,
            event,
            callback: Rc::new(callback),
        });
        id
    }

    /// 注销监听器；不存在时返回 `false`
    pub fn off(&self, event: DetectorEvent, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|entry| !(entry.event == event && entry.id == id));
        listeners.len() != before
    }

    fn emit(&self, event: DetectorEvent, report: &DetectionReport) {
        // 先拷贝出回调列表再逐个调用，监听器内部可以安全地注册/注销
        let callbacks: Vec<Rc<dyn Fn(&DetectionReport)>> = self
            .listeners
            .borrow()
            .iter()
            .filter(|entry| entry.event == event)
            .map(|entry| Rc::clone(&entry.callback))
            .collect();

        for callback in callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(report))).is_err() {
                error!(?event, "监听器执行失败，继续通知其余监听器");
            }
        }
    }

    /// 暂停监控（仅供还原器使用）
    ///
    /// 返回此前是否处于 Watching；Stopped 状态不会被唤醒。
    pub(crate) fn suspend_monitoring(&self) -> bool {
        if self.monitor.get() == MonitorMode::Watching {
            self.monitor.set(MonitorMode::Suspended);
            self.resume_at.set(None);
            true
        } else {
            false
        }
    }

    /// 预约延迟恢复（仅供还原器使用）
    pub(crate) fn schedule_resume(&self, delay_ms: u64) {
        if self.monitor.get() == MonitorMode::Suspended {
            self.resume_at.set(Some(self.clock.get() + delay_ms));
        }
    }

    /// 当前翻译状态
    pub fn is_translated(&self) -> bool {
        self.translated.get()
    }

    /// 锁存的原始根语言；尚未做过任何评估时为 `None`
    pub fn original_language(&self) -> Option<String> {
        self.original_language.borrow().clone()
    }

    /// 运行统计快照
    pub fn stats(&self) -> DetectorStats {
        self.stats.get()
    }

    #[cfg(test)]
    fn monitor_mode_is_suspended(&self) -> bool {
        self.monitor.get() == MonitorMode::Suspended
    }
}
