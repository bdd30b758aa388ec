//! 引擎入口与公共类型
//!
//! [`AntiTranslate`] 把快照存储、侦测器、还原器装配成一个由调用方
//! 显式持有的实例（不做全局单例），并暴露
//! initialize / revert / check / tick 这组对外操作。

use std::cell::Cell;
use std::rc::Rc;

use markup5ever_rcdom::{Handle, RcDom};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::backup::ContentBackup;
use crate::detector::{
    DetectionReport, DetectorEvent, DetectorOptions, ListenerId, TranslationDetector,
};
use crate::env::{self, EnvVar};
use crate::html::{get_child_node_by_name, is_element};
use crate::markers;
use crate::mutation::MutationRecord;
use crate::reverter::TranslationReverter;

/// 本库的错误类型
///
/// 所有错误都在产生处被记录并就地消化，不允许穿透到调用方
/// 破坏页面其余功能；这里的变体只在组件内部传递。
#[derive(Error, Debug)]
pub enum AntiTranslateError {
    /// 文档缺少预期的结构（如 html 根元素）
    #[error("文档结构未就绪: {0}")]
    DocumentNotReady(String),

    /// DOM 序列化失败
    #[error("序列化失败: {0}")]
    Serialize(String),
}

pub type AntiTranslateResult<T> = Result<T, AntiTranslateError>;

/// 引擎配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AntiTranslateOptions {
    /// 时间驱动评估的间隔，毫秒
    pub check_interval_ms: u64,
    /// 是否为初始化后插入的内容自动补快照
    pub watch_dynamic: bool,
    /// 侦测到翻译时是否立即自动还原
    pub auto_revert: bool,
}

impl Default for AntiTranslateOptions {
    fn default() -> Self {
        Self {
            check_interval_ms: crate::detector::DEFAULT_CHECK_INTERVAL_MS,
            watch_dynamic: true,
            auto_revert: false,
        }
    }
}

impl AntiTranslateOptions {
    /// 在默认值之上应用 `ANTI_TRANSLATE_*` 环境变量覆盖
    ///
    /// 单个变量解析失败只记录告警并沿用默认值。
    pub fn from_env() -> Self {
        let mut options = Self::default();

        match env::CheckInterval::get() {
            Ok(Some(interval)) => options.check_interval_ms = interval,
            Ok(None) => {}
            Err(err) => warn!("{}", err),
        }
        match env::WatchDynamic::get() {
            Ok(Some(watch)) => options.watch_dynamic = watch,
            Ok(None) => {}
            Err(err) => warn!("{}", err),
        }
        match env::AutoRevert::get() {
            Ok(Some(auto)) => options.auto_revert = auto,
            Ok(None) => {}
            Err(err) => warn!("{}", err),
        }

        options
    }
}

/// 防翻译引擎
pub struct AntiTranslate {
    document: Handle,
    options: AntiTranslateOptions,
    backup: Rc<ContentBackup>,
    detector: Rc<TranslationDetector>,
    reverter: Rc<TranslationReverter>,
    initialized: Cell<bool>,
}

impl AntiTranslate {
    /// 在给定文档上装配引擎（尚未开始捕获和监控）
    pub fn new(dom: &RcDom, options: AntiTranslateOptions) -> Self {
        let document = dom.document.clone();
        let backup = Rc::new(ContentBackup::new());
        let detector = Rc::new(TranslationDetector::new(
            document.clone(),
            DetectorOptions {
                check_interval_ms: options.check_interval_ms,
            },
        ));
        let reverter = Rc::new(TranslationReverter::new(
            document.clone(),
            Rc::clone(&backup),
            Some(Rc::clone(&detector)),
        ));

        Self {
            document,
            options,
            backup,
            detector,
            reverter,
            initialized: Cell::new(false),
        }
    }

    /// 初始化：完整备份页面，然后启动侦测器
    ///
    /// 只有第一次调用有效，重复调用记录告警并返回 `false`。
    pub fn initialize(&self, now_ms: u64) -> bool {
        if self.initialized.get() {
            warn!("引擎已经初始化过，忽略重复调用");
            return false;
        }

        match get_child_node_by_name(&self.document, "html")
            .and_then(|html| get_child_node_by_name(&html, "body"))
        {
            Some(body) => self.backup.capture_all(&body),
            None => warn!("文档没有 body，跳过初始快照捕获"),
        }

        if self.options.auto_revert {
            let reverter = Rc::clone(&self.reverter);
            self.detector.on(DetectorEvent::Detected, move |_| {
                reverter.smart_revert();
            });
        }

        self.detector.start(now_ms);
        self.initialized.set(true);
        info!(
            snapshots = self.backup.len(),
            fragments = self.backup.fragment_count(),
            "初始化完成"
        );
        true
    }

    /// 手动触发智能还原
    pub fn revert(&self) -> bool {
        if !self.initialized.get() {
            error!("尚未初始化，无法还原");
            return false;
        }
        self.reverter.smart_revert()
    }

    /// 从快照还原单个元素
    pub fn revert_element(&self, element: &Handle) -> bool {
        if !self.initialized.get() {
            error!("尚未初始化，无法还原元素");
            return false;
        }
        self.reverter.revert_element(element)
    }

    /// 立即重新评估翻译状态
    pub fn check_now(&self) -> bool {
        if !self.initialized.get() {
            error!("尚未初始化，无法检查");
            return false;
        }
        self.detector.check_now()
    }

    /// 当前翻译状态
    pub fn is_translated(&self) -> bool {
        self.detector.is_translated()
    }

    /// 推进虚拟时钟（宿主定期调用）
    pub fn tick(&self, now_ms: u64) -> bool {
        self.detector.tick(now_ms)
    }

    /// 投递一批文档变更
    ///
    /// 开启 `watch_dynamic` 时，批次里新插入的普通元素会先补快照，
    /// 翻译产物不补（否则译文会被当成原始内容保护起来）。
    pub fn deliver_mutations(&self, records: &[MutationRecord]) -> bool {
        if !self.initialized.get() {
            return false;
        }

        if self.options.watch_dynamic {
            for record in records {
                if let MutationRecord::ChildList { added, .. } = record {
                    for node in added {
                        if is_element(node) && !markers::is_translation_artifact(node) {
                            self.backup.capture_dynamic(node);
                        }
                    }
                }
            }
        }

        self.detector.deliver_mutations(records)
    }

    /// 为初始化后插入的内容手动补快照
    pub fn capture_dynamic(&self, element: &Handle) -> bool {
        if !self.initialized.get() {
            error!("尚未初始化，无法补快照");
            return false;
        }
        self.backup.capture_dynamic(element)
    }

    /// 注册翻译侦测回调（展示层在这里挂提醒与手动还原入口）
    pub fn on_detected(&self, callback: impl Fn(&DetectionReport) + 'static) -> ListenerId {
        self.detector.on(DetectorEvent::Detected, callback)
    }

    /// 注册还原完成回调
    pub fn on_reverted(&self, callback: impl Fn(&DetectionReport) + 'static) -> ListenerId {
        self.detector.on(DetectorEvent::Reverted, callback)
    }

    /// 注销回调
    pub fn off(&self, event: DetectorEvent, id: ListenerId) -> bool {
        self.detector.off(event, id)
    }

    /// 重新开始监控
    pub fn start_watch(&self, now_ms: u64) -> bool {
        if !self.initialized.get() {
            error!("尚未初始化，无法启动监控");
            return false;
        }
        self.detector.start(now_ms);
        true
    }

    /// 停止监控（不清除快照）
    pub fn stop_watch(&self) {
        self.detector.stop();
    }

    /// 销毁：停止监控并释放全部快照
    pub fn destroy(&self) {
        self.detector.stop();
        self.backup.clear();
        self.initialized.set(false);
        info!("引擎已销毁");
    }

    /// 快照存储
    pub fn backup(&self) -> &Rc<ContentBackup> {
        &self.backup
    }

    /// 侦测器
    pub fn detector(&self) -> &Rc<TranslationDetector> {
        &self.detector
    }

    /// 还原器
    pub fn reverter(&self) -> &Rc<TranslationReverter> {
        &self.reverter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html::html_to_dom;

    fn parse(html: &str) -> RcDom {
        html_to_dom(html.as_bytes(), "utf-8".to_string())
    }

    #[test]
    fn initialize_is_meaningful_exactly_once() {
        let dom = parse("<html lang=\"en\"><body><p>hi</p></body></html>");
        let engine = AntiTranslate::new(&dom, AntiTranslateOptions::default());

        assert!(engine.initialize(0));
        let snapshots = engine.backup().len();
        assert!(snapshots > 0);

        assert!(!engine.initialize(0));
        assert_eq!(engine.backup().len(), snapshots);
    }

    #[test]
    fn operations_before_initialize_report_failure() {
        let dom = parse("<html><body><div>x</div></body></html>");
        let engine = AntiTranslate::new(&dom, AntiTranslateOptions::default());

        assert!(!engine.revert());
        assert!(!engine.check_now());
        assert!(!engine.start_watch(0));
        assert!(!engine.is_translated());
        assert!(!engine.deliver_mutations(&[]));
    }

    #[test]
    fn destroy_allows_reinitialization() {
        let dom = parse("<html><body><div>x</div></body></html>");
        let engine = AntiTranslate::new(&dom, AntiTranslateOptions::default());

        assert!(engine.initialize(0));
        engine.destroy();
        assert!(engine.backup().is_empty());
        assert!(engine.initialize(0));
        assert!(!engine.backup().is_empty());
    }

    #[test]
    fn default_options() {
        let options = AntiTranslateOptions::default();
        assert_eq!(options.check_interval_ms, 1000);
        assert!(options.watch_dynamic);
        assert!(!options.auto_revert);
    }
}
