// 监控生命周期测试
//
// 覆盖两条触发路径（变更驱动 / 时间驱动）和监控的启停。

mod common;

use anti_translate::{AntiTranslate, AntiTranslateOptions, MutationRecord};

use common::*;

#[test]
fn periodic_tick_detects_without_mutations() {
    let dom = parse(&simple_english_page());
    let engine = AntiTranslate::new(&dom, AntiTranslateOptions::default());
    engine.initialize(0);

    simulate_page_translation(&dom, "fr");

    // 宿主没有投递任何变更，兜底的周期评估仍然发现翻译
    assert!(!engine.tick(999));
    assert!(!engine.is_translated());
    assert!(engine.tick(1000));
    assert!(engine.is_translated());
}

#[test]
fn custom_check_interval_is_honored() {
    let dom = parse(&simple_english_page());
    let options = AntiTranslateOptions {
        check_interval_ms: 250,
        ..AntiTranslateOptions::default()
    };
    let engine = AntiTranslate::new(&dom, options);
    engine.initialize(0);

    simulate_page_translation(&dom, "fr");
    assert!(!engine.tick(200));
    assert!(engine.tick(250));
    assert!(engine.is_translated());
}

#[test]
fn unrelated_mutations_are_ignored() {
    let dom = parse(&simple_english_page());
    let engine = AntiTranslate::new(&dom, AntiTranslateOptions::default());
    engine.initialize(0);
    let checks = engine.detector().stats().checks;

    let body = body_of(&dom);
    let records = vec![
        MutationRecord::Attribute {
            target: body.clone(),
            name: "style".to_string(),
        },
        MutationRecord::Attribute {
            target: body,
            name: "data-theme".to_string(),
        },
    ];
    assert!(!engine.deliver_mutations(&records));
    assert_eq!(engine.detector().stats().checks, checks);
}

#[test]
fn related_batch_evaluates_exactly_once() {
    let dom = parse(&simple_english_page());
    let engine = AntiTranslate::new(&dom, AntiTranslateOptions::default());
    engine.initialize(0);
    let checks = engine.detector().stats().checks;

    let html = html_of(&dom);
    let records = vec![
        MutationRecord::Attribute {
            target: html.clone(),
            name: "lang".to_string(),
        },
        MutationRecord::Attribute {
            target: html.clone(),
            name: "class".to_string(),
        },
        MutationRecord::Attribute {
            target: html,
            name: "translate".to_string(),
        },
    ];
    assert!(engine.deliver_mutations(&records));

    let stats = engine.detector().stats();
    assert_eq!(stats.checks, checks + 1);
    assert_eq!(stats.batches_qualified, 1);
    assert_eq!(stats.batches_delivered, 1);
}

#[test]
fn stopped_monitor_ignores_everything_until_restart() {
    let dom = parse(&simple_english_page());
    let engine = AntiTranslate::new(&dom, AntiTranslateOptions::default());
    engine.initialize(0);
    engine.stop_watch();

    simulate_page_translation(&dom, "fr");
    let records = vec![MutationRecord::Attribute {
        target: html_of(&dom),
        name: "lang".to_string(),
    }];
    assert!(!engine.deliver_mutations(&records));
    assert!(!engine.tick(5000));
    assert!(!engine.is_translated());

    // 重新启动时立即评估一次
    assert!(engine.start_watch(5000));
    assert!(engine.is_translated());
}

#[test]
fn destroy_releases_snapshots_and_stops_monitoring() {
    let dom = parse(&simple_english_page());
    let engine = AntiTranslate::new(&dom, AntiTranslateOptions::default());
    engine.initialize(0);
    assert!(!engine.backup().is_empty());

    engine.destroy();
    assert!(engine.backup().is_empty());

    simulate_page_translation(&dom, "fr");
    assert!(!engine.tick(5000));
    assert!(!engine.is_translated());
}
