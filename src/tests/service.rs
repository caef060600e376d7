use super::DocumentService;
use crate::buffer::RichBuffer;
use crate::cache::{RefreshOutcome, RefreshPolicy};
use crate::editor::{ChangeKind, ChangeSource, EditorHost};
use crate::formats::MarkupKind;
use crate::locator::QueryMode;
use proptest::prelude::*;
use std::time::{Duration, Instant};

struct Unmounted;

impl EditorHost for Unmounted {}

fn service(text: &str) -> DocumentService<RichBuffer> {
    DocumentService::new(
        RichBuffer::from_plain(text),
        MarkupKind::Html,
        RefreshPolicy::default(),
    )
}

#[test]
fn test_mount_takes_a_snapshot() {
    let doc = DocumentService::new(
        RichBuffer::from_markdown("# Fatos\nTexto."),
        MarkupKind::Html,
        RefreshPolicy::default(),
    );
    assert!(doc.is_ready());
    assert!(doc.snapshot().is_some());
    assert_eq!(doc.sections().len(), 1);
    assert_eq!(doc.plain_text(), "Fatos\nTexto.");
    assert_eq!(doc.markup(), "<h1>Fatos</h1><p>Texto.</p>");
}

#[test]
fn test_unmounted_service_fails_softly() {
    let mut doc = DocumentService::new(Unmounted, MarkupKind::Html, RefreshPolicy::default());
    assert!(!doc.is_ready());
    assert!(doc.snapshot().is_none());
    assert_eq!(doc.plain_text(), "");
    assert!(doc.sections().is_empty());
    assert!(!doc.replace_range(0, 0, "x"));
    assert!(!doc.insert_at(0, "x"));
    assert!(!doc.move_range(0, 1, 0));
    assert_eq!(doc.refresh(true), RefreshOutcome::Skipped);
}

#[test]
fn test_replace_range() {
    let mut doc = service("Citem-se o réu.");
    let found = doc.find("réu", QueryMode::Literal).unwrap();
    assert!(doc.replace_range(found[0].offset, found[0].length, "requerido"));
    assert_eq!(doc.live_text(), "Citem-se o requerido.");
    assert_eq!(doc.live_slice(11, 9).as_deref(), Some("requerido"));
    assert!(!doc.replace_range(18, 10, "x"));
    assert_eq!(doc.live_text(), "Citem-se o requerido.");
}

#[test]
fn test_write_schedules_a_refresh() {
    let mut doc = service(&"a".repeat(300));
    let before = doc.snapshot().unwrap();
    assert!(doc.insert_at(0, "!"));

    // Still within the policy's tolerance: the scheduled refresh keeps the snapshot.
    doc.tick_at(Instant::now() + Duration::from_secs(1));
    assert_eq!(doc.snapshot().unwrap().plain_text, before.plain_text);
    assert!(doc.live_text().starts_with('!'));

    doc.tick_at(Instant::now() + Duration::from_secs(121));
    assert!(doc.snapshot().unwrap().plain_text.starts_with('!'));
}

#[test]
fn test_user_edits_reach_listeners_and_refresh() {
    let mut doc = service("o autor");
    let seen = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
    let sink = std::rc::Rc::clone(&seen);
    doc.adapter_mut()
        .on_change(move |event| sink.borrow_mut().push(event.source));

    let event = doc
        .adapter_mut()
        .host_mut()
        .sync_text("o requerente")
        .unwrap();
    assert_eq!(event.kind, ChangeKind::Text);
    doc.editor_changed(&event);

    assert_eq!(*seen.borrow(), vec![ChangeSource::User]);
    assert_eq!(doc.snapshot().unwrap().plain_text, "o requerente");
}

#[test]
fn test_format_range() {
    let mut doc = service("Dos Pedidos\ntexto");
    assert!(doc.format_range(0, 11, "header", "2"));
    assert!(doc.live_text().starts_with("Dos Pedidos"));
    doc.refresh_at(false, Instant::now() + Duration::from_secs(30));
    let sections = doc.sections();
    assert_eq!(sections.len(), 1);
    assert_eq!(sections[0].level, 2);
    assert!(!doc.format_range(0, 2, "font", "serif"));
}

#[test]
fn test_move_range_forward_and_backward() {
    let mut doc = service("ABCDEF");
    assert!(doc.move_range(0, 2, 4));
    assert_eq!(doc.live_text(), "CDABEF");

    let mut doc = service("ABCDEF");
    assert!(doc.move_range(4, 2, 1));
    assert_eq!(doc.live_text(), "AEFBCD");
}

#[test]
fn test_move_range_edge_cases() {
    let mut doc = service("ABCDEF");
    assert!(!doc.move_range(0, 4, 2));
    assert!(doc.move_range(1, 2, 1));
    assert!(doc.move_range(1, 2, 3));
    assert!(doc.move_range(1, 0, 5));
    assert!(!doc.move_range(5, 2, 0));
    assert!(!doc.move_range(0, 1, 7));
    assert_eq!(doc.live_text(), "ABCDEF");
}

#[test]
fn test_move_block_carries_its_separator() {
    let mut doc = service("A. B. C.");
    assert!(doc.move_block(0, 2, 8));
    assert_eq!(doc.live_text(), "B. C. A.");

    let mut doc = service("A. B. C.");
    assert!(doc.move_block(6, 2, 0));
    assert_eq!(doc.live_text(), "C. A. B.");

    let mut doc = service("Dos Fatos\nDo Direito\nDos Pedidos");
    assert!(doc.move_block(0, 9, 32));
    assert_eq!(doc.live_text(), "Do Direito\nDos Pedidos\nDos Fatos");
}

#[test]
fn test_move_block_without_whitespace_falls_back() {
    let mut doc = service("ABCDEF");
    assert!(doc.move_block(0, 2, 6));
    assert_eq!(doc.live_text(), "CDEFAB");
    assert!(!doc.move_block(0, 4, 2));
}

proptest! {
    #[test]
    fn prop_move_range_preserves_length_and_block(
        text in "[a-e]{1,30}",
        a in 0usize..30,
        b in 0usize..30,
        c in 0usize..31,
    ) {
        let total = text.chars().count();
        let start = a % total;
        let len = b % (total - start + 1);
        let dest = c % (total + 1);
        prop_assume!(!(dest > start && dest < start + len));

        let mut doc = service(&text);
        let block: String = text.chars().skip(start).take(len).collect();
        prop_assert!(doc.move_range(start, len, dest));

        let after = doc.live_text();
        prop_assert_eq!(after.chars().count(), total);
        let landed = if dest > start { dest - len } else { dest };
        let moved: String = after.chars().skip(landed).take(len).collect();
        prop_assert_eq!(moved, block);
    }

    #[test]
    fn prop_replace_range_splices(
        text in "[a-eé ]{0,30}",
        replacement in "[x-zç]{0,6}",
        a in 0usize..31,
        b in 0usize..31,
    ) {
        let total = text.chars().count();
        let offset = a % (total + 1);
        let len = b % (total - offset + 1);

        let mut doc = service(&text);
        prop_assert!(doc.replace_range(offset, len, &replacement));

        let head: String = text.chars().take(offset).collect();
        let tail: String = text.chars().skip(offset + len).collect();
        prop_assert_eq!(doc.live_text(), format!("{head}{replacement}{tail}"));
    }
}
