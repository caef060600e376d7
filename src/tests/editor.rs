use super::{
    AccessPath, ChangeEvent, ChangeKind, ChangeSource, EditError, EditorAdapter, EditorHost,
    RichTextEditor, TextNodeTree,
};
use crate::buffer::RichBuffer;
use std::cell::RefCell;
use std::rc::Rc;

/// Editor hanging off a property of the host.
struct NestedHost {
    inner: RichBuffer,
}

impl EditorHost for NestedHost {
    fn editor(&self, path: AccessPath) -> Option<&dyn RichTextEditor> {
        if path == AccessPath::Nested {
            Some(&self.inner)
        } else {
            None
        }
    }

    fn editor_mut(&mut self, path: AccessPath) -> Option<&mut dyn RichTextEditor> {
        if path == AccessPath::Nested {
            Some(&mut self.inner)
        } else {
            None
        }
    }
}

/// Only the rendered lines are reachable.
struct NodesOnly {
    inner: RichBuffer,
}

impl EditorHost for NodesOnly {
    fn text_nodes(&self) -> Option<&dyn TextNodeTree> {
        Some(&self.inner)
    }

    fn text_nodes_mut(&mut self) -> Option<&mut dyn TextNodeTree> {
        Some(&mut self.inner)
    }
}

/// Nothing mounted.
struct Unmounted;

impl EditorHost for Unmounted {}

/// Structured API that refuses every write, with working text nodes behind it.
struct Stubborn {
    inner: RichBuffer,
    refreshed: usize,
}

impl RichTextEditor for Stubborn {
    fn text(&self) -> String {
        self.inner.text()
    }

    fn markup(&self) -> String {
        self.inner.markup()
    }

    fn delete_text(&mut self, _offset: usize, _len: usize) -> Result<(), EditError> {
        Err(EditError::Rejected("read-only".to_string()))
    }

    fn insert_text(&mut self, _offset: usize, _text: &str) -> Result<(), EditError> {
        Err(EditError::Rejected("read-only".to_string()))
    }

    fn format_text(
        &mut self,
        _offset: usize,
        _len: usize,
        _attribute: &str,
        _value: &str,
    ) -> Result<(), EditError> {
        Err(EditError::Rejected("read-only".to_string()))
    }
}

impl EditorHost for Stubborn {
    fn editor(&self, path: AccessPath) -> Option<&dyn RichTextEditor> {
        (path == AccessPath::Direct).then_some(self as &dyn RichTextEditor)
    }

    fn editor_mut(&mut self, path: AccessPath) -> Option<&mut dyn RichTextEditor> {
        if path == AccessPath::Direct {
            Some(self)
        } else {
            None
        }
    }

    fn text_nodes(&self) -> Option<&dyn TextNodeTree> {
        Some(&self.inner)
    }

    fn text_nodes_mut(&mut self) -> Option<&mut dyn TextNodeTree> {
        Some(&mut self.inner)
    }

    fn after_change(&mut self) {
        self.refreshed += 1;
    }
}

fn record(adapter: &mut EditorAdapter<impl EditorHost>) -> Rc<RefCell<Vec<ChangeEvent>>> {
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    adapter.on_change(move |event| sink.borrow_mut().push(*event));
    events
}

#[test]
fn test_direct_path_is_preferred() {
    let adapter = EditorAdapter::new(RichBuffer::from_plain("texto"));
    assert_eq!(adapter.access_path(), Some(AccessPath::Direct));
    assert!(adapter.is_ready());
    assert_eq!(adapter.plain_text(), "texto");
    assert_eq!(adapter.markup(), "<p>texto</p>");
}

#[test]
fn test_writes_emit_api_events() {
    let mut adapter = EditorAdapter::new(RichBuffer::from_plain("o réu"));
    let events = record(&mut adapter);

    assert!(adapter.delete_range(2, 3));
    assert!(adapter.insert_at(2, "requerido"));
    assert!(adapter.format_range(2, 9, "bold", "true"));
    assert_eq!(adapter.plain_text(), "o requerido");

    let events = events.borrow();
    assert_eq!(events.len(), 3);
    assert!(events.iter().all(|e| e.source == ChangeSource::Api));
    assert_eq!((events[0].offset, events[0].removed, events[0].inserted), (2, 3, 0));
    assert_eq!((events[1].offset, events[1].removed, events[1].inserted), (2, 0, 9));
    assert_eq!(events[2].kind, ChangeKind::Format);
}

#[test]
fn test_empty_writes_are_noops() {
    let mut adapter = EditorAdapter::new(RichBuffer::from_plain("abc"));
    let events = record(&mut adapter);
    assert!(adapter.delete_range(1, 0));
    assert!(adapter.insert_at(1, ""));
    assert!(events.borrow().is_empty());
}

#[test]
fn test_nested_path() {
    let mut adapter = EditorAdapter::new(NestedHost {
        inner: RichBuffer::from_plain("abc"),
    });
    assert_eq!(adapter.access_path(), Some(AccessPath::Nested));
    assert!(adapter.insert_at(3, "d"));
    assert_eq!(adapter.plain_text(), "abcd");
    assert!(!adapter.delete_range(2, 9));
    assert_eq!(adapter.host().inner.as_str(), "abcd");
}

#[test]
fn test_text_nodes_fallback() {
    let mut adapter = EditorAdapter::new(NodesOnly {
        inner: RichBuffer::from_plain("um\ndois & três"),
    });
    assert_eq!(adapter.access_path(), Some(AccessPath::TextNodes));
    assert_eq!(adapter.plain_text(), "um\ndois & três");
    assert_eq!(adapter.markup(), "<p>um</p><p>dois &amp; três</p>");

    assert!(adapter.insert_at(3, "só "));
    assert_eq!(adapter.plain_text(), "um\nsó dois & três");
    assert!(adapter.delete_range(0, 2));
    assert_eq!(adapter.plain_text(), "\nsó dois & três");
}

#[test]
fn test_text_nodes_refuse_cross_node_ranges_and_formats() {
    let mut adapter = EditorAdapter::new(NodesOnly {
        inner: RichBuffer::from_plain("um\ndois"),
    });
    assert!(!adapter.delete_range(1, 3));
    assert!(!adapter.format_range(0, 2, "bold", "true"));
    assert_eq!(adapter.plain_text(), "um\ndois");
}

#[test]
fn test_unmounted_editor_degrades() {
    let mut adapter = EditorAdapter::new(Unmounted);
    assert_eq!(adapter.access_path(), None);
    assert!(!adapter.is_ready());
    assert_eq!(adapter.plain_text(), "");
    assert_eq!(adapter.markup(), "");
    assert!(!adapter.delete_range(0, 1));
    assert!(!adapter.insert_at(0, "x"));
    assert!(!adapter.format_range(0, 1, "bold", "true"));
}

#[test]
fn test_rejected_structured_write_walks_text_nodes() {
    let mut adapter = EditorAdapter::new(Stubborn {
        inner: RichBuffer::from_plain("pedido"),
        refreshed: 0,
    });
    assert_eq!(adapter.access_path(), Some(AccessPath::Direct));
    assert!(adapter.insert_at(6, "s"));
    assert_eq!(adapter.plain_text(), "pedidos");
    assert_eq!(adapter.host().refreshed, 1);
    assert!(!adapter.format_range(0, 1, "bold", "true"));
}

#[test]
fn test_listeners_can_be_removed() {
    let mut adapter = EditorAdapter::new(RichBuffer::from_plain("abc"));
    let count = Rc::new(RefCell::new(0));
    let sink = Rc::clone(&count);
    let id = adapter.on_change(move |_| *sink.borrow_mut() += 1);

    adapter.notify(&ChangeEvent {
        source: ChangeSource::User,
        kind: ChangeKind::Text,
        offset: 0,
        removed: 0,
        inserted: 1,
    });
    assert!(adapter.remove_listener(id));
    assert!(!adapter.remove_listener(id));
    assert!(adapter.insert_at(0, "x"));
    assert_eq!(*count.borrow(), 1);
}
