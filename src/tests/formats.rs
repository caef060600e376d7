use super::html::{decode_entities, escape, HtmlFormat};
use super::markdown::MarkdownFormat;
use super::{extract_sections, for_kind, MarkupKind};
use crate::offsets::byte_to_char;

fn char_offset(text: &str, needle: &str) -> usize {
    byte_to_char(text, text.find(needle).unwrap())
}

#[test]
fn test_html_sections_with_bodies() {
    let markup = "<h1>Petição Inicial</h1><p>Dos fatos.</p>\
                  <h2>Dos Fatos</h2><p>O autor alega.</p><p>Segundo.</p>\
                  <h2>Do Direito</h2><p><br></p>";
    let plain = "Petição Inicial\nDos fatos.\nDos Fatos\nO autor alega.\nSegundo.\nDo Direito\n";

    let sections = extract_sections(&HtmlFormat, markup, plain);
    assert_eq!(sections.len(), 3);

    assert_eq!(sections[0].title, "Petição Inicial");
    assert_eq!(sections[0].level, 1);
    assert_eq!(sections[0].offset, 0);
    assert_eq!(sections[0].body, "Dos fatos.");

    assert_eq!(sections[1].title, "Dos Fatos");
    assert_eq!(sections[1].level, 2);
    assert_eq!(sections[1].offset, 27);
    assert_eq!(sections[1].body, "O autor alega.\nSegundo.");

    assert_eq!(sections[2].title, "Do Direito");
    assert_eq!(sections[2].offset, char_offset(plain, "Do Direito"));
    assert_eq!(sections[2].body, "");
}

#[test]
fn test_html_heading_markup_is_stripped() {
    let markup = "<h3>Da <strong>Tutela</strong> &amp; Urgência</h3>";
    let plain = "Da Tutela & Urgência";
    let sections = extract_sections(&HtmlFormat, markup, plain);
    assert_eq!(sections.len(), 1);
    assert_eq!(sections[0].title, "Da Tutela & Urgência");
    assert_eq!(sections[0].level, 3);
    assert_eq!(sections[0].title_end(), 20);
}

#[test]
fn test_repeated_titles_bind_to_their_own_occurrence() {
    let markup = "<h2>Pedidos</h2><p>a</p><h2>Pedidos</h2><p>b</p>";
    let plain = "Pedidos\na\nPedidos\nb";
    let sections = extract_sections(&HtmlFormat, markup, plain);
    let offsets: Vec<usize> = sections.iter().map(|s| s.offset).collect();
    assert_eq!(offsets, vec![0, 10]);
    assert_eq!(sections[1].body, "b");
}

#[test]
fn test_document_without_headings() {
    let sections = extract_sections(&HtmlFormat, "<p>Só texto.</p>", "Só texto.");
    assert!(sections.is_empty());
    assert!(extract_sections(&HtmlFormat, "", "").is_empty());
}

#[test]
fn test_markdown_sections() {
    let text = "# Contrato\n\nIntrodução.\n\n## Cláusula Primeira\n\nDo objeto.\n";
    let sections = extract_sections(&MarkdownFormat, text, text);
    assert_eq!(sections.len(), 2);
    assert_eq!(sections[0].title, "Contrato");
    assert_eq!(sections[0].level, 1);
    assert_eq!(sections[0].offset, 2);
    assert_eq!(sections[0].body, "Introdução.");
    assert_eq!(sections[1].title, "Cláusula Primeira");
    assert_eq!(sections[1].level, 2);
    assert_eq!(sections[1].offset, char_offset(text, "Cláusula Primeira"));
    assert_eq!(sections[1].body, "Do objeto.");
}

#[test]
fn test_for_kind_picks_grammar() {
    let html = for_kind(MarkupKind::Html);
    let sections = extract_sections(html.as_ref(), "<h1>A</h1>", "A");
    assert_eq!(sections.len(), 1);

    let md = for_kind(MarkupKind::Markdown);
    let sections = extract_sections(md.as_ref(), "# A\n", "A");
    assert_eq!(sections.len(), 1);
    assert_eq!(sections[0].offset, 0);
}

#[test]
fn test_escape_and_decode() {
    let raw = r#"a < b & "c" > d"#;
    let escaped = escape(raw);
    assert_eq!(escaped, "a &lt; b &amp; &quot;c&quot; &gt; d");
    assert_eq!(decode_entities(&escaped), raw);
    assert_eq!(decode_entities("&amp;lt;"), "&lt;");
}
