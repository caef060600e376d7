//! Recognition of the chat messages the assistant executes itself instead of forwarding.
//!
//! Two commands take two quoted arguments each: replace (`substitua "X" por "Y"`,
//! `replace "X" with "Y"`) and move (`mova o parágrafo "A" para depois de "B"`,
//! `move paragraph "A" before "B"`). Anything else is left to the language model. While a
//! replacement is waiting for the user to pick a candidate, the reply is read as a selection.

use regex::Regex;
use std::sync::LazyLock;

const QUOTE: &str = r#"["“”'‘’]"#;

static REPLACE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?is)^\s*(?:substitu(?:a|ir|i)|troque|trocar|altere|alterar|replace|change)\s+(?:o\s+texto\s+|a\s+palavra\s+|the\s+text\s+)?{QUOTE}(.+?){QUOTE}\s+(?:por|pelo|pela|with|by|to)\s+{QUOTE}(.*?){QUOTE}\s*[.!]?\s*$"
    ))
    .expect("valid replace pattern")
});

static MOVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?is)^\s*(?:mova|mover|move|transfira|transferir)\s+(?:o\s+|a\s+|the\s+)?(?:par[áa]grafo|se[çc][ãa]o|trecho|paragraph|section|text)?\s*{QUOTE}(.+?){QUOTE}\s+(para\s+depois\s+d[eoa]s?|depois\s+d[eoa]s?|ap[óo]s|para\s+antes\s+d[eoa]s?|antes\s+d[eoa]s?|after|before|to|para)\s+(?:o\s+|a\s+|the\s+)?(?:par[áa]grafo|se[çc][ãa]o|trecho|paragraph|section)?\s*{QUOTE}(.+?){QUOTE}\s*[.!]?\s*$"
    ))
    .expect("valid move pattern")
});

/// Where a moved block lands relative to its anchor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placement {
    /// Right after the anchor's last char.
    After,
    /// Right before the anchor's first char.
    Before,
}

/// A chat message the assistant executes directly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Replace `target` with `replacement`.
    Replace {
        /// Text to look for.
        target: String,
        /// Text to put in its place.
        replacement: String,
    },
    /// Move `source` next to `anchor`.
    Move {
        /// Text to move.
        source: String,
        /// Text the moved block is placed against.
        anchor: String,
        /// Which side of the anchor.
        placement: Placement,
    },
}

/// Reply to a "which occurrence?" question.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Selection {
    /// Every candidate.
    All,
    /// One candidate, 1-based.
    Index(usize),
    /// None of them; drop the pending operation.
    Cancel,
}

#[must_use]
/// Parse a replace or move command.
pub fn parse_command(input: &str) -> Option<Command> {
    if let Some(caps) = REPLACE.captures(input) {
        return Some(Command::Replace {
            target: caps[1].to_string(),
            replacement: caps[2].to_string(),
        });
    }
    let caps = MOVE.captures(input)?;
    let connective = caps[2].to_lowercase();
    let placement = if connective.contains("antes") || connective.contains("before") {
        Placement::Before
    } else {
        Placement::After
    };
    Some(Command::Move {
        source: caps[1].to_string(),
        anchor: caps[3].to_string(),
        placement,
    })
}

#[must_use]
/// Read a disambiguation reply against `count` candidates.
pub fn parse_selection(input: &str, count: usize) -> Option<Selection> {
    let answer = input
        .trim()
        .trim_end_matches(['.', '!'])
        .trim_start_matches('#')
        .trim()
        .to_lowercase();
    match answer.as_str() {
        "all" | "todas" | "todos" | "tudo" | "todas elas" => return Some(Selection::All),
        "cancel" | "cancelar" | "cancela" | "nenhuma" | "none" => return Some(Selection::Cancel),
        _ => {}
    }
    let index: usize = answer.parse().ok()?;
    (1..=count).contains(&index).then_some(Selection::Index(index))
}

#[cfg(test)]
#[path = "tests/commands.rs"]
mod tests;
