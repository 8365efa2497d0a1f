//! Markdown-subset to HTML rendering for model responses.
//!
//! The transform is a fixed pipeline of named rules applied in order over the
//! whole string; later rules operate on the output of earlier ones, which is
//! what gives the spacing rules their cross-line effect. There is no escaping
//! mechanism: literal `*` or `•` characters in model output are interpreted
//! as markup.
//!
//! The pipeline is not idempotent (re-running it over produced HTML would
//! double up the spacing rules), so single application is enforced by type:
//! [`render`] consumes raw model text and returns [`RenderedHtml`], which no
//! rendering API accepts as input.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

/// HTML produced by [`render`]. Deliberately opaque: the only way to obtain
/// one is to run the pipeline over raw text exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedHtml(String);

impl RenderedHtml {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for RenderedHtml {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

type RuleFn = fn(&str) -> String;

struct Rule {
    name: &'static str,
    apply: RuleFn,
}

/// The rules, in application order. Order is load-bearing: `em_spans` must
/// run after `strong_spans`, the list rules after `line_breaks`, and the
/// spacing rules last.
const RULES: &[Rule] = &[
    Rule { name: "line_breaks", apply: line_breaks },
    Rule { name: "strong_spans", apply: strong_spans },
    Rule { name: "em_spans", apply: em_spans },
    Rule { name: "bullet_items", apply: bullet_items },
    Rule { name: "wrap_lists", apply: wrap_lists },
    Rule { name: "merge_lists", apply: merge_lists },
    Rule { name: "severity_badges", apply: severity_badges },
    Rule { name: "space_before_strong", apply: space_before_strong },
    Rule { name: "space_after_strong", apply: space_after_strong },
];

/// Run the full pipeline over raw model text.
pub fn render(text: &str) -> RenderedHtml {
    let mut current = text.to_string();
    for rule in RULES {
        current = (rule.apply)(&current);
        log::trace!("render rule {} -> {} bytes", rule.name, current.len());
    }
    RenderedHtml(current)
}

/// Every literal newline becomes a `<br>`.
fn line_breaks(input: &str) -> String {
    input.replace('\n', "<br>")
}

fn strong_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\*\*(.*?)\*\*").expect("strong span pattern"))
}

/// Every `**X**` span becomes `<strong>X</strong>`, non-greedy and
/// leftmost-first.
fn strong_spans(input: &str) -> String {
    strong_re().replace_all(input, "<strong>$1</strong>").into_owned()
}

fn em_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\*(.*?)\*").expect("em span pattern"))
}

/// Every remaining `*X*` span becomes `<em>X</em>`. Runs after
/// [`strong_spans`] so double-asterisk pairs are already consumed.
fn em_spans(input: &str) -> String {
    em_re().replace_all(input, "<em>$1</em>").into_owned()
}

/// Every `<br>`-delimited segment beginning with `•` becomes a list item,
/// with the marker and any following whitespace stripped.
fn bullet_items(input: &str) -> String {
    input
        .split("<br>")
        .map(|segment| match segment.strip_prefix('•') {
            Some(rest) => format!("<li>{}</li>", rest.trim_start()),
            None => segment.to_string(),
        })
        .collect::<Vec<_>>()
        .join("<br>")
}

/// Each maximal run of list items separated by single `<br>`s is wrapped in
/// one `<ul>`, dropping the separators inside the run.
fn wrap_lists(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_list = false;
    for (index, segment) in input.split("<br>").enumerate() {
        let is_item = segment.starts_with("<li>") && segment.ends_with("</li>");
        if is_item {
            if !in_list {
                if index > 0 {
                    out.push_str("<br>");
                }
                out.push_str("<ul>");
                in_list = true;
            }
            out.push_str(segment);
        } else {
            if in_list {
                out.push_str("</ul>");
                in_list = false;
            }
            if index > 0 {
                out.push_str("<br>");
            }
            out.push_str(segment);
        }
    }
    if in_list {
        out.push_str("</ul>");
    }
    out
}

/// Directly adjacent list containers collapse into one.
fn merge_lists(input: &str) -> String {
    input.replace("</ul><ul>", "")
}

const SEVERITY_BADGES: &[(&str, &str)] = &[
    ("[Critical]", "severity-critical"),
    ("[High]", "severity-high"),
    ("[Medium]", "severity-medium"),
    ("[Low]", "severity-low"),
    ("[Informational]", "severity-info"),
];

/// Audit severity labels gain a styling span; the label text is preserved.
fn severity_badges(input: &str) -> String {
    let mut out = input.to_string();
    for (label, class) in SEVERITY_BADGES {
        let replacement = format!("<span class=\"{class}\">{label}</span>");
        out = out.replace(label, &replacement);
    }
    out
}

/// A line break immediately before a strong opening gains one extra break.
fn space_before_strong(input: &str) -> String {
    input.replace("<br><strong>", "<br><br><strong>")
}

/// A strong closing immediately before a line break gains one extra break.
fn space_after_strong(input: &str) -> String {
    input.replace("</strong><br>", "</strong><br><br>")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_breaks_rule() {
        assert_eq!(line_breaks("a\nb\n"), "a<br>b<br>");
    }

    #[test]
    fn strong_spans_are_non_greedy() {
        assert_eq!(
            strong_spans("**a** and **b**"),
            "<strong>a</strong> and <strong>b</strong>"
        );
    }

    #[test]
    fn em_spans_leave_converted_strong_spans_alone() {
        let after_strong = strong_spans("**bold** and *em*");
        assert_eq!(
            em_spans(&after_strong),
            "<strong>bold</strong> and <em>em</em>"
        );
    }

    #[test]
    fn bullet_items_strip_marker_and_whitespace() {
        assert_eq!(
            bullet_items("•  First<br>plain<br>• Second"),
            "<li>First</li><br>plain<br><li>Second</li>"
        );
    }

    #[test]
    fn wrap_lists_wraps_a_run_in_one_container() {
        assert_eq!(
            wrap_lists("<li>A</li><br><li>B</li>"),
            "<ul><li>A</li><li>B</li></ul>"
        );
    }

    #[test]
    fn wrap_lists_keeps_surrounding_text() {
        assert_eq!(
            wrap_lists("Intro:<br><li>A</li><br><li>B</li><br>Outro"),
            "Intro:<br><ul><li>A</li><li>B</li></ul><br>Outro"
        );
    }

    #[test]
    fn merge_lists_collapses_adjacent_containers() {
        assert_eq!(
            merge_lists("<ul><li>A</li></ul><ul><li>B</li></ul>"),
            "<ul><li>A</li><li>B</li></ul>"
        );
    }

    #[test]
    fn severity_badges_wrap_known_labels() {
        assert_eq!(
            severity_badges("[High] Reentrancy"),
            "<span class=\"severity-high\">[High]</span> Reentrancy"
        );
    }

    #[test]
    fn spacing_rules_insert_extra_breaks() {
        assert_eq!(
            space_before_strong("a<br><strong>b</strong>"),
            "a<br><br><strong>b</strong>"
        );
        assert_eq!(
            space_after_strong("<strong>b</strong><br>c"),
            "<strong>b</strong><br><br>c"
        );
    }

    #[test]
    fn pipeline_renders_heading_followed_by_text() {
        let html = render("**Overview**\nText");
        assert_eq!(html.as_str(), "<strong>Overview</strong><br><br>Text");
    }

    #[test]
    fn pipeline_balanced_markers_never_survive() {
        let html = render("**bold** then *soft*");
        assert!(!html.as_str().contains('*'));
        assert!(html.as_str().contains("<strong>bold</strong>"));
        assert!(html.as_str().contains("<em>soft</em>"));
    }

    #[test]
    fn pipeline_two_bullets_share_one_container() {
        let html = render("• A\n• B");
        assert_eq!(html.as_str(), "<ul><li>A</li><li>B</li></ul>");
        assert_eq!(html.as_str().matches("<ul>").count(), 1);
    }

    #[test]
    fn pipeline_bullets_between_paragraphs() {
        let html = render("Topics:\n• Passwords\n• Phishing\nAsk away");
        assert_eq!(
            html.as_str(),
            "Topics:<br><ul><li>Passwords</li><li>Phishing</li></ul><br>Ask away"
        );
    }

    #[test]
    fn pipeline_blank_line_breaks_a_run_into_two_merged_containers() {
        let html = render("• A\n\n• B");
        // The empty segment splits the run; the merge rule only collapses
        // directly adjacent containers, so the break survives between them.
        assert_eq!(
            html.as_str(),
            "<ul><li>A</li></ul><br><br><ul><li>B</li></ul>"
        );
    }

    #[test]
    fn pipeline_severity_labels_inside_audit_output() {
        let html = render("**Findings**\n• [Critical] Reentrancy in withdraw()");
        assert!(html
            .as_str()
            .contains("<span class=\"severity-critical\">[Critical]</span>"));
        assert!(html.as_str().contains("<ul><li>"));
    }

    #[test]
    fn empty_input_renders_empty() {
        assert_eq!(render("").as_str(), "");
    }
}
