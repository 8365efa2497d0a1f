//! Static knowledge-base documents injected into first-turn prompts.
//!
//! The documents are compiled into the binary and never change at runtime.
//! They are only ever included verbatim in the first turn of a session; later
//! turns rely on the upstream model's own conversation memory.

/// A long-form reference document with the banner title used when it is
/// spliced into a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceDocument {
    pub title: &'static str,
    pub body: &'static str,
}

pub const HEX_TECHNICAL_DOCUMENT: ReferenceDocument = ReferenceDocument {
    title: "HEX TECHNICAL DOCUMENT",
    body: include_str!("../knowledge/hex_technical_document.txt"),
};

pub const HEX_FINANCIAL_AUDIT: ReferenceDocument = ReferenceDocument {
    title: "HEX FINANCIAL AUDIT",
    body: include_str!("../knowledge/hex_financial_audit.txt"),
};

/// Preamble placed before the reference documents on a session's first turn.
pub const PRIMING_PREAMBLE: &str =
    "Based on the following documents, please answer my question.";

/// Banner separating the reference documents from the user's question.
pub const QUESTION_BANNER: &str = "--- MY QUESTION ---";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_are_non_empty() {
        assert!(HEX_TECHNICAL_DOCUMENT.body.contains("Time Deposit"));
        assert!(HEX_FINANCIAL_AUDIT.body.contains("CoinFabrik"));
    }
}
