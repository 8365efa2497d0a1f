//! The persona table: one enumerated variant per assistant skin.
//!
//! Each persona is a closed bundle of behavior data (system instruction,
//! greeting, theme tokens, web-search capability, knowledge pack). Lookup is
//! total: an unrecognized or absent key always resolves to the default
//! persona, never to a missing instruction.

use serde::Serialize;

use crate::knowledge::{ReferenceDocument, HEX_FINANCIAL_AUDIT, HEX_TECHNICAL_DOCUMENT};

/// Visual theme tokens carried by a persona. Rendering of these tokens is a
/// front-end concern; the proxy only ships them around as data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Theme {
    pub accent: &'static str,
    pub icon: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Persona {
    DefaultAssistant,
    ContractAuditor,
    PositivityCoach,
    SafetyCoach,
}

const DEFAULT_ASSISTANT_INSTRUCTION: &str = "You are an expert AI assistant specializing in the cryptocurrencies HEX (HEX.com) and PulseChain (PulseChain.com). Your core knowledge will come from the documents provided in the first message. Always maintain a positive and helpful tone. You must not give any financial advice, investment recommendations, or price predictions. Your primary goal is to be an enthusiastic and knowledgeable guide to the world of HEX and PulseChain.";

const CONTRACT_AUDITOR_INSTRUCTION: &str = "You are a professional Solidity smart contract security auditor. Review the contract code provided by the user and produce a structured security audit: summarize the contract's purpose, then list findings ordered by severity, labelling each finding with exactly one of [Critical], [High], [Medium], [Low] or [Informational]. For every finding explain the vulnerable pattern, the attack scenario, and a concrete remediation. Be precise and avoid speculation about code you have not seen.";

const POSITIVITY_COACH_INSTRUCTION: &str = "You are a supportive positive-psychology coach. The user will share negative thoughts, worries, or concerns. Acknowledge the feeling, then help reframe it into a constructive, realistic, and more positive perspective. Keep responses warm and encouraging. You are not a therapist and must not give medical or clinical advice; suggest professional help when a message indicates serious distress.";

const SAFETY_COACH_INSTRUCTION: &str = "You are a friendly digital safety companion. Help the user with password security, phishing detection, social media safety, online privacy protection, and cybersecurity best practices. Give practical, step-by-step guidance that a non-technical person can follow. Never assist with attacking, defrauding, or surveilling other people.";

impl Persona {
    pub const ALL: [Persona; 4] = [
        Persona::DefaultAssistant,
        Persona::ContractAuditor,
        Persona::PositivityCoach,
        Persona::SafetyCoach,
    ];

    /// Look up a persona by its wire key. Returns `None` for unknown keys;
    /// callers that want the fallback behavior use [`Persona::from_key_or_default`].
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "hex" => Some(Persona::DefaultAssistant),
            "solidity" => Some(Persona::ContractAuditor),
            "positive" => Some(Persona::PositivityCoach),
            "safety" => Some(Persona::SafetyCoach),
            _ => None,
        }
    }

    /// Total lookup: absent or unrecognized keys resolve to the default
    /// persona.
    pub fn from_key_or_default(key: Option<&str>) -> Self {
        key.and_then(Persona::from_key)
            .unwrap_or(Persona::DefaultAssistant)
    }

    pub fn key(&self) -> &'static str {
        match self {
            Persona::DefaultAssistant => "hex",
            Persona::ContractAuditor => "solidity",
            Persona::PositivityCoach => "positive",
            Persona::SafetyCoach => "safety",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Persona::DefaultAssistant => "HEX & PulseChain Assistant",
            Persona::ContractAuditor => "Solidity Security Auditor",
            Persona::PositivityCoach => "Positive Vibes Coach",
            Persona::SafetyCoach => "Staying Safe AI",
        }
    }

    /// System instruction sent upstream for every turn of this persona.
    pub fn instruction(&self) -> &'static str {
        match self {
            Persona::DefaultAssistant => DEFAULT_ASSISTANT_INSTRUCTION,
            Persona::ContractAuditor => CONTRACT_AUDITOR_INSTRUCTION,
            Persona::PositivityCoach => POSITIVITY_COACH_INSTRUCTION,
            Persona::SafetyCoach => SAFETY_COACH_INSTRUCTION,
        }
    }

    /// Greeting shown by front-ends before the first user message. Uses the
    /// same markdown subset the responses use.
    pub fn greeting(&self) -> &'static str {
        match self {
            Persona::DefaultAssistant => "Hello! I am an AI assistant with knowledge about HEX and PulseChain, based on the official technical documentation. How can I help you understand the HEX smart contract today?",
            Persona::ContractAuditor => "🔍 **Solidity Security Auditor**\n\nPaste a smart contract and I will review it for vulnerabilities, with findings classified from [Critical] down to [Informational].",
            Persona::PositivityCoach => "✨ **Positive Vibes Only**\n\nI'm here to help transform negative thoughts into positive perspectives! Share any negative thoughts, worries, or concerns you have, and I'll help you see them in a more positive light.",
            Persona::SafetyCoach => "🛡️ **Staying Safe AI**\n\nI'm your digital safety companion! I can help you with:\n• Password security tips\n• Phishing detection\n• Social media safety\n• Online privacy protection\n• Cybersecurity best practices\n\nWhat safety topic would you like to discuss?",
        }
    }

    pub fn theme(&self) -> Theme {
        match self {
            Persona::DefaultAssistant => Theme {
                accent: "#ff3d8b",
                icon: "⬢",
            },
            Persona::ContractAuditor => Theme {
                accent: "#4f8cff",
                icon: "🔍",
            },
            Persona::PositivityCoach => Theme {
                accent: "#ffc247",
                icon: "✨",
            },
            Persona::SafetyCoach => Theme {
                accent: "#3ecf6e",
                icon: "🛡️",
            },
        }
    }

    /// Whether turns for this persona request the upstream provider's live
    /// web-search capability.
    pub fn web_search(&self) -> bool {
        matches!(self, Persona::DefaultAssistant | Persona::SafetyCoach)
    }

    /// Reference documents spliced into this persona's first-turn prompt.
    pub fn knowledge(&self) -> &'static [ReferenceDocument] {
        match self {
            Persona::DefaultAssistant => &[HEX_TECHNICAL_DOCUMENT, HEX_FINANCIAL_AUDIT],
            _ => &[],
        }
    }
}

impl Default for Persona {
    fn default() -> Self {
        Persona::DefaultAssistant
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_keys_round_trip() {
        for persona in Persona::ALL {
            assert_eq!(Persona::from_key(persona.key()), Some(persona));
        }
    }

    #[test]
    fn unknown_and_absent_keys_fall_back_to_default() {
        assert_eq!(
            Persona::from_key_or_default(Some("quantum")),
            Persona::DefaultAssistant
        );
        assert_eq!(Persona::from_key_or_default(None), Persona::DefaultAssistant);
    }

    #[test]
    fn every_persona_has_a_non_empty_instruction() {
        for persona in Persona::ALL {
            assert!(!persona.instruction().is_empty());
            assert!(!persona.greeting().is_empty());
        }
    }

    #[test]
    fn only_the_default_persona_carries_the_reference_documents() {
        assert_eq!(Persona::DefaultAssistant.knowledge().len(), 2);
        assert!(Persona::ContractAuditor.knowledge().is_empty());
        assert!(Persona::PositivityCoach.knowledge().is_empty());
        assert!(Persona::SafetyCoach.knowledge().is_empty());
    }
}
