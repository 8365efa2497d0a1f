//! Prompt composition for one chat turn.
//!
//! The composed prompt is a fixed concatenation: on a session's first turn
//! the priming preamble, each of the persona's reference documents under its
//! banner, and the user's question, in that order; on later turns the user's
//! message alone. Continuity across turns is the upstream model's concern.

use crate::core_types::Message;
use crate::knowledge::{PRIMING_PREAMBLE, QUESTION_BANNER};
use crate::persona::Persona;

/// Build the message vector for one upstream call: the persona's system
/// instruction followed by the (possibly primed) user content.
pub fn compose_turn(persona: Persona, message: &str, first_turn: bool) -> Vec<Message> {
    vec![
        Message::system(persona.instruction()),
        Message::user(compose_user_content(persona, message, first_turn)),
    ]
}

fn compose_user_content(persona: Persona, message: &str, first_turn: bool) -> String {
    let documents = persona.knowledge();
    if !first_turn || documents.is_empty() {
        return message.to_string();
    }

    let mut content = String::from(PRIMING_PREAMBLE);
    for document in documents {
        content.push_str("\n\n--- ");
        content.push_str(document.title);
        content.push_str(" ---\n");
        content.push_str(document.body);
    }
    content.push_str("\n\n");
    content.push_str(QUESTION_BANNER);
    content.push('\n');
    content.push_str(message);
    content
}
