//! Assembly of the instruction payload for one turn.
//!
//! The simple variant sends the persona as a system message and the conversation as the
//! user message. The phased variant folds everything into a single user input: persona,
//! search directions, the anti-repetition block, the recent window, the phase instruction
//! and a closing directive.
use crate::roundtable::client_wrapper::Message;
use crate::roundtable::participant::Participant;

/// Everything that varies from turn to turn.
#[derive(Clone, Debug)]
pub struct TurnPrompt<'a> {
    pub participant: &'a Participant,
    /// Rendered transcript view.
    pub context: &'a str,
    /// Anti-repetition block; empty when there is none.
    pub constraint: &'a str,
    /// Active phase instruction; empty when phases are not used.
    pub phase_instruction: &'a str,
}

/// `system: persona`, `user: conversation so far, speak as <name>`.
pub fn simple_messages(prompt: &TurnPrompt<'_>) -> Vec<Message> {
    vec![
        Message::system(&prompt.participant.persona_instructions),
        Message::user(format!(
            "Conversation so far:\n{}\n\nSpeak as {}:",
            prompt.context, prompt.participant.name
        )),
    ]
}

/// Single combined input for the phased loop.
pub fn phased_messages(prompt: &TurnPrompt<'_>) -> Vec<Message> {
    let participant = prompt.participant;
    let mut input = String::new();
    input.push_str(participant.persona_instructions.trim_end());
    input.push('\n');

    if !participant.search_affinity.is_empty() {
        input.push_str("\n[Search directions]\n");
        for topic in &participant.search_affinity {
            input.push_str("- ");
            input.push_str(topic);
            input.push('\n');
        }
    }

    if !prompt.constraint.is_empty() {
        input.push('\n');
        input.push_str(prompt.constraint);
        input.push('\n');
    }

    input.push_str("===== Conversation (recent turns) =====\n");
    input.push_str(prompt.context);
    input.push_str("\n\n");

    if !prompt.phase_instruction.is_empty() {
        input.push_str("[Current phase instruction]\n");
        input.push_str(prompt.phase_instruction);
        input.push_str("\n\n");
    }

    input.push_str(&format!("Speak as {}.\n", participant.name));
    input.push_str("Important: bring new information or a new point that has not been discussed yet.\n");
    input.push_str("Do not restate what was already said.\n");
    input.push_str("Keep your reply to 3-6 sentences.\n");

    vec![Message::user(input)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roundtable::client_wrapper::Role;

    #[test]
    fn test_simple_prompt_shape() {
        let participant = Participant::new("Engineer", "You are an engineer.");
        let messages = simple_messages(&TurnPrompt {
            participant: &participant,
            context: "System: Slopes",
            constraint: "",
            phase_instruction: "",
        });
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(
            &*messages[1].content,
            "Conversation so far:\nSystem: Slopes\n\nSpeak as Engineer:"
        );
    }

    #[test]
    fn test_phased_prompt_orders_sections() {
        let participant = Participant::new("Ecologist", "You are an ecologist.")
            .with_search_affinity(vec!["NbS cases"]);
        let messages = phased_messages(&TurnPrompt {
            participant: &participant,
            context: "Engineer: walls",
            constraint: "[No repetition] walls",
            phase_instruction: "[Phase 2] debate",
        });
        assert_eq!(messages.len(), 1);
        let input = &*messages[0].content;
        let persona = input.find("You are an ecologist.").unwrap();
        let search = input.find("- NbS cases").unwrap();
        let constraint = input.find("[No repetition]").unwrap();
        let context = input.find("Engineer: walls").unwrap();
        let phase = input.find("[Phase 2] debate").unwrap();
        let closing = input.find("Speak as Ecologist.").unwrap();
        assert!(persona < search && search < constraint && constraint < context);
        assert!(context < phase && phase < closing);
        assert!(input.contains("3-6 sentences"));
    }
}
