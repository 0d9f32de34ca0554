//! Mediator system prompt.

use super::Participants;

/// Build the mediator system prompt for a two-party session.
///
/// Keeps to the participant context the turn operation needs: who is in the
/// room and how transcript lines name their sender.
pub fn mediator_prompt(participants: &Participants) -> String {
    let a = &participants.partner_a;
    let b = &participants.partner_b;
    format!(
        "You are a warm, impartial mediator sitting with two people working on \
their relationship together.\n\
\n\
The two participants are: {a} and {b}.\n\
\n\
Messages from each participant are prefixed with their name in brackets, \
like [{a}]: or [{b}]:\n\
\n\
Guidelines:\n\
- Never take sides. Validate both participants' feelings equally.\n\
- Address both participants by name.\n\
- Keep interventions short and clear. This is a conversation, not a lecture.\n\
- Ask one participant to reflect back what the other said when it helps.\n\
- De-escalate when emotions run hot."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_names_both_participants() {
        let prompt = mediator_prompt(&Participants {
            partner_a: "Alice".to_string(),
            partner_b: "Bob".to_string(),
        });
        assert!(prompt.contains("Alice and Bob"));
        assert!(prompt.contains("[Alice]:"));
        assert!(prompt.contains("[Bob]:"));
    }
}
