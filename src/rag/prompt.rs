//! Prompt assembly: combine retrieved fragments and the question into a
//! bounded instruction for the completion endpoint.

use super::store::ScoredFragment;

/// Delimiter between fragments, unambiguous enough for the model to see
/// fragment boundaries.
const FRAGMENT_DELIMITER: &str = "\n\n---\n\n";

const SYSTEM_INSTRUCTION: &str = "You are a helpful assistant. Answer the user's question based \
only on the following context. If the answer is not in the context, say \"I do not know\".";

#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Concatenates fragments in retrieval order, then appends the literal
/// question. Context-length budgeting, if any, is the completion
/// gateway's concern, not this function's.
pub fn assemble(question: &str, fragments: &[ScoredFragment]) -> Prompt {
    let context = fragments
        .iter()
        .map(|f| f.text.as_str())
        .collect::<Vec<_>>()
        .join(FRAGMENT_DELIMITER);

    let user = format!(
        "Context:\n{}{}User Question: {}",
        context, FRAGMENT_DELIMITER, question
    );

    Prompt {
        system: SYSTEM_INSTRUCTION.to_string(),
        user,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(text: &str) -> ScoredFragment {
        ScoredFragment {
            text: text.to_string(),
            score: 0.9,
        }
    }

    #[test]
    fn fragments_appear_in_retrieval_order() {
        let prompt = assemble("why?", &[fragment("first"), fragment("second")]);
        let first = prompt.user.find("first").unwrap();
        let second = prompt.user.find("second").unwrap();
        assert!(first < second);
        assert!(prompt.user.contains("---"));
    }

    #[test]
    fn question_is_appended_verbatim() {
        let prompt = assemble("What color is grass?", &[fragment("Grass is green.")]);
        assert!(prompt.user.ends_with("User Question: What color is grass?"));
    }

    #[test]
    fn system_instruction_pins_refusal_sentinel() {
        let prompt = assemble("q", &[]);
        assert!(prompt.system.contains("I do not know"));
        assert!(prompt.system.contains("only on the following context"));
    }
}
