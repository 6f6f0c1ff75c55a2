//! Fixed prompt templates and the sampling temperature used at each call site.

pub const CLASSIFICATION_TEMPERATURE: f32 = 0.7;
pub const ANALYSIS_TEMPERATURE: f32 = 0.7;
pub const CONVERSATION_TEMPERATURE: f32 = 0.7;

pub fn classification(user_text: &str) -> String {
    format!(
        r#"Analyze the following user input and determine the appropriate action.

User Input: {user_text}

Apply these rules in order:
1. If the input contains an incident number (format: INCxxxxxxx), this is an incident request.
2. If the input asks to search, find or recheck information, solutions or articles, this is a KB search request,
   for example "can you help me with rechecking the keywords like job failed, job error, job issue or schedule issue".
3. Otherwise this is general conversation that needs a friendly response.

Provide your analysis as a single JSON object with exactly these fields:
{{
    "action_type": "incident" | "kb_search" | "conversation",
    "incident_number": "INCxxxxxxx" (if found, else null),
    "search_keywords": "comma separated search terms" (if kb_search, else null),
    "conversation_context": "context for conversation" (if conversation, else null),
    "confidence": 0.0 to 1.0
}}

Example responses:
For incident: {{"action_type": "incident", "incident_number": "INC0000123", "search_keywords": null, "conversation_context": null, "confidence": 0.95}}
For KB search: {{"action_type": "kb_search", "incident_number": null, "search_keywords": "password reset procedure", "conversation_context": null, "confidence": 0.88}}
For conversation: {{"action_type": "conversation", "incident_number": null, "search_keywords": null, "conversation_context": "greeting and well-being inquiry", "confidence": 0.90}}

Return only the JSON object, with no text before or after it."#
    )
}

pub fn incident_analysis(incident_details: &str) -> String {
    format!(
        r#"Analyze these incident details and extract key points for KB article search:
{incident_details}

Provide a concise summary focusing on:
1. Main issue
2. Category/Impact
3. Key technical terms

Then provide short lowercase keywords (about two words each) for the KB article search,
comma separated on a single line after the heading shown below. Always use this exact format.

Sample output:
1. **Main issue:** USB port not working on PC
2. **Category/Impact:** Hardware issue, affecting PC functionality
3. **Key technical terms:** USB port, PC, hardware issue

**Searchable keywords for KB article search:**

keywords: "usb port", "usb not working", "pc hardware issue", "usb malfunction", "pc usb problem""#
    )
}

pub fn conversation(user_text: &str, conversation_context: &str) -> String {
    format!(
        r#"You are a friendly IT service desk assistant. You can look up ServiceNow incidents
by number (for example INC0000059) and search knowledge base articles for known errors
and workarounds.

Conversation context: {conversation_context}
User message: {user_text}

Reply briefly and helpfully. If the user seems to need support, invite them to share an
incident number or describe the problem so you can search the knowledge base."#
    )
}

#[cfg(test)]
mod tests {
    use deskpilot_core::keywords::KEYWORD_DELIMITER;

    use super::{classification, conversation, incident_analysis};

    #[test]
    fn classification_prompt_embeds_input_and_contract() {
        let prompt = classification("Process incident INC0000059");

        assert!(prompt.contains("User Input: Process incident INC0000059"));
        assert!(prompt.contains(r#""action_type": "incident" | "kb_search" | "conversation""#));
        assert!(prompt.contains(r#""confidence": 0.0 to 1.0"#));
    }

    #[test]
    fn analysis_prompt_requests_keyword_block() {
        let prompt = incident_analysis("Short Description: USB not working");

        assert!(prompt.contains("Short Description: USB not working"));
        assert!(prompt.contains(KEYWORD_DELIMITER));
        assert!(prompt.contains("keywords: \"usb port\""));
    }

    #[test]
    fn conversation_prompt_carries_context() {
        let prompt = conversation("hi", "greeting");
        assert!(prompt.contains("Conversation context: greeting"));
        assert!(prompt.contains("User message: hi"));
    }
}
