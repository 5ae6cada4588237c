use colloquy_core::Window;

/// System message for chat-style providers.
pub const SYSTEM_PROMPT: &str =
    "You are an expert AI assistant providing strategic analysis and insights.";

/// Renders the advisory prompt for one window.
///
/// Messages appear as `Speaker: text` lines in window order, so identical
/// windows always produce identical prompts.
pub fn build_prompt(window: &Window) -> String {
    format!(
        r#"You are Quen, an AI assistant providing strategic advice to Relationship Managers (RMs) based on real-time conversation analysis.

The following is a conversation between a Relationship Manager and a Customer:

{transcript}

Your role is to analyze this conversation and provide strategic guidance to the RM. You are NOT participating in the conversation directly - you are advising the RM on how to proceed.

Based on your analysis, provide:
1. Strategic advice to the RM on how to respond or proceed
2. Cognitive analysis of the conversation dynamics

Please provide your response in this exact JSON format:
{{
  "response": "Strategic advice to the RM: [Your specific guidance on how the RM should respond or proceed]",
  "analysis": {{
    "customer_intent": "What the customer is trying to achieve",
    "rm_strategy": "Recommended strategy for the RM",
    "urgency_level": "low/medium/high",
    "emotion": "Customer's emotional state",
    "next_action": "What the RM should do next"
  }}
}}

Remember: You are advising the RM, not participating in the conversation directly."#,
        transcript = window.transcript()
    )
}
