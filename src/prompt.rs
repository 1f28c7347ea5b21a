//! Llama 3's instruction format.

/// Embeds the prompt in the instruction template, marking the user turn and
/// the start of the assistant turn with the model's literal delimiter tokens.
pub fn llama3_instruct(prompt: &str) -> String {
    format!(
        "\n<|begin_of_text|><|start_header_id|>user<|end_header_id|>\n\
        {prompt}\n\
        <|eot_id|>\n\
        <|start_header_id|>assistant<|end_header_id|>\n"
    )
}
