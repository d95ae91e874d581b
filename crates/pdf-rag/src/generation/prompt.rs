//! Prompt templates for grounded answer generation

/// Prompt builder for RAG queries
pub struct PromptBuilder;

impl PromptBuilder {
    /// Build the grounded question-answering prompt
    ///
    /// `context` is the assembled block list; the model is told to answer
    /// from it alone and to say so when it cannot.
    pub fn build_rag_prompt(question: &str, context: &str) -> String {
        format!(
            "Answer the question based only on the following context from PDF documents.\n\
             If the answer cannot be found in the context, say so.\n\
             \n\
             Context:\n\
             {context}\n\
             \n\
             Question: {question}\n\
             \n\
             Answer:",
            context = context,
            question = question.trim()
        )
    }
}
