use crate::evaluation::EvaluationRequest;

/// Instruction sent with every provider call. The provider must answer with a JSON
/// object carrying at least `score` and `status`.
pub fn build_prompt(request: &EvaluationRequest) -> String {
    let mut prompt = format!(
        "You are grading a {difficulty} {language} learner.\n\
         Exercise context: {context}\n\
         Learner answer: {text}\n",
        difficulty = request.difficulty.as_str(),
        language = request.target_language.trim(),
        context = request.context.trim(),
        text = request.text.trim(),
    );
    if let Some(page) = request.page_context {
        prompt.push_str(&format!("Practice mode: {}\n", page.as_str()));
    }
    prompt.push_str(
        "Reply with JSON only: {\"score\": 0-100, \"status\": \"correct\"|\"close\"|\"wrong\", \
         \"confidence\": 0.0-1.0, \"feedback\": \"one or two short sentences for the learner\"}",
    );
    prompt
}
