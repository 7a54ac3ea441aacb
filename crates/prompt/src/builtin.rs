//! Prompts shipped with Sage.

/// Answer prompt for the default persona.
pub const ANSWER_NORMAL: &str = "answer.normal";

/// Answer prompt for the mad-scientist persona.
pub const ANSWER_CRAZY_SCIENTIST: &str = "answer.crazy_scientist";

/// Language detection plus translation into the corpus language.
pub const LANGUAGE_DETECT: &str = "language.detect";

/// Translation into an arbitrary target language.
pub const LANGUAGE_TRANSLATE: &str = "language.translate";

const BUILTIN: [(&str, &str); 4] = [
    (ANSWER_NORMAL, include_str!("../prompts/answer.normal.yml")),
    (
        ANSWER_CRAZY_SCIENTIST,
        include_str!("../prompts/answer.crazy_scientist.yml"),
    ),
    (LANGUAGE_DETECT, include_str!("../prompts/language.detect.yml")),
    (
        LANGUAGE_TRANSLATE,
        include_str!("../prompts/language.translate.yml"),
    ),
];

/// YAML source of a built-in prompt.
pub fn builtin_source(prompt_id: &str) -> Option<&'static str> {
    BUILTIN
        .iter()
        .find(|(id, _)| *id == prompt_id)
        .map(|(_, source)| *source)
}

/// Ids of every built-in prompt.
pub fn builtin_ids() -> impl Iterator<Item = &'static str> {
    BUILTIN.iter().map(|(id, _)| *id)
}
