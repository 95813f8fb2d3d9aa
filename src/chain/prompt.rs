//! 프롬프트 템플릿

use std::sync::OnceLock;

use anyhow::{bail, Result};
use regex::Regex;

/// 기본 프롬프트 (컨텍스트 기반 학습 튜터)
pub const DEFAULT_PROMPT_TEMPLATE: &str = "You are a precise study tutor.

Use ONLY the information in the context to answer the question.
If the answer is not clearly in the context, say \"I don't know from this page.\"

Rules:
- Do NOT invent code that is not present in the context.
- Do NOT mix Java and JavaScript unless the context explicitly compares them.
- Do NOT paste long paragraphs; summarize in your own words.
- Answer concisely and exam-oriented.

Context:
{context}

Question:
{question}

Answer in 2–5 sentences, based only on the context above.";

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{(context|question)\}").expect("valid placeholder regex"))
}

/// `{context}` / `{question}` 치환 템플릿
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    /// 템플릿 생성 (두 플레이스홀더 모두 필수)
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        for placeholder in ["{context}", "{question}"] {
            if !template.contains(placeholder) {
                bail!("Prompt template is missing {}", placeholder);
            }
        }
        Ok(Self { template })
    }

    /// 한 번의 패스로 치환 (치환된 값 안의 중괄호는 다시 해석하지 않음)
    pub fn format(&self, context: &str, question: &str) -> String {
        placeholder_re()
            .replace_all(&self.template, |caps: &regex::Captures| match &caps[1] {
                "context" => context.to_string(),
                _ => question.to_string(),
            })
            .into_owned()
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            template: DEFAULT_PROMPT_TEMPLATE.to_string(),
        }
    }
}
