//! 프롬프트 템플릿
//!
//! `{name}` 형태의 자리표시자를 값으로 치환합니다.
//! 치환된 값 안의 중괄호는 다시 해석하지 않습니다.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use anyhow::{bail, Result};
use regex::{Captures, Regex};

fn placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("Invalid regex"))
}

/// 프롬프트 템플릿
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    pub fn from_template(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// 템플릿에 등장하는 변수 이름 (정렬, 중복 제거)
    pub fn input_variables(&self) -> Vec<String> {
        placeholder()
            .captures_iter(&self.template)
            .map(|c| c[1].to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// 변수 치환
    ///
    /// 템플릿의 변수가 하나라도 빠져 있으면 에러입니다.
    pub fn format(&self, values: &[(&str, &str)]) -> Result<String> {
        let missing: Vec<String> = self
            .input_variables()
            .into_iter()
            .filter(|var| !values.iter().any(|(k, _)| *k == var.as_str()))
            .collect();

        if !missing.is_empty() {
            bail!("Missing prompt variables: {}", missing.join(", "));
        }

        let rendered = placeholder().replace_all(&self.template, |caps: &Captures<'_>| {
            values
                .iter()
                .find(|(k, _)| *k == &caps[1])
                .map(|(_, v)| v.to_string())
                .unwrap_or_default()
        });

        Ok(rendered.into_owned())
    }

    pub fn template(&self) -> &str {
        &self.template
    }
}

/// 검색된 컨텍스트가 관련 없을 때 모델이 답해야 하는 문장
pub const NO_CONTEXT_ANSWER: &str = "I don't have enough information to answer that question.";

/// 의료 질문용 프롬프트
///
/// 변수: `context`, `input`
pub fn create_medical_prompt() -> PromptTemplate {
    PromptTemplate::from_template(format!(
        "Answer the following medical question based only on the provided context.\n\
         Think step by step before providing a detailed answer.\n\
         If you do not find any relevant context, please say \"{NO_CONTEXT_ANSWER}\"\n\
         Focus on providing accurate medical information in a friendly, helpful tone.\n\
         Format any medical terms or important information in **bold**.\n\
         \n\
         <context>\n\
         {{context}}\n\
         </context>\n\
         \n\
         Question: {{input}}\n"
    ))
}
