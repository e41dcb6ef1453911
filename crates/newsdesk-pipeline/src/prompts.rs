//! Instructions and answer schemas for each generation stage.

use newsdesk_llm::PromptTemplate;

pub const NEWSWORTHINESS: PromptTemplate = PromptTemplate::new(
    r#"
You are a legal news editor. Read the court opinion and decide whether it is
newsworthy for a general audience. An opinion is newsworthy when it changes
how the law is applied, affects many people or businesses, or resolves a
question that lower courts disagree on. Classify its influence as "Global"
when its effect reaches beyond the parties and the deciding court's own
district, otherwise "Local". List any earlier opinions it relies on.
Answer with a single JSON object that follows the schema.
"#,
    r#"
{
  "type": "object",
  "properties": {
    "newsworthy": {"type": "string", "enum": ["True", "False"]},
    "influence": {"type": "string", "enum": ["Global", "Local"]},
    "reason": {"type": "string"},
    "opinions_cited": {"type": "array", "items": {"type": "string"}}
  },
  "required": ["newsworthy", "influence", "reason"]
}
"#,
);

pub const KEYPOINTS: PromptTemplate = PromptTemplate::new(
    r#"
Extract the key points of the court opinion: the parties, the question
presented, the holding, the reasoning, and the practical consequences.
Keep each point to one or two sentences. Answer with a single JSON object
that follows the schema.
"#,
    r#"
{
  "type": "object",
  "properties": {
    "parties": {"type": "string"},
    "question": {"type": "string"},
    "holding": {"type": "string"},
    "reasoning": {"type": "array", "items": {"type": "string"}},
    "consequences": {"type": "array", "items": {"type": "string"}}
  },
  "required": ["holding"]
}
"#,
);

pub const DRAFT: PromptTemplate = PromptTemplate::new(
    r#"
Write a news article about the court opinion for readers without legal
training. Lead with the outcome, explain why it matters, and stay faithful to
the key points provided. Also return up to ten keywords for the article.
Answer with a single JSON object that follows the schema.
"#,
    r#"
{
  "type": "object",
  "properties": {
    "news_article": {
      "type": "object",
      "properties": {
        "lede": {"type": "string"},
        "body": {"type": "string"}
      }
    },
    "keywords": {
      "type": "array",
      "items": {"type": "object", "properties": {"keyword": {"type": "string"}}}
    }
  },
  "required": ["news_article", "keywords"]
}
"#,
);

pub const ASSESS: PromptTemplate = PromptTemplate::new(
    r#"
You are reviewing a draft news article against the court opinion's key
points. Score each criterion from 0 to 10: accuracy, clarity, completeness,
neutrality, and readability. For any criterion scoring 8 or lower, give one
sentence of concrete feedback. Answer with a single JSON object that follows
the schema.
"#,
    r#"
{
  "type": "object",
  "properties": {
    "criteria": {
      "type": "object",
      "additionalProperties": {
        "type": "object",
        "properties": {
          "score": {"type": "number"},
          "feedback": {"type": "string"}
        },
        "required": ["score"]
      }
    }
  },
  "required": ["criteria"]
}
"#,
);

pub const REVISE: PromptTemplate = PromptTemplate::new(
    r#"
Rewrite the draft news article so that it addresses the reviewer's feedback
while staying faithful to the key points. Keep what already works. Return the
full revised article and its keywords. Answer with a single JSON object that
follows the schema.
"#,
    DRAFT.schema,
);

pub const HEADLINE: PromptTemplate = PromptTemplate::new(
    r#"
Write one headline for the news article: accurate, specific, and under
fourteen words. Do not use a question or a colon. Answer with a single JSON
object that follows the schema.
"#,
    r#"
{
  "type": "object",
  "properties": {
    "headline": {"type": "string"}
  },
  "required": ["headline"]
}
"#,
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schemas_are_valid_json() {
        for t in [NEWSWORTHINESS, KEYPOINTS, DRAFT, ASSESS, REVISE, HEADLINE] {
            let schema: serde_json::Value = serde_json::from_str(t.schema).unwrap();
            assert!(schema.get("properties").is_some());
        }
    }

    #[test]
    fn system_message_embeds_schema() {
        let msg = HEADLINE.system_message();
        assert!(msg.starts_with("User Requirement:\nWrite one headline"));
        assert!(msg.contains("```json\n{"));
    }
}
