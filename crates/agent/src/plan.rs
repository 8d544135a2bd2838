//! Follow-up policy for answers that describe a plan instead of acting.

/// System message injected when a policy decides the model stopped at a plan.
pub const PLAN_FOLLOW_UP: &str = "You provided a plan. Now execute the necessary steps \
using the available tools. Do not describe what you will do; do it. \
Respond only with tool calls until data is gathered.";

/// Decides whether a tool-free answer should be pushed back to the model.
pub trait PlanFollowUpPolicy: Send + Sync {
    /// `content` is the model's answer; `tools_available` is false when the
    /// agent has nothing to call.
    fn should_follow_up(&self, content: &str, tools_available: bool) -> bool;

    fn message(&self) -> &str {
        PLAN_FOLLOW_UP
    }
}

/// Never follows up.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverFollowUp;

impl PlanFollowUpPolicy for NeverFollowUp {
    fn should_follow_up(&self, _content: &str, _tools_available: bool) -> bool {
        false
    }
}

/// Keyword matching on the answer text. All-lowercase keywords match
/// case-insensitively; any other keyword must match exactly.
#[derive(Debug, Clone)]
pub struct KeywordPlanPolicy {
    keywords: Vec<String>,
}

impl Default for KeywordPlanPolicy {
    fn default() -> Self {
        Self::new(["plan", "I'll ", "i will"])
    }
}

impl KeywordPlanPolicy {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keywords: keywords.into_iter().map(Into::into).collect(),
        }
    }
}

impl PlanFollowUpPolicy for KeywordPlanPolicy {
    fn should_follow_up(&self, content: &str, tools_available: bool) -> bool {
        if !tools_available {
            return false;
        }
        let lower = content.to_lowercase();
        self.keywords.iter().any(|k| {
            if k.chars().any(char::is_uppercase) {
                content.contains(k.as_str())
            } else {
                lower.contains(k.as_str())
            }
        })
    }
}
