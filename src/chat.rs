//! Chat-assisted data entry.
//!
//! Each user message gets a conversational reply, then the whole transcript
//! is sent once more with a fixed instruction asking for the Résumé Document
//! as JSON. Whatever parses is merged into the running draft. A reply that
//! does not parse leaves the draft exactly as it was and sets a soft warning
//! instead of failing the turn.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::llm::{ChatModel, CompletionParams, LlmError, Message, Role};
use crate::resume::{
    null_as_default, Certification, Education, PersonalInfo, Project, Resume, Skills,
    WorkExperience,
};
use crate::templates::TemplateKind;

const SYSTEM_PROMPT: &str = "You are a friendly CV assistant. Collect the user's name, \
contact details, professional summary, work experience, skills, education and preferred \
template, asking one or two questions at a time. Never show JSON or code.";

const GREETING: &str = "Hi! I'll help you put your CV together. \
Let's start with the basics: what's your name, and what do you do?";

const WELCOME_BACK: &str = "Welcome back! Let's pick up where we left off.";

const EXTRACTION_PROMPT: &str = "Extract the CV details from the conversation below as a \
single JSON object with the keys personalInfo, workExperience, skills (technical, soft, \
languages), education, certifications, projects and selectedTemplate. Include only \
details that were actually mentioned. Skill levels are integers from 1 to 5. \
selectedTemplate is one of modern, classic, creative, tech, nature, design. \
Reply with JSON only.";

/// Soft warning surfaced when a turn yielded nothing usable.
pub const EXTRACTION_WARNING: &str = "I couldn't read any new details from that reply.";

const FALLBACK_REPLY: &str = "Sorry, something went wrong. Could you say that again?";

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("conversation failed: {0}")]
    Llm(#[from] LlmError),
}

/// Which part of the CV the conversation is collecting next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    Personal,
    Contact,
    Summary,
    Experience,
    Skills,
    Education,
    Template,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationState {
    pub messages: Vec<Message>,
    /// Everything confirmed so far.
    pub draft: Resume,
    /// Set once the model has named a template.
    pub template_chosen: bool,
    pub completed: bool,
    pub current_step: Step,
    /// Soft warning for the last turn, if extraction degraded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl ConversationState {
    /// Fresh conversation opened by the assistant's greeting.
    pub fn start() -> Self {
        Self {
            messages: vec![Message::assistant(GREETING)],
            draft: Resume::default(),
            template_chosen: false,
            completed: false,
            current_step: Step::Personal,
            warning: None,
        }
    }

    /// Continue from a previously saved draft. Step and completion are
    /// derived from the draft rather than restarted.
    pub fn resume(draft: Resume) -> Self {
        let mut state = Self {
            messages: vec![Message::assistant(WELCOME_BACK)],
            draft,
            template_chosen: false,
            completed: false,
            current_step: Step::Personal,
            warning: None,
        };
        state.refresh();
        state
    }

    /// Recompute completion and the current step from the draft.
    pub fn refresh(&mut self) {
        self.completed = is_complete(&self.draft);
        self.current_step = current_step(&self.draft, self.template_chosen);
    }
}

/// The part of a Résumé Document a model reply carried.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResumePatch {
    #[serde(deserialize_with = "null_as_default")]
    pub personal_info: PersonalInfo,
    #[serde(deserialize_with = "null_as_default")]
    pub work_experience: Vec<WorkExperience>,
    #[serde(deserialize_with = "null_as_default")]
    pub skills: Skills,
    #[serde(deserialize_with = "null_as_default")]
    pub education: Vec<Education>,
    #[serde(deserialize_with = "null_as_default")]
    pub certifications: Vec<Certification>,
    #[serde(deserialize_with = "null_as_default")]
    pub projects: Vec<Project>,
    pub selected_template: Option<TemplateKind>,
}

impl ResumePatch {
    /// Merge into `draft`: non-blank fields override, non-empty lists
    /// replace. Blank or missing values never erase what is there.
    pub fn merge_into(self, draft: &mut Resume) {
        let p = self.personal_info;
        let d = &mut draft.personal_info;
        for (target, value) in [
            (&mut d.first_name, p.first_name),
            (&mut d.last_name, p.last_name),
            (&mut d.title, p.title),
            (&mut d.email, p.email),
            (&mut d.phone, p.phone),
            (&mut d.location, p.location),
            (&mut d.website, p.website),
            (&mut d.linkedin, p.linkedin),
            (&mut d.github, p.github),
            (&mut d.summary, p.summary),
        ] {
            if !value.trim().is_empty() {
                *target = value.trim().to_string();
            }
        }

        if !self.work_experience.is_empty() {
            draft.work_experience = with_ids(self.work_experience, "work", |e| &mut e.id);
        }
        if !self.education.is_empty() {
            draft.education = with_ids(self.education, "edu", |e| &mut e.id);
        }
        if !self.certifications.is_empty() {
            draft.certifications = with_ids(self.certifications, "cert", |c| &mut c.id);
        }
        if !self.projects.is_empty() {
            draft.projects = with_ids(self.projects, "proj", |p| &mut p.id);
        }
        if !self.skills.technical.is_empty() {
            draft.skills.technical = self.skills.technical;
        }
        if !self.skills.soft.is_empty() {
            draft.skills.soft = self.skills.soft;
        }
        if !self.skills.languages.is_empty() {
            draft.skills.languages = self.skills.languages;
        }
        if let Some(kind) = self.selected_template {
            draft.selected_template = kind;
        }
        draft.normalize();
    }
}

fn with_ids<T, F>(mut items: Vec<T>, prefix: &str, id: F) -> Vec<T>
where
    F: Fn(&mut T) -> &mut String,
{
    for item in &mut items {
        let slot = id(item);
        if slot.trim().is_empty() {
            *slot = format!("{prefix}-{}", Uuid::new_v4());
        }
    }
    items
}

/// Result of asking the model for structured data.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionOutcome {
    Extracted(ResumePatch),
    /// Nothing usable; the reason is for logs only.
    Degraded(String),
}

/// Parse a model reply into a patch. Markdown code fences and chatter around
/// the JSON object are tolerated.
pub fn parse_extraction(reply: &str) -> ExtractionOutcome {
    let stripped = reply.replace("```json", "").replace("```", "");
    let body = match (stripped.find('{'), stripped.rfind('}')) {
        (Some(start), Some(end)) if start < end => &stripped[start..=end],
        _ => return ExtractionOutcome::Degraded("no JSON object in reply".to_string()),
    };
    match serde_json::from_str::<ResumePatch>(body) {
        Ok(patch) => ExtractionOutcome::Extracted(patch),
        Err(e) => ExtractionOutcome::Degraded(format!("invalid extraction JSON: {e}")),
    }
}

/// Whether the draft has enough to build a CV.
pub fn is_complete(draft: &Resume) -> bool {
    let p = &draft.personal_info;
    !p.first_name.is_empty()
        && !p.last_name.is_empty()
        && !p.email.is_empty()
        && !draft.work_experience.is_empty()
        && !draft.skills.is_empty()
        && !draft.education.is_empty()
}

pub fn current_step(draft: &Resume, template_chosen: bool) -> Step {
    let p = &draft.personal_info;
    if p.first_name.is_empty() {
        Step::Personal
    } else if p.email.is_empty() {
        Step::Contact
    } else if p.summary.is_empty() {
        Step::Summary
    } else if draft.work_experience.is_empty() {
        Step::Experience
    } else if draft.skills.is_empty() {
        Step::Skills
    } else if draft.education.is_empty() {
        Step::Education
    } else if !template_chosen {
        Step::Template
    } else {
        Step::Complete
    }
}

fn transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .filter(|m| m.role != Role::System)
        .map(|m| {
            let role = match m.role {
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::System => "system",
            };
            format!("{role}: {}", m.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Drives the conversation against a [`ChatModel`].
pub struct ConversationService<M> {
    model: M,
}

impl<M: ChatModel> ConversationService<M> {
    pub fn new(model: M) -> Self {
        Self { model }
    }

    /// Send one user message. Fails only if the conversational reply itself
    /// fails; extraction problems degrade to a warning.
    pub async fn send_message(
        &self,
        state: &ConversationState,
        user_message: &str,
    ) -> Result<(String, ConversationState), ChatError> {
        let mut messages = state.messages.clone();
        messages.push(Message::user(user_message));

        let mut prompt = Vec::with_capacity(messages.len() + 1);
        prompt.push(Message::system(SYSTEM_PROMPT));
        prompt.extend(messages.iter().cloned());
        let reply = match self.model.complete(&prompt, CompletionParams::CHAT).await {
            Ok(reply) => reply,
            Err(LlmError::EmptyContent) => FALLBACK_REPLY.to_string(),
            Err(e) => {
                log::error!("Conversation call failed: {e}");
                return Err(e.into());
            }
        };
        messages.push(Message::assistant(reply.clone()));

        let mut next = ConversationState {
            messages,
            warning: None,
            ..state.clone()
        };
        match self.extract(&next.messages).await {
            ExtractionOutcome::Extracted(patch) => {
                if patch.selected_template.is_some() {
                    next.template_chosen = true;
                }
                patch.merge_into(&mut next.draft);
            }
            ExtractionOutcome::Degraded(reason) => {
                log::warn!("CV extraction degraded, keeping previous draft: {reason}");
                next.warning = Some(EXTRACTION_WARNING.to_string());
            }
        }
        next.refresh();
        Ok((reply, next))
    }

    async fn extract(&self, messages: &[Message]) -> ExtractionOutcome {
        let request = [Message::user(format!(
            "{EXTRACTION_PROMPT}\n\nConversation:\n{}",
            transcript(messages)
        ))];
        match self.model.complete(&request, CompletionParams::EXTRACT).await {
            Ok(reply) => parse_extraction(&reply),
            Err(e) => ExtractionOutcome::Degraded(format!("extraction call failed: {e}")),
        }
    }
}
