//! Résumé Document – the nested value object collected by the builder, plus
//! the pure reducer that mutates it one field at a time.
//!
//! The JSON shape (camelCase keys) matches what the builder persists and what
//! the extraction model is asked to emit, so documents round-trip through the
//! store and the chat flow without translation.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::templates::TemplateKind;

/// Lowest and highest skill level.
pub const MIN_LEVEL: u8 = 1;
pub const MAX_LEVEL: u8 = 5;

/// A complete résumé.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Resume {
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
    #[serde(deserialize_with = "null_as_default")]
    pub selected_template: TemplateKind,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersonalInfo {
    #[serde(deserialize_with = "lenient_string")]
    pub first_name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub last_name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(deserialize_with = "lenient_string")]
    pub email: String,
    #[serde(deserialize_with = "lenient_string")]
    pub phone: String,
    #[serde(deserialize_with = "lenient_string")]
    pub location: String,
    #[serde(deserialize_with = "lenient_string")]
    pub website: String,
    #[serde(deserialize_with = "lenient_string")]
    pub linkedin: String,
    #[serde(deserialize_with = "lenient_string")]
    pub github: String,
    #[serde(deserialize_with = "lenient_string")]
    pub summary: String,
}

impl PersonalInfo {
    /// "First Last", trimmed; empty when both names are blank.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkExperience {
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(deserialize_with = "lenient_string")]
    pub company: String,
    #[serde(deserialize_with = "lenient_string")]
    pub position: String,
    #[serde(deserialize_with = "lenient_string")]
    pub location: String,
    #[serde(deserialize_with = "lenient_string")]
    pub start_date: String,
    #[serde(deserialize_with = "lenient_string")]
    pub end_date: String,
    /// Open-ended role; `end_date` is ignored while set.
    #[serde(deserialize_with = "null_as_default")]
    pub current: bool,
    #[serde(deserialize_with = "lenient_string")]
    pub description: String,
    #[serde(deserialize_with = "null_as_default")]
    pub achievements: Vec<String>,
}

impl WorkExperience {
    /// Human-readable date range, e.g. `2021-03 - Present`.
    pub fn period(&self) -> String {
        let end = if self.current {
            "Present"
        } else {
            self.end_date.trim()
        };
        join_range(self.start_date.trim(), end)
    }
}

/// Skill name with a 1–5 level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skill {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default = "default_level", deserialize_with = "deserialize_level")]
    pub level: u8,
}

impl Skill {
    /// Create a skill, clamping `level` into `1..=5`.
    pub fn new(name: impl Into<String>, level: u8) -> Self {
        Self {
            name: name.into(),
            level: clamp_level(level),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Language {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub proficiency: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Skills {
    #[serde(deserialize_with = "null_as_default")]
    pub technical: Vec<Skill>,
    #[serde(deserialize_with = "null_as_default")]
    pub soft: Vec<Skill>,
    #[serde(deserialize_with = "null_as_default")]
    pub languages: Vec<Language>,
}

impl Skills {
    pub fn is_empty(&self) -> bool {
        self.technical.is_empty() && self.soft.is_empty() && self.languages.is_empty()
    }

    fn list_mut(&mut self, kind: SkillKind) -> &mut Vec<Skill> {
        match kind {
            SkillKind::Technical => &mut self.technical,
            SkillKind::Soft => &mut self.soft,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Education {
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(deserialize_with = "lenient_string")]
    pub degree: String,
    #[serde(deserialize_with = "lenient_string")]
    pub school: String,
    #[serde(deserialize_with = "lenient_string")]
    pub location: String,
    #[serde(deserialize_with = "lenient_string")]
    pub start_date: String,
    #[serde(deserialize_with = "lenient_string")]
    pub end_date: String,
    #[serde(deserialize_with = "lenient_string")]
    pub gpa: String,
    #[serde(deserialize_with = "lenient_string")]
    pub description: String,
}

impl Education {
    pub fn period(&self) -> String {
        join_range(self.start_date.trim(), self.end_date.trim())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Certification {
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub issuer: String,
    #[serde(deserialize_with = "lenient_string")]
    pub date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Project {
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub description: String,
    #[serde(deserialize_with = "null_as_default")]
    pub technologies: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub start_date: String,
    #[serde(deserialize_with = "lenient_string")]
    pub end_date: String,
}

// ---------------------------------------------------------------------------
// Reducer
// ---------------------------------------------------------------------------

/// A single editable personal-info field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersonalField {
    FirstName,
    LastName,
    Title,
    Email,
    Phone,
    Location,
    Website,
    Linkedin,
    Github,
    Summary,
}

impl PersonalField {
    pub fn parse(s: &str) -> Option<Self> {
        let field = match s {
            "firstName" => Self::FirstName,
            "lastName" => Self::LastName,
            "title" => Self::Title,
            "email" => Self::Email,
            "phone" => Self::Phone,
            "location" => Self::Location,
            "website" => Self::Website,
            "linkedin" => Self::Linkedin,
            "github" => Self::Github,
            "summary" => Self::Summary,
            _ => return None,
        };
        Some(field)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkillKind {
    Technical,
    Soft,
}

/// One form-input event. Record ids travel inside the payload so that
/// reduction stays a pure function of (document, action).
#[derive(Debug, Clone, PartialEq)]
pub enum ResumeAction {
    SetPersonal(PersonalField, String),
    AddExperience(WorkExperience),
    UpdateExperience(WorkExperience),
    RemoveExperience(String),
    AddAchievement { experience_id: String, text: String },
    AddSkill(SkillKind, Skill),
    RemoveSkill(SkillKind, String),
    AddLanguage(Language),
    RemoveLanguage(String),
    AddEducation(Education),
    UpdateEducation(Education),
    RemoveEducation(String),
    AddCertification(Certification),
    RemoveCertification(String),
    AddProject(Project),
    RemoveProject(String),
    SelectTemplate(TemplateKind),
}

impl Resume {
    /// Apply one action in place.
    pub fn apply(&mut self, action: ResumeAction) {
        match action {
            ResumeAction::SetPersonal(field, value) => {
                *self.personal_info.field_mut(field) = value;
            }
            ResumeAction::AddExperience(exp) => upsert(&mut self.work_experience, exp, |e| &e.id),
            ResumeAction::UpdateExperience(exp) => {
                replace(&mut self.work_experience, exp, |e| &e.id)
            }
            ResumeAction::RemoveExperience(id) => self.work_experience.retain(|e| e.id != id),
            ResumeAction::AddAchievement {
                experience_id,
                text,
            } => {
                if let Some(exp) = self
                    .work_experience
                    .iter_mut()
                    .find(|e| e.id == experience_id)
                {
                    exp.achievements.push(text);
                }
            }
            ResumeAction::AddSkill(kind, skill) => {
                let skill = Skill::new(skill.name, skill.level);
                upsert(self.skills.list_mut(kind), skill, |s| &s.name)
            }
            ResumeAction::RemoveSkill(kind, name) => {
                self.skills.list_mut(kind).retain(|s| s.name != name)
            }
            ResumeAction::AddLanguage(lang) => upsert(&mut self.skills.languages, lang, |l| &l.name),
            ResumeAction::RemoveLanguage(name) => self.skills.languages.retain(|l| l.name != name),
            ResumeAction::AddEducation(edu) => upsert(&mut self.education, edu, |e| &e.id),
            ResumeAction::UpdateEducation(edu) => replace(&mut self.education, edu, |e| &e.id),
            ResumeAction::RemoveEducation(id) => self.education.retain(|e| e.id != id),
            ResumeAction::AddCertification(cert) => {
                upsert(&mut self.certifications, cert, |c| &c.id)
            }
            ResumeAction::RemoveCertification(id) => self.certifications.retain(|c| c.id != id),
            ResumeAction::AddProject(project) => upsert(&mut self.projects, project, |p| &p.id),
            ResumeAction::RemoveProject(id) => self.projects.retain(|p| p.id != id),
            ResumeAction::SelectTemplate(kind) => self.selected_template = kind,
        }
    }

    /// Functional form of [`Resume::apply`].
    pub fn reduce(mut self, action: ResumeAction) -> Self {
        self.apply(action);
        self
    }

    /// Names of the fields that must be filled before the CV is export-ready.
    pub fn missing_for_export(&self) -> Vec<&'static str> {
        let p = &self.personal_info;
        let mut missing = Vec::new();
        if p.first_name.trim().is_empty() {
            missing.push("firstName");
        }
        if p.last_name.trim().is_empty() {
            missing.push("lastName");
        }
        if p.email.trim().is_empty() {
            missing.push("email");
        }
        missing
    }

    /// Clamp every skill level into range. Applied after loading untrusted
    /// JSON (stored drafts, model output).
    pub fn normalize(&mut self) {
        for skill in self.skills.technical.iter_mut().chain(self.skills.soft.iter_mut()) {
            skill.level = clamp_level(skill.level);
        }
    }
}

impl PersonalInfo {
    fn field_mut(&mut self, field: PersonalField) -> &mut String {
        match field {
            PersonalField::FirstName => &mut self.first_name,
            PersonalField::LastName => &mut self.last_name,
            PersonalField::Title => &mut self.title,
            PersonalField::Email => &mut self.email,
            PersonalField::Phone => &mut self.phone,
            PersonalField::Location => &mut self.location,
            PersonalField::Website => &mut self.website,
            PersonalField::Linkedin => &mut self.linkedin,
            PersonalField::Github => &mut self.github,
            PersonalField::Summary => &mut self.summary,
        }
    }
}

/// Insert `item`, replacing an existing entry with the same key in place.
fn upsert<T, F>(list: &mut Vec<T>, item: T, key: F)
where
    F: Fn(&T) -> &String,
{
    match list.iter().position(|existing| key(existing) == key(&item)) {
        Some(idx) => list[idx] = item,
        None => list.push(item),
    }
}

/// Replace an existing entry; unknown keys are ignored.
fn replace<T, F>(list: &mut [T], item: T, key: F)
where
    F: Fn(&T) -> &String,
{
    if let Some(slot) = list.iter_mut().find(|existing| key(existing) == key(&item)) {
        *slot = item;
    }
}

fn join_range(start: &str, end: &str) -> String {
    match (start.is_empty(), end.is_empty()) {
        (true, true) => String::new(),
        (false, true) => start.to_string(),
        (true, false) => end.to_string(),
        (false, false) => format!("{start} - {end}"),
    }
}

fn clamp_level(level: u8) -> u8 {
    level.clamp(MIN_LEVEL, MAX_LEVEL)
}

fn default_level() -> u8 {
    MIN_LEVEL
}

/// Models occasionally emit levels as floats, numeric strings, `null` or
/// out of range; accept all of them and clamp.
fn deserialize_level<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(raw
        .filter(|v| v.is_finite())
        .map_or(MIN_LEVEL, |v| v.round().clamp(MIN_LEVEL as f64, MAX_LEVEL as f64) as u8))
}

/// A string field that also takes `null` (empty) and bare numbers or
/// booleans (their JSON text), e.g. a numeric `gpa`.
pub(crate) fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::Bool(b)) => Ok(b.to_string()),
        Some(other) => Err(D::Error::custom(format!("expected a string, found {other}"))),
    }
}

/// `null` reads as the type's default.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn experience(id: &str, company: &str) -> WorkExperience {
        WorkExperience {
            id: id.to_string(),
            company: company.to_string(),
            position: "Engineer".to_string(),
            start_date: "2020-01".to_string(),
            end_date: "2022-06".to_string(),
            ..WorkExperience::default()
        }
    }

    fn script() -> Vec<ResumeAction> {
        vec![
            ResumeAction::SetPersonal(PersonalField::FirstName, "Ann".into()),
            ResumeAction::SetPersonal(PersonalField::LastName, "Lee".into()),
            ResumeAction::AddExperience(experience("w1", "Acme")),
            ResumeAction::AddAchievement {
                experience_id: "w1".into(),
                text: "Shipped v2".into(),
            },
            ResumeAction::AddSkill(SkillKind::Technical, Skill::new("Rust", 9)),
            ResumeAction::AddLanguage(Language {
                name: "English".into(),
                proficiency: "Native".into(),
            }),
            ResumeAction::AddEducation(Education {
                id: "e1".into(),
                degree: "BSc".into(),
                school: "Uni".into(),
                ..Education::default()
            }),
            ResumeAction::SelectTemplate(TemplateKind::Classic),
        ]
    }

    #[test]
    fn same_actions_give_same_document() {
        let a = script().into_iter().fold(Resume::default(), Resume::reduce);
        let b = script().into_iter().fold(Resume::default(), Resume::reduce);
        assert_eq!(a, b);
        assert_eq!(a.personal_info.full_name(), "Ann Lee");
        assert_eq!(a.work_experience[0].achievements, vec!["Shipped v2"]);
        assert_eq!(a.skills.technical[0].level, MAX_LEVEL);
    }

    #[test]
    fn add_with_existing_id_replaces() {
        let doc = Resume::default()
            .reduce(ResumeAction::AddExperience(experience("w1", "Acme")))
            .reduce(ResumeAction::AddExperience(experience("w1", "Globex")));
        assert_eq!(doc.work_experience.len(), 1);
        assert_eq!(doc.work_experience[0].company, "Globex");
    }

    #[test]
    fn update_and_remove_unknown_id_are_noops() {
        let doc = Resume::default().reduce(ResumeAction::AddExperience(experience("w1", "Acme")));
        let same = doc
            .clone()
            .reduce(ResumeAction::UpdateExperience(experience("zz", "Other")))
            .reduce(ResumeAction::RemoveExperience("zz".into()));
        assert_eq!(doc, same);
    }

    #[test]
    fn current_role_ignores_end_date() {
        let mut exp = experience("w1", "Acme");
        exp.current = true;
        assert_eq!(exp.period(), "2020-01 - Present");
        exp.current = false;
        assert_eq!(exp.period(), "2020-01 - 2022-06");
    }

    #[test]
    fn missing_fields_for_export() {
        let doc = Resume::default()
            .reduce(ResumeAction::SetPersonal(PersonalField::FirstName, "Ann".into()));
        assert_eq!(doc.missing_for_export(), vec!["lastName", "email"]);
    }

    #[test]
    fn deserializes_builder_shape() {
        let json = r#"{
            "personalInfo": {"firstName": "Ann", "lastName": "Lee"},
            "skills": {"technical": [{"name": "Go", "level": 7.4}]},
            "selectedTemplate": "tech"
        }"#;
        let doc: Resume = serde_json::from_str(json).unwrap();
        assert_eq!(doc.personal_info.first_name, "Ann");
        assert_eq!(doc.skills.technical[0].level, 5);
        assert_eq!(doc.selected_template, TemplateKind::Tech);
        assert!(doc.work_experience.is_empty());
    }
}
