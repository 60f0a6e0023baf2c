//! Template projections – pure mappings from a [`Resume`] to layout blocks.
//!
//! Every template shows the same data; they differ in palette, header style,
//! and whether skills sit in a sidebar. Empty sections are omitted.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::layout::{Block, Span};
use crate::resume::{Resume, MAX_LEVEL};
use crate::scene::{Rgb, BLACK, GRAY, LIGHT_GRAY, WHITE};

/// Visual layout selected for a résumé.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateKind {
    #[default]
    Modern,
    Classic,
    Creative,
    Tech,
    Nature,
    Design,
}

impl TemplateKind {
    pub const ALL: [TemplateKind; 6] = [
        TemplateKind::Modern,
        TemplateKind::Classic,
        TemplateKind::Creative,
        TemplateKind::Tech,
        TemplateKind::Nature,
        TemplateKind::Design,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TemplateKind::Modern => "modern",
            TemplateKind::Classic => "classic",
            TemplateKind::Creative => "creative",
            TemplateKind::Tech => "tech",
            TemplateKind::Nature => "nature",
            TemplateKind::Design => "design",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            TemplateKind::Modern => "Indigo banner header, single column",
            TemplateKind::Classic => "Centred serif-style header with ruled sections",
            TemplateKind::Creative => "Coloured sidebar with skills and contact details",
            TemplateKind::Tech => "Gradient-style banner with accented experience cards",
            TemplateKind::Nature => "Green palette with a light sidebar",
            TemplateKind::Design => "Bold monochrome header with rose accents",
        }
    }

    fn theme(self) -> Theme {
        match self {
            TemplateKind::Modern => Theme {
                accent: [79, 70, 229],
                header: Header::Banner,
                sidebar: None,
                cards: false,
                upper_headings: false,
            },
            TemplateKind::Classic => Theme {
                accent: BLACK,
                header: Header::Plain,
                sidebar: None,
                cards: false,
                upper_headings: true,
            },
            TemplateKind::Creative => Theme {
                accent: [219, 39, 119],
                header: Header::Plain,
                sidebar: Some([253, 242, 248]),
                cards: false,
                upper_headings: false,
            },
            TemplateKind::Tech => Theme {
                accent: [124, 58, 237],
                header: Header::Banner,
                sidebar: None,
                cards: true,
                upper_headings: false,
            },
            TemplateKind::Nature => Theme {
                accent: [22, 163, 74],
                header: Header::Plain,
                sidebar: Some([240, 253, 244]),
                cards: false,
                upper_headings: false,
            },
            TemplateKind::Design => Theme {
                accent: [225, 29, 72],
                header: Header::Dark,
                sidebar: None,
                cards: true,
                upper_headings: true,
            },
        }
    }
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemplateKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TemplateKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown template '{s}'"))
    }
}

/// Unknown template names fall back to the default rather than failing the
/// whole document.
impl<'de> Deserialize<'de> for TemplateKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(raw.parse().unwrap_or_default())
    }
}

#[derive(Debug, Clone, Copy)]
enum Header {
    /// Accent-filled banner with white text.
    Banner,
    /// Near-black banner with white text.
    Dark,
    /// Text on the page background.
    Plain,
}

#[derive(Debug, Clone, Copy)]
struct Theme {
    accent: Rgb,
    header: Header,
    /// Sidebar fill; `None` means a single column.
    sidebar: Option<Rgb>,
    cards: bool,
    upper_headings: bool,
}

const NAME_SIZE: f32 = 28.0;
const TITLE_SIZE: f32 = 15.0;
const HEADING_SIZE: f32 = 16.0;
const BODY_SIZE: f32 = 11.0;
const SMALL_SIZE: f32 = 10.0;
const SIDEBAR_WIDTH: f32 = 230.0;

/// Project a résumé through its selected template.
pub fn project(resume: &Resume) -> Vec<Block> {
    project_with(resume, resume.selected_template)
}

/// Project a résumé through an explicit template.
pub fn project_with(resume: &Resume, kind: TemplateKind) -> Vec<Block> {
    let theme = kind.theme();
    let mut blocks = vec![header(resume, &theme)];

    let summary = resume.personal_info.summary.trim();
    let mut main = Vec::new();
    if !summary.is_empty() && !matches!(theme.header, Header::Banner) {
        main.extend(section(&theme, "Profile", vec![body(summary)]));
    }
    main.extend(experience(resume, &theme));
    main.extend(education(resume, &theme));
    main.extend(projects(resume, &theme));

    let mut side = Vec::new();
    side.extend(skills(resume, &theme));
    side.extend(languages(resume, &theme));
    side.extend(certifications(resume, &theme));

    match theme.sidebar {
        Some(fill) if !side.is_empty() => {
            blocks.push(Block::Spacer(8.0));
            blocks.push(Block::Columns {
                sidebar: side,
                main,
                sidebar_width: SIDEBAR_WIDTH,
                sidebar_fill: Some(fill),
            });
        }
        _ => {
            for section_blocks in [main, side] {
                if !section_blocks.is_empty() {
                    blocks.push(Block::Spacer(8.0));
                    blocks.extend(section_blocks);
                }
            }
        }
    }
    blocks
}

fn header(resume: &Resume, theme: &Theme) -> Block {
    let p = &resume.personal_info;
    let (name_color, text_color) = match theme.header {
        Header::Banner | Header::Dark => (WHITE, [238, 242, 255]),
        Header::Plain => (theme.accent, GRAY),
    };

    let mut children = vec![Block::Text(
        Span::new(p.full_name(), NAME_SIZE, name_color).bold(),
    )];
    if !p.title.trim().is_empty() {
        children.push(Block::Text(Span::new(p.title.trim(), TITLE_SIZE, text_color)));
    }
    let contact = contact_line(resume);
    if !contact.is_empty() {
        children.push(Block::Text(Span::new(contact, SMALL_SIZE, text_color)));
    }
    if matches!(theme.header, Header::Banner) && !p.summary.trim().is_empty() {
        children.push(Block::Spacer(4.0));
        children.push(Block::Text(Span::new(p.summary.trim(), BODY_SIZE, text_color)));
    }

    match theme.header {
        Header::Banner => Block::Banner {
            fill: theme.accent,
            padding: 24.0,
            children,
        },
        Header::Dark => Block::Banner {
            fill: BLACK,
            padding: 24.0,
            children,
        },
        Header::Plain => {
            children.push(Block::Rule(theme.accent));
            Block::Banner {
                fill: WHITE,
                padding: 0.0,
                children,
            }
        }
    }
}

fn contact_line(resume: &Resume) -> String {
    let p = &resume.personal_info;
    [
        &p.email,
        &p.phone,
        &p.location,
        &p.website,
        &p.linkedin,
        &p.github,
    ]
    .iter()
    .map(|s| s.trim())
    .filter(|s| !s.is_empty())
    .collect::<Vec<_>>()
    .join("  |  ")
}

fn section(theme: &Theme, title: &str, content: Vec<Block>) -> Vec<Block> {
    if content.is_empty() {
        return Vec::new();
    }
    let title = if theme.upper_headings {
        title.to_uppercase()
    } else {
        title.to_string()
    };
    let mut blocks = vec![
        Block::Spacer(6.0),
        Block::Heading {
            span: Span::new(title, HEADING_SIZE, theme.accent).bold(),
            rule: Some(if theme.upper_headings {
                theme.accent
            } else {
                LIGHT_GRAY
            }),
        },
    ];
    blocks.extend(content);
    blocks
}

fn body(text: &str) -> Block {
    Block::Text(Span::new(text, BODY_SIZE, BLACK))
}

/// Wrap an entry in a card when the theme asks for it.
fn entry(theme: &Theme, children: Vec<Block>) -> Block {
    if theme.cards {
        Block::Card {
            accent: theme.accent,
            fill: Some([249, 250, 251]),
            children,
        }
    } else {
        Block::Banner {
            fill: WHITE,
            padding: 0.0,
            children,
        }
    }
}

fn experience(resume: &Resume, theme: &Theme) -> Vec<Block> {
    let entries = resume
        .work_experience
        .iter()
        .map(|exp| {
            let mut children = vec![Block::Row {
                left: Span::new(exp.position.trim(), 13.0, BLACK).bold(),
                right: Span::new(exp.period(), SMALL_SIZE, GRAY),
            }];
            let at = [exp.company.trim(), exp.location.trim()]
                .into_iter()
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(", ");
            if !at.is_empty() {
                children.push(Block::Text(Span::new(at, BODY_SIZE, theme.accent)));
            }
            if !exp.description.trim().is_empty() {
                children.push(body(exp.description.trim()));
            }
            if !exp.achievements.is_empty() {
                children.push(Block::Bullets {
                    items: exp.achievements.clone(),
                    size: SMALL_SIZE,
                    color: GRAY,
                });
            }
            entry(theme, children)
        })
        .collect();
    section(theme, "Work Experience", entries)
}

fn education(resume: &Resume, theme: &Theme) -> Vec<Block> {
    let entries = resume
        .education
        .iter()
        .map(|edu| {
            let mut children = vec![Block::Row {
                left: Span::new(edu.degree.trim(), 13.0, BLACK).bold(),
                right: Span::new(edu.period(), SMALL_SIZE, GRAY),
            }];
            let mut school = edu.school.trim().to_string();
            if !edu.location.trim().is_empty() {
                school = format!("{school}, {}", edu.location.trim());
            }
            if !edu.gpa.trim().is_empty() {
                school = format!("{school}  (GPA: {})", edu.gpa.trim());
            }
            children.push(Block::Text(Span::new(school, BODY_SIZE, theme.accent)));
            if !edu.description.trim().is_empty() {
                children.push(Block::Text(Span::new(edu.description.trim(), SMALL_SIZE, GRAY)));
            }
            entry(theme, children)
        })
        .collect();
    section(theme, "Education", entries)
}

fn projects(resume: &Resume, theme: &Theme) -> Vec<Block> {
    let entries = resume
        .projects
        .iter()
        .map(|project| {
            let period = match (project.start_date.trim(), project.end_date.trim()) {
                ("", "") => String::new(),
                (s, "") => s.to_string(),
                ("", e) => e.to_string(),
                (s, e) => format!("{s} - {e}"),
            };
            let mut children = vec![Block::Row {
                left: Span::new(project.name.trim(), 13.0, BLACK).bold(),
                right: Span::new(period, SMALL_SIZE, GRAY),
            }];
            if !project.description.trim().is_empty() {
                children.push(body(project.description.trim()));
            }
            if !project.technologies.is_empty() {
                children.push(Block::Text(Span::new(
                    project.technologies.join(" · "),
                    SMALL_SIZE,
                    theme.accent,
                )));
            }
            if let Some(url) = project.url.as_deref().filter(|u| !u.trim().is_empty()) {
                children.push(Block::Text(Span::new(url.trim(), SMALL_SIZE, GRAY)));
            }
            entry(theme, children)
        })
        .collect();
    section(theme, "Projects", entries)
}

fn skills(resume: &Resume, theme: &Theme) -> Vec<Block> {
    let mut out = Vec::new();
    for (title, list) in [
        ("Technical Skills", &resume.skills.technical),
        ("Soft Skills", &resume.skills.soft),
    ] {
        let meters = list
            .iter()
            .map(|skill| Block::Meter {
                label: Span::new(skill.name.trim(), BODY_SIZE, BLACK),
                level: skill.level,
                max: MAX_LEVEL,
                color: theme.accent,
            })
            .collect();
        out.extend(section(theme, title, meters));
    }
    out
}

fn languages(resume: &Resume, theme: &Theme) -> Vec<Block> {
    let rows = resume
        .skills
        .languages
        .iter()
        .map(|lang| Block::Row {
            left: Span::new(lang.name.trim(), BODY_SIZE, BLACK),
            right: Span::new(lang.proficiency.trim(), SMALL_SIZE, GRAY),
        })
        .collect();
    section(theme, "Languages", rows)
}

fn certifications(resume: &Resume, theme: &Theme) -> Vec<Block> {
    let entries = resume
        .certifications
        .iter()
        .flat_map(|cert| {
            let mut detail = cert.issuer.trim().to_string();
            if !cert.date.trim().is_empty() {
                detail = format!("{detail} ({})", cert.date.trim());
            }
            if let Some(expiry) = cert.expiry_date.as_deref().filter(|d| !d.trim().is_empty()) {
                detail = format!("{detail}, expires {}", expiry.trim());
            }
            [
                Block::Text(Span::new(cert.name.trim(), BODY_SIZE, BLACK).bold()),
                Block::Text(Span::new(detail, SMALL_SIZE, GRAY)),
            ]
        })
        .collect();
    section(theme, "Certifications", entries)
}
