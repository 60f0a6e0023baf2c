//! Integration tests for the cv-forge export pipeline.
//!
//! These tests validate:
//! - Every template produces a valid single-file PDF
//! - Long résumés paginate into full A4 bands
//! - Rasterization is deterministic for a fixed scene
//! - The export action names, writes and records the file
//! - Stored CVs survive the schema envelope migration

use sha2::{Digest, Sha256};

use cv_forge::error::ExportError;
use cv_forge::export::{DirectoryDownload, OverlayId, Surface};
use cv_forge::fonts::FontManager;
use cv_forge::pagination::plan_bands;
use cv_forge::raster::{Capture, Preview};
use cv_forge::resume::{
    Education, PersonalField, PersonalInfo, ResumeAction, Skill, SkillKind, WorkExperience,
};
use cv_forge::store::{self, CvLibrary, FileStore, KeyValueStore, MemoryStore};
use cv_forge::{
    generate_pdf, pdf_filename, render_scene, ExportConfig, Exporter, Resume, TemplateKind,
};

// =====================================================================
// Helper
// =====================================================================

fn assert_valid_pdf(bytes: &[u8]) {
    assert!(bytes.len() > 100, "PDF too small: {} bytes", bytes.len());
    assert_eq!(&bytes[0..5], b"%PDF-", "Missing PDF header");
}

fn sample_resume() -> Resume {
    let mut resume = Resume::default();
    for (field, value) in [
        (PersonalField::FirstName, "Ada"),
        (PersonalField::LastName, "Lovelace"),
        (PersonalField::Email, "ada@example.com"),
        (PersonalField::Title, "Analyst"),
        (PersonalField::Summary, "Writes programs for engines that do not exist yet."),
    ] {
        resume.apply(ResumeAction::SetPersonal(field, value.to_string()));
    }
    resume.apply(ResumeAction::AddExperience(WorkExperience {
        id: "exp-1".into(),
        company: "Analytical Engine Co".into(),
        position: "Programmer".into(),
        start_date: "1842".into(),
        current: true,
        description: "Annotated the translation of Menabrea's memoir.".into(),
        achievements: vec!["First published algorithm".into()],
        ..Default::default()
    }));
    resume.apply(ResumeAction::AddSkill(SkillKind::Technical, Skill::new("Mathematics", 5)));
    resume.apply(ResumeAction::AddEducation(Education {
        id: "edu-1".into(),
        degree: "Private tutoring".into(),
        school: "Home".into(),
        ..Default::default()
    }));
    resume
}

fn long_resume() -> Resume {
    let mut resume = sample_resume();
    for i in 0..40 {
        resume.apply(ResumeAction::AddExperience(WorkExperience {
            id: format!("exp-long-{i}"),
            company: format!("Company {i}"),
            position: "Engineer".into(),
            start_date: "2010".into(),
            end_date: "2012".into(),
            description: "Built and maintained systems that needed careful numerical work, \
                          wrote the documentation and trained the people who ran them."
                .into(),
            achievements: vec!["Shipped on time".into(), "Reduced costs".into()],
            ..Default::default()
        }));
    }
    resume
}

fn preview_for(resume: &Resume) -> Preview {
    let mut preview = Preview::new(FontManager::default());
    let scene = render_scene(resume, preview.fonts());
    preview.mount(scene);
    preview
}

#[derive(Default)]
struct SilentSurface;

impl Surface for SilentSurface {
    fn show_overlay(&self, _label: &str) -> OverlayId {
        OverlayId(0)
    }
    fn remove_overlay(&self, _id: OverlayId) {}
    fn alert(&self, _message: &str) {}
}

// =====================================================================
// Template tests
// =====================================================================

#[test]
fn every_template_exports_a_pdf() {
    for kind in TemplateKind::ALL {
        let resume = sample_resume().reduce(ResumeAction::SelectTemplate(kind));
        let preview = preview_for(&resume);
        let target = preview.target().expect("mounted preview");
        let pdf = generate_pdf(&target, &ExportConfig::default())
            .unwrap_or_else(|e| panic!("{kind}: {e}"));
        assert_valid_pdf(&pdf.bytes);
        assert_eq!(pdf.plan.page_count(), 1, "{kind} should fit one page");
    }
}

#[test]
fn scene_carries_the_name_for_every_template() {
    let fonts = FontManager::default();
    for kind in TemplateKind::ALL {
        let resume = sample_resume().reduce(ResumeAction::SelectTemplate(kind));
        let scene = render_scene(&resume, &fonts);
        let text: String = scene.text_lines().collect::<Vec<_>>().join(" ");
        assert!(
            text.to_lowercase().contains("lovelace"),
            "{kind} dropped the name: {text}"
        );
    }
}

// =====================================================================
// Pagination tests
// =====================================================================

#[test]
fn long_resume_spans_several_pages() {
    let preview = preview_for(&long_resume());
    let target = preview.target().expect("mounted preview");
    let pdf = generate_pdf(&target, &ExportConfig::default()).expect("export");
    assert_valid_pdf(&pdf.bytes);

    let plan = &pdf.plan;
    assert!(plan.page_count() > 1, "expected several pages");
    let covered: u32 = plan.pages.iter().map(|b| b.height_px).sum();
    assert_eq!(covered, pdf.raster.height());
    for band in &plan.pages[..plan.page_count() - 1] {
        assert_eq!(band.height_px, plan.band_height_px);
    }
}

#[test]
fn band_height_follows_page_aspect() {
    // 794px at scale 2 against A4 portrait.
    let plan = plan_bands(1588, 5000, 595.28, 841.89).unwrap();
    assert_eq!(plan.band_height_px, 2246);
    assert_eq!(plan.page_count(), 3);
}

// =====================================================================
// Determinism tests
// =====================================================================

#[test]
fn raster_is_deterministic() {
    let preview = preview_for(&sample_resume());
    let target = preview.target().expect("mounted preview");
    let digest = |scale: f32| {
        let raster = target.rasterize(scale, 60_000_000).expect("raster");
        Sha256::digest(raster.as_raw())
    };
    assert_eq!(digest(2.0), digest(2.0));
    assert_ne!(digest(1.0), digest(2.0));
}

#[test]
fn scene_json_is_stable() {
    let fonts = FontManager::default();
    let a = render_scene(&sample_resume(), &fonts).to_json();
    let b = render_scene(&sample_resume(), &fonts).to_json();
    assert_eq!(a, b);
}

// =====================================================================
// Export action tests
// =====================================================================

#[test]
fn export_writes_named_pdf_to_directory() {
    let dir = tempfile::tempdir().unwrap();
    let resume = sample_resume();
    let preview = preview_for(&resume);
    let target = preview.target().expect("mounted preview");

    let exporter = Exporter::new(ExportConfig::default());
    let report = exporter
        .export(
            Some(&target as &dyn Capture),
            &resume.personal_info,
            &SilentSurface,
            &DirectoryDownload::new(dir.path()),
        )
        .expect("export");

    assert_eq!(report.filename, "Ada_Lovelace_CV.pdf");
    assert_eq!(report.path, dir.path().join("Ada_Lovelace_CV.pdf"));
    let bytes = std::fs::read(&report.path).unwrap();
    assert_valid_pdf(&bytes);
    assert_eq!(bytes.len(), report.bytes);
    assert!(report
        .thumbnail
        .as_deref()
        .is_some_and(|t| t.starts_with("data:image/png;base64,")));
    assert!(!exporter.is_busy());
}

#[test]
fn export_without_preview_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let exporter = Exporter::new(ExportConfig::default());
    let err = exporter
        .export(
            None,
            &PersonalInfo::default(),
            &SilentSurface,
            &DirectoryDownload::new(dir.path()),
        )
        .unwrap_err();
    assert!(matches!(err, ExportError::MissingTarget));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn filename_handles_odd_names() {
    assert_eq!(pdf_filename("Mary Ann", "O'Neil"), "Mary_Ann_O'Neil_CV.pdf");
    assert_eq!(pdf_filename("", ""), "CV_Resume_CV.pdf");
    assert!(!pdf_filename("a/b", "c\\d").contains(['/', '\\']));
}

// =====================================================================
// Store tests
// =====================================================================

#[test]
fn library_round_trips_through_files() {
    let dir = tempfile::tempdir().unwrap();
    let lib = CvLibrary::new(FileStore::new(dir.path()), "ada");
    let id = lib.create(&sample_resume(), None).unwrap();

    let reopened = CvLibrary::new(FileStore::new(dir.path()), "ada");
    let item = reopened.get(&id).unwrap().expect("saved CV");
    assert_eq!(item.title, "Ada Lovelace - CV");
    assert_eq!(item.data, sample_resume());

    let copy = reopened.duplicate(&id).unwrap().expect("copy id");
    assert_ne!(copy, id);
    assert_eq!(reopened.list().unwrap().len(), 2);
    assert!(reopened.delete(&id).unwrap());
    assert_eq!(reopened.list().unwrap().len(), 1);
}

#[test]
fn unversioned_library_is_migrated() {
    let kv = MemoryStore::default();
    let legacy = serde_json::json!([{
        "id": "legacy-1",
        "title": "Ada Lovelace - CV",
        "template": "classic",
        "data": serde_json::to_value(sample_resume()).unwrap(),
        "createdAt": "2024-01-01T00:00:00Z",
        "updatedAt": "2024-01-01T00:00:00Z"
    }]);
    kv.set("user-cvs:ada", legacy).unwrap();

    let lib = CvLibrary::new(&kv, "ada");
    let items = lib.list().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].template, TemplateKind::Classic);
    assert_eq!(items[0].downloads, 0);

    lib.record_download("legacy-1").unwrap();
    let stored = kv.get("user-cvs:ada").unwrap().unwrap();
    assert_eq!(stored["schemaVersion"], store::SCHEMA_VERSION);
    assert_eq!(stored["data"][0]["downloads"], 1);
}

#[test]
fn newer_schema_is_refused() {
    let kv = MemoryStore::default();
    kv.set(
        "user-cvs:ada",
        serde_json::json!({ "schemaVersion": store::SCHEMA_VERSION + 1, "data": [] }),
    )
    .unwrap();
    assert!(CvLibrary::new(&kv, "ada").list().is_err());
}
