pub mod document;
pub mod embedding;
pub mod fixtures;
pub mod parser;

use std::fs;
use std::path::Path;

use tracing::info;

pub use document::{
    CorpusDocument, DocMeta, IntensityDistribution, LongRunRule, PhilosophyDoc, SessionTemplate,
    StructureDoc, StructureRules, TemplateParams, WeekPattern,
};
pub use parser::{parse_document, CorpusError};

use crate::domain::plan::Phase;

/// Read-only store of philosophy, structure, and template documents.
///
/// Built once at startup and passed by reference into the planning pipeline;
/// readers never block and nothing mutates it after load.
#[derive(Clone, Debug, Default)]
pub struct CorpusStore {
    philosophies: Vec<PhilosophyDoc>,
    structures: Vec<StructureDoc>,
    templates: Vec<SessionTemplate>,
}

impl CorpusStore {
    pub fn from_documents(documents: Vec<CorpusDocument>) -> Self {
        let mut store = Self::default();
        for document in documents {
            match document {
                CorpusDocument::Philosophy(philosophy) => store.philosophies.push(philosophy),
                CorpusDocument::Structure(structure) => store.structures.push(structure),
                CorpusDocument::Templates(mut templates) => {
                    store.templates.append(&mut templates)
                }
            }
        }
        store.sort_for_determinism();
        store
    }

    /// Loads every `.md` document under `root`, recursing into
    /// subdirectories. Parse failures abort the load; a partially loaded
    /// corpus would silently skew selection.
    pub fn load_from_dir(root: &Path) -> Result<Self, CorpusError> {
        let mut documents = Vec::new();
        collect_documents(root, &mut documents)?;

        let store = Self::from_documents(documents);
        info!(
            event_name = "corpus.loaded",
            philosophies = store.philosophies.len(),
            structures = store.structures.len(),
            templates = store.templates.len(),
            root = %root.display(),
            "retrieval corpus loaded"
        );
        Ok(store)
    }

    fn sort_for_determinism(&mut self) {
        self.philosophies.sort_by(|a, b| a.meta.id.cmp(&b.meta.id));
        self.structures.sort_by(|a, b| a.meta.id.cmp(&b.meta.id));
        self.templates.sort_by(|a, b| a.id.cmp(&b.id));
    }

    pub fn is_empty(&self) -> bool {
        self.philosophies.is_empty() && self.structures.is_empty() && self.templates.is_empty()
    }

    pub fn philosophies(&self) -> &[PhilosophyDoc] {
        &self.philosophies
    }

    pub fn structures(&self) -> &[StructureDoc] {
        &self.structures
    }

    pub fn templates(&self) -> &[SessionTemplate] {
        &self.templates
    }

    /// Philosophy candidates for a race type and audience, before gating.
    pub fn philosophy_candidates(
        &self,
        race_type: &str,
        audience: &str,
    ) -> Vec<&PhilosophyDoc> {
        self.philosophies
            .iter()
            .filter(|doc| {
                doc.meta.race_types.iter().any(|rt| rt == race_type)
                    && doc.meta.audience == audience
            })
            .collect()
    }

    /// Structures matching the selection key, unordered; the loader applies
    /// taper preference and priority on top.
    pub fn structures_for(
        &self,
        philosophy_id: &str,
        race_type: &str,
        audience: &str,
        phase: Phase,
    ) -> Vec<&StructureDoc> {
        self.structures
            .iter()
            .filter(|doc| {
                doc.philosophy_id == philosophy_id
                    && doc.meta.race_types.iter().any(|rt| rt == race_type)
                    && doc.meta.audience == audience
                    && doc.meta.phase == phase
            })
            .collect()
    }

    /// All taper structures for the key, regardless of declared phase.
    pub fn taper_structures_for(
        &self,
        philosophy_id: &str,
        race_type: &str,
        audience: &str,
    ) -> Vec<&StructureDoc> {
        self.structures
            .iter()
            .filter(|doc| {
                doc.philosophy_id == philosophy_id
                    && doc.meta.race_types.iter().any(|rt| rt == race_type)
                    && doc.meta.audience == audience
                    && doc.taper_days_to_race_le.is_some()
            })
            .collect()
    }

    pub fn templates_for(
        &self,
        philosophy_id: &str,
        race_type: &str,
        audience: &str,
        phase: Phase,
        session_type: &str,
    ) -> Vec<&SessionTemplate> {
        self.templates
            .iter()
            .filter(|template| {
                template.matches(philosophy_id, race_type, audience, phase, session_type)
            })
            .collect()
    }
}

fn collect_documents(
    dir: &Path,
    documents: &mut Vec<CorpusDocument>,
) -> Result<(), CorpusError> {
    let entries = fs::read_dir(dir)
        .map_err(|source| CorpusError::ReadFile { path: dir.to_path_buf(), source })?;

    for entry in entries {
        let entry = entry
            .map_err(|source| CorpusError::ReadFile { path: dir.to_path_buf(), source })?;
        let path = entry.path();
        if path.is_dir() {
            collect_documents(&path, documents)?;
            continue;
        }
        if path.extension().and_then(|ext| ext.to_str()) != Some("md") {
            continue;
        }

        let content = fs::read_to_string(&path)
            .map_err(|source| CorpusError::ReadFile { path: path.clone(), source })?;
        let context = path.display().to_string();
        documents.push(parse_document(&content, &context)?);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use crate::domain::plan::Phase;

    use super::fixtures;
    use super::CorpusStore;

    #[test]
    fn fixture_corpus_indexes_all_document_kinds() {
        let store = fixtures::seeded_store();

        assert!(!store.philosophies().is_empty());
        assert!(!store.structures().is_empty());
        assert!(!store.templates().is_empty());
    }

    #[test]
    fn candidates_filter_by_race_type_and_audience() {
        let store = fixtures::seeded_store();

        let marathon = store.philosophy_candidates("marathon", "intermediate");
        assert!(!marathon.is_empty());

        let unknown = store.philosophy_candidates("triathlon", "intermediate");
        assert!(unknown.is_empty());
    }

    #[test]
    fn structures_filter_by_full_key() {
        let store = fixtures::seeded_store();

        let build =
            store.structures_for("polarized", "marathon", "intermediate", Phase::Build);
        assert!(!build.is_empty());

        let wrong_philosophy =
            store.structures_for("unknown", "marathon", "intermediate", Phase::Build);
        assert!(wrong_philosophy.is_empty());
    }

    #[test]
    fn load_from_dir_walks_subdirectories() {
        let dir = TempDir::new().expect("tempdir");
        let nested = dir.path().join("philosophies");
        fs::create_dir_all(&nested).expect("create nested dir");
        fs::write(nested.join("doc.md"), fixtures::PHILOSOPHY_POLARIZED).expect("write doc");
        fs::write(dir.path().join("notes.txt"), "ignored").expect("write non-md file");

        let store = CorpusStore::load_from_dir(dir.path()).expect("load corpus");
        assert_eq!(store.philosophies().len(), 1);
        assert!(store.structures().is_empty());
    }

    #[test]
    fn broken_document_aborts_the_load() {
        let dir = TempDir::new().expect("tempdir");
        fs::write(dir.path().join("broken.md"), "not a corpus document").expect("write doc");

        assert!(CorpusStore::load_from_dir(dir.path()).is_err());
    }
}
