use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Deserialize;
use thiserror::Error;

use crate::corpus::document::{
    CorpusDocument, DocMeta, IntensityDistribution, LongRunRule, PhilosophyDoc, SessionTemplate,
    StructureDoc, StructureRules, TemplateParams, WeekPattern,
};
use crate::corpus::embedding;
use crate::domain::plan::Phase;

pub const DOC_TYPE_PHILOSOPHY: &str = "philosophy";
pub const DOC_TYPE_STRUCTURE: &str = "plan_structure";
pub const DOC_TYPE_TEMPLATES: &str = "session_templates";

/// Fence names accepted for spec blocks. Template documents may use either
/// `template_spec` or the older `template_sets` fence.
const STRUCTURE_FENCES: [&str; 1] = ["structure_spec"];
const TEMPLATE_FENCES: [&str; 2] = ["template_spec", "template_sets"];

#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("could not read corpus file `{path}`: {source}")]
    ReadFile { path: std::path::PathBuf, source: std::io::Error },
    #[error("missing or malformed front matter in `{context}`")]
    MissingFrontMatter { context: String },
    #[error("invalid front matter in `{context}`: {message}")]
    InvalidFrontMatter { context: String, message: String },
    #[error("no `{block}` block found in `{context}`")]
    MissingSpecBlock { block: &'static str, context: String },
    #[error("found {count} spec blocks in `{context}`, expected exactly one")]
    MultipleSpecBlocks { count: usize, context: String },
    #[error("invalid TOML in spec block in `{context}`: {message}")]
    InvalidSpecToml { context: String, message: String },
    #[error("unknown doc_type `{doc_type}` in `{context}`")]
    UnknownDocType { doc_type: String, context: String },
    #[error("invalid document `{context}`: {message}")]
    InvalidDocument { context: String, message: String },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(value) => vec![value],
            Self::Many(values) => values,
        }
    }
}

#[derive(Debug, Deserialize)]
struct FrontMatter {
    id: String,
    doc_type: String,
    domain: String,
    race_types: OneOrMany,
    audience: String,
    phase: String,
    priority: i32,
    version: u32,
    last_reviewed: String,

    philosophy_id: Option<String>,
    days_to_race_min: Option<i64>,
    days_to_race_max: Option<i64>,
    taper_days_to_race_le: Option<i64>,

    easy_pct_min: Option<f64>,
    easy_pct_max: Option<f64>,
    hard_pct_max: Option<f64>,
    max_hard_days: Option<u32>,
    requires: Option<Vec<String>>,
    prohibits: Option<Vec<String>>,
    embedding: Option<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
struct StructureSpecBlock {
    week_pattern: BTreeMap<String, String>,
    rules: RulesBlock,
    session_groups: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RulesBlock {
    hard_days_max: u32,
    no_consecutive_hard_days: bool,
    long_run: LongRunBlock,
}

#[derive(Debug, Deserialize)]
struct LongRunBlock {
    required_count: u32,
}

#[derive(Debug, Deserialize)]
struct TemplateSpecBlock {
    templates: Vec<TemplateEntry>,
}

#[derive(Debug, Deserialize)]
struct TemplateEntry {
    id: String,
    session_type: String,
    priority: i32,
    description: String,
    #[serde(default)]
    params: TemplateParamsBlock,
}

#[derive(Debug, Default, Deserialize)]
struct TemplateParamsBlock {
    distance_mi_min: Option<f64>,
    distance_mi_max: Option<f64>,
    duration_min_min: Option<f64>,
    duration_min_max: Option<f64>,
    hard_minutes_max: Option<f64>,
}

/// Parses one corpus document: TOML front matter between `---` markers,
/// then a markdown body whose fenced spec block carries the domain payload.
pub fn parse_document(content: &str, context: &str) -> Result<CorpusDocument, CorpusError> {
    let (front_matter, body) = split_front_matter(content, context)?;

    match front_matter.doc_type.as_str() {
        DOC_TYPE_PHILOSOPHY => parse_philosophy(front_matter, &body, context),
        DOC_TYPE_STRUCTURE => parse_structure(front_matter, &body, context),
        DOC_TYPE_TEMPLATES => parse_templates(front_matter, &body, context),
        other => Err(CorpusError::UnknownDocType {
            doc_type: other.to_string(),
            context: context.to_string(),
        }),
    }
}

fn split_front_matter(content: &str, context: &str) -> Result<(FrontMatter, String), CorpusError> {
    let trimmed = content.trim_start_matches('\u{feff}');
    let rest = trimmed
        .strip_prefix("---")
        .ok_or_else(|| CorpusError::MissingFrontMatter { context: context.to_string() })?;
    let end = rest
        .find("\n---")
        .ok_or_else(|| CorpusError::MissingFrontMatter { context: context.to_string() })?;

    let front_raw = &rest[..end];
    let body = rest[end + 4..].trim_start_matches('\n').to_string();

    let front_matter: FrontMatter =
        toml::from_str(front_raw).map_err(|error| CorpusError::InvalidFrontMatter {
            context: context.to_string(),
            message: error.to_string(),
        })?;

    Ok((front_matter, body))
}

fn extract_fenced_block(
    body: &str,
    fence_names: &[&str],
    block_label: &'static str,
    context: &str,
) -> Result<String, CorpusError> {
    let mut found: Vec<String> = Vec::new();

    for fence in fence_names {
        let opener = format!("```{fence}");
        let mut cursor = 0usize;
        while let Some(start) = body[cursor..].find(&opener) {
            let block_start = cursor + start + opener.len();
            let after_opener = &body[block_start..];
            let content_start = after_opener.find('\n').map(|i| block_start + i + 1);
            let Some(content_start) = content_start else {
                break;
            };
            let Some(end) = body[content_start..].find("```") else {
                break;
            };
            found.push(body[content_start..content_start + end].trim().to_string());
            cursor = content_start + end + 3;
        }
    }

    if found.len() > 1 {
        return Err(CorpusError::MultipleSpecBlocks {
            count: found.len(),
            context: context.to_string(),
        });
    }
    match found.pop() {
        Some(block) => Ok(block),
        None => {
            Err(CorpusError::MissingSpecBlock { block: block_label, context: context.to_string() })
        }
    }
}

fn build_meta(front: &FrontMatter, context: &str) -> Result<DocMeta, CorpusError> {
    let phase = Phase::parse(&front.phase).ok_or_else(|| CorpusError::InvalidDocument {
        context: context.to_string(),
        message: format!("unknown phase `{}`", front.phase),
    })?;
    let last_reviewed = NaiveDate::parse_from_str(&front.last_reviewed, "%Y-%m-%d").map_err(
        |error| CorpusError::InvalidDocument {
            context: context.to_string(),
            message: format!("invalid last_reviewed `{}`: {error}", front.last_reviewed),
        },
    )?;

    Ok(DocMeta {
        id: front.id.clone(),
        domain: front.domain.clone(),
        race_types: match &front.race_types {
            OneOrMany::One(value) => vec![value.clone()],
            OneOrMany::Many(values) => values.clone(),
        },
        audience: front.audience.clone(),
        phase,
        priority: front.priority,
        version: front.version,
        last_reviewed,
    })
}

fn require_philosophy_id(front: &FrontMatter, context: &str) -> Result<String, CorpusError> {
    front.philosophy_id.clone().ok_or_else(|| CorpusError::InvalidDocument {
        context: context.to_string(),
        message: "missing required field `philosophy_id`".to_string(),
    })
}

fn parse_philosophy(
    front: FrontMatter,
    body: &str,
    context: &str,
) -> Result<CorpusDocument, CorpusError> {
    let meta = build_meta(&front, context)?;
    let philosophy_id = require_philosophy_id(&front, context)?;

    let intensity = IntensityDistribution {
        easy_pct_min: front.easy_pct_min.unwrap_or(70.0),
        easy_pct_max: front.easy_pct_max.unwrap_or(85.0),
        hard_pct_max: front.hard_pct_max.unwrap_or(20.0),
    };

    let summary = body.trim().to_string();
    let embedding = match front.embedding {
        Some(vector) if !vector.is_empty() => vector,
        _ => embedding::embed(&summary),
    };

    Ok(CorpusDocument::Philosophy(PhilosophyDoc {
        meta,
        philosophy_id,
        intensity,
        max_hard_days: front.max_hard_days.unwrap_or(2),
        requires: front.requires.unwrap_or_default(),
        prohibits: front.prohibits.unwrap_or_default(),
        embedding,
        summary,
    }))
}

fn parse_structure(
    front: FrontMatter,
    body: &str,
    context: &str,
) -> Result<CorpusDocument, CorpusError> {
    let meta = build_meta(&front, context)?;
    let philosophy_id = require_philosophy_id(&front, context)?;

    let days_to_race_min =
        front.days_to_race_min.ok_or_else(|| CorpusError::InvalidDocument {
            context: context.to_string(),
            message: "missing required field `days_to_race_min`".to_string(),
        })?;
    let days_to_race_max =
        front.days_to_race_max.ok_or_else(|| CorpusError::InvalidDocument {
            context: context.to_string(),
            message: "missing required field `days_to_race_max`".to_string(),
        })?;

    let raw_block = extract_fenced_block(body, &STRUCTURE_FENCES, "structure_spec", context)?;
    let block: StructureSpecBlock =
        toml::from_str(&raw_block).map_err(|error| CorpusError::InvalidSpecToml {
            context: context.to_string(),
            message: error.to_string(),
        })?;

    let week_pattern = WeekPattern::from_map(&block.week_pattern).map_err(|message| {
        CorpusError::InvalidDocument { context: context.to_string(), message }
    })?;

    Ok(CorpusDocument::Structure(StructureDoc {
        meta,
        philosophy_id,
        days_to_race_min,
        days_to_race_max,
        taper_days_to_race_le: front.taper_days_to_race_le,
        week_pattern,
        rules: StructureRules {
            hard_days_max: block.rules.hard_days_max,
            no_consecutive_hard_days: block.rules.no_consecutive_hard_days,
            long_run: LongRunRule { required_count: block.rules.long_run.required_count },
        },
        session_groups: block.session_groups,
    }))
}

fn parse_templates(
    front: FrontMatter,
    body: &str,
    context: &str,
) -> Result<CorpusDocument, CorpusError> {
    let meta = build_meta(&front, context)?;
    let philosophy_id = require_philosophy_id(&front, context)?;

    let raw_block = extract_fenced_block(body, &TEMPLATE_FENCES, "template_spec", context)?;
    let block: TemplateSpecBlock =
        toml::from_str(&raw_block).map_err(|error| CorpusError::InvalidSpecToml {
            context: context.to_string(),
            message: error.to_string(),
        })?;

    if block.templates.is_empty() {
        return Err(CorpusError::InvalidDocument {
            context: context.to_string(),
            message: "template document declares no templates".to_string(),
        });
    }

    let templates = block
        .templates
        .into_iter()
        .map(|entry| SessionTemplate {
            id: entry.id,
            philosophy_id: philosophy_id.clone(),
            race_types: meta.race_types.clone(),
            audience: meta.audience.clone(),
            phase: meta.phase,
            session_type: entry.session_type,
            priority: entry.priority,
            params: TemplateParams {
                distance_mi_min: entry.params.distance_mi_min,
                distance_mi_max: entry.params.distance_mi_max,
                duration_min_min: entry.params.duration_min_min,
                duration_min_max: entry.params.duration_min_max,
                hard_minutes_max: entry.params.hard_minutes_max,
            },
            description: entry.description,
        })
        .collect();

    Ok(CorpusDocument::Templates(templates))
}

#[cfg(test)]
mod tests {
    use crate::corpus::document::CorpusDocument;
    use crate::domain::plan::Phase;
    use crate::domain::session::SessionIntent;

    use super::{parse_document, CorpusError};

    const STRUCTURE_DOC: &str = r#"---
id = "pol-mar-int-build"
doc_type = "plan_structure"
domain = "training_structure"
philosophy_id = "polarized"
race_types = ["marathon"]
audience = "intermediate"
phase = "build"
days_to_race_min = 22
days_to_race_max = 120
priority = 10
version = 1
last_reviewed = "2026-05-01"
---

Build-phase marathon week for polarized training.

```structure_spec
[week_pattern]
monday = "rest"
tuesday = "intervals"
wednesday = "easy"
thursday = "tempo"
friday = "easy"
saturday = "long_run"
sunday = "easy"

[rules]
hard_days_max = 2
no_consecutive_hard_days = true

[rules.long_run]
required_count = 1

[session_groups]
hard = ["intervals", "tempo"]
easy = ["easy"]
long = ["long_run"]
```
"#;

    const PHILOSOPHY_DOC: &str = r#"---
id = "polarized-marathon"
doc_type = "philosophy"
domain = "training_philosophy"
philosophy_id = "polarized"
race_types = ["marathon", "half"]
audience = "intermediate"
phase = "build"
priority = 20
version = 1
last_reviewed = "2026-05-01"
easy_pct_min = 75.0
easy_pct_max = 85.0
hard_pct_max = 20.0
max_hard_days = 2
requires = []
prohibits = ["injury_prone"]
---

Polarized training keeps most volume easy and a small share very hard.
"#;

    const TEMPLATE_DOC: &str = r#"---
id = "pol-mar-int-build-templates"
doc_type = "session_templates"
domain = "session_templates"
philosophy_id = "polarized"
race_types = ["marathon"]
audience = "intermediate"
phase = "build"
priority = 10
version = 1
last_reviewed = "2026-05-01"
---

```template_spec
[[templates]]
id = "tpl-easy-run"
session_type = "easy"
priority = 10
description = "Relaxed aerobic run"

[templates.params]
distance_mi_min = 3.0
distance_mi_max = 10.0

[[templates]]
id = "tpl-long-run"
session_type = "long_run"
priority = 10
description = "Weekly long run"

[templates.params]
distance_mi_min = 8.0
distance_mi_max = 22.0
```
"#;

    #[test]
    fn structure_document_parses_with_intent_mapping() {
        let parsed = parse_document(STRUCTURE_DOC, "structure.md").expect("parse structure");
        let CorpusDocument::Structure(structure) = parsed else {
            panic!("expected structure document");
        };

        assert_eq!(structure.philosophy_id, "polarized");
        assert_eq!(structure.meta.phase, Phase::Build);
        assert_eq!(structure.week_pattern.session_type(1), "intervals");
        assert_eq!(structure.intent_for("intervals"), SessionIntent::Quality);
        assert_eq!(structure.rules.long_run.required_count, 1);
    }

    #[test]
    fn philosophy_document_parses_and_embeds_summary() {
        let parsed = parse_document(PHILOSOPHY_DOC, "philosophy.md").expect("parse philosophy");
        let CorpusDocument::Philosophy(philosophy) = parsed else {
            panic!("expected philosophy document");
        };

        assert_eq!(philosophy.philosophy_id, "polarized");
        assert_eq!(philosophy.prohibits, vec!["injury_prone"]);
        assert!(!philosophy.embedding.is_empty());
        assert!(philosophy.summary.contains("Polarized training"));
    }

    #[test]
    fn template_document_yields_one_template_per_entry() {
        let parsed = parse_document(TEMPLATE_DOC, "templates.md").expect("parse templates");
        let CorpusDocument::Templates(templates) = parsed else {
            panic!("expected template document");
        };

        assert_eq!(templates.len(), 2);
        assert_eq!(templates[0].id, "tpl-easy-run");
        assert_eq!(templates[0].params.distance_mi_max, Some(10.0));
        assert_eq!(templates[1].session_type, "long_run");
    }

    #[test]
    fn template_sets_fence_is_accepted() {
        let doc = TEMPLATE_DOC.replace("```template_spec", "```template_sets");
        let parsed = parse_document(&doc, "templates.md").expect("parse template_sets fence");
        assert!(matches!(parsed, CorpusDocument::Templates(_)));
    }

    #[test]
    fn missing_front_matter_is_rejected() {
        let error = parse_document("no front matter here", "broken.md")
            .expect_err("must reject missing front matter");
        assert!(matches!(error, CorpusError::MissingFrontMatter { .. }));
    }

    #[test]
    fn duplicated_spec_blocks_are_rejected() {
        let block_start = STRUCTURE_DOC.find("```structure_spec").expect("block present");
        let duplicated = format!("{}\n{}", STRUCTURE_DOC, &STRUCTURE_DOC[block_start..]);
        let error =
            parse_document(&duplicated, "broken.md").expect_err("must reject duplicate blocks");
        assert!(matches!(error, CorpusError::MultipleSpecBlocks { count: 2, .. }));
    }

    #[test]
    fn unknown_doc_type_is_rejected() {
        let doc = PHILOSOPHY_DOC.replace("doc_type = \"philosophy\"", "doc_type = \"mystery\"");
        let error = parse_document(&doc, "broken.md").expect_err("must reject unknown doc_type");
        assert!(matches!(error, CorpusError::UnknownDocType { .. }));
    }

    #[test]
    fn parse_serialize_parse_is_stable_for_structures() {
        let first = parse_document(STRUCTURE_DOC, "structure.md").expect("first parse");
        let CorpusDocument::Structure(structure) = &first else {
            panic!("expected structure document");
        };

        // Serialize the spec payload back to TOML and re-parse the document
        // with the regenerated block; the in-memory structure must match.
        let pattern_toml: String = crate::corpus::document::WEEKDAY_NAMES
            .iter()
            .enumerate()
            .map(|(index, day)| {
                format!("{day} = \"{}\"\n", structure.week_pattern.session_type(index))
            })
            .collect();
        let groups_toml: String = structure
            .session_groups
            .iter()
            .map(|(group, members)| {
                let quoted: Vec<String> =
                    members.iter().map(|member| format!("\"{member}\"")).collect();
                format!("{group} = [{}]\n", quoted.join(", "))
            })
            .collect();
        let regenerated = format!(
            "---\nid = \"{}\"\ndoc_type = \"plan_structure\"\ndomain = \"{}\"\nphilosophy_id = \"{}\"\nrace_types = [\"marathon\"]\naudience = \"{}\"\nphase = \"{}\"\ndays_to_race_min = {}\ndays_to_race_max = {}\npriority = {}\nversion = {}\nlast_reviewed = \"{}\"\n---\n\n```structure_spec\n[week_pattern]\n{pattern_toml}\n[rules]\nhard_days_max = {}\nno_consecutive_hard_days = {}\n\n[rules.long_run]\nrequired_count = {}\n\n[session_groups]\n{groups_toml}```\n",
            structure.meta.id,
            structure.meta.domain,
            structure.philosophy_id,
            structure.meta.audience,
            structure.meta.phase.as_str(),
            structure.days_to_race_min,
            structure.days_to_race_max,
            structure.meta.priority,
            structure.meta.version,
            structure.meta.last_reviewed.format("%Y-%m-%d"),
            structure.rules.hard_days_max,
            structure.rules.no_consecutive_hard_days,
            structure.rules.long_run.required_count,
        );

        let second = parse_document(&regenerated, "structure.md").expect("reparse");
        assert_eq!(first, second);
    }
}
