//! Seeded corpus documents shared by tests across the workspace. The same
//! texts ship under `corpus/` for local runs; keeping them here gives every
//! crate a loadable corpus without touching the filesystem.

use crate::corpus::{parse_document, CorpusDocument, CorpusStore};

pub const ALL_RACE_TYPES: &str = r#"["5k", "10k", "half", "marathon", "ultra"]"#;

pub const PHILOSOPHY_POLARIZED: &str = r#"---
id = "phil-polarized"
doc_type = "philosophy"
domain = "training_philosophy"
philosophy_id = "polarized"
race_types = ["5k", "10k", "half", "marathon", "ultra"]
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
prohibits = []
---

Polarized training keeps roughly four fifths of weekly volume at an easy
aerobic effort and concentrates the rest into a small number of very hard
sessions. Works well for intermediate runners building toward a goal race
on moderate weekly mileage.
"#;

pub const PHILOSOPHY_THRESHOLD: &str = r#"---
id = "phil-threshold"
doc_type = "philosophy"
domain = "training_philosophy"
philosophy_id = "threshold"
race_types = ["10k", "half", "marathon"]
audience = "intermediate"
phase = "build"
priority = 15
version = 1
last_reviewed = "2026-05-01"
easy_pct_min = 70.0
easy_pct_max = 80.0
hard_pct_max = 25.0
max_hard_days = 2
requires = []
prohibits = ["injury_prone"]
---

Threshold-centred training anchors each week around sustained lactate
threshold work with generous easy running in between. Suits durable
runners chasing half marathon and marathon times.
"#;

pub const PHILOSOPHY_HIGH_MILEAGE: &str = r#"---
id = "phil-high-mileage"
doc_type = "philosophy"
domain = "training_philosophy"
philosophy_id = "high_mileage"
race_types = ["marathon", "ultra"]
audience = "intermediate"
phase = "build"
priority = 30
version = 1
last_reviewed = "2026-05-01"
easy_pct_min = 80.0
easy_pct_max = 90.0
hard_pct_max = 15.0
max_hard_days = 2
requires = ["advanced_base"]
prohibits = []
---

High-mileage preparation stacks aerobic volume well beyond typical
intermediate loads. Requires an established base of consistent high
weekly mileage before it is safe to apply.
"#;

pub const STRUCTURE_BASE: &str = r#"---
id = "struct-pol-base"
doc_type = "plan_structure"
domain = "training_structure"
philosophy_id = "polarized"
race_types = ["5k", "10k", "half", "marathon", "ultra"]
audience = "intermediate"
phase = "base"
days_to_race_min = 43
days_to_race_max = 400
priority = 10
version = 1
last_reviewed = "2026-05-01"
---

Base-phase week: one controlled tempo, everything else easy.

```structure_spec
[week_pattern]
monday = "rest"
tuesday = "easy"
wednesday = "easy"
thursday = "tempo"
friday = "easy"
saturday = "long_run"
sunday = "easy"

[rules]
hard_days_max = 1
no_consecutive_hard_days = true

[rules.long_run]
required_count = 1

[session_groups]
hard = ["tempo"]
easy = ["easy"]
long = ["long_run"]
```
"#;

pub const STRUCTURE_BUILD: &str = r#"---
id = "struct-pol-build"
doc_type = "plan_structure"
domain = "training_structure"
philosophy_id = "polarized"
race_types = ["5k", "10k", "half", "marathon", "ultra"]
audience = "intermediate"
phase = "build"
days_to_race_min = 22
days_to_race_max = 180
priority = 10
version = 1
last_reviewed = "2026-05-01"
---

Build-phase week: two hard days separated by easy running.

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

pub const STRUCTURE_PEAK: &str = r#"---
id = "struct-pol-peak"
doc_type = "plan_structure"
domain = "training_structure"
philosophy_id = "polarized"
race_types = ["5k", "10k", "half", "marathon", "ultra"]
audience = "intermediate"
phase = "peak"
days_to_race_min = 15
days_to_race_max = 42
priority = 10
version = 1
last_reviewed = "2026-05-01"
---

Peak-phase week: race-specific intervals and a fast-finish long run.

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

pub const STRUCTURE_TAPER: &str = r#"---
id = "struct-pol-taper"
doc_type = "plan_structure"
domain = "training_structure"
philosophy_id = "polarized"
race_types = ["5k", "10k", "half", "marathon", "ultra"]
audience = "intermediate"
phase = "taper"
days_to_race_min = 0
days_to_race_max = 21
taper_days_to_race_le = 21
priority = 10
version = 1
last_reviewed = "2026-05-01"
---

Taper week: volume drops, one sharpening session, extra rest.

```structure_spec
[week_pattern]
monday = "rest"
tuesday = "intervals"
wednesday = "easy"
thursday = "rest"
friday = "easy"
saturday = "long_run"
sunday = "easy"

[rules]
hard_days_max = 1
no_consecutive_hard_days = true

[rules.long_run]
required_count = 1

[session_groups]
hard = ["intervals"]
easy = ["easy"]
long = ["long_run"]
```
"#;

/// One template document per phase, each covering every session type the
/// seeded structures emit.
pub fn template_doc(phase: &str) -> String {
    format!(
        r#"---
id = "tpl-pol-{phase}"
doc_type = "session_templates"
domain = "session_templates"
philosophy_id = "polarized"
race_types = {ALL_RACE_TYPES}
audience = "intermediate"
phase = "{phase}"
priority = 10
version = 1
last_reviewed = "2026-05-01"
---

```template_spec
[[templates]]
id = "tpl-{phase}-easy"
session_type = "easy"
priority = 10
description = "Relaxed aerobic run, conversational effort"

[templates.params]
distance_mi_min = 2.0
distance_mi_max = 16.0

[[templates]]
id = "tpl-{phase}-long"
session_type = "long_run"
priority = 10
description = "Weekly long run at steady aerobic effort"

[templates.params]
distance_mi_min = 5.0
distance_mi_max = 30.0

[[templates]]
id = "tpl-{phase}-intervals"
session_type = "intervals"
priority = 10
description = "Repetition work at 5k effort with jog recoveries"

[templates.params]
distance_mi_min = 3.0
distance_mi_max = 14.0
hard_minutes_max = 40.0

[[templates]]
id = "tpl-{phase}-tempo"
session_type = "tempo"
priority = 10
description = "Sustained tempo at threshold effort"

[templates.params]
distance_mi_min = 3.0
distance_mi_max = 14.0
hard_minutes_max = 45.0
```
"#
    )
}

/// Every seeded document as raw text, in load order.
pub fn all_documents() -> Vec<String> {
    let mut documents = vec![
        PHILOSOPHY_POLARIZED.to_string(),
        PHILOSOPHY_THRESHOLD.to_string(),
        PHILOSOPHY_HIGH_MILEAGE.to_string(),
        STRUCTURE_BASE.to_string(),
        STRUCTURE_BUILD.to_string(),
        STRUCTURE_PEAK.to_string(),
        STRUCTURE_TAPER.to_string(),
    ];
    for phase in ["base", "build", "peak", "taper"] {
        documents.push(template_doc(phase));
    }
    documents
}

/// Parses the seeded documents into a ready-to-query store. Panics only on
/// a broken fixture, which the corpus tests would catch first.
pub fn seeded_store() -> CorpusStore {
    let documents: Vec<CorpusDocument> = all_documents()
        .iter()
        .enumerate()
        .map(|(index, text)| {
            parse_document(text, &format!("fixture-{index}"))
                .unwrap_or_else(|error| panic!("fixture document {index} is broken: {error}"))
        })
        .collect();
    CorpusStore::from_documents(documents)
}
