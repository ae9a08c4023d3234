use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use tracing::debug;

use cadence_core::domain::slot::{
    names, normalize_race_date, normalize_target_time, normalize_weekly_mileage, validate_slot,
    RaceDistance, SlotOutcome, SlotValue,
};

/// Input to one extraction pass: the raw message plus everything the
/// controller already knows.
#[derive(Clone, Debug)]
pub struct ExtractionRequest<'a> {
    pub message: &'a str,
    pub attributes_requested: &'a [String],
    pub known_slots: &'a BTreeMap<String, SlotValue>,
    pub conversation_summary: Option<&'a str>,
    /// The conversation's "today"; relative dates resolve against it.
    pub today: NaiveDate,
    /// True when the previous assistant turn explicitly asked for weekly
    /// mileage, which legitimizes a bare number.
    pub unit_prompted: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExtractionResult {
    pub values: BTreeMap<String, SlotValue>,
    pub confidence: f64,
    pub evidence: BTreeMap<String, String>,
    pub missing_fields: BTreeSet<String>,
    pub ambiguous_fields: BTreeSet<String>,
}

impl ExtractionResult {
    fn all_missing(requested: &[String]) -> Self {
        Self {
            missing_fields: requested.iter().cloned().collect(),
            ..Self::default()
        }
    }
}

/// Stage-2 agent: extracts typed attributes from one message. Values are
/// only ever produced from text actually present in the message; prior slot
/// state is used to disambiguate, never to invent.
#[derive(Clone, Copy, Debug, Default)]
pub struct AttributeExtractor;

impl AttributeExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, request: &ExtractionRequest<'_>) -> ExtractionResult {
        if request.message.trim().is_empty() {
            return ExtractionResult::all_missing(request.attributes_requested);
        }

        let mut result = ExtractionResult::default();

        // The race distance is resolved first so finish-time plausibility
        // can use it, whether it arrived this turn or earlier.
        let distance_context = self
            .extract_one(names::RACE_DISTANCE, request)
            .and_then(|outcome| match outcome {
                SlotOutcome::Value(SlotValue::Distance(distance)) => Some(distance),
                _ => None,
            })
            .or_else(|| {
                request
                    .known_slots
                    .get(names::RACE_DISTANCE)
                    .and_then(SlotValue::as_distance)
            });

        for attribute in request.attributes_requested {
            let outcome = match attribute.as_str() {
                names::TARGET_TIME => {
                    normalize_target_time(request.message, distance_context)
                }
                _ => self
                    .extract_one(attribute, request)
                    .unwrap_or(SlotOutcome::Missing),
            };

            match outcome {
                SlotOutcome::Value(value) => {
                    if validate_slot(attribute, &value, request.today).is_ok() {
                        result
                            .evidence
                            .insert(attribute.clone(), evidence_span(request.message, &value));
                        result.values.insert(attribute.clone(), value);
                    } else {
                        result.ambiguous_fields.insert(attribute.clone());
                    }
                }
                SlotOutcome::Ambiguous(reason) => {
                    debug!(
                        event_name = "extractor.ambiguous_field",
                        attribute = %attribute,
                        reason = %reason,
                        "attribute is ambiguous in this message"
                    );
                    result.ambiguous_fields.insert(attribute.clone());
                }
                SlotOutcome::Missing => {
                    result.missing_fields.insert(attribute.clone());
                }
            }
        }

        result.confidence = confidence(
            request.attributes_requested.len(),
            result.values.len(),
            result.ambiguous_fields.len(),
        );
        result
    }

    fn extract_one(
        &self,
        attribute: &str,
        request: &ExtractionRequest<'_>,
    ) -> Option<SlotOutcome> {
        match attribute {
            names::RACE_DISTANCE => Some(match RaceDistance::from_mention(request.message) {
                Some(distance) => SlotOutcome::Value(SlotValue::Distance(distance)),
                None => SlotOutcome::Missing,
            }),
            names::RACE_DATE => Some(normalize_race_date(request.message, request.today)),
            names::WEEKLY_MILEAGE => {
                Some(normalize_weekly_mileage(request.message, request.unit_prompted))
            }
            names::SEASON_START | names::SEASON_END => {
                Some(self.extract_season_date(attribute, request))
            }
            names::DAY_DATE => Some(day_date_outcome(request)),
            names::WORKOUT_DESCRIPTION => {
                Some(SlotOutcome::Value(SlotValue::Text(request.message.trim().to_string())))
            }
            _ => None,
        }
    }

    /// Season spans name two dates; the first maps to the start and the
    /// second to the end. A single date fills whichever slot is requested
    /// and not already known.
    fn extract_season_date(
        &self,
        attribute: &str,
        request: &ExtractionRequest<'_>,
    ) -> SlotOutcome {
        let dates = collect_dates(request.message, request.today);
        match dates.len() {
            0 => match normalize_race_date(request.message, request.today) {
                SlotOutcome::Ambiguous(reason) => SlotOutcome::Ambiguous(reason),
                _ => SlotOutcome::Missing,
            },
            1 => {
                let known_start = request.known_slots.contains_key(names::SEASON_START);
                let fills_this_slot = match attribute {
                    names::SEASON_START => !known_start,
                    _ => known_start,
                };
                if fills_this_slot {
                    SlotOutcome::Value(SlotValue::Date(dates[0]))
                } else {
                    SlotOutcome::Missing
                }
            }
            _ => {
                let date = if attribute == names::SEASON_START { dates[0] } else { dates[1] };
                SlotOutcome::Value(SlotValue::Date(date))
            }
        }
    }
}

fn day_date_outcome(request: &ExtractionRequest<'_>) -> SlotOutcome {
    let lowered = request.message.to_ascii_lowercase();
    if lowered.contains("today") {
        return SlotOutcome::Value(SlotValue::Date(request.today));
    }
    if lowered.contains("tomorrow") {
        return match request.today.succ_opt() {
            Some(tomorrow) => SlotOutcome::Value(SlotValue::Date(tomorrow)),
            None => SlotOutcome::Missing,
        };
    }
    normalize_race_date(request.message, request.today)
}

fn collect_dates(message: &str, today: NaiveDate) -> Vec<NaiveDate> {
    let mut dates = Vec::new();

    // ISO dates first, in textual order.
    for token in message.split_whitespace() {
        let cleaned = token.trim_matches(|ch: char| !ch.is_ascii_digit() && ch != '-');
        if cleaned.len() == 10 {
            if let Ok(date) = NaiveDate::parse_from_str(cleaned, "%Y-%m-%d") {
                dates.push(date);
            }
        }
    }
    if !dates.is_empty() {
        return dates;
    }

    // Fall back to spelled-out month-day mentions, segment by segment.
    for segment in message.split([',', ';']) {
        if let SlotOutcome::Value(SlotValue::Date(date)) = normalize_race_date(segment, today) {
            dates.push(date);
        }
    }
    dates
}

fn evidence_span(message: &str, value: &SlotValue) -> String {
    let canonical = value.canonical_string();
    let lowered = message.to_ascii_lowercase();

    let needle = match value {
        SlotValue::Distance(distance) => Some(distance.as_str().to_string()),
        SlotValue::Mileage(miles) => Some(format!("{miles}")),
        _ => None,
    };

    if let Some(needle) = needle {
        if let Some(index) = lowered.find(&needle.to_ascii_lowercase()) {
            return message[index..index + needle.len()].to_string();
        }
    }
    if let Some(index) = lowered.find(&canonical.to_ascii_lowercase()) {
        return message[index..index + canonical.len()].to_string();
    }

    // No literal surface form (normalized dates, sub-X times): cite the
    // whole message as the span.
    message.trim().to_string()
}

fn confidence(requested: usize, extracted: usize, ambiguous: usize) -> f64 {
    if requested == 0 {
        return 0.0;
    }
    let base = extracted as f64 / requested as f64;
    let penalty = ambiguous as f64 * 0.1;
    (0.2 + 0.8 * base - penalty).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::NaiveDate;

    use cadence_core::domain::slot::{names, RaceDistance, SlotValue};

    use super::{AttributeExtractor, ExtractionRequest};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 10).expect("valid date")
    }

    fn requested(attributes: &[&str]) -> Vec<String> {
        attributes.iter().map(|attribute| (*attribute).to_string()).collect()
    }

    fn request<'a>(
        message: &'a str,
        attributes: &'a [String],
        known: &'a BTreeMap<String, SlotValue>,
    ) -> ExtractionRequest<'a> {
        ExtractionRequest {
            message,
            attributes_requested: attributes,
            known_slots: known,
            conversation_summary: None,
            today: today(),
            unit_prompted: false,
        }
    }

    #[test]
    fn rich_message_fills_all_four_slots() {
        let attributes = requested(&[
            names::RACE_DISTANCE,
            names::RACE_DATE,
            names::TARGET_TIME,
            names::WEEKLY_MILEAGE,
        ]);
        let known = BTreeMap::new();
        let result = AttributeExtractor::new().extract(&request(
            "Marathon on April 25, aiming for sub-3. Running ~55 mpw.",
            &attributes,
            &known,
        ));

        assert_eq!(
            result.values.get(names::RACE_DISTANCE),
            Some(&SlotValue::Distance(RaceDistance::Marathon))
        );
        assert_eq!(
            result.values.get(names::RACE_DATE),
            Some(&SlotValue::Date(NaiveDate::from_ymd_opt(2026, 4, 25).expect("valid date")))
        );
        assert_eq!(result.values.get(names::TARGET_TIME), Some(&SlotValue::Duration(3 * 3600)));
        assert_eq!(result.values.get(names::WEEKLY_MILEAGE), Some(&SlotValue::Mileage(55.0)));
        assert!(result.missing_fields.is_empty());
        assert!(result.ambiguous_fields.is_empty());
        assert!(result.confidence > 0.9);
    }

    #[test]
    fn distance_mention_alone_leaves_date_missing() {
        let attributes = requested(&[names::RACE_DISTANCE, names::RACE_DATE]);
        let known = BTreeMap::new();
        let result = AttributeExtractor::new().extract(&request(
            "I'm training for a marathon",
            &attributes,
            &known,
        ));

        assert_eq!(
            result.values.get(names::RACE_DISTANCE),
            Some(&SlotValue::Distance(RaceDistance::Marathon))
        );
        assert!(result.missing_fields.contains(names::RACE_DATE));
        assert_eq!(result.evidence.get(names::RACE_DISTANCE).map(String::as_str), Some("marathon"));
    }

    #[test]
    fn known_distance_disambiguates_a_bare_date() {
        let attributes = requested(&[names::RACE_DATE, names::TARGET_TIME]);
        let mut known = BTreeMap::new();
        known.insert(
            names::RACE_DISTANCE.to_string(),
            SlotValue::Distance(RaceDistance::Marathon),
        );
        let result =
            AttributeExtractor::new().extract(&request("April 25th, sub-3", &attributes, &known));

        assert_eq!(
            result.values.get(names::RACE_DATE),
            Some(&SlotValue::Date(NaiveDate::from_ymd_opt(2026, 4, 25).expect("valid date")))
        );
        // `sub-3` reads as three hours only because the known distance says
        // a marathon is plausible at three hours.
        assert_eq!(result.values.get(names::TARGET_TIME), Some(&SlotValue::Duration(3 * 3600)));
    }

    #[test]
    fn season_words_mark_the_date_ambiguous() {
        let attributes = requested(&[names::RACE_DISTANCE, names::RACE_DATE]);
        let known = BTreeMap::new();
        let result = AttributeExtractor::new().extract(&request(
            "I want to run a race in spring",
            &attributes,
            &known,
        ));

        assert!(result.ambiguous_fields.contains(names::RACE_DATE));
        assert!(!result.values.contains_key(names::RACE_DATE));
        assert!(result.missing_fields.contains(names::RACE_DISTANCE));
    }

    #[test]
    fn empty_message_is_a_noop_extraction() {
        let attributes = requested(&[names::RACE_DISTANCE, names::RACE_DATE]);
        let known = BTreeMap::new();
        let result = AttributeExtractor::new().extract(&request("   ", &attributes, &known));

        assert!(result.values.is_empty());
        assert_eq!(result.missing_fields.len(), 2);
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn bare_number_fills_mileage_only_when_prompted() {
        let attributes = requested(&[names::WEEKLY_MILEAGE]);
        let known = BTreeMap::new();

        let unprompted = AttributeExtractor::new().extract(&request("55", &attributes, &known));
        assert!(unprompted.ambiguous_fields.contains(names::WEEKLY_MILEAGE));

        let mut prompted_request = request("55", &attributes, &known);
        prompted_request.unit_prompted = true;
        let prompted = AttributeExtractor::new().extract(&prompted_request);
        assert_eq!(prompted.values.get(names::WEEKLY_MILEAGE), Some(&SlotValue::Mileage(55.0)));
    }

    #[test]
    fn season_span_fills_start_and_end_in_order() {
        let attributes = requested(&[names::SEASON_START, names::SEASON_END]);
        let known = BTreeMap::new();
        let result = AttributeExtractor::new().extract(&request(
            "plan my season from 2026-03-01 to 2026-09-01",
            &attributes,
            &known,
        ));

        assert_eq!(
            result.values.get(names::SEASON_START),
            Some(&SlotValue::Date(NaiveDate::from_ymd_opt(2026, 3, 1).expect("valid date")))
        );
        assert_eq!(
            result.values.get(names::SEASON_END),
            Some(&SlotValue::Date(NaiveDate::from_ymd_opt(2026, 9, 1).expect("valid date")))
        );
    }

    #[test]
    fn single_date_fills_the_awaited_season_slot() {
        let attributes = requested(&[names::SEASON_START, names::SEASON_END]);
        let mut known = BTreeMap::new();
        known.insert(
            names::SEASON_START.to_string(),
            SlotValue::Date(NaiveDate::from_ymd_opt(2026, 3, 1).expect("valid date")),
        );
        let result =
            AttributeExtractor::new().extract(&request("through 2026-09-01", &attributes, &known));

        assert!(!result.values.contains_key(names::SEASON_START));
        assert_eq!(
            result.values.get(names::SEASON_END),
            Some(&SlotValue::Date(NaiveDate::from_ymd_opt(2026, 9, 1).expect("valid date")))
        );
    }

    #[test]
    fn values_never_come_from_prior_state_alone() {
        // The known distance must not resurface as an extracted value when
        // the message does not mention it.
        let attributes = requested(&[names::RACE_DISTANCE]);
        let mut known = BTreeMap::new();
        known.insert(
            names::RACE_DISTANCE.to_string(),
            SlotValue::Distance(RaceDistance::Marathon),
        );
        let result =
            AttributeExtractor::new().extract(&request("see you tomorrow", &attributes, &known));

        assert!(result.values.is_empty());
        assert!(result.missing_fields.contains(names::RACE_DISTANCE));
    }
}
