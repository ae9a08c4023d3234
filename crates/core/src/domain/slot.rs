use chrono::{Datelike, NaiveDate};
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Canonical slot names used by the controller and the extractor.
pub mod names {
    pub const RACE_DISTANCE: &str = "race_distance";
    pub const RACE_DATE: &str = "race_date";
    pub const TARGET_TIME: &str = "target_time";
    pub const WEEKLY_MILEAGE: &str = "weekly_mileage";
    pub const SEASON_START: &str = "season_start";
    pub const SEASON_END: &str = "season_end";
    pub const WORKOUT_DESCRIPTION: &str = "workout_description";
    pub const DAY_DATE: &str = "day_date";
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RaceDistance {
    #[serde(rename = "5k")]
    FiveK,
    #[serde(rename = "10k")]
    TenK,
    Half,
    Marathon,
    Ultra,
}

impl RaceDistance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FiveK => "5k",
            Self::TenK => "10k",
            Self::Half => "half",
            Self::Marathon => "marathon",
            Self::Ultra => "ultra",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "5k" => Some(Self::FiveK),
            "10k" => Some(Self::TenK),
            "half" => Some(Self::Half),
            "marathon" => Some(Self::Marathon),
            "ultra" => Some(Self::Ultra),
            _ => None,
        }
    }

    /// Finds a race-distance mention inside free text. Synonyms (`26.2`,
    /// `full`) map to the canonical enum; a bare number is never a distance.
    pub fn from_mention(text: &str) -> Option<Self> {
        let lowered = text.to_ascii_lowercase();

        if lowered.contains("ultra") || lowered.contains("50k") || lowered.contains("100k") {
            return Some(Self::Ultra);
        }
        if lowered.contains("half marathon")
            || lowered.contains("half-marathon")
            || lowered.contains("13.1")
            || contains_word(&lowered, "half")
        {
            return Some(Self::Half);
        }
        if lowered.contains("marathon") || lowered.contains("26.2") || contains_word(&lowered, "full")
        {
            return Some(Self::Marathon);
        }
        if lowered.contains("10k") || lowered.contains("10 k") {
            return Some(Self::TenK);
        }
        if lowered.contains("5k") || lowered.contains("5 k") {
            return Some(Self::FiveK);
        }
        None
    }

    /// Plausible finish-time window in seconds, used to disambiguate
    /// shorthand like `3:15`.
    pub fn plausible_finish_secs(&self) -> (u32, u32) {
        match self {
            Self::FiveK => (12 * 60, 60 * 60),
            Self::TenK => (25 * 60, 2 * 3600),
            Self::Half => (55 * 60, 4 * 3600),
            Self::Marathon => (2 * 3600, 8 * 3600),
            Self::Ultra => (3 * 3600, 30 * 3600),
        }
    }
}

fn contains_word(haystack: &str, needle: &str) -> bool {
    haystack
        .split(|ch: char| !ch.is_ascii_alphanumeric() && ch != '.')
        .any(|word| word == needle)
}

/// A canonical, validated slot value.
///
/// The JSON form is the canonical wire/storage form: distances serialize to
/// their enum string, dates to ISO `YYYY-MM-DD`, durations to `HH:MM:SS`,
/// mileage to a number, text to a plain string. The representation is stable
/// so progress records round-trip byte-for-byte.
#[derive(Clone, Debug, PartialEq)]
pub enum SlotValue {
    Distance(RaceDistance),
    Date(NaiveDate),
    Duration(u32),
    Mileage(f64),
    Text(String),
}

impl SlotValue {
    pub fn as_distance(&self) -> Option<RaceDistance> {
        match self {
            Self::Distance(distance) => Some(*distance),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(date) => Some(*date),
            _ => None,
        }
    }

    pub fn as_duration_secs(&self) -> Option<u32> {
        match self {
            Self::Duration(secs) => Some(*secs),
            _ => None,
        }
    }

    pub fn as_mileage(&self) -> Option<f64> {
        match self {
            Self::Mileage(miles) => Some(*miles),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn canonical_string(&self) -> String {
        match self {
            Self::Distance(distance) => distance.as_str().to_string(),
            Self::Date(date) => date.format("%Y-%m-%d").to_string(),
            Self::Duration(secs) => format_duration(*secs),
            Self::Mileage(miles) => format_mileage(*miles),
            Self::Text(text) => text.clone(),
        }
    }
}

impl Serialize for SlotValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Mileage(miles) => {
                if (miles.fract()).abs() < f64::EPSILON {
                    serializer.serialize_i64(*miles as i64)
                } else {
                    serializer.serialize_f64(*miles)
                }
            }
            other => serializer.serialize_str(&other.canonical_string()),
        }
    }
}

impl<'de> Deserialize<'de> for SlotValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        match raw {
            serde_json::Value::Number(number) => {
                let miles = number.as_f64().ok_or_else(|| {
                    DeError::custom(format!("mileage value out of range: {number}"))
                })?;
                Ok(Self::Mileage(miles))
            }
            serde_json::Value::String(text) => Ok(Self::from_canonical_string(&text)),
            other => Err(DeError::custom(format!("unsupported slot value: {other}"))),
        }
    }
}

impl SlotValue {
    /// Inverse of [`SlotValue::canonical_string`]. Strings that are not a
    /// known distance, date, or duration stay text.
    pub fn from_canonical_string(text: &str) -> Self {
        if let Some(distance) = RaceDistance::parse(text) {
            return Self::Distance(distance);
        }
        if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
            return Self::Date(date);
        }
        if let Some(secs) = parse_hms(text) {
            return Self::Duration(secs);
        }
        Self::Text(text.to_string())
    }
}

/// Outcome of normalizing one candidate value. Ambiguous values are counted
/// as missing by the controller; they never enter `filled_slots`.
#[derive(Clone, Debug, PartialEq)]
pub enum SlotOutcome {
    Value(SlotValue),
    Ambiguous(String),
    Missing,
}

impl SlotOutcome {
    pub fn is_value(&self) -> bool {
        matches!(self, Self::Value(_))
    }
}

pub fn format_duration(total_secs: u32) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

fn format_mileage(miles: f64) -> String {
    if miles.fract().abs() < f64::EPSILON {
        format!("{}", miles as i64)
    } else {
        format!("{miles}")
    }
}

fn parse_hms(text: &str) -> Option<u32> {
    let parts: Vec<&str> = text.split(':').collect();
    if parts.len() != 3 {
        return None;
    }
    let hours: u32 = parts[0].parse().ok()?;
    let minutes: u32 = parts[1].parse().ok()?;
    let seconds: u32 = parts[2].parse().ok()?;
    if minutes >= 60 || seconds >= 60 {
        return None;
    }
    Some(hours * 3600 + minutes * 60 + seconds)
}

const SEASON_WORDS: [&str; 5] = ["spring", "summer", "fall", "autumn", "winter"];
const OPEN_ENDED_PHRASES: [&str; 4] = ["sometime", "later this year", "eventually", "at some point"];

const MONTHS: [(&str, u32); 12] = [
    ("january", 1),
    ("february", 2),
    ("march", 3),
    ("april", 4),
    ("may", 5),
    ("june", 6),
    ("july", 7),
    ("august", 8),
    ("september", 9),
    ("october", 10),
    ("november", 11),
    ("december", 12),
];

/// Normalizes a race-date mention against the conversation's `today`.
///
/// Absolute forms (`2026-04-25`, `April 25th`, `April 25, 2026`) are parsed
/// directly; bare month-days assume the next occurrence. Season words and
/// open-ended ranges are ambiguous, as are past dates.
pub fn normalize_race_date(text: &str, today: NaiveDate) -> SlotOutcome {
    let lowered = text.to_ascii_lowercase();

    for season in SEASON_WORDS {
        if contains_word(&lowered, season) {
            return SlotOutcome::Ambiguous(format!(
                "`{season}` is a season, not a date; a specific day is required"
            ));
        }
    }
    for phrase in OPEN_ENDED_PHRASES {
        if lowered.contains(phrase) {
            return SlotOutcome::Ambiguous(
                "open-ended timeframes cannot be used as a race date".to_string(),
            );
        }
    }

    let parsed = parse_iso_date(&lowered)
        .or_else(|| parse_month_day(&lowered, today))
        .or_else(|| parse_relative_date(&lowered, today));

    match parsed {
        Some(date) if date > today => SlotOutcome::Value(SlotValue::Date(date)),
        Some(date) => SlotOutcome::Ambiguous(format!(
            "race date {date} is not in the future (today is {today})"
        )),
        None => SlotOutcome::Missing,
    }
}

fn parse_iso_date(text: &str) -> Option<NaiveDate> {
    for token in text.split_whitespace() {
        let cleaned = token.trim_matches(|ch: char| !ch.is_ascii_digit() && ch != '-');
        if cleaned.len() == 10 {
            if let Ok(date) = NaiveDate::parse_from_str(cleaned, "%Y-%m-%d") {
                return Some(date);
            }
        }
    }
    None
}

fn parse_month_day(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    let tokens: Vec<&str> = text
        .split(|ch: char| ch.is_whitespace() || ch == ',')
        .filter(|token| !token.is_empty())
        .collect();

    for (index, token) in tokens.iter().enumerate() {
        let Some(&(_, month)) = MONTHS.iter().find(|(name, _)| *token == *name) else {
            continue;
        };

        let day_token = tokens.get(index + 1)?;
        let day = parse_day_ordinal(day_token)?;

        // Explicit year wins; otherwise assume the next occurrence.
        if let Some(year_token) = tokens.get(index + 2) {
            if let Ok(year) = year_token.parse::<i32>() {
                if (1900..=9999).contains(&year) {
                    return NaiveDate::from_ymd_opt(year, month, day);
                }
            }
        }

        let this_year = NaiveDate::from_ymd_opt(today.year(), month, day)?;
        if this_year > today {
            return Some(this_year);
        }
        return NaiveDate::from_ymd_opt(today.year() + 1, month, day);
    }
    None
}

fn parse_day_ordinal(token: &str) -> Option<u32> {
    let digits: String = token.chars().take_while(|ch| ch.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    let rest = &token[digits.len()..];
    if !rest.is_empty() && !matches!(rest, "st" | "nd" | "rd" | "th") {
        return None;
    }
    let day: u32 = digits.parse().ok()?;
    (1..=31).contains(&day).then_some(day)
}

fn parse_relative_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    if contains_word(text, "tomorrow") {
        return today.succ_opt();
    }

    let tokens: Vec<&str> = text.split_whitespace().collect();
    for (index, token) in tokens.iter().enumerate() {
        if *token != "in" {
            continue;
        }
        let count: i64 = tokens.get(index + 1)?.parse().ok()?;
        let unit = tokens.get(index + 2)?;
        let days = match *unit {
            "day" | "days" => count,
            "week" | "weeks" => count * 7,
            "month" | "months" => count * 30,
            _ => continue,
        };
        return today.checked_add_signed(chrono::Duration::days(days));
    }
    None
}

/// Normalizes a target finish time. `sub-3` resolves to `03:00:00`; a
/// two-part `3:15` is read as HH:MM only when plausible for the race
/// distance, otherwise it is ambiguous.
pub fn normalize_target_time(text: &str, race: Option<RaceDistance>) -> SlotOutcome {
    let lowered = text.to_ascii_lowercase();

    if let Some(rest) = find_sub_target(&lowered) {
        return resolve_bare_quantity(rest, race);
    }

    for token in lowered.split_whitespace() {
        let cleaned = token.trim_matches(|ch: char| !ch.is_ascii_digit() && ch != ':');
        let parts: Vec<&str> = cleaned.split(':').collect();
        match parts.len() {
            3 => {
                if let Some(secs) = parse_hms(cleaned) {
                    return validated_duration(secs, race);
                }
            }
            2 => {
                let (Ok(first), Ok(second)) = (parts[0].parse::<u32>(), parts[1].parse::<u32>())
                else {
                    continue;
                };
                if second >= 60 {
                    continue;
                }
                let as_hours_minutes = first * 3600 + second * 60;
                let as_minutes_seconds = first * 60 + second;
                let hm_plausible = is_plausible(as_hours_minutes, race);
                let ms_plausible = is_plausible(as_minutes_seconds, race);
                return match (hm_plausible, ms_plausible) {
                    (true, _) => SlotOutcome::Value(SlotValue::Duration(as_hours_minutes)),
                    (false, true) => SlotOutcome::Value(SlotValue::Duration(as_minutes_seconds)),
                    (false, false) => SlotOutcome::Ambiguous(format!(
                        "`{cleaned}` is not a plausible finish time for this race distance"
                    )),
                };
            }
            _ => {}
        }
    }

    SlotOutcome::Missing
}

fn find_sub_target(text: &str) -> Option<&str> {
    let index = text.find("sub-").or_else(|| text.find("sub "))?;
    Some(&text[index + 4..])
}

fn resolve_bare_quantity(rest: &str, race: Option<RaceDistance>) -> SlotOutcome {
    let digits: String =
        rest.trim_start().chars().take_while(|ch| ch.is_ascii_digit() || *ch == '.').collect();
    let Ok(quantity) = digits.parse::<f64>() else {
        return SlotOutcome::Missing;
    };

    let as_hours = (quantity * 3600.0).round() as u32;
    let as_minutes = (quantity * 60.0).round() as u32;

    if quantity <= 24.0 && is_plausible(as_hours, race) {
        return SlotOutcome::Value(SlotValue::Duration(as_hours));
    }
    if is_plausible(as_minutes, race) {
        return SlotOutcome::Value(SlotValue::Duration(as_minutes));
    }
    SlotOutcome::Ambiguous(format!("cannot tell whether `{digits}` means hours or minutes"))
}

fn is_plausible(secs: u32, race: Option<RaceDistance>) -> bool {
    match race {
        Some(distance) => {
            let (lo, hi) = distance.plausible_finish_secs();
            (lo..=hi).contains(&secs)
        }
        // Without a known distance accept anything between 10 minutes and 30h.
        None => (600..=30 * 3600).contains(&secs),
    }
}

fn validated_duration(secs: u32, race: Option<RaceDistance>) -> SlotOutcome {
    if is_plausible(secs, race) {
        SlotOutcome::Value(SlotValue::Duration(secs))
    } else {
        SlotOutcome::Ambiguous(format!(
            "`{}` is not a plausible finish time for this race distance",
            format_duration(secs)
        ))
    }
}

const MILEAGE_UNITS: [&str; 6] = ["mpw", "miles/week", "miles", "mi", "mile", "mpws"];

/// Normalizes a weekly-mileage mention. A number needs a unit (`mpw`,
/// `miles/week`, ...) unless the preceding prompt explicitly asked for
/// weekly mileage (`unit_prompted`).
pub fn normalize_weekly_mileage(text: &str, unit_prompted: bool) -> SlotOutcome {
    let lowered = text.to_ascii_lowercase();
    let tokens: Vec<String> = lowered
        .split(|ch: char| ch.is_whitespace() || ch == ',')
        .map(|token| {
            token
                .trim_start_matches('~')
                .trim_end_matches(['.', '!', '?', ';', ':'])
                .to_string()
        })
        .filter(|token| !token.is_empty())
        .collect();

    let mut bare_number: Option<f64> = None;

    for (index, token) in tokens.iter().enumerate() {
        // Attached unit: `55mpw`.
        for unit in MILEAGE_UNITS {
            if let Some(prefix) = token.strip_suffix(unit) {
                if let Ok(miles) = prefix.parse::<f64>() {
                    return validated_mileage(miles);
                }
            }
        }

        let Ok(miles) = token.parse::<f64>() else {
            continue;
        };
        let next_is_unit = tokens
            .get(index + 1)
            .map(|next| MILEAGE_UNITS.contains(&next.as_str()) || next.starts_with("mile"))
            .unwrap_or(false);

        if next_is_unit {
            return validated_mileage(miles);
        }
        if bare_number.is_none() {
            bare_number = Some(miles);
        }
    }

    match bare_number {
        Some(miles) if unit_prompted => validated_mileage(miles),
        Some(miles) => SlotOutcome::Ambiguous(format!(
            "`{miles}` has no unit; weekly mileage needs `mpw` or `miles/week`"
        )),
        None => SlotOutcome::Missing,
    }
}

fn validated_mileage(miles: f64) -> SlotOutcome {
    if miles > 0.0 && miles <= 200.0 {
        SlotOutcome::Value(SlotValue::Mileage(miles))
    } else {
        SlotOutcome::Ambiguous(format!("weekly mileage {miles} is out of the accepted range"))
    }
}

/// Post-normalization validator, applied again when merging stored slots.
pub fn validate_slot(name: &str, value: &SlotValue, today: NaiveDate) -> Result<(), String> {
    match (name, value) {
        (names::RACE_DISTANCE, SlotValue::Distance(_)) => Ok(()),
        (names::RACE_DATE, SlotValue::Date(date)) => {
            if *date > today {
                Ok(())
            } else {
                Err(format!("race date {date} must be in the future"))
            }
        }
        (names::SEASON_START | names::SEASON_END | names::DAY_DATE, SlotValue::Date(_)) => Ok(()),
        (names::TARGET_TIME, SlotValue::Duration(secs)) => {
            if *secs > 0 {
                Ok(())
            } else {
                Err("target time must be positive".to_string())
            }
        }
        (names::WEEKLY_MILEAGE, SlotValue::Mileage(miles)) => {
            if *miles > 0.0 {
                Ok(())
            } else {
                Err("weekly mileage must be positive".to_string())
            }
        }
        (names::WORKOUT_DESCRIPTION, SlotValue::Text(text)) => {
            if text.trim().is_empty() {
                Err("workout description must not be empty".to_string())
            } else {
                Ok(())
            }
        }
        (name, value) => Err(format!("slot `{name}` has incompatible value {value:?}")),
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{
        format_duration, names, normalize_race_date, normalize_target_time,
        normalize_weekly_mileage, validate_slot, RaceDistance, SlotOutcome, SlotValue,
    };

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 10).expect("valid date")
    }

    #[test]
    fn distance_synonyms_map_to_canonical_enum() {
        assert_eq!(RaceDistance::from_mention("training for a marathon"), Some(RaceDistance::Marathon));
        assert_eq!(RaceDistance::from_mention("running the 26.2 in april"), Some(RaceDistance::Marathon));
        assert_eq!(RaceDistance::from_mention("going for the full"), Some(RaceDistance::Marathon));
        assert_eq!(RaceDistance::from_mention("a half marathon next year"), Some(RaceDistance::Half));
        assert_eq!(RaceDistance::from_mention("13.1 race"), Some(RaceDistance::Half));
        assert_eq!(RaceDistance::from_mention("my first 10k"), Some(RaceDistance::TenK));
        assert_eq!(RaceDistance::from_mention("a 50k ultra"), Some(RaceDistance::Ultra));
    }

    #[test]
    fn bare_numbers_are_not_distances() {
        assert_eq!(RaceDistance::from_mention("running 40 miles a week"), None);
        assert_eq!(RaceDistance::from_mention("55"), None);
    }

    #[test]
    fn bare_month_day_assumes_next_occurrence() {
        let outcome = normalize_race_date("April 25th", today());
        assert_eq!(
            outcome,
            SlotOutcome::Value(SlotValue::Date(
                NaiveDate::from_ymd_opt(2026, 4, 25).expect("valid date")
            ))
        );

        // A month-day earlier in the year rolls into next year.
        let outcome = normalize_race_date("January 5", today());
        assert_eq!(
            outcome,
            SlotOutcome::Value(SlotValue::Date(
                NaiveDate::from_ymd_opt(2027, 1, 5).expect("valid date")
            ))
        );
    }

    #[test]
    fn season_words_are_ambiguous() {
        let outcome = normalize_race_date("I want to race in spring", today());
        assert!(matches!(outcome, SlotOutcome::Ambiguous(_)));
    }

    #[test]
    fn past_dates_are_ambiguous() {
        let outcome = normalize_race_date("2025-06-01", today());
        assert!(matches!(outcome, SlotOutcome::Ambiguous(_)));
    }

    #[test]
    fn iso_and_spelled_out_dates_parse() {
        assert_eq!(
            normalize_race_date("2026-04-25", today()),
            SlotOutcome::Value(SlotValue::Date(
                NaiveDate::from_ymd_opt(2026, 4, 25).expect("valid date")
            ))
        );
        assert_eq!(
            normalize_race_date("April 25, 2027", today()),
            SlotOutcome::Value(SlotValue::Date(
                NaiveDate::from_ymd_opt(2027, 4, 25).expect("valid date")
            ))
        );
    }

    #[test]
    fn sub_three_is_three_hours_for_marathon() {
        let outcome = normalize_target_time("aiming for sub-3", Some(RaceDistance::Marathon));
        assert_eq!(outcome, SlotOutcome::Value(SlotValue::Duration(3 * 3600)));
    }

    #[test]
    fn two_part_time_prefers_plausible_reading() {
        // 3:15 for a marathon is hours:minutes.
        let outcome = normalize_target_time("3:15", Some(RaceDistance::Marathon));
        assert_eq!(outcome, SlotOutcome::Value(SlotValue::Duration(3 * 3600 + 15 * 60)));

        // 19:30 for a 5k is minutes:seconds.
        let outcome = normalize_target_time("19:30", Some(RaceDistance::FiveK));
        assert_eq!(outcome, SlotOutcome::Value(SlotValue::Duration(19 * 60 + 30)));
    }

    #[test]
    fn implausible_time_is_ambiguous() {
        let outcome = normalize_target_time("59:59", Some(RaceDistance::Marathon));
        assert!(matches!(outcome, SlotOutcome::Ambiguous(_)));
    }

    #[test]
    fn mileage_requires_a_unit_unless_prompted() {
        assert_eq!(
            normalize_weekly_mileage("running ~55 mpw", false),
            SlotOutcome::Value(SlotValue::Mileage(55.0))
        );
        assert_eq!(
            normalize_weekly_mileage("40 miles/week", false),
            SlotOutcome::Value(SlotValue::Mileage(40.0))
        );
        assert_eq!(
            normalize_weekly_mileage("Running ~55 mpw.", false),
            SlotOutcome::Value(SlotValue::Mileage(55.0))
        );
        assert!(matches!(normalize_weekly_mileage("55", false), SlotOutcome::Ambiguous(_)));
        assert_eq!(
            normalize_weekly_mileage("55", true),
            SlotOutcome::Value(SlotValue::Mileage(55.0))
        );
    }

    #[test]
    fn slot_values_round_trip_through_canonical_json() {
        let values = vec![
            SlotValue::Distance(RaceDistance::Marathon),
            SlotValue::Date(NaiveDate::from_ymd_opt(2026, 4, 25).expect("valid date")),
            SlotValue::Duration(3 * 3600),
            SlotValue::Mileage(55.0),
        ];

        for value in values {
            let encoded = serde_json::to_string(&value).expect("serialize slot value");
            let decoded: SlotValue = serde_json::from_str(&encoded).expect("deserialize slot value");
            assert_eq!(decoded, value, "round trip failed for {encoded}");
        }
    }

    #[test]
    fn duration_formats_as_hms() {
        assert_eq!(format_duration(3 * 3600), "03:00:00");
        assert_eq!(format_duration(3 * 3600 + 15 * 60), "03:15:00");
    }

    #[test]
    fn validators_reject_incompatible_values() {
        let err = validate_slot(names::RACE_DATE, &SlotValue::Mileage(40.0), today());
        assert!(err.is_err());

        let err = validate_slot(
            names::RACE_DATE,
            &SlotValue::Date(NaiveDate::from_ymd_opt(2025, 4, 25).expect("valid date")),
            today(),
        );
        assert!(err.is_err());
    }
}
