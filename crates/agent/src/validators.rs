//! Schema-level response validators for the execution controller. The
//! controller is a slot machine, not a coach: when an action is armed and
//! slots are missing, its output is one question and nothing else.

use tracing::error;

use cadence_core::domain::conversation::TargetAction;

/// Token lists are configuration, not code: deployments can tighten or
/// loosen the markers without touching the validator logic.
#[derive(Clone, Debug)]
pub struct ValidatorConfig {
    pub advice_markers: Vec<String>,
    pub chatty_markers: Vec<String>,
    pub max_sentences: usize,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            advice_markers: [
                "recommend",
                "you should",
                "because",
                "typically",
                "it's important to",
                "remember to",
                "here's what",
                "here are some",
                "tips",
                "advice",
                "gradually",
                "training theory",
            ]
            .iter()
            .map(|marker| (*marker).to_string())
            .collect(),
            chatty_markers: [
                "let's start",
                "let's begin",
                "let me help",
                "i'll help you",
                "thinking about",
            ]
            .iter()
            .map(|marker| (*marker).to_string())
            .collect(),
            max_sentences: 2,
        }
    }
}

/// The decision a turn produced, as seen by the validators.
#[derive(Clone, Debug, PartialEq)]
pub struct DecisionView<'a> {
    pub message: &'a str,
    pub target_action: Option<TargetAction>,
    pub missing_slots: &'a [String],
    pub should_execute: bool,
}

/// Rule 1: with slots missing, the rendered text contains exactly one `?`.
pub fn validate_single_question(message: &str, missing_slots: &[String]) -> Result<(), String> {
    if missing_slots.is_empty() {
        return Ok(());
    }

    let question_count = message.matches('?').count();
    if question_count != 1 {
        return Err(format!(
            "single-question rule violated: {question_count} question marks with \
             missing_slots={missing_slots:?}, expected exactly one"
        ));
    }

    if message.split("\n\n").count() > 1 {
        return Err(
            "single-question rule violated: multiple paragraphs in a slot question".to_string()
        );
    }

    Ok(())
}

/// Rule 2: no advice while an armed action still misses slots.
pub fn validate_no_advice(
    config: &ValidatorConfig,
    message: &str,
    target_action: Option<TargetAction>,
    missing_slots: &[String],
) -> Result<(), String> {
    if target_action.is_none() || missing_slots.is_empty() {
        return Ok(());
    }

    let lowered = message.to_ascii_lowercase();
    let found: Vec<&str> = config
        .advice_markers
        .iter()
        .filter(|marker| lowered.contains(marker.as_str()))
        .map(String::as_str)
        .collect();

    if found.is_empty() {
        Ok(())
    } else {
        Err(format!(
            "advice ban violated: markers {found:?} present while missing_slots={missing_slots:?}"
        ))
    }
}

/// Rule 3: with an armed action the response stays slot-oriented; paragraph
/// length or chatty phrasing is rejected.
pub fn validate_not_chatty(
    config: &ValidatorConfig,
    message: &str,
    target_action: Option<TargetAction>,
    missing_slots: &[String],
) -> Result<(), String> {
    if target_action.is_none() {
        return Ok(());
    }

    if !missing_slots.is_empty() {
        let sentence_count = message.matches(['.', '!', '?']).count();
        if sentence_count > config.max_sentences {
            return Err(format!(
                "chatty response: {sentence_count} sentences while asking for a slot"
            ));
        }

        let lowered = message.to_ascii_lowercase();
        if let Some(marker) =
            config.chatty_markers.iter().find(|marker| lowered.contains(marker.as_str()))
        {
            return Err(format!("chatty response: marker `{marker}` present"));
        }
    }

    if message.split("\n\n").count() > 2 {
        return Err("chatty response: paragraph-length text with an armed action".to_string());
    }

    Ok(())
}

/// Rule 4: complete slots plus an armed action means execution, this turn.
pub fn validate_execute_immediately(view: &DecisionView<'_>) -> Result<(), String> {
    if view.target_action.is_some() && view.missing_slots.is_empty() && !view.should_execute {
        return Err(format!(
            "execute-immediately rule violated: target={:?} with no missing slots but \
             should_execute=false",
            view.target_action
        ));
    }
    if view.should_execute && !view.missing_slots.is_empty() {
        return Err(format!(
            "should_execute=true requires empty missing_slots, got {:?}",
            view.missing_slots
        ));
    }
    Ok(())
}

/// Runs every rule; the first failure list is logged and returned. A
/// failing decision is fatal for the turn and replaced by the deterministic
/// fallback question.
pub fn validate_decision(
    config: &ValidatorConfig,
    view: &DecisionView<'_>,
) -> Result<(), Vec<String>> {
    let mut violations = Vec::new();

    if let Err(message) = validate_single_question(view.message, view.missing_slots) {
        violations.push(message);
    }
    if let Err(message) =
        validate_no_advice(config, view.message, view.target_action, view.missing_slots)
    {
        violations.push(message);
    }
    if let Err(message) =
        validate_not_chatty(config, view.message, view.target_action, view.missing_slots)
    {
        violations.push(message);
    }
    if let Err(message) = validate_execute_immediately(view) {
        violations.push(message);
    }

    if violations.is_empty() {
        Ok(())
    } else {
        error!(
            event_name = "controller.validator_rejection",
            target_action = ?view.target_action,
            missing_slots = ?view.missing_slots,
            violations = ?violations,
            message_preview = %view.message.chars().take(100).collect::<String>(),
            "controller response failed validation"
        );
        Err(violations)
    }
}

/// The deterministic fallback emitted when validation fails.
pub fn fallback_question(slot: &str) -> String {
    format!("I need one more detail: {}?", slot_question_fragment(slot))
}

pub(crate) fn slot_question_fragment(slot: &str) -> &'static str {
    use cadence_core::domain::slot::names;
    match slot {
        names::RACE_DISTANCE => "what race distance are you training for",
        names::RACE_DATE => "what date is your race",
        names::TARGET_TIME => "what finish time are you targeting",
        names::WEEKLY_MILEAGE => "how many miles per week are you currently running",
        names::SEASON_START => "what date should your season start",
        names::SEASON_END => "what date should your season end",
        names::WORKOUT_DESCRIPTION => "what workout would you like",
        names::DAY_DATE => "which day should I change",
        _ => "could you clarify",
    }
}
