use crate::submission::{MalformedInput, loose_string, parse_object};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Questionnaire submission as sent by the web form.
#[derive(Clone, Default, Deserialize, PartialEq)]
pub struct ArchiveSubmission {
    #[serde(rename = "fullName", default, deserialize_with = "loose_string")]
    pub full_name: Option<String>,
    #[serde(rename = "lineId", default, deserialize_with = "loose_string")]
    pub line_id: Option<String>,
    #[serde(rename = "phoneNumber", default, deserialize_with = "loose_string")]
    pub phone_number: Option<String>,
    #[serde(rename = "currentWeight", default, deserialize_with = "loose_string")]
    pub current_weight: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub height: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub bmi: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub past_med_exp: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub caffeine_sensitivity: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub has_condition: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub is_pregnant: Option<String>,
    #[serde(rename = "sideEffects", default, deserialize_with = "loose_string")]
    pub side_effects: Option<String>,
    #[serde(rename = "diagnosisResult", default, deserialize_with = "loose_string")]
    pub diagnosis_result: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub consent: Option<String>,
    #[serde(rename = "submittedAt", default, deserialize_with = "loose_string")]
    pub submitted_at: Option<String>,
}

impl ArchiveSubmission {
    pub fn from_body(body: &[u8]) -> Result<Self, MalformedInput> {
        parse_object(body)
    }
}

impl fmt::Debug for ArchiveSubmission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveSubmission")
            .field("has_full_name", &self.full_name.is_some())
            .field("has_line_id", &self.line_id.is_some())
            .field("has_phone_number", &self.phone_number.is_some())
            .field("consent", &self.consent)
            .field("submitted_at", &self.submitted_at)
            .finish_non_exhaustive()
    }
}

pub const COLUMN_COUNT: usize = 14;

/// One spreadsheet row, columns A to N.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ArchiveRow([String; COLUMN_COUNT]);

impl ArchiveRow {
    pub fn from_submission(submission: &ArchiveSubmission, now: DateTime<Utc>) -> Self {
        let text = |value: &Option<String>| value.clone().unwrap_or_default();

        ArchiveRow([
            submission
                .submitted_at
                .clone()
                .unwrap_or_else(|| now.to_rfc3339_opts(SecondsFormat::Millis, true)),
            text(&submission.full_name),
            text(&submission.line_id),
            text(&submission.phone_number),
            text(&submission.current_weight),
            text(&submission.height),
            text(&submission.bmi),
            translate(Question::PastMedicationExperience, &submission.past_med_exp),
            translate(Question::CaffeineSensitivity, &submission.caffeine_sensitivity),
            translate(Question::HasCondition, &submission.has_condition),
            translate(Question::IsPregnant, &submission.is_pregnant),
            text(&submission.side_effects),
            text(&submission.diagnosis_result),
            // `false`, `0` and blank already deserialize to `None`
            submission.consent.clone().unwrap_or_else(|| "no".into()),
        ])
    }

    pub fn columns(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Debug for ArchiveRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ArchiveRow({} columns)", self.0.len())
    }
}

#[derive(Clone, Copy)]
enum Question {
    PastMedicationExperience,
    CaffeineSensitivity,
    HasCondition,
    IsPregnant,
}

// Form answer codes rendered in the reviewers' language (Thai).
fn translate(question: Question, answer: &Option<String>) -> String {
    let Some(answer) = answer else {
        return String::new();
    };

    let translated = match (question, answer.as_str()) {
        (Question::PastMedicationExperience, "has_experience") => "เคย",
        (Question::PastMedicationExperience, "no_experience") => "ไม่เคย",
        (Question::CaffeineSensitivity, "sensitive") => "ไว / มีอาการ",
        (Question::CaffeineSensitivity, "not_sensitive") => "ไม่ไว / ไม่มีอาการ",
        (Question::HasCondition, "has_condition") => "มี",
        (Question::HasCondition, "no_condition") => "ไม่มี",
        (Question::IsPregnant, "yes") => "ใช่",
        (Question::IsPregnant, "no") => "ไม่ใช่",
        _ => return answer.clone(),
    };

    translated.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_123).unwrap()
    }

    #[test]
    fn test_full_row() {
        let body = br#"{
            "fullName": "Somchai Jaidee",
            "lineId": "somchai.j",
            "phoneNumber": "0812345678",
            "currentWeight": 72,
            "height": "170",
            "bmi": "24.9",
            "past_med_exp": "has_experience",
            "caffeine_sensitivity": "not_sensitive",
            "has_condition": "no_condition",
            "is_pregnant": "no",
            "sideEffects": "none",
            "diagnosisResult": "type B",
            "consent": "yes",
            "submittedAt": "2024-05-01T10:00:00.000Z"
        }"#;

        let submission = ArchiveSubmission::from_body(body).unwrap();
        let row = ArchiveRow::from_submission(&submission, now());

        assert_eq!(
            row.columns(),
            [
                "2024-05-01T10:00:00.000Z",
                "Somchai Jaidee",
                "somchai.j",
                "0812345678",
                "72",
                "170",
                "24.9",
                "เคย",
                "ไม่ไว / ไม่มีอาการ",
                "ไม่มี",
                "ไม่ใช่",
                "none",
                "type B",
                "yes",
            ]
        );
    }

    #[test]
    fn test_defaults_for_missing_fields() {
        let row = ArchiveRow::from_submission(&ArchiveSubmission::default(), now());
        let columns = row.columns();

        assert_eq!(columns.len(), COLUMN_COUNT);
        assert_eq!(columns[0], "2023-11-14T22:13:20.123Z");
        assert!(columns[1..13].iter().all(String::is_empty));
        assert_eq!(columns[13], "no");
    }

    #[test]
    fn test_false_consent_is_recorded_as_no() {
        for body in [&br#"{"consent": false}"#[..], br#"{"consent": ""}"#, br#"{"consent": 0}"#] {
            let submission = ArchiveSubmission::from_body(body).unwrap();
            let row = ArchiveRow::from_submission(&submission, now());
            assert_eq!(row.columns()[13], "no");
        }

        let submission = ArchiveSubmission::from_body(br#"{"consent": true}"#).unwrap();
        let row = ArchiveRow::from_submission(&submission, now());
        assert_eq!(row.columns()[13], "true");
    }

    #[test]
    fn test_unknown_answers_pass_through() {
        let submission = ArchiveSubmission {
            past_med_exp: Some("maybe".into()),
            is_pregnant: Some("yes".into()),
            ..Default::default()
        };
        let row = ArchiveRow::from_submission(&submission, now());
        assert_eq!(row.columns()[7], "maybe");
        assert_eq!(row.columns()[10], "ใช่");
    }

    #[test]
    fn test_serializes_as_plain_array() {
        let submission = ArchiveSubmission {
            full_name: Some("A".into()),
            ..Default::default()
        };
        let row = ArchiveRow::from_submission(&submission, now());
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json.as_array().unwrap().len(), COLUMN_COUNT);
        assert_eq!(json[1], "A");
    }

    #[test]
    fn test_debug_hides_personal_data() {
        let submission = ArchiveSubmission {
            full_name: Some("Somchai Jaidee".into()),
            phone_number: Some("0812345678".into()),
            ..Default::default()
        };
        let row = ArchiveRow::from_submission(&submission, now());

        for debug in [format!("{submission:?}"), format!("{row:?}")] {
            assert!(!debug.contains("Somchai"));
            assert!(!debug.contains("0812345678"));
        }
    }
}
