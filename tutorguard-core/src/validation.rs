//! Input validation
//!
//! Pure checks run before any lock is taken or state is touched.

use std::collections::BTreeSet;

use crate::error::ValidationError;
use crate::intervention::{InterventionKind, InterventionRequest, SettingsChange};
use crate::session::StartSession;
use crate::types::Subject;

pub fn validate_message(message: &str, max_chars: usize) -> Result<(), ValidationError> {
    if message.trim().is_empty() {
        return Err(ValidationError::EmptyMessage);
    }
    let len = message.chars().count();
    if len > max_chars {
        return Err(ValidationError::MessageTooLong {
            len,
            max: max_chars,
        });
    }
    Ok(())
}

pub fn validate_difficulty(difficulty: u8) -> Result<(), ValidationError> {
    if (1..=10).contains(&difficulty) {
        Ok(())
    } else {
        Err(ValidationError::DifficultyOutOfRange(difficulty))
    }
}

pub fn validate_subjects(subjects: &BTreeSet<Subject>) -> Result<(), ValidationError> {
    if subjects.is_empty() {
        return Err(ValidationError::NoSubjects);
    }
    Ok(())
}

fn validate_topic(topic: &str) -> Result<(), ValidationError> {
    if topic.trim().is_empty() {
        return Err(ValidationError::Invalid("topic must not be empty".to_string()));
    }
    Ok(())
}

pub fn validate_start(request: &StartSession) -> Result<(), ValidationError> {
    if request.student_id.as_str().is_empty() || request.family_id.as_str().is_empty() {
        return Err(ValidationError::Invalid(
            "student and family ids are required".to_string(),
        ));
    }
    if let Some(difficulty) = request.difficulty {
        validate_difficulty(difficulty)?;
    }
    if let Some(subjects) = &request.subjects {
        validate_subjects(subjects)?;
    }
    if let Some(topic) = &request.topic {
        validate_topic(topic)?;
    }
    Ok(())
}

pub fn validate_settings(settings: &SettingsChange) -> Result<(), ValidationError> {
    if let Some(difficulty) = settings.difficulty {
        validate_difficulty(difficulty)?;
    }
    if let Some(subjects) = &settings.subjects {
        validate_subjects(subjects)?;
    }
    if let Some(topic) = &settings.topic {
        validate_topic(topic)?;
    }
    Ok(())
}

/// Shape checks for a guardian request; role and approval are checked later
pub fn validate_intervention(
    request: &InterventionRequest,
    max_message_chars: usize,
) -> Result<(), ValidationError> {
    if let Some(message) = &request.message {
        validate_message(message, max_message_chars)?;
    }
    if let Some(request_id) = &request.request_id
        && request_id.trim().is_empty()
    {
        return Err(ValidationError::Invalid(
            "request id must not be blank".to_string(),
        ));
    }
    validate_settings(&request.settings)?;
    if request.kind == InterventionKind::Redirect && !request.settings.reassigns() {
        return Err(ValidationError::EmptyRedirect);
    }
    Ok(())
}
