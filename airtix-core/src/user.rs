use serde::{Deserialize, Serialize};

use crate::{CoreError, CoreResult, PersonId, UserId};

// Column widths of the `persons` and `users` tables.
pub(crate) const USERNAME_MAX: usize = 50;
pub(crate) const NAME_MAX: usize = 100;
pub(crate) const CONTACT_MAX: usize = 20;
const ADDRESS_MAX: usize = 255;
const SECURITY_TEXT_MAX: usize = 255;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    /// Single-character code stored in the `persons.gender` column.
    pub fn code(&self) -> &'static str {
        match self {
            Gender::Male => "M",
            Gender::Female => "F",
            Gender::Other => "O",
        }
    }

    pub fn from_code(code: &str) -> CoreResult<Self> {
        match code.trim() {
            "M" | "m" => Ok(Gender::Male),
            "F" | "f" => Ok(Gender::Female),
            "O" | "o" => Ok(Gender::Other),
            other => Err(CoreError::Storage(format!("Unknown gender code '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersonDetail {
    pub name: String,
    pub contact_number: String,
    #[serde(default)]
    pub address: String,
    pub gender: Gender,
}

/// Registration payload. `password` is the transmitted (possibly encrypted) form.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterUser {
    pub username: String,
    pub password: String,
    pub person: PersonDetail,
    pub security_question: String,
    pub security_answer: String,
}

impl RegisterUser {
    pub fn validate(&self) -> CoreResult<()> {
        require("username", &self.username)?;
        require("password", &self.password)?;
        require("person.name", &self.person.name)?;
        require("person.contact_number", &self.person.contact_number)?;
        require("security_question", &self.security_question)?;
        require("security_answer", &self.security_answer)?;

        within("username", &self.username, USERNAME_MAX)?;
        within("person.name", &self.person.name, NAME_MAX)?;
        within("person.contact_number", &self.person.contact_number, CONTACT_MAX)?;
        within("person.address", &self.person.address, ADDRESS_MAX)?;
        within("security_question", &self.security_question, SECURITY_TEXT_MAX)?;
        within("security_answer", &self.security_answer, SECURITY_TEXT_MAX)?;
        Ok(())
    }
}

/// Account row as handed to the repository: the password is already hashed.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub password_hash: String,
    pub person: PersonDetail,
    pub security_question: String,
    pub security_answer: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UserProfile {
    pub user_id: UserId,
    pub username: String,
    pub person_id: PersonId,
    pub person: PersonDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub user_id: UserId,
    pub username: String,
    /// Left unchanged when absent.
    pub password: Option<String>,
    pub person_name: String,
    pub contact_number: String,
    #[serde(default)]
    pub address: String,
}

impl ProfileUpdate {
    pub fn validate(&self) -> CoreResult<()> {
        require("username", &self.username)?;
        require("person_name", &self.person_name)?;
        require("contact_number", &self.contact_number)?;
        if let Some(password) = &self.password {
            require("password", password)?;
        }

        within("username", &self.username, USERNAME_MAX)?;
        within("person_name", &self.person_name, NAME_MAX)?;
        within("contact_number", &self.contact_number, CONTACT_MAX)?;
        within("address", &self.address, ADDRESS_MAX)?;
        Ok(())
    }
}

/// Profile update with the new password, if any, already hashed.
#[derive(Debug, Clone)]
pub struct ProfileChanges {
    pub user_id: UserId,
    pub username: String,
    pub password_hash: Option<String>,
    pub person_name: String,
    pub contact_number: String,
    pub address: String,
}

#[derive(Debug, Clone)]
pub struct StoredCredential {
    pub user_id: UserId,
    pub password_hash: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SecurityChallenge {
    pub question: String,
    pub answer: String,
}

impl SecurityChallenge {
    /// Answers are compared ignoring surrounding whitespace and case.
    pub fn accepts(&self, answer: &str) -> bool {
        let expected = self.answer.trim();
        !expected.is_empty() && expected.eq_ignore_ascii_case(answer.trim())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PasswordReset {
    pub username: String,
    pub password: String,
}

pub(crate) fn require(field: &str, value: &str) -> CoreResult<()> {
    if value.trim().is_empty() {
        return Err(CoreError::Validation(format!("{} must not be empty", field)));
    }
    Ok(())
}

/// Rejects values longer than `max` characters.
pub(crate) fn within(field: &str, value: &str, max: usize) -> CoreResult<()> {
    let len = value.chars().count();
    if len > max {
        return Err(CoreError::Validation(format!(
            "{} is {} characters long; at most {} allowed",
            field, len, max
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gender_codes() {
        for gender in [Gender::Male, Gender::Female, Gender::Other] {
            assert_eq!(Gender::from_code(gender.code()).unwrap(), gender);
        }
        assert!(Gender::from_code("X").is_err());
    }

    #[test]
    fn test_security_answer_matching() {
        let challenge = SecurityChallenge {
            question: "First pet?".to_string(),
            answer: "Rex".to_string(),
        };
        assert!(challenge.accepts("  rex "));
        assert!(!challenge.accepts("Max"));

        let empty = SecurityChallenge { question: "Q".to_string(), answer: String::new() };
        assert!(!empty.accepts(""));
    }

    #[test]
    fn test_register_validation() {
        let mut user = RegisterUser {
            username: "alice".to_string(),
            password: "pw1".to_string(),
            person: PersonDetail {
                name: "Alice".to_string(),
                contact_number: "555-0100".to_string(),
                address: String::new(),
                gender: Gender::Female,
            },
            security_question: "First pet?".to_string(),
            security_answer: "Rex".to_string(),
        };
        assert!(user.validate().is_ok());

        user.username = "   ".to_string();
        assert!(matches!(user.validate(), Err(CoreError::Validation(_))));
    }

    #[test]
    fn test_overlong_fields_are_rejected() {
        let user = RegisterUser {
            username: "a".repeat(50),
            password: "pw1".to_string(),
            person: PersonDetail {
                name: "Alice".to_string(),
                contact_number: "5".repeat(20),
                address: String::new(),
                gender: Gender::Female,
            },
            security_question: "First pet?".to_string(),
            security_answer: "Rex".to_string(),
        };
        assert!(user.validate().is_ok());

        let mut long_name = user.clone();
        long_name.username = "a".repeat(51);
        assert!(matches!(long_name.validate(), Err(CoreError::Validation(_))));

        let mut long_contact = user.clone();
        long_contact.person.contact_number = "5".repeat(21);
        assert!(matches!(long_contact.validate(), Err(CoreError::Validation(_))));

        let mut long_answer = user;
        long_answer.security_answer = "x".repeat(256);
        assert!(matches!(long_answer.validate(), Err(CoreError::Validation(_))));
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        assert!(within("person.name", &"é".repeat(100), NAME_MAX).is_ok());
        assert!(within("person.name", &"é".repeat(101), NAME_MAX).is_err());
    }

    #[test]
    fn test_profile_update_lengths() {
        let update = ProfileUpdate {
            user_id: 1,
            username: "alice".to_string(),
            password: None,
            person_name: "Alice".to_string(),
            contact_number: "555-0100-555-0100-555-0100".to_string(),
            address: String::new(),
        };
        assert!(matches!(update.validate(), Err(CoreError::Validation(_))));
    }
}
