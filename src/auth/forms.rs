//! Submitted forms and their field-level validation.
//!
//! Errors are kept per field in the order the form declares its fields, so
//! status messages and rendered error lists come out in a stable order.

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{json, Value};

use crate::auth::password::PasswordPolicy;

pub const USERNAME_MAX_LENGTH: usize = 150;

pub const REQUIRED: &str = "This field is required.";
pub const INVALID_USERNAME: &str =
    "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.";
pub const DUPLICATE_USERNAME: &str = "A user with that username already exists.";
pub const PASSWORD_MISMATCH: &str = "The two password fields didn't match.";
pub const INCORRECT_OLD_PASSWORD: &str =
    "Your old password was entered incorrectly. Please enter it again.";

/// Validation errors keyed by field name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormErrors {
    fields: Vec<(String, Vec<String>)>,
}

impl FormErrors {
    pub fn for_fields(fields: &[&str]) -> Self {
        Self {
            fields: fields.iter().map(|f| (f.to_string(), Vec::new())).collect(),
        }
    }

    /// Fields the form never declared are appended after the declared ones.
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        match self.fields.iter_mut().find(|(name, _)| name == field) {
            Some((_, errors)) => errors.push(message.into()),
            None => self.fields.push((field.to_string(), vec![message.into()])),
        }
    }

    pub fn extend<I>(&mut self, field: &str, messages: I)
    where
        I: IntoIterator<Item = String>,
    {
        for message in messages {
            self.add(field, message);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.iter().all(|(_, errors)| errors.is_empty())
    }

    pub fn has_errors(&self, field: &str) -> bool {
        !self.get(field).is_empty()
    }

    pub fn get(&self, field: &str) -> &[String] {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, errors)| errors.as_slice())
            .unwrap_or(&[])
    }

    /// Fields with at least one error, in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.fields
            .iter()
            .filter(|(_, errors)| !errors.is_empty())
            .map(|(name, errors)| (name.as_str(), errors.as_slice()))
    }

    /// One `"{Field}: {error}"` line per error.
    pub fn messages(&self) -> Vec<String> {
        self.iter()
            .flat_map(|(field, errors)| {
                let label = capitalize(field);
                errors.iter().map(move |e| format!("{}: {}", label, e))
            })
            .collect()
    }
}

impl Serialize for FormErrors {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        struct Entry<'a>(&'a str, &'a [String]);

        impl Serialize for Entry<'_> {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("field", self.0)?;
                map.serialize_entry("messages", self.1)?;
                map.end()
            }
        }

        let entries: Vec<_> = self.iter().collect();
        let mut seq = serializer.serialize_seq(Some(entries.len()))?;
        for (field, errors) in entries {
            seq.serialize_element(&Entry(field, errors))?;
        }
        seq.end()
    }
}

/// Upper-cases the first character and lower-cases the rest.
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// The `form` entry of a page context.
pub fn form_context(data: Value, errors: Option<&FormErrors>) -> Value {
    json!({
        "data": data,
        "errors": errors.map(|e| json!(e)).unwrap_or_else(|| json!([])),
    })
}

fn valid_username_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '@' | '.' | '+' | '-')
}

fn check_new_password_pair(
    errors: &mut FormErrors,
    policy: &PasswordPolicy,
    username: &str,
    (first_field, first): (&str, &str),
    (second_field, second): (&str, &str),
) {
    if first.is_empty() {
        errors.add(first_field, REQUIRED);
    }
    if second.is_empty() {
        errors.add(second_field, REQUIRED);
        return;
    }
    if first.is_empty() {
        return;
    }
    if first != second {
        errors.add(second_field, PASSWORD_MISMATCH);
        return;
    }
    errors.extend(second_field, policy.validate(second, username));
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistrationForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password1: String,
    #[serde(default)]
    pub password2: String,
}

impl RegistrationForm {
    pub const FIELDS: &'static [&'static str] = &["username", "password1", "password2"];

    pub fn username(&self) -> &str {
        self.username.trim()
    }

    /// Every check that doesn't need the identity store.
    pub fn validate(&self, policy: &PasswordPolicy) -> FormErrors {
        let mut errors = FormErrors::for_fields(Self::FIELDS);
        let username = self.username();
        let length = username.chars().count();

        if username.is_empty() {
            errors.add("username", REQUIRED);
        } else if length > USERNAME_MAX_LENGTH {
            errors.add(
                "username",
                format!(
                    "Ensure this value has at most {} characters (it has {}).",
                    USERNAME_MAX_LENGTH, length
                ),
            );
        } else if !username.chars().all(valid_username_char) {
            errors.add("username", INVALID_USERNAME);
        }

        check_new_password_pair(
            &mut errors,
            policy,
            username,
            ("password1", self.password1.as_str()),
            ("password2", self.password2.as_str()),
        );
        errors
    }

    /// Submitted values worth echoing back. Passwords are never re-rendered.
    pub fn data(&self) -> Value {
        json!({ "username": self.username() })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl LoginForm {
    pub const FIELDS: &'static [&'static str] = &["username", "password"];

    pub fn username(&self) -> &str {
        self.username.trim()
    }

    /// Shape only: presence and length. Credentials are checked by the service.
    pub fn validate(&self) -> FormErrors {
        let mut errors = FormErrors::for_fields(Self::FIELDS);
        let username = self.username();
        let length = username.chars().count();

        if username.is_empty() {
            errors.add("username", REQUIRED);
        } else if length > USERNAME_MAX_LENGTH {
            errors.add(
                "username",
                format!(
                    "Ensure this value has at most {} characters (it has {}).",
                    USERNAME_MAX_LENGTH, length
                ),
            );
        }
        if self.password.is_empty() {
            errors.add("password", REQUIRED);
        }
        errors
    }

    pub fn data(&self) -> Value {
        json!({ "username": self.username() })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PasswordChangeForm {
    #[serde(default)]
    pub old_password: String,
    #[serde(default)]
    pub new_password1: String,
    #[serde(default)]
    pub new_password2: String,
}

impl PasswordChangeForm {
    pub const FIELDS: &'static [&'static str] = &["old_password", "new_password1", "new_password2"];

    /// Everything except the old-password check.
    pub fn validate(&self, policy: &PasswordPolicy, username: &str) -> FormErrors {
        let mut errors = FormErrors::for_fields(Self::FIELDS);
        if self.old_password.is_empty() {
            errors.add("old_password", REQUIRED);
        }
        check_new_password_pair(
            &mut errors,
            policy,
            username,
            ("new_password1", self.new_password1.as_str()),
            ("new_password2", self.new_password2.as_str()),
        );
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(username: &str, p1: &str, p2: &str) -> RegistrationForm {
        RegistrationForm {
            username: username.to_string(),
            password1: p1.to_string(),
            password2: p2.to_string(),
        }
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("password2"), "Password2");
        assert_eq!(capitalize("username"), "Username");
        assert_eq!(capitalize("OLD_PASSWORD"), "Old_password");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn test_errors_keep_declaration_order() {
        let mut errors = FormErrors::for_fields(&["username", "password1", "password2"]);
        errors.add("password2", "second");
        errors.add("username", "first");
        errors.add("__all__", "last");

        let fields: Vec<&str> = errors.iter().map(|(f, _)| f).collect();
        assert_eq!(fields, vec!["username", "password2", "__all__"]);
        assert_eq!(
            errors.messages(),
            vec!["Username: first", "Password2: second", "__all__: last"]
        );
    }

    #[test]
    fn test_errors_serialize_as_ordered_list() {
        let mut errors = FormErrors::for_fields(&["username", "password"]);
        errors.add("password", REQUIRED);
        errors.add("username", REQUIRED);

        let value = serde_json::to_value(&errors).unwrap();
        assert_eq!(
            value,
            json!([
                {"field": "username", "messages": [REQUIRED]},
                {"field": "password", "messages": [REQUIRED]},
            ])
        );
    }

    #[test]
    fn test_valid_registration() {
        let form = registration("alice", "tangerine-orbit-42", "tangerine-orbit-42");
        assert!(form.validate(&PasswordPolicy::default()).is_empty());
    }

    #[test]
    fn test_registration_mismatch() {
        let form = registration("alice", "tangerine-orbit-42", "tangerine-orbit-43");
        let errors = form.validate(&PasswordPolicy::default());

        assert_eq!(errors.get("password2"), &[PASSWORD_MISMATCH.to_string()]);
        assert!(!errors.has_errors("username"));
        assert_eq!(errors.messages(), vec![format!("Password2: {}", PASSWORD_MISMATCH)]);
    }

    #[test]
    fn test_registration_missing_fields() {
        let errors = RegistrationForm::default().validate(&PasswordPolicy::default());
        assert_eq!(
            errors.messages(),
            vec![
                format!("Username: {}", REQUIRED),
                format!("Password1: {}", REQUIRED),
                format!("Password2: {}", REQUIRED),
            ]
        );
    }

    #[test]
    fn test_registration_username_rules() {
        let policy = PasswordPolicy::default();

        let errors =
            registration("bad name!", "tangerine-orbit-42", "tangerine-orbit-42").validate(&policy);
        assert_eq!(errors.get("username"), &[INVALID_USERNAME.to_string()]);

        let long = "a".repeat(151);
        let errors =
            registration(&long, "tangerine-orbit-42", "tangerine-orbit-42").validate(&policy);
        assert_eq!(
            errors.get("username"),
            &["Ensure this value has at most 150 characters (it has 151).".to_string()]
        );

        let errors = registration(
            "j.doe+tag@example-mail_1",
            "tangerine-orbit-42",
            "tangerine-orbit-42",
        )
        .validate(&policy);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_registration_policy_errors_land_on_confirmation() {
        let form = registration("alice", "12345678", "12345678");
        let errors = form.validate(&PasswordPolicy::default());

        assert!(!errors.has_errors("password1"));
        assert_eq!(
            errors.get("password2"),
            &[
                "This password is too common.".to_string(),
                "This password is entirely numeric.".to_string(),
            ]
        );
    }

    #[test]
    fn test_registration_data_never_echoes_passwords() {
        let form = registration("  alice ", "tangerine-orbit-42", "x");
        assert_eq!(form.data(), json!({"username": "alice"}));
    }

    #[test]
    fn test_login_shape() {
        let ok = LoginForm {
            username: "alice".into(),
            password: "pw".into(),
        };
        assert!(ok.validate().is_empty());

        let missing = LoginForm {
            username: "alice".into(),
            password: String::new(),
        };
        assert_eq!(missing.validate().get("password"), &[REQUIRED.to_string()]);

        let long = LoginForm {
            username: "x".repeat(200),
            password: "pw".into(),
        };
        assert!(long.validate().has_errors("username"));
    }

    #[test]
    fn test_password_change_validation() {
        let policy = PasswordPolicy::default();
        let form = PasswordChangeForm {
            old_password: String::new(),
            new_password1: "tangerine-orbit-42".into(),
            new_password2: "tangerine-orbit-24".into(),
        };
        let errors = form.validate(&policy, "alice");

        assert_eq!(errors.get("old_password"), &[REQUIRED.to_string()]);
        assert_eq!(errors.get("new_password2"), &[PASSWORD_MISMATCH.to_string()]);
    }
}
