//! Form bindings and their validation.
//!
//! Every form declares its fields in [`FormSchema::FIELDS`], which the
//! templates and tests read instead of inspecting the struct at runtime.

use std::collections::BTreeMap;

use file_format::FileFormat;
use serde::{Deserialize, Serialize};

use crate::{
    entity::{group, post},
    media::{self, ImageUpload},
    service::NewUser,
};

pub const NON_FIELD_ERRORS: &str = "__all__";
pub const REQUIRED: &str = "This field is required.";
pub const INVALID_CHOICE: &str =
    "Select a valid choice. That choice is not one of the available choices.";
pub const USERNAME_MAX_LEN: usize = 150;
pub const PASSWORD_MIN_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Free text
    Char,
    Email,
    Password,
    /// Reference to a stored record, chosen from a list
    ModelChoice,
    Image,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Field {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub help_text: &'static str,
}

pub trait FormSchema {
    const FIELDS: &'static [Field];

    fn field(name: &str) -> Option<&'static Field> {
        Self::FIELDS.iter().find(|field| field.name == name)
    }
}

/// Validation messages keyed by field name.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FormErrors(BTreeMap<String, Vec<String>>);

impl FormErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_owned())
            .or_default()
            .push(message.into());
    }

    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn into_result<T>(self, value: impl FnOnce() -> T) -> Result<T, FormErrors> {
        if self.is_empty() {
            Ok(value())
        } else {
            Err(self)
        }
    }
}

fn required(errors: &mut FormErrors, field: &str, value: &str) -> bool {
    if value.trim().is_empty() {
        errors.add(field, REQUIRED);
        false
    } else {
        true
    }
}

/// An uploaded image that passed content sniffing.
#[derive(Debug, Clone)]
pub struct ValidImage {
    pub upload: ImageUpload,
    pub format: FileFormat,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PostForm {
    pub text: String,
    /// Group id, or empty for no group
    pub group: String,
}

#[derive(Debug, Clone)]
pub struct CleanedPost {
    pub text: String,
    pub group_id: Option<i32>,
    pub image: Option<ValidImage>,
}

impl FormSchema for PostForm {
    const FIELDS: &'static [Field] = &[
        Field {
            name: "text",
            label: "Post text",
            kind: FieldKind::Char,
            required: true,
            help_text: "Text of the new post",
        },
        Field {
            name: "group",
            label: "Group",
            kind: FieldKind::ModelChoice,
            required: false,
            help_text: "Group the post belongs to",
        },
        Field {
            name: "image",
            label: "Image",
            kind: FieldKind::Image,
            required: false,
            help_text: "Picture shown with the post",
        },
    ];
}

impl PostForm {
    /// Initial values for editing `post`.
    pub fn from_post(post: &post::Model) -> Self {
        Self {
            text: post.text.clone(),
            group: post.group_id.map(|id| id.to_string()).unwrap_or_default(),
        }
    }

    /// Check the submission against the groups that may be chosen.
    pub fn validate(
        &self,
        groups: &[group::Model],
        image: Option<&ImageUpload>,
    ) -> Result<CleanedPost, FormErrors> {
        let mut errors = FormErrors::new();
        required(&mut errors, "text", &self.text);

        let group_id = match self.group.trim() {
            "" => None,
            raw => match raw.parse::<i32>() {
                Ok(id) if groups.iter().any(|group| group.id == id) => Some(id),
                _ => {
                    errors.add("group", INVALID_CHOICE);
                    None
                }
            },
        };

        let image = match image {
            Some(upload) => match media::validate_image(upload) {
                Ok(format) => Some(ValidImage {
                    upload: upload.clone(),
                    format,
                }),
                Err(message) => {
                    errors.add("image", message);
                    None
                }
            },
            None => None,
        };

        errors.into_result(|| CleanedPost {
            text: self.text.trim().to_owned(),
            group_id,
            image,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CommentForm {
    pub text: String,
}

impl FormSchema for CommentForm {
    const FIELDS: &'static [Field] = &[Field {
        name: "text",
        label: "Comment",
        kind: FieldKind::Char,
        required: true,
        help_text: "",
    }];
}

impl CommentForm {
    pub fn validate(&self) -> Result<String, FormErrors> {
        let mut errors = FormErrors::new();
        required(&mut errors, "text", &self.text);
        errors.into_result(|| self.text.trim().to_owned())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SignupForm {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password1: String,
    #[serde(skip_serializing)]
    pub password2: String,
}

impl FormSchema for SignupForm {
    const FIELDS: &'static [Field] = &[
        Field {
            name: "first_name",
            label: "First name",
            kind: FieldKind::Char,
            required: false,
            help_text: "",
        },
        Field {
            name: "last_name",
            label: "Last name",
            kind: FieldKind::Char,
            required: false,
            help_text: "",
        },
        Field {
            name: "username",
            label: "Username",
            kind: FieldKind::Char,
            required: true,
            help_text: "Required. 150 characters or fewer. Letters, digits and @/./+/-/_ only.",
        },
        Field {
            name: "email",
            label: "Email address",
            kind: FieldKind::Email,
            required: false,
            help_text: "",
        },
        Field {
            name: "password1",
            label: "Password",
            kind: FieldKind::Password,
            required: true,
            help_text: "Your password must contain at least 8 characters and can't be entirely numeric.",
        },
        Field {
            name: "password2",
            label: "Password confirmation",
            kind: FieldKind::Password,
            required: true,
            help_text: "Enter the same password as before, for verification.",
        },
    ];
}

impl SignupForm {
    /// `username_taken` reports whether the submitted username is already registered.
    pub fn validate(&self, username_taken: bool) -> Result<NewUser, FormErrors> {
        let mut errors = FormErrors::new();
        let username = self.username.trim();

        if required(&mut errors, "username", username) {
            if username.chars().count() > USERNAME_MAX_LEN
                || !username
                    .chars()
                    .all(|c| c.is_alphanumeric() || "@.+-_".contains(c))
            {
                errors.add(
                    "username",
                    "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
                );
            } else if username_taken {
                errors.add("username", "A user with that username already exists.");
            }
        }

        let email = self.email.trim();
        if !email.is_empty() && !is_plausible_email(email) {
            errors.add("email", "Enter a valid email address.");
        }

        let has_password1 = required(&mut errors, "password1", &self.password1);
        let has_password2 = required(&mut errors, "password2", &self.password2);
        if has_password1 && has_password2 {
            if self.password1 != self.password2 {
                errors.add("password2", "The two password fields didn't match.");
            } else {
                if self.password2.chars().count() < PASSWORD_MIN_LEN {
                    errors.add(
                        "password2",
                        format!(
                            "This password is too short. It must contain at least {PASSWORD_MIN_LEN} characters."
                        ),
                    );
                }
                if self.password2.chars().all(|c| c.is_ascii_digit()) {
                    errors.add("password2", "This password is entirely numeric.");
                }
            }
        }

        errors.into_result(|| NewUser {
            username: username.to_owned(),
            first_name: self.first_name.trim().to_owned(),
            last_name: self.last_name.trim().to_owned(),
            email: email.to_owned(),
            password: Some(self.password1.clone()),
        })
    }
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoginForm {
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
}

impl FormSchema for LoginForm {
    const FIELDS: &'static [Field] = &[
        Field {
            name: "username",
            label: "Username",
            kind: FieldKind::Char,
            required: true,
            help_text: "",
        },
        Field {
            name: "password",
            label: "Password",
            kind: FieldKind::Password,
            required: true,
            help_text: "",
        },
    ];
}

impl LoginForm {
    pub const INVALID_LOGIN: &'static str = "Please enter a correct username and password. Note that both fields may be case-sensitive.";

    /// Presence checks only; credentials are verified against the database afterwards.
    pub fn validate(&self) -> Result<(), FormErrors> {
        let mut errors = FormErrors::new();
        required(&mut errors, "username", &self.username);
        required(&mut errors, "password", &self.password);
        errors.into_result(|| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn groups() -> Vec<group::Model> {
        vec![group::Model {
            id: 3,
            title: "Test group".to_owned(),
            slug: "test-slug".to_owned(),
            description: "Test description".to_owned(),
        }]
    }

    fn post_form(text: &str, group: &str) -> PostForm {
        PostForm {
            text: text.to_owned(),
            group: group.to_owned(),
        }
    }

    #[test]
    fn post_form_schema() {
        let fields: Vec<_> = PostForm::FIELDS.iter().map(|f| (f.name, f.kind)).collect();
        assert_eq!(
            fields,
            vec![
                ("text", FieldKind::Char),
                ("group", FieldKind::ModelChoice),
                ("image", FieldKind::Image),
            ]
        );
        assert!(PostForm::field("text").unwrap().required);
        assert!(!PostForm::field("group").unwrap().required);
        assert!(PostForm::field("author").is_none());
    }

    #[test]
    fn post_form_accepts_text_and_group() {
        let cleaned = post_form("  Hello  ", "3").validate(&groups(), None).unwrap();
        assert_eq!(cleaned.text, "Hello");
        assert_eq!(cleaned.group_id, Some(3));
        assert!(cleaned.image.is_none());

        let cleaned = post_form("Hello", "").validate(&groups(), None).unwrap();
        assert_eq!(cleaned.group_id, None);
    }

    #[test]
    fn post_form_rejects_blank_text_and_unknown_group() {
        let errors = post_form("   ", "42").validate(&groups(), None).unwrap_err();
        assert_eq!(errors.get("text"), [REQUIRED.to_owned()]);
        assert_eq!(errors.get("group"), [INVALID_CHOICE.to_owned()]);

        let errors = post_form("text", "not-a-number")
            .validate(&groups(), None)
            .unwrap_err();
        assert!(errors.has("group"));
        assert!(!errors.has("text"));
    }

    #[test]
    fn post_form_rejects_non_image() {
        let upload = ImageUpload::new("fake.png", &b"plain text"[..]);
        let errors = post_form("text", "")
            .validate(&groups(), Some(&upload))
            .unwrap_err();
        assert_eq!(errors.get("image"), [media::INVALID_IMAGE.to_owned()]);
    }

    #[test]
    fn comment_form_requires_text() {
        let form = CommentForm {
            text: "\n".to_owned(),
        };
        assert!(form.validate().unwrap_err().has("text"));

        let form = CommentForm {
            text: " Nice post ".to_owned(),
        };
        assert_eq!(form.validate().unwrap(), "Nice post");
    }

    fn signup(username: &str, password1: &str, password2: &str) -> SignupForm {
        SignupForm {
            username: username.to_owned(),
            password1: password1.to_owned(),
            password2: password2.to_owned(),
            ..Default::default()
        }
    }

    #[test]
    fn signup_form_valid() {
        let user = signup("leo", "correct horse", "correct horse")
            .validate(false)
            .unwrap();
        assert_eq!(user.username, "leo");
        assert_eq!(user.password.as_deref(), Some("correct horse"));
    }

    #[test]
    fn signup_form_errors() {
        let errors = signup("leo", "correct horse", "battery staple")
            .validate(false)
            .unwrap_err();
        assert!(errors.has("password2"));

        let errors = signup("leo", "1234", "1234").validate(false).unwrap_err();
        assert_eq!(errors.get("password2").len(), 2);

        let errors = signup("no spaces", "correct horse", "correct horse")
            .validate(false)
            .unwrap_err();
        assert!(errors.has("username"));

        let errors = signup("leo", "correct horse", "correct horse")
            .validate(true)
            .unwrap_err();
        assert_eq!(
            errors.get("username"),
            ["A user with that username already exists.".to_owned()]
        );

        let mut form = signup("leo", "correct horse", "correct horse");
        form.email = "leo-at-example".to_owned();
        assert!(form.validate(false).unwrap_err().has("email"));
    }

    #[test]
    fn login_form_requires_both_fields() {
        let errors = LoginForm::default().validate().unwrap_err();
        assert!(errors.has("username"));
        assert!(errors.has("password"));
    }
}
