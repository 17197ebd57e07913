use crate::model::{
    Id,
    category::{Category, CategoryMarker, CategoryName},
    post::{Post, PostContent, PostTitle},
    user::Username,
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt::Display};

pub const PASSWORD_MIN_LEN: usize = 8;

const REQUIRED: &str = "This field is required.";

/// Validation messages keyed by field name. Errors that concern the form as a
/// whole live under [`FormErrors::FORM`].
#[derive(Clone, Eq, PartialEq, Debug, Default, Serialize)]
#[serde(transparent)]
pub struct FormErrors(BTreeMap<&'static str, Vec<String>>);

impl FormErrors {
    pub const FORM: &'static str = "form";

    pub fn add(&mut self, field: &'static str, message: impl Display) {
        self.0.entry(field).or_default().push(message.to_string());
    }

    #[must_use]
    pub fn with(field: &'static str, message: impl Display) -> Self {
        let mut errors = Self::default();
        errors.add(field, message);
        errors
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map_or(&[], Vec::as_slice)
    }

    fn finish<T>(self, value: Option<T>) -> Result<T, Self> {
        match value {
            Some(value) if self.is_empty() => Ok(value),
            _ => Err(self),
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize, Serialize)]
pub struct PostForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    /// Raw option values, parsed by [`PostForm::validate`].
    #[serde(default)]
    pub categories: Vec<String>,
}

impl PostForm {
    /// `available` is the full set of existing categories; selecting anything
    /// outside of it is a field error.
    pub fn validate(&self, available: &[Category]) -> Result<PostContent, FormErrors> {
        let mut errors = FormErrors::default();

        let title = PostTitle::new(&self.title)
            .map_err(|err| errors.add("title", err))
            .ok();

        if self.body.trim().is_empty() {
            errors.add("body", REQUIRED);
        }

        let mut categories = Vec::with_capacity(self.categories.len());
        for value in &self.categories {
            let selected = value
                .trim()
                .parse::<i64>()
                .ok()
                .map(Id::<CategoryMarker>::new)
                .filter(|&id| available.iter().any(|category| category.id == id));

            match selected {
                Some(id) if !categories.contains(&id) => categories.push(id),
                Some(_) => {}
                None => errors.add(
                    "categories",
                    format!("Select a valid choice. {value} is not one of the available choices."),
                ),
            }
        }

        errors.finish(title.map(|title| PostContent {
            title,
            body: self.body.trim().to_owned(),
            categories,
        }))
    }
}

impl From<&Post> for PostForm {
    fn from(post: &Post) -> Self {
        Self {
            title: post.title.get().to_owned(),
            body: post.body.clone(),
            categories: post
                .category_ids()
                .into_iter()
                .map(|id| id.to_string())
                .collect(),
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize, Serialize)]
pub struct CommentForm {
    #[serde(default)]
    pub body: String,
}

impl CommentForm {
    pub fn validate(&self) -> Result<String, FormErrors> {
        let body = self.body.trim();
        if body.is_empty() {
            Err(FormErrors::with("body", REQUIRED))
        } else {
            Ok(body.to_owned())
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize)]
pub struct RegistrationForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password_confirmation: String,
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Registration {
    pub username: Username,
    pub password: String,
}

impl RegistrationForm {
    /// Username availability is checked against the store by the caller.
    pub fn validate(&self) -> Result<Registration, FormErrors> {
        let mut errors = FormErrors::default();

        let username = Username::new(&self.username)
            .map_err(|err| errors.add("username", err))
            .ok();

        if self.password.is_empty() {
            errors.add("password", REQUIRED);
        } else {
            if self.password.chars().count() < PASSWORD_MIN_LEN {
                errors.add(
                    "password",
                    format!(
                        "This password is too short. It must contain at least {PASSWORD_MIN_LEN} characters."
                    ),
                );
            }
            if self.password.chars().all(|c| c.is_ascii_digit()) {
                errors.add("password", "This password is entirely numeric.");
            }
            if username
                .as_ref()
                .is_some_and(|username| username.get().to_lowercase() == self.password.to_lowercase())
            {
                errors.add("password", "The password is too similar to the username.");
            }
        }

        if self.password != self.password_confirmation {
            errors.add(
                "password_confirmation",
                "The two password fields didn't match.",
            );
        }

        errors.finish(username.map(|username| Registration {
            username,
            password: self.password.clone(),
        }))
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub next: Option<String>,
}

pub const INVALID_LOGIN: &str = "Please enter a correct username and password.";

impl LoginForm {
    pub fn validate(&self) -> Result<(Username, &str), FormErrors> {
        let mut errors = FormErrors::default();

        if self.username.trim().is_empty() {
            errors.add("username", REQUIRED);
        }
        if self.password.is_empty() {
            errors.add("password", REQUIRED);
        }
        if !errors.is_empty() {
            return Err(errors);
        }

        let username =
            Username::new(&self.username).map_err(|_| FormErrors::with(FormErrors::FORM, INVALID_LOGIN))?;

        Ok((username, &self.password))
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize)]
pub struct CategoryForm {
    #[serde(default)]
    pub name: String,
}

impl CategoryForm {
    pub fn validate(&self) -> Result<CategoryName, FormErrors> {
        CategoryName::new(&self.name).map_err(|err| FormErrors::with("name", err))
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        form::{
            CategoryForm, CommentForm, FormErrors, INVALID_LOGIN, LoginForm, PostForm,
            RegistrationForm,
        },
        model::{
            Id,
            category::{Category, CategoryName},
        },
    };

    fn categories() -> Vec<Category> {
        vec![
            Category {
                id: Id::new(1),
                name: CategoryName::new("Tech").unwrap(),
            },
            Category {
                id: Id::new(2),
                name: CategoryName::new("Life").unwrap(),
            },
        ]
    }

    #[test]
    fn valid_post_form() {
        let form = PostForm {
            title: "  Hello  ".to_owned(),
            body: "World".to_owned(),
            categories: vec!["2".to_owned(), " 1 ".to_owned(), "2".to_owned()],
        };

        let content = form.validate(&categories()).unwrap();
        assert_eq!(content.title.get(), "Hello");
        assert_eq!(content.body, "World");
        assert_eq!(content.categories, vec![Id::new(2), Id::new(1)]);
    }

    #[test]
    fn post_form_reports_every_field() {
        let form = PostForm {
            title: String::new(),
            body: "   ".to_owned(),
            categories: vec!["1".to_owned(), "99".to_owned(), "abc".to_owned()],
        };

        let errors = form.validate(&categories()).unwrap_err();
        assert_eq!(errors.get("title").len(), 1);
        assert_eq!(errors.get("body"), ["This field is required."]);
        assert_eq!(
            errors.get("categories"),
            [
                "Select a valid choice. 99 is not one of the available choices.",
                "Select a valid choice. abc is not one of the available choices.",
            ]
        );
    }

    #[test]
    fn post_title_too_long() {
        let form = PostForm {
            title: "t".repeat(256),
            body: "body".to_owned(),
            categories: Vec::new(),
        };

        assert!(!form.validate(&[]).unwrap_err().get("title").is_empty());
    }

    #[test]
    fn comment_form() {
        let valid = CommentForm {
            body: " First! ".to_owned(),
        };
        assert_eq!(valid.validate().unwrap(), "First!");

        let empty = CommentForm {
            body: "\n".to_owned(),
        };
        assert_eq!(empty.validate().unwrap_err().get("body").len(), 1);
    }

    #[test]
    fn registration_form() {
        let mut form = RegistrationForm {
            username: "alice".to_owned(),
            password: "s3cret-words".to_owned(),
            password_confirmation: "s3cret-words".to_owned(),
        };
        let registration = form.validate().unwrap();
        assert_eq!(registration.username.get(), "alice");
        assert_eq!(registration.password, "s3cret-words");

        form.password_confirmation = "something else".to_owned();
        assert_eq!(
            form.validate().unwrap_err().get("password_confirmation").len(),
            1
        );

        form.password = "1234567890".to_owned();
        form.password_confirmation = "1234567890".to_owned();
        assert_eq!(
            form.validate().unwrap_err().get("password"),
            ["This password is entirely numeric."]
        );

        form.password = "short".to_owned();
        form.password_confirmation = "short".to_owned();
        assert_eq!(form.validate().unwrap_err().get("password").len(), 1);

        form.username = "AliceCooper".to_owned();
        form.password = "alicecooper".to_owned();
        form.password_confirmation = "alicecooper".to_owned();
        assert_eq!(
            form.validate().unwrap_err().get("password"),
            ["The password is too similar to the username."]
        );

        form.username = "not valid".to_owned();
        form.password = "s3cret-words".to_owned();
        form.password_confirmation = "s3cret-words".to_owned();
        let errors = form.validate().unwrap_err();
        assert_eq!(errors.get("username").len(), 1);
        assert!(errors.get("password").is_empty());
    }

    #[test]
    fn login_form() {
        let form = LoginForm {
            username: "alice".to_owned(),
            password: "pw".to_owned(),
            next: None,
        };
        let (username, password) = form.validate().unwrap();
        assert_eq!(username.get(), "alice");
        assert_eq!(password, "pw");

        let form = LoginForm {
            username: "no spaces allowed".to_owned(),
            password: "pw".to_owned(),
            next: None,
        };
        assert_eq!(form.validate().unwrap_err().get(FormErrors::FORM), [INVALID_LOGIN]);

        let errors = LoginForm::default().validate().unwrap_err();
        assert_eq!(errors.get("username").len(), 1);
        assert_eq!(errors.get("password").len(), 1);
    }

    #[test]
    fn category_form() {
        let form = CategoryForm {
            name: " Rust ".to_owned(),
        };
        assert_eq!(form.validate().unwrap().get(), "Rust");
        assert!(CategoryForm::default().validate().is_err());
    }
}
