use std::fmt;
use std::path::Path;

use crate::error::{PoolError, Result};
use crate::settings::file::{parse_properties, required};

/// Backend credentials handed to [`SessionFactory`](crate::SessionFactory)
/// implementations.
///
/// The pool core never reads these; they exist so factory implementations
/// share one carrier and one loading policy with the settings providers.
#[derive(Clone)]
pub struct Credentials {
    pub user: String,
    pub password: String,
    pub url: String,
}

impl Credentials {
    pub fn new(
        user: impl Into<String>,
        password: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
            url: url.into(),
        }
    }

    /// Load credentials from a `key = value` properties file with the keys
    /// `user`, `password` and `url`. Absence of any key is fatal.
    pub fn from_properties_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| PoolError::Io(format!("cannot read {}: {}", path.display(), e)))?;
        let props = parse_properties(&text);

        Ok(Self {
            user: required(&props, "user")?.to_string(),
            password: required(&props, "password")?.to_string(),
            url: required(&props, "url")?.to_string(),
        })
    }
}

// Manual Debug so the password never reaches logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("url", &self.url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn loads_from_properties_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "user = app\npassword = hunter2\nurl = jdbc:postgresql://db:5432/app\n"
        )
        .unwrap();

        let creds = Credentials::from_properties_file(file.path()).unwrap();
        assert_eq!(creds.user, "app");
        assert_eq!(creds.password, "hunter2");
        assert_eq!(creds.url, "jdbc:postgresql://db:5432/app");
    }

    #[test]
    fn missing_password_is_fatal() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "user = app\nurl = jdbc:postgresql://db:5432/app\n").unwrap();

        match Credentials::from_properties_file(file.path()) {
            Err(PoolError::ConfigMissing { key }) => assert_eq!(key, "password"),
            other => panic!("expected ConfigMissing, got {other:?}"),
        }
    }

    #[test]
    fn unreadable_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let absent = dir.path().join("absent.properties");

        assert!(matches!(
            Credentials::from_properties_file(&absent),
            Err(PoolError::Io(_))
        ));
    }

    #[test]
    fn debug_redacts_password() {
        let creds = Credentials::new("app", "hunter2", "postgres://db/app");
        let rendered = format!("{creds:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }
}
