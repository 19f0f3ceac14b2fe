use serde::Serialize;

use crate::error::{Error, Result};

pub const RELEASES_DIR: &str = "releases";
pub const CURRENT_LINK: &str = "current";

/// A timestamped release directory on the remote host and the `current`
/// symlink that points at the active one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseIdentity {
    pub id: String,
    pub release_path: String,
    pub current_path: String,
}

impl ReleaseIdentity {
    /// `<deploy_to>/releases/<id>` and `<deploy_to>/current`.
    pub fn new(deploy_to: &str, id: &str) -> Result<Self> {
        let deploy_to = deploy_to.trim();
        if deploy_to.is_empty() {
            return Err(Error::config_missing_key("deployTo", None));
        }
        let root = deploy_to.trim_end_matches('/');
        let id = id.trim();
        if id.is_empty() {
            return Err(Error::validation_invalid_argument(
                "releaseId",
                "Release id cannot be empty",
            ));
        }

        Ok(Self {
            id: id.to_string(),
            release_path: format!("{}/{}/{}", root, RELEASES_DIR, id),
            current_path: format!("{}/{}", root, CURRENT_LINK),
        })
    }
}

/// Seconds since the Unix epoch, as used for release directory names.
pub fn generate_id() -> String {
    chrono::Utc::now().timestamp().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn release_path_is_deterministic() {
        let release = ReleaseIdentity::new("/srv/app", "1700000000").unwrap();

        assert_eq!(release.release_path, "/srv/app/releases/1700000000");
        assert_eq!(release.current_path, "/srv/app/current");
        assert_eq!(release.id, "1700000000");
    }

    #[test]
    fn trailing_slash_on_deploy_root_is_tolerated() {
        let release = ReleaseIdentity::new("/srv/app/", "42").unwrap();

        assert_eq!(release.release_path, "/srv/app/releases/42");
        assert_eq!(release.current_path, "/srv/app/current");
    }

    #[test]
    fn empty_deploy_root_is_missing_key() {
        let err = ReleaseIdentity::new("  ", "42").unwrap_err();

        assert_eq!(err.code, ErrorCode::ConfigMissingKey);
        assert_eq!(err.details["key"], "deployTo");
    }

    #[test]
    fn relative_and_home_roots_are_kept_as_given() {
        let release = ReleaseIdentity::new("~/app", "7").unwrap();
        assert_eq!(release.release_path, "~/app/releases/7");

        let release = ReleaseIdentity::new(" www ", "7").unwrap();
        assert_eq!(release.current_path, "www/current");

        let release = ReleaseIdentity::new("/", "7").unwrap();
        assert_eq!(release.release_path, "/releases/7");
    }

    #[test]
    fn empty_release_id_is_rejected() {
        let err = ReleaseIdentity::new("/srv/app", " ").unwrap_err();

        assert_eq!(err.code, ErrorCode::ValidationInvalidArgument);
    }

    #[test]
    fn generated_id_is_unix_seconds() {
        let id: i64 = generate_id().parse().unwrap();

        assert!(id > 1_600_000_000);
    }
}
