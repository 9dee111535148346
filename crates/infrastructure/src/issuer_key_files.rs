use std::path::{Path, PathBuf};

use council_application::{IssuerKey, IssuerKeyRegistry};
use council_core::{AppError, AppResult};
use tracing::info;

/// One configured `issuer=path` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuerKeyFile {
    /// Issuer name as it appears in the `iss` claim.
    pub issuer: String,
    /// PEM file holding the issuer's public key.
    pub path: PathBuf,
}

impl IssuerKeyFile {
    /// Parses a comma separated `issuer=path` list.
    pub fn parse_list(value: &str) -> AppResult<Vec<Self>> {
        let entries = value
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| {
                let (issuer, path) = entry.split_once('=').ok_or_else(|| {
                    AppError::Validation(format!(
                        "issuer key entry '{entry}' must have the form issuer=path"
                    ))
                })?;
                let issuer = issuer.trim();
                let path = path.trim();
                if issuer.is_empty() || path.is_empty() {
                    return Err(AppError::Validation(format!(
                        "issuer key entry '{entry}' has an empty issuer or path"
                    )));
                }

                Ok(Self {
                    issuer: issuer.to_owned(),
                    path: PathBuf::from(path),
                })
            })
            .collect::<AppResult<Vec<_>>>()?;

        if entries.is_empty() {
            return Err(AppError::Validation(
                "at least one issuer key file must be configured".to_owned(),
            ));
        }

        Ok(entries)
    }
}

/// Reads every configured PEM file into an issuer key registry.
///
/// Any unreadable or unparsable file fails the whole load.
pub fn load_issuer_keys(files: &[IssuerKeyFile]) -> AppResult<IssuerKeyRegistry> {
    files.iter().try_fold(IssuerKeyRegistry::new(), |registry, file| {
        let key = read_issuer_key(&file.path).map_err(|error| {
            AppError::Validation(format!(
                "failed to load key for issuer '{}': {error}",
                file.issuer
            ))
        })?;
        info!(issuer = %file.issuer, algorithm = ?key.algorithm(), "issuer key loaded");
        Ok(registry.with_issuer(file.issuer.clone(), key))
    })
}

fn read_issuer_key(path: &Path) -> AppResult<IssuerKey> {
    let pem = std::fs::read(path).map_err(|error| {
        AppError::Internal(format!("failed to read '{}': {error}", path.display()))
    })?;

    IssuerKey::from_pem(&pem)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use jsonwebtoken::Algorithm;

    use super::{IssuerKeyFile, load_issuer_keys};

    const ED25519_PUBLIC_PEM: &str = "-----BEGIN PUBLIC KEY-----
MCowBQYDK2VwAyEAGb9ECWmEzf6FQbrBZ9w7lshQhqowtrbLDFw4rXAxZuE=
-----END PUBLIC KEY-----
";

    fn write_temp_pem(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("council-{}-{name}", std::process::id()));
        assert!(std::fs::write(&path, contents).is_ok());
        path
    }

    #[test]
    fn parse_list_accepts_pairs_and_skips_blank_entries() {
        let parsed = IssuerKeyFile::parse_list(" gov-bot=bot.pem, ,single-endpoint = se.pem ");

        assert_eq!(
            parsed.ok(),
            Some(vec![
                IssuerKeyFile {
                    issuer: "gov-bot".to_owned(),
                    path: PathBuf::from("bot.pem"),
                },
                IssuerKeyFile {
                    issuer: "single-endpoint".to_owned(),
                    path: PathBuf::from("se.pem"),
                },
            ])
        );
    }

    #[test]
    fn parse_list_rejects_entries_without_separator() {
        assert!(IssuerKeyFile::parse_list("gov-bot").is_err());
        assert!(IssuerKeyFile::parse_list("=bot.pem").is_err());
        assert!(IssuerKeyFile::parse_list(" , ").is_err());
    }

    #[test]
    fn loads_ed25519_public_key() {
        let path = write_temp_pem("ed.pem", ED25519_PUBLIC_PEM);
        let registry = load_issuer_keys(&[IssuerKeyFile {
            issuer: "gov-bot".to_owned(),
            path: path.clone(),
        }]);
        let _ = std::fs::remove_file(path);

        let Ok(registry) = registry else {
            panic!("ed25519 key should load");
        };
        assert_eq!(
            registry.find("gov-bot").map(|key| key.algorithm()),
            Some(Algorithm::EdDSA)
        );
    }

    #[test]
    fn missing_or_garbage_file_fails_the_load() {
        let missing = load_issuer_keys(&[IssuerKeyFile {
            issuer: "gov-bot".to_owned(),
            path: PathBuf::from("/nonexistent/council/bot.pem"),
        }]);
        assert!(missing.is_err());

        let path = write_temp_pem("garbage.pem", "not a key");
        let garbage = load_issuer_keys(&[IssuerKeyFile {
            issuer: "gov-bot".to_owned(),
            path: path.clone(),
        }]);
        let _ = std::fs::remove_file(path);
        assert!(garbage.is_err());
    }
}
