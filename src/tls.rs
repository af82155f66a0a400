use crate::VaultError;
use std::path::{Path, PathBuf};

/// Trust material for the Vault server certificate.
///
/// Files are read again on every reload, so a CA rotated on disk is picked
/// up without rebuilding the client. An empty path means system roots only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TlsConfig {
    /// PEM file holding one or more CA certificates.
    CaCert(PathBuf),
    /// Directory of PEM encoded CA certificates.
    CaPath(PathBuf),
}

impl TlsConfig {
    pub fn ca_cert(path: impl Into<PathBuf>) -> Self {
        TlsConfig::CaCert(path.into())
    }

    pub fn ca_path(path: impl Into<PathBuf>) -> Self {
        TlsConfig::CaPath(path.into())
    }

    /// `VAULT_CACERT` wins over `VAULT_CAPATH`, as in the Vault CLI.
    pub fn from_env() -> Option<Self> {
        std::env::var("VAULT_CACERT")
            .ok()
            .map(Self::ca_cert)
            .or_else(|| std::env::var("VAULT_CAPATH").ok().map(Self::ca_path))
    }

    pub(crate) fn load_certificates(&self) -> Result<Vec<reqwest::Certificate>, VaultError> {
        let mut certs = Vec::new();
        for file in self.pem_files()? {
            let pem = std::fs::read(&file).map_err(|e| {
                VaultError::Tls(format!("failed to read {}: {}", file.display(), e))
            })?;
            let bundle = reqwest::Certificate::from_pem_bundle(&pem).map_err(|e| {
                VaultError::Tls(format!("invalid certificate in {}: {}", file.display(), e))
            })?;
            if bundle.is_empty() {
                return Err(VaultError::Tls(format!(
                    "no certificates found in {}",
                    file.display()
                )));
            }
            certs.extend(bundle);
        }
        Ok(certs)
    }

    fn pem_files(&self) -> Result<Vec<PathBuf>, VaultError> {
        match self {
            TlsConfig::CaCert(path) if is_unset(path) => Ok(Vec::new()),
            TlsConfig::CaPath(path) if is_unset(path) => Ok(Vec::new()),
            TlsConfig::CaCert(path) => Ok(vec![path.clone()]),
            TlsConfig::CaPath(dir) => {
                let entries = std::fs::read_dir(dir).map_err(|e| {
                    VaultError::Tls(format!("failed to read CA directory {}: {}", dir.display(), e))
                })?;

                let mut files = Vec::new();
                for entry in entries {
                    let path = entry?.path();
                    let is_cert = path
                        .extension()
                        .and_then(|ext| ext.to_str())
                        .is_some_and(|ext| matches!(ext, "pem" | "crt" | "cer"));
                    if path.is_file() && is_cert {
                        files.push(path);
                    }
                }
                files.sort();
                Ok(files)
            }
        }
    }
}

fn is_unset(path: &Path) -> bool {
    path.as_os_str().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_empty_paths_use_system_roots() {
        assert!(TlsConfig::ca_path("").load_certificates().unwrap().is_empty());
        assert!(TlsConfig::ca_cert("").load_certificates().unwrap().is_empty());
    }

    #[test]
    fn test_ca_path_picks_certificate_files_only() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.pem"), "").unwrap();
        fs::write(dir.path().join("a.crt"), "").unwrap();
        fs::write(dir.path().join("README.md"), "").unwrap();
        fs::create_dir(dir.path().join("nested.pem")).unwrap();

        let files = TlsConfig::ca_path(dir.path()).pem_files().unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.crt", "b.pem"]);
    }

    #[test]
    fn test_missing_ca_cert_is_tls_error() {
        let result = TlsConfig::ca_cert("/nonexistent/ca.pem").load_certificates();
        assert!(matches!(result, Err(VaultError::Tls(_))));
    }

    #[test]
    fn test_missing_ca_path_is_tls_error() {
        let result = TlsConfig::ca_path("/nonexistent/ca-dir").load_certificates();
        assert!(matches!(result, Err(VaultError::Tls(_))));
    }

    #[test]
    fn test_file_without_certificates_is_rejected() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("ca.pem");
        fs::write(&file, "not a certificate").unwrap();

        let result = TlsConfig::ca_cert(&file).load_certificates();
        assert!(matches!(result, Err(VaultError::Tls(msg)) if msg.contains("no certificates")));
    }
}
