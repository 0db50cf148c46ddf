
#[cfg(test)]
pub(super) struct CredentialFiles {
    pub dir: tempfile::TempDir,
}

#[cfg(test)]
impl CredentialFiles {
    pub fn local() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("source.json"),
            r#"{"provider": "local", "root": "/data/source"}"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("target.json"),
            r#"{"provider": "s3", "accessKeyId": "my_access_key", "secretAccessKey": "my_secret_access_key", "region": "us-west-2"}"#,
        )
        .unwrap();
        Self { dir }
    }

    pub fn source(&self) -> String {
        self.dir.path().join("source.json").to_string_lossy().to_string()
    }

    pub fn target(&self) -> String {
        self.dir.path().join("target.json").to_string_lossy().to_string()
    }

    pub fn args(&self, command: &[&str]) -> Vec<String> {
        let mut args = vec![
            "object-storage-migrate".to_string(),
            "--source-credential-file".to_string(),
            self.source(),
            "--target-credential-file".to_string(),
            self.target(),
        ];
        args.extend(command.iter().map(|arg| arg.to_string()));
        args
    }
}
