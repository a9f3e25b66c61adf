use std::path::Path;

use courier_common::error::AppError;
use courier_common::types::NewRecipient;

/// Read the recipients listed in a JSON seed file.
pub async fn load_seed_file(path: impl AsRef<Path>) -> Result<Vec<NewRecipient>, AppError> {
    let path = path.as_ref();
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| AppError::Config(format!("cannot read seed file {}: {e}", path.display())))?;

    let recipients: Vec<NewRecipient> = serde_json::from_str(&raw)
        .map_err(|e| AppError::Config(format!("invalid seed file {}: {e}", path.display())))?;

    if let Some(bad) = recipients.iter().find(|r| !r.email.contains('@')) {
        return Err(AppError::Config(format!(
            "seed file {} has an invalid email: {}",
            path.display(),
            bad.email
        )));
    }

    Ok(recipients)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_seed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seed.json");
        std::fs::write(
            &path,
            r#"[
                {"name": "John Doe", "email": "john@example.com"},
                {"name": "Jane Smith", "email": "jane@example.com"}
            ]"#,
        )
        .unwrap();

        let recipients = load_seed_file(&path).await.unwrap();
        assert_eq!(recipients.len(), 2);
        assert_eq!(recipients[1].email, "jane@example.com");
    }

    #[tokio::test]
    async fn test_load_seed_file_rejects_bad_email() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seed.json");
        std::fs::write(&path, r#"[{"name": "Bob", "email": "bob"}]"#).unwrap();

        let err = load_seed_file(&path).await.unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[tokio::test]
    async fn test_load_missing_seed_file() {
        let err = load_seed_file("/nonexistent/seed.json").await.unwrap_err();
        assert!(err.to_string().contains("cannot read seed file"));
    }
}
