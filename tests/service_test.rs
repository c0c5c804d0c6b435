//! An application service written against the `Manager` capability trait.

use serde::Deserialize;
use sql_manager::config::PoolOptions;
use sql_manager::models::{ConnectionConfig, RowMapping, Statement};
use sql_manager::{DbResult, Manager, ManagerExt, PoolManager};
use std::sync::Arc;
use tempfile::NamedTempFile;

#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
struct User {
    id: String,
    email: String,
    date_of_birth: Option<String>,
    verified: bool,
}

struct UserService {
    db: Arc<dyn Manager>,
    mapping: RowMapping,
}

impl UserService {
    fn new(db: Arc<dyn Manager>) -> Self {
        let mapping = RowMapping::new()
            .rename("date_of_birth", "dateOfBirth")
            .bool_field("verified");
        Self { db, mapping }
    }

    async fn create_schema(&self) -> DbResult<u64> {
        self.db
            .exec_batch(&[
                Statement::new(
                    "CREATE TABLE users (id TEXT PRIMARY KEY, email TEXT UNIQUE NOT NULL, date_of_birth TEXT, verified TEXT NOT NULL DEFAULT 'n')",
                ),
                Statement::new("CREATE TABLE audit (user_id TEXT NOT NULL, action TEXT NOT NULL)"),
            ])
            .await
    }

    async fn create(&self, id: &str, email: &str, date_of_birth: Option<&str>) -> DbResult<u64> {
        self.db
            .exec_batch(&[
                Statement::new("INSERT INTO users (id, email, date_of_birth) VALUES ($1, $2, $3)")
                    .with_params(vec![
                        Some(id.into()),
                        Some(email.into()),
                        date_of_birth.map(Into::into),
                    ]),
                Statement::new("INSERT INTO audit (user_id, action) VALUES ($1, 'create')")
                    .with_param(id),
            ])
            .await
    }

    async fn verify(&self, id: &str) -> DbResult<bool> {
        let affected = self
            .db
            .exec("UPDATE users SET verified = 'y' WHERE id = $1", &[Some(id.into())])
            .await?;
        Ok(affected == 1)
    }

    async fn find(&self, id: &str) -> DbResult<Option<User>> {
        self.db
            .query_one_as("SELECT * FROM users WHERE id = $1", &[Some(id.into())], Some(&self.mapping))
            .await
    }

    async fn list(&self) -> DbResult<Vec<User>> {
        self.db
            .query_as("SELECT * FROM users ORDER BY id ASC", &[], Some(&self.mapping))
            .await
    }

    async fn audit_count(&self) -> DbResult<i64> {
        self.db.count("SELECT COUNT(*) FROM audit", &[]).await
    }
}

async fn user_service(temp_file: &NamedTempFile) -> UserService {
    let conn_url = format!("sqlite:{}", temp_file.path().to_str().unwrap());
    let config = ConnectionConfig::new(conn_url, PoolOptions::default()).unwrap();
    let manager = PoolManager::connect(&config).await.unwrap();
    let service = UserService::new(Arc::new(manager));
    service.create_schema().await.unwrap();
    service
}

#[tokio::test]
async fn test_user_lifecycle() {
    let temp_file = NamedTempFile::new().unwrap();
    let service = user_service(&temp_file).await;

    assert_eq!(service.create("1", "a@x.io", Some("1990-01-01")).await.unwrap(), 2);
    assert_eq!(service.create("2", "b@x.io", None).await.unwrap(), 2);
    assert!(service.verify("1").await.unwrap());
    assert!(!service.verify("3").await.unwrap());

    assert_eq!(
        service.find("1").await.unwrap(),
        Some(User {
            id: "1".to_string(),
            email: "a@x.io".to_string(),
            date_of_birth: Some("1990-01-01".to_string()),
            verified: true,
        })
    );
    assert_eq!(service.find("3").await.unwrap(), None);

    let users = service.list().await.unwrap();
    assert_eq!(users.len(), 2);
    assert_eq!(users[1].date_of_birth, None);
    assert!(!users[1].verified);
}

#[tokio::test]
async fn test_duplicate_user_leaves_no_audit_row() {
    let temp_file = NamedTempFile::new().unwrap();
    let service = user_service(&temp_file).await;

    service.create("1", "a@x.io", None).await.unwrap();
    // Unique email violation on the first statement rolls back the audit insert too
    assert!(service.create("2", "a@x.io", None).await.is_err());

    assert_eq!(service.audit_count().await.unwrap(), 1);
    assert_eq!(service.list().await.unwrap().len(), 1);
}
