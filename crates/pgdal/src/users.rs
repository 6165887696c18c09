//! User accounts on top of the executor.
//!
//! [`UserRepository`] keeps users in one table (by default
//! `"SiteData"."UserDat"` with columns `UserID`, `Username`, `Password`,
//! `Email`). Passwords are stored as salted hashes, see [`crate::password`].
//!
//! Registration checks for an existing username, then an existing email, then
//! inserts. The check and the insert are separate statements, so two racing
//! registrations can both pass the checks. With UNIQUE constraints on the
//! table the loser's insert fails and the outcome is re-derived from fresh
//! checks; without them both rows land.

use crate::clause::{like, set, where_eq};
use crate::client::Connector;
use crate::error::{OrmError, OrmResult};
use crate::executor::Executor;
use crate::ident::Location;
use crate::password::{PasswordConfig, hash_password_with, verify_password};
use crate::row::Row;
use crate::template::PatternMode;
use crate::values;
use serde::Serialize;
use uuid::Uuid;

/// Where users live and what the columns are called.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserTable {
    pub schema: String,
    pub table: String,
    pub id_column: String,
    pub username_column: String,
    pub password_column: String,
    pub email_column: String,
}

impl Default for UserTable {
    fn default() -> Self {
        Self {
            schema: "SiteData".to_string(),
            table: "UserDat".to_string(),
            id_column: "UserID".to_string(),
            username_column: "Username".to_string(),
            password_column: "Password".to_string(),
            email_column: "Email".to_string(),
        }
    }
}

impl UserTable {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
            ..Self::default()
        }
    }

    pub fn location(&self) -> Location {
        Location::new(&self.schema, &self.table)
    }

    /// Decode one row of this table.
    pub fn user_from_row(&self, row: &Row) -> OrmResult<User> {
        Ok(User {
            id: row.try_get(&self.id_column)?,
            username: row.try_get(&self.username_column)?,
            password_hash: row.try_get(&self.password_column)?,
            email: row.try_get(&self.email_column)?,
        })
    }
}

/// A stored user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub email: String,
}

/// Registration input; `password` is plain text and hashed before storage.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub email: String,
}

impl NewUser {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            email: email.into(),
        }
    }
}

/// Result of [`UserRepository::insert_user`]. Failures are the `Err` arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertUserOutcome {
    Inserted(Uuid),
    UsernameExists,
    EmailExists,
}

/// User operations over one table.
#[derive(Debug, Clone)]
pub struct UserRepository<C> {
    executor: Executor<C>,
    table: UserTable,
    passwords: PasswordConfig,
}

impl<C: Connector> UserRepository<C> {
    pub fn new(executor: Executor<C>) -> Self {
        Self {
            executor,
            table: UserTable::default(),
            passwords: PasswordConfig::default(),
        }
    }

    pub fn with_table(mut self, table: UserTable) -> Self {
        self.table = table;
        self
    }

    pub fn with_password_config(mut self, config: PasswordConfig) -> Self {
        self.passwords = config;
        self
    }

    pub fn executor(&self) -> &Executor<C> {
        &self.executor
    }

    pub fn table(&self) -> &UserTable {
        &self.table
    }

    pub async fn username_exists(&self, username: &str) -> OrmResult<bool> {
        let rows = self
            .executor
            .select_many_by(&self.table.location(), &self.table.username_column, username)
            .await?;
        Ok(!rows.is_empty())
    }

    pub async fn email_exists(&self, email: &str) -> OrmResult<bool> {
        let rows = self
            .executor
            .select_many_by(&self.table.location(), &self.table.email_column, email)
            .await?;
        Ok(!rows.is_empty())
    }

    /// Register a user under a fresh id.
    pub async fn insert_user(&self, user: &NewUser) -> OrmResult<InsertUserOutcome> {
        if let Some(taken) = self.taken(user).await? {
            return Ok(taken);
        }

        let id = Uuid::new_v4();
        let hash = self.hash(&user.password).await?;
        let t = &self.table;
        let fields = [
            t.id_column.as_str(),
            t.username_column.as_str(),
            t.password_column.as_str(),
            t.email_column.as_str(),
        ];
        let values = values![id, user.username.as_str(), hash, user.email.as_str()];

        match self.executor.insert(&t.location(), &fields, values).await {
            Ok(true) => {
                tracing::debug!(target: "pgdal", user_id = %id, "user inserted");
                Ok(InsertUserOutcome::Inserted(id))
            }
            Ok(false) => Err(OrmError::Other(format!(
                "insert of user '{}' affected no rows",
                user.username
            ))),
            Err(e) if e.is_unique_violation() => {
                tracing::warn!(
                    target: "pgdal",
                    username = %user.username,
                    "user insert hit a unique constraint after passing checks"
                );
                match self.taken(user).await? {
                    Some(taken) => Ok(taken),
                    None => Err(e),
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn taken(&self, user: &NewUser) -> OrmResult<Option<InsertUserOutcome>> {
        if self.username_exists(&user.username).await? {
            return Ok(Some(InsertUserOutcome::UsernameExists));
        }
        if self.email_exists(&user.email).await? {
            return Ok(Some(InsertUserOutcome::EmailExists));
        }
        Ok(None)
    }

    /// Check a username/password pair. An unknown user is `Ok(false)`.
    pub async fn authenticate(&self, username: &str, password: &str) -> OrmResult<bool> {
        let Some(row) = self
            .executor
            .select_one_by(&self.table.location(), &self.table.username_column, username)
            .await?
        else {
            return Ok(false);
        };
        let stored: String = row.try_get(&self.table.password_column)?;
        let password = password.to_string();
        blocking(move || verify_password(&password, &stored)).await
    }

    pub async fn get_user_by_id(&self, id: Uuid) -> OrmResult<Option<User>> {
        let row = self
            .executor
            .select_one_by(&self.table.location(), &self.table.id_column, id)
            .await?;
        row.map(|r| self.table.user_from_row(&r)).transpose()
    }

    pub async fn get_user_by_username(&self, username: &str) -> OrmResult<Option<User>> {
        let row = self
            .executor
            .select_one_by(&self.table.location(), &self.table.username_column, username)
            .await?;
        row.map(|r| self.table.user_from_row(&r)).transpose()
    }

    /// Returns whether a user with that name was updated.
    pub async fn update_email(&self, username: &str, email: &str) -> OrmResult<bool> {
        self.executor
            .update(
                &self.table.location(),
                &set([&self.table.email_column]),
                values![email],
                &where_eq(&self.table.username_column),
                values![username],
            )
            .await
    }

    /// Store a new hash for `username`.
    pub async fn update_password(&self, username: &str, password: &str) -> OrmResult<bool> {
        let hash = self.hash(password).await?;
        self.executor
            .update(
                &self.table.location(),
                &set([&self.table.password_column]),
                values![hash],
                &where_eq(&self.table.username_column),
                values![username],
            )
            .await
    }

    pub async fn delete_user(&self, username: &str) -> OrmResult<bool> {
        self.executor
            .delete(
                &self.table.location(),
                &where_eq(&self.table.username_column),
                values![username],
            )
            .await
    }

    /// Users whose name matches `fragment` placed according to `mode`.
    pub async fn search_users(&self, fragment: &str, mode: PatternMode) -> OrmResult<Vec<User>> {
        let rows = self
            .executor
            .select_many(
                &self.table.location(),
                &like(&self.table.username_column, mode),
                values![fragment],
            )
            .await?;
        rows.iter().map(|r| self.table.user_from_row(r)).collect()
    }

    pub async fn count_users_matching(&self, fragment: &str, mode: PatternMode) -> OrmResult<i64> {
        self.executor
            .count(
                &self.table.location(),
                &like(&self.table.username_column, mode),
                values![fragment],
            )
            .await
    }

    pub async fn list_users(&self) -> OrmResult<Vec<User>> {
        let rows = self.executor.select_all(&self.table.location()).await?;
        rows.iter().map(|r| self.table.user_from_row(r)).collect()
    }

    async fn hash(&self, password: &str) -> OrmResult<String> {
        let password = password.to_string();
        let config = self.passwords;
        blocking(move || hash_password_with(&password, &config)).await
    }
}

// Key stretching is CPU-bound; keep it off the async workers.
async fn blocking<T, F>(f: F) -> OrmResult<T>
where
    F: FnOnce() -> OrmResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| OrmError::Other(format!("password task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedConnector;
    use crate::value::Value;

    const USER_COLUMNS: [&str; 4] = ["UserID", "Username", "Password", "Email"];

    fn setup() -> (ScriptedConnector, UserRepository<ScriptedConnector>) {
        let conn = ScriptedConnector::new();
        let repo = UserRepository::new(Executor::new(conn.clone()))
            .with_password_config(PasswordConfig::new().iterations(8));
        (conn, repo)
    }

    /// Script one successful registration: both checks empty, insert hits.
    fn script_free_insert(conn: &ScriptedConnector) {
        conn.push_empty(&USER_COLUMNS)
            .push_empty(&USER_COLUMNS)
            .push_affected(1);
    }

    fn stored_row(id: Uuid, name: &str, hash: &str, email: &str) -> Vec<Value> {
        values![id, name, hash, email]
    }

    #[tokio::test]
    async fn insert_user_checks_then_inserts() {
        let (conn, repo) = setup();
        script_free_insert(&conn);

        let outcome = repo
            .insert_user(&NewUser::new("alice", "pw1", "alice@x.com"))
            .await
            .unwrap();
        let InsertUserOutcome::Inserted(id) = outcome else {
            panic!("expected insert, got {outcome:?}");
        };

        let sent = conn.statements();
        assert_eq!(sent.len(), 3);
        assert_eq!(
            sent[0].sql,
            r#"SELECT * FROM "SiteData"."UserDat" WHERE "Username"=$1"#
        );
        assert_eq!(
            sent[1].sql,
            r#"SELECT * FROM "SiteData"."UserDat" WHERE "Email"=$1"#
        );
        assert_eq!(
            sent[2].sql,
            r#"INSERT INTO "SiteData"."UserDat" ("UserID","Username","Password","Email") VALUES ($1,$2,$3,$4)"#
        );
        assert_eq!(sent[2].values[0], Value::Uuid(id));
        assert_eq!(sent[2].values[1], Value::from("alice"));
        let hash = sent[2].values[2].as_str().unwrap();
        assert_ne!(hash, "pw1");
        assert!(verify_password("pw1", hash).unwrap());
    }

    #[tokio::test]
    async fn second_insert_of_same_username_is_refused() {
        let (conn, repo) = setup();
        script_free_insert(&conn);
        let first = repo
            .insert_user(&NewUser::new("alice", "pw1", "alice@x.com"))
            .await
            .unwrap();
        assert!(matches!(first, InsertUserOutcome::Inserted(_)));

        conn.push_rows(
            &USER_COLUMNS,
            vec![stored_row(Uuid::new_v4(), "alice", "h", "alice@x.com")],
        );
        let second = repo
            .insert_user(&NewUser::new("alice", "pw2", "other@x.com"))
            .await
            .unwrap();
        assert_eq!(second, InsertUserOutcome::UsernameExists);

        let inserts = conn
            .sql()
            .into_iter()
            .filter(|s| s.starts_with("INSERT"))
            .count();
        assert_eq!(inserts, 1);
    }

    #[tokio::test]
    async fn taken_email_is_reported() {
        let (conn, repo) = setup();
        conn.push_empty(&USER_COLUMNS).push_rows(
            &USER_COLUMNS,
            vec![stored_row(Uuid::new_v4(), "alice", "h", "alice@x.com")],
        );
        let outcome = repo
            .insert_user(&NewUser::new("alice2", "pw", "alice@x.com"))
            .await
            .unwrap();
        assert_eq!(outcome, InsertUserOutcome::EmailExists);
        assert_eq!(conn.statements().len(), 2);
    }

    #[tokio::test]
    async fn racing_insert_is_rederived_from_checks() {
        let (conn, repo) = setup();
        conn.push_empty(&USER_COLUMNS)
            .push_empty(&USER_COLUMNS)
            .push_error(OrmError::UniqueViolation("UserDat_Username_key".into()))
            .push_rows(
                &USER_COLUMNS,
                vec![stored_row(Uuid::new_v4(), "alice", "h", "a@x.com")],
            );
        let outcome = repo
            .insert_user(&NewUser::new("alice", "pw", "b@x.com"))
            .await
            .unwrap();
        assert_eq!(outcome, InsertUserOutcome::UsernameExists);
    }

    #[tokio::test]
    async fn unexplained_unique_violation_is_returned() {
        let (conn, repo) = setup();
        conn.push_empty(&USER_COLUMNS)
            .push_empty(&USER_COLUMNS)
            .push_error(OrmError::UniqueViolation("UserDat_pkey".into()))
            .push_empty(&USER_COLUMNS)
            .push_empty(&USER_COLUMNS);
        let err = repo
            .insert_user(&NewUser::new("alice", "pw", "a@x.com"))
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[tokio::test]
    async fn insert_affecting_nothing_is_an_error() {
        let (conn, repo) = setup();
        conn.push_empty(&USER_COLUMNS)
            .push_empty(&USER_COLUMNS)
            .push_affected(0);
        let err = repo
            .insert_user(&NewUser::new("alice", "pw", "a@x.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, OrmError::Other(_)));
    }

    #[tokio::test]
    async fn alice_and_bob() {
        let (conn, repo) = setup();
        script_free_insert(&conn);
        script_free_insert(&conn);
        repo.insert_user(&NewUser::new("alice", "pw1", "alice@x.com"))
            .await
            .unwrap();
        repo.insert_user(&NewUser::new("bob", "pw2", "bob@x.com"))
            .await
            .unwrap();

        let inserted = conn.statements();
        let alice_id = inserted[2].values[0].as_uuid().unwrap();
        let alice_hash = inserted[2].values[2].as_str().unwrap().to_string();

        conn.push_rows(
            &USER_COLUMNS,
            vec![stored_row(alice_id, "alice", &alice_hash, "alice@x.com")],
        );
        assert!(repo.username_exists("alice").await.unwrap());

        conn.push_rows(
            &USER_COLUMNS,
            vec![stored_row(alice_id, "alice", &alice_hash, "alice@x.com")],
        );
        assert!(repo.authenticate("alice", "pw1").await.unwrap());

        conn.push_rows(
            &USER_COLUMNS,
            vec![stored_row(alice_id, "alice", &alice_hash, "alice@x.com")],
        );
        assert!(!repo.authenticate("alice", "wrong").await.unwrap());

        conn.push_empty(&USER_COLUMNS);
        assert!(!repo.authenticate("carol", "pw1").await.unwrap());

        conn.push_rows(
            &USER_COLUMNS,
            vec![stored_row(alice_id, "alice", &alice_hash, "alice@x.com")],
        );
        let user = repo.get_user_by_id(alice_id).await.unwrap().unwrap();
        assert_eq!(user.username, "alice");
        assert_eq!(user.email, "alice@x.com");
        let last = conn.statements().pop().unwrap();
        assert_eq!(
            last.sql,
            r#"SELECT * FROM "SiteData"."UserDat" WHERE "UserID"=$1 LIMIT 1"#
        );
        assert_eq!(last.values, values![alice_id]);
    }

    #[tokio::test]
    async fn alice_only() {
        let (conn, repo) = setup();
        script_free_insert(&conn);
        let outcome = repo
            .insert_user(&NewUser::new("alice", "secret", "a@x.com"))
            .await
            .unwrap();
        let InsertUserOutcome::Inserted(id) = outcome else {
            panic!("expected insert, got {outcome:?}");
        };
        let hash = conn.statements()[2].values[2].as_str().unwrap().to_string();

        conn.push_rows(&USER_COLUMNS, vec![stored_row(id, "alice", &hash, "a@x.com")]);
        let alice = repo.get_user_by_username("alice").await.unwrap().unwrap();
        assert_eq!(alice.email, "a@x.com");

        conn.push_rows(&USER_COLUMNS, vec![stored_row(id, "alice", &hash, "a@x.com")])
            .push_empty(&USER_COLUMNS);
        assert!(repo.username_exists("alice").await.unwrap());
        assert!(!repo.username_exists("bob").await.unwrap());
    }

    #[tokio::test]
    async fn plain_text_stored_password_is_a_credential_error() {
        let (conn, repo) = setup();
        conn.push_rows(
            &USER_COLUMNS,
            vec![stored_row(Uuid::new_v4(), "legacy", "pw1", "l@x.com")],
        );
        let err = repo.authenticate("legacy", "pw1").await.unwrap_err();
        assert!(matches!(err, OrmError::Credential(_)));
    }

    #[tokio::test]
    async fn search_and_count_use_like() {
        let (conn, repo) = setup();
        let id = Uuid::new_v4();
        conn.push_rows(&USER_COLUMNS, vec![stored_row(id, "alice", "h", "a@x.com")])
            .push_rows(&["count"], vec![values![1_i64]]);

        let found = repo.search_users("lic", PatternMode::Anywhere).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, id);
        let n = repo
            .count_users_matching("lic", PatternMode::Anywhere)
            .await
            .unwrap();
        assert_eq!(n, found.len() as i64);

        let sent = conn.statements();
        assert!(sent[0].sql.ends_with(r#"WHERE "Username" LIKE $1"#));
        assert_eq!(sent[0].values, values!["%lic%"]);
        assert_eq!(sent[1].values, values!["%lic%"]);
    }

    #[tokio::test]
    async fn updates_and_delete() {
        let (conn, repo) = setup();
        conn.push_affected(1).push_affected(1).push_affected(0);

        assert!(repo.update_email("alice", "new@x.com").await.unwrap());
        assert!(repo.update_password("alice", "pw9").await.unwrap());
        assert!(!repo.delete_user("ghost").await.unwrap());

        let sent = conn.statements();
        assert_eq!(
            sent[0].sql,
            r#"UPDATE "SiteData"."UserDat" SET "Email"=$1 WHERE "Username"=$2"#
        );
        assert_eq!(sent[0].values, values!["new@x.com", "alice"]);
        let hash = sent[1].values[0].as_str().unwrap();
        assert!(verify_password("pw9", hash).unwrap());
        assert_eq!(
            sent[2].sql,
            r#"DELETE FROM "SiteData"."UserDat" WHERE "Username"=$1"#
        );
    }

    #[tokio::test]
    async fn list_users_decodes_every_row() {
        let (conn, repo) = setup();
        conn.push_rows(
            &USER_COLUMNS,
            vec![
                stored_row(Uuid::new_v4(), "alice", "h1", "a@x.com"),
                stored_row(Uuid::new_v4(), "bob", "h2", "b@x.com"),
            ],
        );
        let users = repo.list_users().await.unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[1].email, "b@x.com");
    }

    #[tokio::test]
    async fn custom_table_names_flow_through() {
        let conn = ScriptedConnector::new();
        let mut table = UserTable::new("auth", "accounts");
        table.username_column = "login".to_string();
        let repo = UserRepository::new(Executor::new(conn.clone())).with_table(table);

        conn.push_empty(&["login"]);
        assert!(!repo.username_exists("x").await.unwrap());
        assert_eq!(
            conn.sql()[0],
            r#"SELECT * FROM "auth"."accounts" WHERE "login"=$1"#
        );
    }

    #[test]
    fn serialized_user_omits_password() {
        let user = User {
            id: Uuid::nil(),
            username: "alice".into(),
            password_hash: "secret-hash".into(),
            email: "a@x.com".into(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret-hash"));
        assert!(json.contains("alice"));
    }
}
