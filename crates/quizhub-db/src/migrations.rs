use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (accounts, quizzes, scores)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id                      INTEGER PRIMARY KEY AUTOINCREMENT,
                username                TEXT NOT NULL,
                email                   TEXT NOT NULL UNIQUE,
                password                TEXT NOT NULL,
                subscription_type       TEXT NOT NULL DEFAULT 'free'
                                        CHECK (subscription_type IN ('free', 'premium')),
                billing_customer_id     TEXT,
                billing_subscription_id TEXT,
                subscription_ends_at    TEXT,
                created_at              TEXT NOT NULL
            );

            CREATE INDEX idx_users_billing_customer ON users(billing_customer_id);

            CREATE TABLE password_reset_tokens (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                token       TEXT NOT NULL UNIQUE,
                expires_at  TEXT NOT NULL,
                used_at     TEXT,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE quizzes (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                owner_id    INTEGER REFERENCES users(id) ON DELETE SET NULL,
                title       TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                language    TEXT NOT NULL,
                difficulty  TEXT NOT NULL,
                questions   TEXT NOT NULL,
                is_public   INTEGER NOT NULL DEFAULT 0,
                is_premium  INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );

            CREATE INDEX idx_quizzes_owner ON quizzes(owner_id);
            CREATE INDEX idx_quizzes_public ON quizzes(is_public, created_at);

            CREATE TABLE user_scores (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                quiz_id     INTEGER NOT NULL REFERENCES quizzes(id) ON DELETE CASCADE,
                user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                score       INTEGER NOT NULL,
                max_score   INTEGER NOT NULL,
                answers     TEXT NOT NULL DEFAULT 'null',
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_scores_quiz ON user_scores(quiz_id, user_id);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    if version < 2 {
        info!("Running migration v2 (friendships, notifications, generations)");
        conn.execute_batch(
            "
            CREATE TABLE friendships (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                requester_id    INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                addressee_id    INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                status          TEXT NOT NULL
                                CHECK (status IN ('pending', 'accepted', 'declined')),
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL,
                CHECK (requester_id <> addressee_id)
            );

            -- At most one relationship per unordered pair
            CREATE UNIQUE INDEX idx_friendships_pair
                ON friendships(min(requester_id, addressee_id), max(requester_id, addressee_id));
            CREATE INDEX idx_friendships_requester ON friendships(requester_id, status);
            CREATE INDEX idx_friendships_addressee ON friendships(addressee_id, status);

            CREATE TABLE notifications (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id         INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                actor_user_id   INTEGER REFERENCES users(id) ON DELETE SET NULL,
                type            TEXT NOT NULL,
                data            TEXT NOT NULL,
                is_read         INTEGER NOT NULL DEFAULT 0,
                created_at      TEXT NOT NULL
            );

            CREATE INDEX idx_notifications_user ON notifications(user_id, created_at);

            CREATE TABLE generations (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_generations_user ON generations(user_id, created_at);

            INSERT INTO schema_version (version) VALUES (2);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
