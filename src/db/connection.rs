use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;

pub type DbPool = Pool<Postgres>;

pub async fn init_db(database_url: &str) -> Result<DbPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(20)
        .max_lifetime(Duration::from_secs(30 * 60))
        .idle_timeout(Duration::from_secs(10 * 60))
        .connect(database_url)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id UUID PRIMARY KEY,
            university_id VARCHAR(20) NOT NULL UNIQUE,
            full_name VARCHAR(255) NOT NULL,
            user_type VARCHAR(10) NOT NULL,
            created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS courses (
            id UUID PRIMARY KEY,
            code VARCHAR(10) NOT NULL,
            name VARCHAR(100) NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS periods (
            number INT PRIMARY KEY,
            start_time TIME NOT NULL,
            end_time TIME NOT NULL,
            is_online BOOLEAN NOT NULL DEFAULT FALSE,
            CHECK (start_time < end_time)
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sections (
            id UUID PRIMARY KEY,
            course_id UUID NOT NULL REFERENCES courses(id) ON DELETE CASCADE,
            section_number VARCHAR(10) NOT NULL,
            activity_type VARCHAR(50) NOT NULL,
            professor_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            UNIQUE(course_id, section_number, activity_type)
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS section_students (
            section_id UUID NOT NULL REFERENCES sections(id) ON DELETE CASCADE,
            student_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            PRIMARY KEY(section_id, student_id)
        )
        "#,
    )
    .execute(&pool)
    .await?;

    // Recurring weekly commitments. day_of_week is 0..=6 with 0 = Sunday;
    // teaching days are Sunday through Thursday.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schedules (
            id UUID PRIMARY KEY,
            section_id UUID NOT NULL REFERENCES sections(id) ON DELETE CASCADE,
            day_of_week INT NOT NULL CHECK (day_of_week BETWEEN 0 AND 6),
            period_number INT NOT NULL REFERENCES periods(number) ON DELETE CASCADE,
            UNIQUE(section_id, day_of_week, period_number)
        )
        "#,
    )
    .execute(&pool)
    .await?;

    // A section can never hold two quizzes in the same slot; the unique
    // constraint is what stops two concurrent resolutions from double-booking.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS quizzes (
            id UUID PRIMARY KEY,
            section_id UUID NOT NULL REFERENCES sections(id) ON DELETE CASCADE,
            date DATE NOT NULL,
            period_number INT NOT NULL REFERENCES periods(number) ON DELETE CASCADE,
            room VARCHAR(20) NOT NULL,
            created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(section_id, date, period_number)
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS votes (
            id UUID PRIMARY KEY,
            section_id UUID NOT NULL REFERENCES sections(id) ON DELETE CASCADE,
            professor_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT CURRENT_TIMESTAMP,
            duration_days INT NOT NULL DEFAULT 1,
            ends_at TIMESTAMP WITH TIME ZONE NOT NULL,
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            selected_option_id UUID,
            room VARCHAR(20),
            needs_room BOOLEAN NOT NULL DEFAULT FALSE
        )
        "#,
    )
    .execute(&pool)
    .await?;

    // position records creation order; the resolver breaks ties by it.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS vote_options (
            id UUID PRIMARY KEY,
            vote_id UUID NOT NULL REFERENCES votes(id) ON DELETE CASCADE,
            date DATE NOT NULL,
            period_number INT NOT NULL REFERENCES periods(number) ON DELETE CASCADE,
            position INT NOT NULL,
            UNIQUE(vote_id, date, period_number)
        )
        "#,
    )
    .execute(&pool)
    .await?;

    // One ballot per (vote, student), enforced by the database rather than
    // application logic so concurrent casts cannot both succeed.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS student_ballots (
            id UUID PRIMARY KEY,
            vote_id UUID NOT NULL REFERENCES votes(id) ON DELETE CASCADE,
            student_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            option_id UUID NOT NULL REFERENCES vote_options(id) ON DELETE CASCADE,
            created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(vote_id, student_id)
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS notifications (
            id UUID PRIMARY KEY,
            recipient_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            sender_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            notification_type VARCHAR(20) NOT NULL,
            title VARCHAR(200) NOT NULL,
            message TEXT NOT NULL,
            section_id UUID REFERENCES sections(id) ON DELETE CASCADE,
            vote_id UUID,
            is_read BOOLEAN NOT NULL DEFAULT FALSE,
            created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_sections_professor_id ON sections(professor_id)
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_section_students_student_id ON section_students(student_id)
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_quizzes_date ON quizzes(date)
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_votes_section_id ON votes(section_id)
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_votes_active_ends_at ON votes(ends_at) WHERE is_active
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_vote_options_vote_id ON vote_options(vote_id)
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_student_ballots_vote_id ON student_ballots(vote_id)
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_notifications_recipient_id ON notifications(recipient_id)
        "#,
    )
    .execute(&pool)
    .await?;

    Ok(pool)
}
