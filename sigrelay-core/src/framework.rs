use sqlx::PgPool;

/// Executes the SQL commands defined in [`crate::entities`].
///
/// Every command is a plain struct with a `Processor<Command>` impl on this
/// type, so call sites read as `processor.process(GetEventById { id }).await`.
#[derive(Debug, Clone)]
pub struct DatabaseProcessor {
    pub pool: PgPool,
}

impl DatabaseProcessor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Begin a transaction for commands that need read-check-write atomicity.
    pub async fn begin(&self) -> Result<sqlx::Transaction<'static, sqlx::Postgres>, sqlx::Error> {
        self.pool.begin().await
    }
}
